//! Installation identity
//!
//! The identifier is a 16-byte random token, hex encoded, created the first
//! time the integration is activated. It is immutable afterwards: nothing in
//! this crate rotates or deletes it. The automation service signs it to
//! authenticate, and the site encrypts it to answer the authority's challenge.

pub mod settings;

pub use settings::{FileSettings, MemorySettings, SettingsError, SettingsStore};

use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

use crate::types::{Result, SiteError};

/// Opaque installation identifier
#[derive(Clone, PartialEq, Eq)]
pub struct Identifier(String);

impl Identifier {
    /// Number of random bytes behind the hex encoding
    pub const BYTE_LEN: usize = 16;

    /// Generate a fresh identifier from the OS random number generator
    pub fn generate() -> Self {
        let mut bytes = [0u8; Self::BYTE_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    /// Parse a stored identifier, rejecting anything that is not 32 hex chars
    pub fn parse(value: &str) -> Option<Self> {
        let decoded = hex::decode(value).ok()?;
        (decoded.len() == Self::BYTE_LEN).then(|| Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The bytes that are signed and encrypted
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identifier({}…)", &self.0[..4])
    }
}

/// Reads and lazily creates the installation identifier
#[derive(Clone)]
pub struct IdentityStore {
    settings: Arc<dyn SettingsStore>,
    key: String,
}

impl IdentityStore {
    pub fn new(settings: Arc<dyn SettingsStore>, namespace: &str) -> Self {
        Self {
            settings,
            key: format!("{namespace}_identifier"),
        }
    }

    /// Settings key the identifier lives under
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Return the identifier, creating it on first call.
    ///
    /// Never overwrites: the write is add-if-absent, and a lost race re-reads
    /// whatever the winner stored.
    pub async fn ensure_identifier(&self) -> Result<Identifier> {
        if let Some(existing) = self.get_identifier().await? {
            return Ok(existing);
        }

        let fresh = Identifier::generate();
        if self.settings.add(&self.key, fresh.as_str()).await? {
            info!(key = %self.key, "Installation identifier created");
            return Ok(fresh);
        }

        warn!(key = %self.key, "Identifier appeared concurrently, keeping stored value");
        self.get_identifier()
            .await?
            .ok_or_else(|| SiteError::Internal("identifier vanished after add".to_string()))
    }

    /// Look up the identifier without creating it
    pub async fn get_identifier(&self) -> Result<Option<Identifier>> {
        match self.settings.get(&self.key).await? {
            None => Ok(None),
            Some(raw) => Identifier::parse(&raw).map(Some).ok_or_else(|| {
                SiteError::Internal(format!("stored value under {} is not an identifier", self.key))
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (IdentityStore, Arc<MemorySettings>) {
        let settings = Arc::new(MemorySettings::new());
        (IdentityStore::new(settings.clone(), "sitebridge"), settings)
    }

    #[test]
    fn test_generated_identifier_shape() {
        let id = Identifier::generate();
        assert_eq!(id.as_str().len(), 32);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(Identifier::generate(), id);
    }

    #[test]
    fn test_parse_rejects_wrong_length_and_non_hex() {
        assert!(Identifier::parse("abcd").is_none());
        assert!(Identifier::parse(&"z".repeat(32)).is_none());
        assert!(Identifier::parse(&"a".repeat(32)).is_some());
    }

    #[test]
    fn test_debug_does_not_print_full_value() {
        let id = Identifier::parse("0123456789abcdef0123456789abcdef").unwrap();
        assert!(!format!("{id:?}").contains("0123456789abcdef0123"));
    }

    #[tokio::test]
    async fn test_ensure_is_idempotent() {
        let (identity, _) = store();
        let first = identity.ensure_identifier().await.unwrap();
        let second = identity.ensure_identifier().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(identity.get_identifier().await.unwrap(), Some(first));
    }

    #[tokio::test]
    async fn test_ensure_keeps_preexisting_value() {
        let (identity, settings) = store();
        let preset = "ffeeddccbbaa99887766554433221100";
        settings.set("sitebridge_identifier", preset).await.unwrap();

        let id = identity.ensure_identifier().await.unwrap();
        assert_eq!(id.as_str(), preset);
    }

    #[tokio::test]
    async fn test_get_before_activation_is_absent() {
        let (identity, _) = store();
        assert!(identity.get_identifier().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_identifier_is_not_replaced() {
        let (identity, settings) = store();
        settings.set("sitebridge_identifier", "garbage").await.unwrap();

        assert!(matches!(identity.ensure_identifier().await, Err(SiteError::Internal(_))));
        assert_eq!(
            settings.get("sitebridge_identifier").await.unwrap().as_deref(),
            Some("garbage")
        );
    }
}
