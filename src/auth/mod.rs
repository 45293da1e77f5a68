//! Request authentication
//!
//! Every protected request carries a `Signature` header: the base64 RSA-SHA512
//! signature of the installation identifier, produced by the automation service
//! with the private half of the key the authority currently publishes.
//!
//! The gate re-evaluates that proof on every call. There is no session, no
//! token and no key cache, so each protected request costs one key fetch.

use axum::http::HeaderMap;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::crypto;
use crate::identity::IdentityStore;
use crate::keys::KeyProvider;
use crate::types::SiteError;

/// Header carrying the request signature
pub const SIGNATURE_HEADER: &str = "signature";

/// Why a request was turned away
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Missing Signature header")]
    MissingSignature,

    #[error("Signature header is not valid ASCII")]
    MalformedHeader,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Identity lookup failed: {0}")]
    IdentityUnavailable(String),
}

impl From<AuthError> for SiteError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingSignature => SiteError::BadRequest("Missing Signature header".into()),
            AuthError::MalformedHeader => SiteError::BadRequest("Malformed Signature header".into()),
            AuthError::Unauthorized => SiteError::Unauthorized,
            AuthError::IdentityUnavailable(msg) => SiteError::Internal(msg),
        }
    }
}

/// Single pass/fail decision for protected operations
#[derive(Clone)]
pub struct AuthenticationGate {
    identity: IdentityStore,
    keys: Arc<dyn KeyProvider>,
}

impl AuthenticationGate {
    pub fn new(identity: IdentityStore, keys: Arc<dyn KeyProvider>) -> Self {
        Self { identity, keys }
    }

    /// Authenticate a request from its headers.
    ///
    /// Missing header is a client error; every other failure collapses to
    /// `Unauthorized` with the real reason only in the logs.
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<(), AuthError> {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .ok_or(AuthError::MissingSignature)?
            .to_str()
            .map_err(|_| AuthError::MalformedHeader)?;

        let identifier = match self.identity.get_identifier().await {
            Ok(Some(id)) => id,
            Ok(None) => {
                error!("No installation identifier stored; activation never completed");
                return Err(AuthError::Unauthorized);
            }
            Err(e) => {
                error!(error = %e, "Failed to read installation identifier");
                return Err(AuthError::IdentityUnavailable(e.to_string()));
            }
        };

        let public_key = match self.keys.fetch_public_key().await {
            Ok(key) => key,
            Err(e) => {
                warn!(error = %e, "Public key fetch failed, rejecting request");
                return Err(AuthError::Unauthorized);
            }
        };

        if !crypto::verify(&identifier, signature, &public_key) {
            debug!("Signature did not verify");
            return Err(AuthError::Unauthorized);
        }

        Ok(())
    }
}
