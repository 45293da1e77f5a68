//! Public key retrieval from the remote key authority
//!
//! The authority publishes one PEM RSA public key at a fixed URL. The key is
//! never cached: every verification or challenge fetches it again, so a key
//! rotation takes effect on the very next request.

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

/// PEM-encoded public key as served by the authority
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKeyPem(String);

impl PublicKeyPem {
    pub fn new(pem: impl Into<String>) -> Self {
        Self(pem.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Errors from fetching the public key
#[derive(Debug, thiserror::Error)]
pub enum KeyFetchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP {status} from key endpoint")]
    Status { status: u16 },

    #[error("Key endpoint returned an empty body")]
    EmptyBody,

    #[error("Key body exceeds {limit} bytes")]
    TooLarge { limit: usize },

    #[error("Key body is not valid UTF-8")]
    InvalidEncoding,
}

/// Upper bound on a key response; a PEM RSA public key is a few KiB at most
pub const MAX_KEY_BYTES: usize = 16 * 1024;

/// Source of the authority's current public key
#[async_trait]
pub trait KeyProvider: Send + Sync {
    /// Fetch the current key. Failures are not retried.
    async fn fetch_public_key(&self) -> Result<PublicKeyPem, KeyFetchError>;
}

/// Configuration for the HTTP key provider
#[derive(Debug, Clone)]
pub struct HttpKeyProviderConfig {
    /// URL serving the PEM key
    pub endpoint: String,
    /// Whole-request timeout (default: 5 seconds)
    pub request_timeout: Duration,
    /// TCP connect timeout (default: 3 seconds)
    pub connect_timeout: Duration,
}

impl HttpKeyProviderConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            request_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(3),
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Fetches the key over HTTP with bounded timeouts
pub struct HttpKeyProvider {
    config: HttpKeyProviderConfig,
    http_client: reqwest::Client,
}

impl HttpKeyProvider {
    pub fn new(config: HttpKeyProviderConfig) -> Result<Self, KeyFetchError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout.min(config.request_timeout))
            .user_agent(concat!("sitebridge/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| KeyFetchError::Network(format!("client build failed: {e}")))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }
}

#[async_trait]
impl KeyProvider for HttpKeyProvider {
    async fn fetch_public_key(&self) -> Result<PublicKeyPem, KeyFetchError> {
        debug!(url = %self.config.endpoint, "Fetching public key");

        let mut response = self
            .http_client
            .get(&self.config.endpoint)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        if !response.status().is_success() {
            warn!(
                url = %self.config.endpoint,
                status = %response.status(),
                "Key endpoint returned non-success status"
            );
            return Err(KeyFetchError::Status {
                status: response.status().as_u16(),
            });
        }

        if response
            .content_length()
            .is_some_and(|len| len > MAX_KEY_BYTES as u64)
        {
            warn!(url = %self.config.endpoint, "Key endpoint advertised an oversized body");
            return Err(KeyFetchError::TooLarge {
                limit: MAX_KEY_BYTES,
            });
        }

        let mut raw = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| self.classify(e))? {
            if raw.len() + chunk.len() > MAX_KEY_BYTES {
                warn!(url = %self.config.endpoint, "Key body exceeded size limit");
                return Err(KeyFetchError::TooLarge {
                    limit: MAX_KEY_BYTES,
                });
            }
            raw.extend_from_slice(&chunk);
        }

        let body = String::from_utf8(raw).map_err(|_| KeyFetchError::InvalidEncoding)?;
        if body.trim().is_empty() {
            return Err(KeyFetchError::EmptyBody);
        }

        Ok(PublicKeyPem::new(body))
    }
}

impl HttpKeyProvider {
    fn classify(&self, err: reqwest::Error) -> KeyFetchError {
        if err.is_timeout() {
            warn!(url = %self.config.endpoint, "Key fetch timed out");
            KeyFetchError::Timeout(self.config.request_timeout)
        } else {
            warn!(url = %self.config.endpoint, error = %err, "Key fetch failed");
            KeyFetchError::Network(err.to_string())
        }
    }
}

/// Fixed key provider for tests and offline development
pub struct StaticKeyProvider {
    key: Option<PublicKeyPem>,
}

impl StaticKeyProvider {
    /// Always serve `pem`
    pub fn new(pem: impl Into<String>) -> Self {
        Self {
            key: Some(PublicKeyPem::new(pem)),
        }
    }

    /// Always fail as if the authority were unreachable
    pub fn unavailable() -> Self {
        Self { key: None }
    }
}

#[async_trait]
impl KeyProvider for StaticKeyProvider {
    async fn fetch_public_key(&self) -> Result<PublicKeyPem, KeyFetchError> {
        self.key
            .clone()
            .ok_or_else(|| KeyFetchError::Network("static provider has no key".to_string()))
    }
}
