//! Error types for sitebridge
//!
//! Every failure a handler can surface ends up here. Authentication and
//! primitive failures carry fixed messages so the response body never becomes
//! an oracle for the verification step or leaks internal detail.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use crate::content::{MediaError, RepositoryError, UserDirectoryError};
use crate::identity::SettingsError;
use crate::keys::KeyFetchError;

/// Main error type for sitebridge operations
#[derive(Debug, thiserror::Error)]
pub enum SiteError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Key authority unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Attachment association failed: {0}")]
    AttachmentAssociationFailed(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SiteError {
    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            Self::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::EncryptionFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::AttachmentAssociationFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::Unauthorized => "unauthorized",
            Self::NotFound(_) => "not_found",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::UpstreamUnavailable(_) => "upstream_unavailable",
            Self::EncryptionFailed(_) => "encryption_failed",
            Self::AttachmentAssociationFailed(_) => "attachment_association_failed",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Message that is safe to return to the caller.
    ///
    /// Caller-facing validation messages pass through; everything that could
    /// describe upstream or primitive internals is replaced with a fixed text.
    pub fn public_message(&self) -> String {
        match self {
            Self::BadRequest(msg) | Self::NotFound(msg) | Self::InvalidArgument(msg) => {
                msg.clone()
            }
            Self::Unauthorized => "Unauthorized".to_string(),
            Self::UpstreamUnavailable(_) => "Key authority unavailable".to_string(),
            Self::EncryptionFailed(_) => "Unable to encrypt identifier".to_string(),
            Self::AttachmentAssociationFailed(_) => "Unable to set thumbnail".to_string(),
            Self::Internal(_) => "Internal error".to_string(),
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

impl IntoResponse for SiteError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(code = self.code(), error = %self, "Request failed");
        }

        let body = ErrorBody {
            code: self.code(),
            message: self.public_message(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<SettingsError> for SiteError {
    fn from(err: SettingsError) -> Self {
        Self::Internal(format!("settings: {err}"))
    }
}

impl From<KeyFetchError> for SiteError {
    fn from(err: KeyFetchError) -> Self {
        Self::UpstreamUnavailable(err.to_string())
    }
}

impl From<RepositoryError> for SiteError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(id) => Self::NotFound(format!("Post {id} not found")),
            RepositoryError::Invalid(msg) => Self::BadRequest(msg),
            RepositoryError::Backend(msg) => Self::Internal(format!("repository: {msg}")),
        }
    }
}

impl From<MediaError> for SiteError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::Rejected(msg) => Self::BadRequest(msg),
            other => Self::Internal(format!("media: {other}")),
        }
    }
}

impl From<UserDirectoryError> for SiteError {
    fn from(err: UserDirectoryError) -> Self {
        Self::Internal(format!("users: {err}"))
    }
}

/// Result type alias for sitebridge operations
pub type Result<T> = std::result::Result<T, SiteError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_failures_carry_no_detail() {
        let err = SiteError::Unauthorized;
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.public_message(), "Unauthorized");
    }

    #[test]
    fn test_upstream_detail_is_hidden() {
        let err = SiteError::UpstreamUnavailable("connect to 10.0.0.3:443 refused".into());
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(!err.public_message().contains("10.0.0.3"));
    }

    #[test]
    fn test_invalid_argument_is_client_error() {
        let err = SiteError::InvalidArgument("Unable to retrieve post meta".into());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "invalid_argument");
    }

    #[test]
    fn test_repository_not_found_maps_to_not_found() {
        let err: SiteError = RepositoryError::NotFound(7).into();
        assert!(matches!(err, SiteError::NotFound(_)));
    }
}
