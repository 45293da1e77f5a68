//! Installation-level handlers
//!
//! Challenge response, site verification token, user listing and version.

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse},
    Json,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use std::sync::Arc;
use tracing::{error, info};

use crate::api::extract::{TokenBody, Verified};
use crate::api::AppState;
use crate::content::{Role, SiteUser};
use crate::crypto;
use crate::types::{Result, SiteError};

/// Answer the automation service's activation challenge
///
/// GET /{namespace}/v1/authenticate
///
/// Returns the installation identifier encrypted under the authority's
/// current public key, base64 encoded. Only the holder of the matching
/// private key can read it back.
pub async fn authenticate(State(state): State<Arc<AppState>>) -> Result<Json<String>> {
    let public_key = state.keys.fetch_public_key().await?;

    let identifier = state.identity.get_identifier().await?.ok_or_else(|| {
        error!("Challenge requested before an identifier was generated");
        SiteError::Internal("no installation identifier".to_string())
    })?;

    let ciphertext = crypto::encrypt_for_challenge(&identifier, &public_key)?;
    Ok(Json(STANDARD.encode(ciphertext)))
}

/// GET /{namespace}/v1/site-verification-token
pub async fn get_verification_token(State(state): State<Arc<AppState>>) -> Result<Json<String>> {
    state.site.token().await?.map(Json).ok_or_else(|| {
        SiteError::NotFound("Unable to retrieve Site Verification token".to_string())
    })
}

/// POST /{namespace}/v1/site-verification-token
pub async fn set_verification_token(
    _verified: Verified,
    State(state): State<Arc<AppState>>,
    body: TokenBody,
) -> Result<StatusCode> {
    let token = body.token.ok_or_else(|| {
        SiteError::BadRequest("Unable to update the Site Verification token".to_string())
    })?;

    state.site.set_token(&token).await?;
    info!("Site verification token updated");
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /{namespace}/v1/site-verification-token
///
/// Succeeds whether or not a token was stored.
pub async fn delete_verification_token(
    _verified: Verified,
    State(state): State<Arc<AppState>>,
) -> Result<StatusCode> {
    let existed = state.site.clear().await?;
    info!(existed, "Site verification token cleared");
    Ok(StatusCode::NO_CONTENT)
}

/// Head markup for pages of the site
///
/// GET /{namespace}/v1/site-verification-token/meta
pub async fn verification_meta_tag(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse> {
    Ok(Html(state.site.meta_tag().await?.unwrap_or_default()))
}

/// Users who can author content
///
/// GET /{namespace}/v1/users
pub async fn list_users(
    _verified: Verified,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<SiteUser>>> {
    Ok(Json(state.users.users_with_roles(&Role::ELEVATED).await?))
}

/// GET /{namespace}/v1/version
pub async fn version() -> Json<&'static str> {
    Json(env!("CARGO_PKG_VERSION"))
}
