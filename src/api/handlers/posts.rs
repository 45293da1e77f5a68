//! Managed post handlers

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::api::extract::{PostIdPath, UpsertBody, Verified};
use crate::api::AppState;
use crate::sync::{ManagedView, UpsertOutcome};
use crate::types::Result;

/// GET /{namespace}/v1/posts
pub async fn list_posts(
    _verified: Verified,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ManagedView>>> {
    Ok(Json(state.sync.list().await?))
}

/// POST /{namespace}/v1/posts
pub async fn create_post(
    _verified: Verified,
    State(state): State<Arc<AppState>>,
    body: UpsertBody,
) -> Result<Json<UpsertOutcome>> {
    Ok(Json(state.sync.create(&body.draft, body.thumbnail).await?))
}

/// GET /{namespace}/v1/posts/{id}
pub async fn get_post(
    PostIdPath(id): PostIdPath,
    _verified: Verified,
    State(state): State<Arc<AppState>>,
) -> Result<Json<ManagedView>> {
    Ok(Json(state.sync.get(id).await?))
}

/// POST /{namespace}/v1/posts/{id}
pub async fn update_post(
    PostIdPath(id): PostIdPath,
    _verified: Verified,
    State(state): State<Arc<AppState>>,
    body: UpsertBody,
) -> Result<StatusCode> {
    state.sync.update(id, &body.draft, body.thumbnail).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /{namespace}/v1/posts/{id}
pub async fn delete_post(
    PostIdPath(id): PostIdPath,
    _verified: Verified,
    State(state): State<Arc<AppState>>,
) -> Result<StatusCode> {
    state.sync.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
