//! HTTP surface
//!
//! All routes live under `/<namespace>/v1/...`; `/health` sits outside the
//! namespace for load balancers.

pub mod extract;
pub mod handlers;

use axum::{
    extract::DefaultBodyLimit,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::auth::AuthenticationGate;
use crate::content::{ContentRepository, MediaStore, UserDirectory};
use crate::identity::{IdentityStore, SettingsStore};
use crate::keys::KeyProvider;
use crate::site::SiteVerification;
use crate::sync::{ResourceSyncEngine, UpdateScope};

pub use extract::{PostIdPath, UpsertBody, Verified};

/// Largest accepted request body, thumbnails included
pub const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Shared state for all handlers
pub struct AppState {
    pub namespace: String,
    pub identity: IdentityStore,
    pub keys: Arc<dyn KeyProvider>,
    pub gate: AuthenticationGate,
    pub site: SiteVerification,
    pub users: Arc<dyn UserDirectory>,
    pub sync: ResourceSyncEngine,
}

impl AppState {
    pub fn new(
        namespace: &str,
        settings: Arc<dyn SettingsStore>,
        keys: Arc<dyn KeyProvider>,
        repo: Arc<dyn ContentRepository>,
        media: Arc<dyn MediaStore>,
        users: Arc<dyn UserDirectory>,
    ) -> Self {
        let identity = IdentityStore::new(settings.clone(), namespace);
        Self {
            namespace: namespace.to_string(),
            gate: AuthenticationGate::new(identity.clone(), keys.clone()),
            identity,
            keys,
            site: SiteVerification::new(settings, namespace),
            users,
            sync: ResourceSyncEngine::new(repo, media, namespace),
        }
    }

    pub fn with_update_scope(mut self, scope: UpdateScope) -> Self {
        self.sync = self.sync.with_update_scope(scope);
        self
    }
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
    })
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    let v1 = Router::new()
        .route("/v1/authenticate", get(handlers::authenticate))
        .route(
            "/v1/site-verification-token",
            get(handlers::get_verification_token)
                .post(handlers::set_verification_token)
                .put(handlers::set_verification_token)
                .patch(handlers::set_verification_token)
                .delete(handlers::delete_verification_token),
        )
        .route(
            "/v1/site-verification-token/meta",
            get(handlers::verification_meta_tag),
        )
        .route("/v1/users", get(handlers::list_users))
        .route("/v1/version", get(handlers::version))
        .route(
            "/v1/posts",
            get(handlers::list_posts).post(handlers::create_post),
        )
        .route(
            "/v1/posts/:id",
            get(handlers::get_post)
                .post(handlers::update_post)
                .put(handlers::update_post)
                .patch(handlers::update_post)
                .delete(handlers::delete_post),
        );

    Router::new()
        .route("/health", get(health))
        .nest(&format!("/{}", state.namespace), v1)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
