//! sitebridge - signed-request gateway for remote content automation
//!
//! Lets a remote automation service manage content on a site it does not
//! host. The installation holds a random identifier; the service proves it is
//! the intended party by signing that identifier with a key the site fetches
//! from the service's key authority on every call.
//!
//! ## Components
//!
//! - **Identity**: generates and persists the installation identifier
//! - **Keys**: fetches the authority's current public key over HTTP
//! - **Crypto**: RSA-SHA512 signature checks and the activation challenge
//! - **Auth**: per-request signature gate, exposed as an axum extractor
//! - **Sync**: ownership-scoped create/read/update/delete of posts
//! - **API**: axum router under `/<namespace>/v1`

pub mod api;
pub mod auth;
pub mod config;
pub mod content;
pub mod crypto;
pub mod identity;
pub mod keys;
pub mod site;
pub mod sync;
pub mod types;

pub use api::{create_router, AppState};
pub use config::Args;
pub use types::{Result, SiteError};
