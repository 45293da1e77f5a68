//! Shared types

pub mod error;

pub use error::{ErrorBody, Result, SiteError};
