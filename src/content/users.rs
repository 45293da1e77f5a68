//! Site user directory
//!
//! The automation service only needs to know who can author content, so the
//! directory is asked for users holding one of the elevated roles.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Site roles, most privileged first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Administrator,
    Editor,
    Author,
    Contributor,
    Subscriber,
}

impl Role {
    /// Roles whose holders are listed to the automation service
    pub const ELEVATED: [Role; 3] = [Role::Administrator, Role::Editor, Role::Author];
}

/// A site user as exposed over the API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteUser {
    pub id: u64,
    pub login: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub roles: Vec<Role>,
}

/// Errors from the user directory
#[derive(Debug, thiserror::Error)]
pub enum UserDirectoryError {
    #[error("Failed to read user list: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid user list: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Source of site users
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Users holding at least one of `roles`
    async fn users_with_roles(&self, roles: &[Role]) -> Result<Vec<SiteUser>, UserDirectoryError>;
}

/// Fixed user list, optionally loaded from a JSON file
#[derive(Debug, Clone, Default)]
pub struct StaticUserDirectory {
    users: Vec<SiteUser>,
}

impl StaticUserDirectory {
    pub fn new(users: Vec<SiteUser>) -> Self {
        Self { users }
    }

    /// Load a JSON array of users
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, UserDirectoryError> {
        let raw = tokio::fs::read(path).await?;
        Ok(Self::new(serde_json::from_slice(&raw)?))
    }
}

#[async_trait]
impl UserDirectory for StaticUserDirectory {
    async fn users_with_roles(&self, roles: &[Role]) -> Result<Vec<SiteUser>, UserDirectoryError> {
        Ok(self
            .users
            .iter()
            .filter(|u| u.roles.iter().any(|r| roles.contains(r)))
            .cloned()
            .collect())
    }
}
