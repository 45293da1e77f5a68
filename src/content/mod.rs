//! Site content collaborators
//!
//! The sync engine does not own the content repository, the media subsystem or
//! the user directory; it talks to them through the traits below. The
//! in-memory implementations back the binary and the test suites.

pub mod memory;
pub mod render;
pub mod users;

pub use memory::{MemoryContentRepository, MemoryMediaStore};
pub use users::{Role, SiteUser, StaticUserDirectory, UserDirectory, UserDirectoryError};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Repository-assigned post identity
pub type PostId = u64;

/// Media-assigned attachment identity
pub type AttachmentId = u64;

/// Publication status of a post
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    #[default]
    Draft,
    Publish,
    Pending,
    Private,
    Future,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Publish => "publish",
            Self::Pending => "pending",
            Self::Private => "private",
            Self::Future => "future",
        }
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PostStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "draft" => Ok(Self::Draft),
            "publish" => Ok(Self::Publish),
            "pending" => Ok(Self::Pending),
            "private" => Ok(Self::Private),
            "future" => Ok(Self::Future),
            other => Err(format!("unknown post status '{other}'")),
        }
    }
}

/// A stored content item
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Post {
    pub id: PostId,
    pub title: String,
    pub body: String,
    pub status: PostStatus,
    pub excerpt: String,
    pub slug: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    /// Primary image, if one is associated
    pub featured_image: Option<AttachmentId>,
}

/// Caller-supplied fields for an insert or update.
///
/// `None` means "not supplied": inserts fall back to defaults, updates keep
/// the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PostDraft {
    pub title: Option<String>,
    pub body: Option<String>,
    pub status: Option<PostStatus>,
    pub excerpt: Option<String>,
    pub slug: Option<String>,
}

impl PostDraft {
    /// True when nothing a reader would see was supplied
    pub fn is_empty_content(&self) -> bool {
        let blank = |v: &Option<String>| v.as_deref().map_or(true, |s| s.trim().is_empty());
        blank(&self.title) && blank(&self.body) && blank(&self.excerpt)
    }
}

/// Binary upload destined for the media subsystem
#[derive(Clone)]
pub struct AttachmentUpload {
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
}

impl fmt::Debug for AttachmentUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttachmentUpload")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.data.len())
            .finish()
    }
}

/// An attachment the media subsystem has accepted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredAttachment {
    pub id: AttachmentId,
    pub url: String,
}

/// Errors from the content repository
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Post {0} not found")]
    NotFound(PostId),

    #[error("{0}")]
    Invalid(String),

    #[error("Repository backend error: {0}")]
    Backend(String),
}

/// Errors from the media subsystem
#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("Upload rejected: {0}")]
    Rejected(String),

    #[error("Attachment {0} not found")]
    NotFound(AttachmentId),

    #[error("Media backend error: {0}")]
    Backend(String),
}

/// Generic document store the site keeps its posts in
#[async_trait]
pub trait ContentRepository: Send + Sync {
    /// Create a post and return its identity
    async fn insert(&self, draft: &PostDraft) -> Result<PostId, RepositoryError>;

    /// Apply supplied fields to an existing post
    async fn update(&self, id: PostId, draft: &PostDraft) -> Result<(), RepositoryError>;

    async fn get(&self, id: PostId) -> Result<Option<Post>, RepositoryError>;

    /// Remove a post and its metadata, returning what was removed
    async fn delete(&self, id: PostId) -> Result<Option<Post>, RepositoryError>;

    async fn get_meta(&self, id: PostId, key: &str) -> Result<Option<String>, RepositoryError>;

    /// Attach a metadata value if the key is not already set on the post
    async fn add_meta(&self, id: PostId, key: &str, value: &str) -> Result<bool, RepositoryError>;

    /// All posts carrying metadata `key`, newest first
    async fn find_by_meta(&self, key: &str) -> Result<Vec<Post>, RepositoryError>;

    async fn set_featured_image(
        &self,
        id: PostId,
        attachment: AttachmentId,
    ) -> Result<(), RepositoryError>;

    /// Public URL of a post, if it has one
    fn permalink(&self, post: &Post) -> Option<String>;

    /// Body as it would be shown to a reader
    fn render_body(&self, body: &str) -> String;
}

/// Binary storage that hands back public URLs
#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn store(&self, upload: AttachmentUpload) -> Result<StoredAttachment, MediaError>;

    async fn url(&self, id: AttachmentId) -> Result<Option<String>, MediaError>;

    /// Remove an attachment, returning whether it existed
    async fn remove(&self, id: AttachmentId) -> Result<bool, MediaError>;
}
