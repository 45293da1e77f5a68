//! In-memory content repository and media store
//!
//! Concurrent maps with atomic id allocation. Each call is atomic for the
//! single post it touches; nothing spans calls.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::debug;

use super::render::{autop, slugify};
use super::{
    AttachmentId, AttachmentUpload, ContentRepository, MediaError, MediaStore, Post, PostDraft,
    PostId, PostStatus, RepositoryError, StoredAttachment,
};

/// Stored post plus its metadata
#[derive(Debug, Clone)]
struct PostEntry {
    post: Post,
    meta: HashMap<String, String>,
}

/// Content repository held in process memory
pub struct MemoryContentRepository {
    site_url: String,
    posts: DashMap<PostId, PostEntry>,
    next_id: AtomicU64,
    fail_image_association: AtomicBool,
}

impl MemoryContentRepository {
    /// `site_url` is the base for generated permalinks
    pub fn new(site_url: impl Into<String>) -> Self {
        Self {
            site_url: site_url.into().trim_end_matches('/').to_string(),
            posts: DashMap::new(),
            next_id: AtomicU64::new(1),
            fail_image_association: AtomicBool::new(false),
        }
    }

    /// Make `set_featured_image` fail, for exercising error paths
    pub fn fail_image_association(&self, fail: bool) {
        self.fail_image_association.store(fail, Ordering::SeqCst);
    }

    /// Number of stored posts, tagged or not
    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }
}

#[async_trait]
impl ContentRepository for MemoryContentRepository {
    async fn insert(&self, draft: &PostDraft) -> Result<PostId, RepositoryError> {
        if draft.is_empty_content() {
            return Err(RepositoryError::Invalid(
                "Content, title, and excerpt are empty.".to_string(),
            ));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let now = Utc::now();
        let title = draft.title.clone().unwrap_or_default();
        let slug = draft
            .slug
            .as_deref()
            .map(slugify)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| slugify(&title));

        let post = Post {
            id,
            slug,
            title,
            body: draft.body.clone().unwrap_or_default(),
            status: draft.status.unwrap_or_default(),
            excerpt: draft.excerpt.clone().unwrap_or_default(),
            created_at: now,
            modified_at: now,
            featured_image: None,
        };

        debug!(post_id = id, status = %post.status, "Post inserted");
        self.posts.insert(
            id,
            PostEntry {
                post,
                meta: HashMap::new(),
            },
        );
        Ok(id)
    }

    async fn update(&self, id: PostId, draft: &PostDraft) -> Result<(), RepositoryError> {
        let mut entry = self.posts.get_mut(&id).ok_or(RepositoryError::NotFound(id))?;
        let post = &mut entry.post;

        if let Some(title) = &draft.title {
            post.title = title.clone();
        }
        if let Some(body) = &draft.body {
            post.body = body.clone();
        }
        if let Some(status) = draft.status {
            post.status = status;
        }
        if let Some(excerpt) = &draft.excerpt {
            post.excerpt = excerpt.clone();
        }
        if let Some(slug) = draft.slug.as_deref().map(slugify).filter(|s| !s.is_empty()) {
            post.slug = slug;
        }
        post.modified_at = Utc::now();

        debug!(post_id = id, "Post updated");
        Ok(())
    }

    async fn get(&self, id: PostId) -> Result<Option<Post>, RepositoryError> {
        Ok(self.posts.get(&id).map(|e| e.post.clone()))
    }

    async fn delete(&self, id: PostId) -> Result<Option<Post>, RepositoryError> {
        Ok(self.posts.remove(&id).map(|(_, e)| e.post))
    }

    async fn get_meta(&self, id: PostId, key: &str) -> Result<Option<String>, RepositoryError> {
        Ok(self.posts.get(&id).and_then(|e| e.meta.get(key).cloned()))
    }

    async fn add_meta(&self, id: PostId, key: &str, value: &str) -> Result<bool, RepositoryError> {
        let mut entry = self.posts.get_mut(&id).ok_or(RepositoryError::NotFound(id))?;
        if entry.meta.contains_key(key) {
            return Ok(false);
        }
        entry.meta.insert(key.to_string(), value.to_string());
        Ok(true)
    }

    async fn find_by_meta(&self, key: &str) -> Result<Vec<Post>, RepositoryError> {
        let mut posts: Vec<Post> = self
            .posts
            .iter()
            .filter(|e| e.meta.contains_key(key))
            .map(|e| e.post.clone())
            .collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(posts)
    }

    async fn set_featured_image(
        &self,
        id: PostId,
        attachment: AttachmentId,
    ) -> Result<(), RepositoryError> {
        if self.fail_image_association.load(Ordering::SeqCst) {
            return Err(RepositoryError::Backend("featured image write refused".to_string()));
        }

        let mut entry = self.posts.get_mut(&id).ok_or(RepositoryError::NotFound(id))?;
        entry.post.featured_image = Some(attachment);
        Ok(())
    }

    fn permalink(&self, post: &Post) -> Option<String> {
        if post.status == PostStatus::Publish && !post.slug.is_empty() {
            Some(format!("{}/{}/", self.site_url, post.slug))
        } else {
            Some(format!("{}/?p={}", self.site_url, post.id))
        }
    }

    fn render_body(&self, body: &str) -> String {
        autop(body)
    }
}

/// Stored attachment bytes
struct MediaEntry {
    url: String,
    upload: AttachmentUpload,
}

/// Media store held in process memory
pub struct MemoryMediaStore {
    base_url: String,
    entries: DashMap<AttachmentId, MediaEntry>,
    next_id: AtomicU64,
    fail_uploads: AtomicBool,
}

impl MemoryMediaStore {
    /// `base_url` prefixes every attachment URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            entries: DashMap::new(),
            next_id: AtomicU64::new(1),
            fail_uploads: AtomicBool::new(false),
        }
    }

    /// Make `store` fail, for exercising error paths
    pub fn fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    /// Number of stored attachments
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Raw bytes and content type of a stored attachment
    pub fn content(&self, id: AttachmentId) -> Option<(String, bytes::Bytes)> {
        self.entries
            .get(&id)
            .map(|e| (e.upload.content_type.clone(), e.upload.data.clone()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl MediaStore for MemoryMediaStore {
    async fn store(&self, upload: AttachmentUpload) -> Result<StoredAttachment, MediaError> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(MediaError::Backend("upload directory is not writable".to_string()));
        }
        if upload.data.is_empty() {
            return Err(MediaError::Rejected("File is empty.".to_string()));
        }
        if !upload.content_type.starts_with("image/") {
            return Err(MediaError::Rejected(format!(
                "Sorry, you are not allowed to upload this file type ({}).",
                upload.content_type
            )));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let name = slugify(&upload.file_name);
        let url = format!("{}/{}-{}", self.base_url, id, name);

        debug!(attachment_id = id, bytes = upload.data.len(), "Attachment stored");
        self.entries.insert(
            id,
            MediaEntry {
                url: url.clone(),
                upload,
            },
        );
        Ok(StoredAttachment { id, url })
    }

    async fn url(&self, id: AttachmentId) -> Result<Option<String>, MediaError> {
        Ok(self.entries.get(&id).map(|e| e.url.clone()))
    }

    async fn remove(&self, id: AttachmentId) -> Result<bool, MediaError> {
        Ok(self.entries.remove(&id).is_some())
    }
}
