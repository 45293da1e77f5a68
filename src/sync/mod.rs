//! Ownership-scoped content synchronization
//!
//! The automation service creates, reads, updates and deletes "managed"
//! posts. A post becomes managed when this engine creates it and stamps it
//! with the ownership tag (metadata `<namespace>` = `"1"`). Reads, listings and
//! deletes only ever see tagged posts, even when the caller guesses an id.
//!
//! ## Update scope
//!
//! Updating by id does not check the tag unless [`UpdateScope::OwnedOnly`] is
//! selected. The unscoped mode lets a caller overwrite any post whose id it
//! knows; it is kept as the default for compatibility with existing callers.
//!
//! ## Attachments
//!
//! An optional thumbnail upload is handled in two phases: store it, then
//! associate it as the post's primary image once the post write succeeded.
//! A failure in either later step removes the stored attachment again, and a
//! failed create also removes the post it just inserted.

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::content::{
    AttachmentUpload, ContentRepository, MediaStore, Post, PostDraft, PostId, StoredAttachment,
};
use crate::types::{Result, SiteError};

/// Value stored under the ownership tag key
pub const OWNERSHIP_VALUE: &str = "1";

/// Whether update-by-id must target a managed post
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateScope {
    /// Any existing post can be updated by id
    #[default]
    Unscoped,
    /// Only tagged posts can be updated; others look absent
    OwnedOnly,
}

/// Result of creating a managed post
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpsertOutcome {
    #[serde(rename = "ID")]
    pub id: PostId,
    pub permalink: Option<String>,
}

/// A managed post as returned to the automation service
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManagedView {
    /// The post with its body rendered for readers
    pub post: Post,
    pub thumbnail: Option<String>,
    pub permalink: Option<String>,
}

/// Create/read/update/delete of managed posts
pub struct ResourceSyncEngine {
    repo: Arc<dyn ContentRepository>,
    media: Arc<dyn MediaStore>,
    tag_key: String,
    update_scope: UpdateScope,
}

impl ResourceSyncEngine {
    /// The ownership tag key is the namespace itself
    pub fn new(
        repo: Arc<dyn ContentRepository>,
        media: Arc<dyn MediaStore>,
        namespace: &str,
    ) -> Self {
        Self {
            repo,
            media,
            tag_key: namespace.to_string(),
            update_scope: UpdateScope::default(),
        }
    }

    pub fn with_update_scope(mut self, scope: UpdateScope) -> Self {
        self.update_scope = scope;
        self
    }

    pub fn update_scope(&self) -> UpdateScope {
        self.update_scope
    }

    /// Create a managed post: absent → owned
    pub async fn create(
        &self,
        draft: &PostDraft,
        attachment: Option<AttachmentUpload>,
    ) -> Result<UpsertOutcome> {
        let stored = self.store_attachment(attachment).await?;

        let id = match self.repo.insert(draft).await {
            Ok(id) => id,
            Err(e) => {
                self.discard_attachment(stored.as_ref()).await;
                return Err(e.into());
            }
        };

        if let Err(e) = self.finish_create(id, stored.as_ref()).await {
            self.discard_attachment(stored.as_ref()).await;
            self.discard_post(id).await;
            return Err(e);
        }

        let permalink = self
            .repo
            .get(id)
            .await?
            .and_then(|post| self.repo.permalink(&post));

        info!(post_id = id, "Managed post created");
        Ok(UpsertOutcome { id, permalink })
    }

    async fn finish_create(&self, id: PostId, stored: Option<&StoredAttachment>) -> Result<()> {
        self.repo
            .add_meta(id, &self.tag_key, OWNERSHIP_VALUE)
            .await
            .map_err(|e| SiteError::Internal(format!("Unable to insert post meta: {e}")))?;

        self.associate(id, stored).await
    }

    /// Update a post by id: owned → owned.
    ///
    /// Fields missing from `draft` keep their current value. The ownership tag
    /// is never touched here.
    pub async fn update(
        &self,
        id: PostId,
        draft: &PostDraft,
        attachment: Option<AttachmentUpload>,
    ) -> Result<()> {
        if self.update_scope == UpdateScope::OwnedOnly && !self.is_owned(id).await? {
            debug!(post_id = id, "Update refused for unmanaged post");
            return Err(SiteError::NotFound(format!("Post {id} not found")));
        }

        let stored = self.store_attachment(attachment).await?;

        if let Err(e) = self.repo.update(id, draft).await {
            self.discard_attachment(stored.as_ref()).await;
            return Err(e.into());
        }

        if let Err(e) = self.associate(id, stored.as_ref()).await {
            self.discard_attachment(stored.as_ref()).await;
            return Err(e);
        }

        info!(post_id = id, "Post updated");
        Ok(())
    }

    /// Fetch a managed post
    pub async fn get(&self, id: PostId) -> Result<ManagedView> {
        let post = self
            .repo
            .get(id)
            .await?
            .ok_or_else(|| SiteError::NotFound("Unable to retrieve post".to_string()))?;

        if !self.is_owned(id).await? {
            return Err(SiteError::InvalidArgument(
                "Unable to retrieve post meta".to_string(),
            ));
        }

        self.enrich(post).await
    }

    /// All managed posts, newest first
    pub async fn list(&self) -> Result<Vec<ManagedView>> {
        let posts = self.repo.find_by_meta(&self.tag_key).await?;

        let mut views = Vec::with_capacity(posts.len());
        for post in posts {
            views.push(self.enrich(post).await?);
        }
        Ok(views)
    }

    /// Delete a managed post and its primary image: owned → absent
    pub async fn delete(&self, id: PostId) -> Result<()> {
        if !self.is_owned(id).await? {
            return Err(SiteError::InvalidArgument(
                "Unable to retrieve post meta".to_string(),
            ));
        }

        let removed = self
            .repo
            .delete(id)
            .await?
            .ok_or_else(|| SiteError::NotFound(format!("Post {id} not found")))?;

        if let Some(attachment) = removed.featured_image {
            match self.media.remove(attachment).await {
                Ok(_) => debug!(post_id = id, attachment_id = attachment, "Attachment removed"),
                Err(e) => warn!(
                    post_id = id,
                    attachment_id = attachment,
                    error = %e,
                    "Post deleted but its attachment could not be removed"
                ),
            }
        }

        info!(post_id = id, "Managed post deleted");
        Ok(())
    }

    async fn is_owned(&self, id: PostId) -> Result<bool> {
        let tag = self.repo.get_meta(id, &self.tag_key).await?;
        Ok(tag.as_deref() == Some(OWNERSHIP_VALUE))
    }

    /// Phase one: store the upload before any post mutation
    async fn store_attachment(
        &self,
        attachment: Option<AttachmentUpload>,
    ) -> Result<Option<StoredAttachment>> {
        match attachment {
            None => Ok(None),
            Some(upload) => {
                let stored = self.media.store(upload).await?;
                debug!(attachment_id = stored.id, "Attachment stored");
                Ok(Some(stored))
            }
        }
    }

    /// Phase two: make the stored upload the post's primary image
    async fn associate(&self, id: PostId, stored: Option<&StoredAttachment>) -> Result<()> {
        let Some(stored) = stored else {
            return Ok(());
        };

        self.repo
            .set_featured_image(id, stored.id)
            .await
            .map_err(|e| SiteError::AttachmentAssociationFailed(e.to_string()))
    }

    async fn discard_attachment(&self, stored: Option<&StoredAttachment>) {
        let Some(stored) = stored else {
            return;
        };

        if let Err(e) = self.media.remove(stored.id).await {
            warn!(
                attachment_id = stored.id,
                error = %e,
                "Failed to clean up attachment after upsert failure"
            );
        }
    }

    async fn discard_post(&self, id: PostId) {
        if let Err(e) = self.repo.delete(id).await {
            warn!(post_id = id, error = %e, "Failed to roll back post after create failure");
        }
    }

    async fn enrich(&self, mut post: Post) -> Result<ManagedView> {
        let thumbnail = match post.featured_image {
            Some(attachment) => self.media.url(attachment).await.unwrap_or_else(|e| {
                warn!(post_id = post.id, error = %e, "Thumbnail lookup failed");
                None
            }),
            None => None,
        };

        let permalink = self.repo.permalink(&post);
        post.body = self.repo.render_body(&post.body);

        Ok(ManagedView {
            post,
            thumbnail,
            permalink,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{MemoryContentRepository, MemoryMediaStore, PostStatus};
    use bytes::Bytes;

    struct Fixture {
        repo: Arc<MemoryContentRepository>,
        media: Arc<MemoryMediaStore>,
        engine: ResourceSyncEngine,
    }

    fn fixture(scope: UpdateScope) -> Fixture {
        let repo = Arc::new(MemoryContentRepository::new("https://site.test"));
        let media = Arc::new(MemoryMediaStore::new("https://site.test/uploads"));
        let engine = ResourceSyncEngine::new(repo.clone(), media.clone(), "sitebridge")
            .with_update_scope(scope);
        Fixture {
            repo,
            media,
            engine,
        }
    }

    fn draft(title: &str, body: &str) -> PostDraft {
        PostDraft {
            title: Some(title.into()),
            body: Some(body.into()),
            ..Default::default()
        }
    }

    fn thumbnail() -> AttachmentUpload {
        AttachmentUpload {
            file_name: "cover.png".into(),
            content_type: "image/png".into(),
            data: Bytes::from_static(b"\x89PNG\r\n\x1a\n"),
        }
    }

    #[tokio::test]
    async fn test_create_then_get_round_trip() {
        let f = fixture(UpdateScope::Unscoped);
        let outcome = f.engine.create(&draft("Hello", "World"), None).await.unwrap();
        assert_eq!(
            outcome.permalink.as_deref(),
            Some(format!("https://site.test/?p={}", outcome.id).as_str())
        );

        let view = f.engine.get(outcome.id).await.unwrap();
        assert_eq!(view.post.title, "Hello");
        assert_eq!(view.post.body, "<p>World</p>");
        assert_eq!(view.post.status, PostStatus::Draft);
        assert!(view.thumbnail.is_none());
        assert_eq!(view.permalink, outcome.permalink);
    }

    #[tokio::test]
    async fn test_update_is_idempotent() {
        let f = fixture(UpdateScope::Unscoped);
        let id = f.engine.create(&draft("a", "b"), None).await.unwrap().id;
        let change = draft("Final", "Text");

        f.engine.update(id, &change, None).await.unwrap();
        let first = f.engine.get(id).await.unwrap();
        f.engine.update(id, &change, None).await.unwrap();
        let second = f.engine.get(id).await.unwrap();

        assert_eq!(first.post.title, second.post.title);
        assert_eq!(first.post.body, second.post.body);
        assert_eq!(f.engine.list().await.unwrap().len(), 1);
        assert_eq!(f.repo.len(), 1);
    }

    #[tokio::test]
    async fn test_untagged_post_is_invisible() {
        let f = fixture(UpdateScope::Unscoped);
        let foreign = f.repo.insert(&draft("Owner's post", "mine")).await.unwrap();
        f.engine.create(&draft("Managed", "x"), None).await.unwrap();

        assert!(matches!(
            f.engine.get(foreign).await,
            Err(SiteError::InvalidArgument(_))
        ));
        assert!(matches!(
            f.engine.delete(foreign).await,
            Err(SiteError::InvalidArgument(_))
        ));

        let listed = f.engine.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].post.title, "Managed");
        assert!(f.repo.get(foreign).await.unwrap().is_some());
    }

    #[test]
    fn test_outcome_serializes_upper_case_id() {
        let outcome = UpsertOutcome {
            id: 7,
            permalink: None,
        };
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            serde_json::json!({"ID": 7, "permalink": null})
        );
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let f = fixture(UpdateScope::Unscoped);
        assert!(matches!(f.engine.get(99).await, Err(SiteError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_missing_is_invalid_argument() {
        let f = fixture(UpdateScope::Unscoped);
        assert!(matches!(
            f.engine.delete(99).await,
            Err(SiteError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_unscoped_update_reaches_unmanaged_posts() {
        let f = fixture(UpdateScope::Unscoped);
        let foreign = f.repo.insert(&draft("Owner's post", "mine")).await.unwrap();

        f.engine
            .update(foreign, &draft("Overwritten", "by caller"), None)
            .await
            .unwrap();

        let post = f.repo.get(foreign).await.unwrap().unwrap();
        assert_eq!(post.title, "Overwritten");
        // Still untagged, so still invisible to reads.
        assert!(f.engine.get(foreign).await.is_err());
    }

    #[tokio::test]
    async fn test_owned_only_update_refuses_unmanaged_posts() {
        let f = fixture(UpdateScope::OwnedOnly);
        let foreign = f.repo.insert(&draft("Owner's post", "mine")).await.unwrap();

        let err = f
            .engine
            .update(foreign, &draft("Overwritten", "x"), Some(thumbnail()))
            .await
            .unwrap_err();
        assert!(matches!(err, SiteError::NotFound(_)));

        let post = f.repo.get(foreign).await.unwrap().unwrap();
        assert_eq!(post.title, "Owner's post");
        assert!(f.media.is_empty());
    }

    #[tokio::test]
    async fn test_owned_only_update_allows_managed_posts() {
        let f = fixture(UpdateScope::OwnedOnly);
        assert_eq!(f.engine.update_scope(), UpdateScope::OwnedOnly);
        let id = f.engine.create(&draft("a", "b"), None).await.unwrap().id;
        f.engine.update(id, &draft("c", "d"), None).await.unwrap();
        assert_eq!(f.engine.get(id).await.unwrap().post.title, "c");
    }

    #[tokio::test]
    async fn test_create_with_thumbnail() {
        let f = fixture(UpdateScope::Unscoped);
        let id = f
            .engine
            .create(&draft("Pic", "x"), Some(thumbnail()))
            .await
            .unwrap()
            .id;

        let view = f.engine.get(id).await.unwrap();
        let url = view.thumbnail.expect("thumbnail url");
        assert!(url.starts_with("https://site.test/uploads/"));
    }

    #[tokio::test]
    async fn test_upload_failure_leaves_no_post() {
        let f = fixture(UpdateScope::Unscoped);
        f.media.fail_uploads(true);

        let err = f
            .engine
            .create(&draft("Pic", "x"), Some(thumbnail()))
            .await
            .unwrap_err();
        assert!(matches!(err, SiteError::Internal(_)));
        assert!(f.repo.is_empty());
    }

    #[tokio::test]
    async fn test_association_failure_cleans_up() {
        let f = fixture(UpdateScope::Unscoped);
        f.repo.fail_image_association(true);

        let err = f
            .engine
            .create(&draft("Pic", "x"), Some(thumbnail()))
            .await
            .unwrap_err();
        assert!(matches!(err, SiteError::AttachmentAssociationFailed(_)));
        assert!(f.media.is_empty());
        assert!(f.repo.is_empty());
    }

    #[tokio::test]
    async fn test_update_association_failure_keeps_post() {
        let f = fixture(UpdateScope::Unscoped);
        let id = f.engine.create(&draft("a", "b"), None).await.unwrap().id;
        f.repo.fail_image_association(true);

        let err = f
            .engine
            .update(id, &draft("c", "d"), Some(thumbnail()))
            .await
            .unwrap_err();
        assert!(matches!(err, SiteError::AttachmentAssociationFailed(_)));
        assert!(f.media.is_empty());
        assert!(f.engine.get(id).await.is_ok());
    }

    #[tokio::test]
    async fn test_update_missing_post_discards_upload() {
        let f = fixture(UpdateScope::Unscoped);
        let err = f
            .engine
            .update(404, &draft("c", "d"), Some(thumbnail()))
            .await
            .unwrap_err();
        assert!(matches!(err, SiteError::NotFound(_)));
        assert!(f.media.is_empty());
    }

    #[tokio::test]
    async fn test_delete_removes_post_and_thumbnail() {
        let f = fixture(UpdateScope::Unscoped);
        let id = f
            .engine
            .create(&draft("Pic", "x"), Some(thumbnail()))
            .await
            .unwrap()
            .id;
        assert_eq!(f.media.len(), 1);

        f.engine.delete(id).await.unwrap();
        assert!(f.repo.get(id).await.unwrap().is_none());
        assert!(f.media.is_empty());
        assert!(matches!(
            f.engine.delete(id).await,
            Err(SiteError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_create_is_bad_request() {
        let f = fixture(UpdateScope::Unscoped);
        assert!(matches!(
            f.engine.create(&PostDraft::default(), None).await,
            Err(SiteError::BadRequest(_))
        ));
    }
}
