//! Request extractors
//!
//! [`Verified`] runs the authentication gate from the request head, so a
//! handler that takes it never sees an unauthenticated request and never
//! reads the body of one. [`PostIdPath`] goes ahead of it, so a malformed id
//! is a 404 whether or not the request is signed.

use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Multipart, Path, Request},
    http::{header::CONTENT_TYPE, request::Parts},
    Form, Json,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

use super::AppState;
use crate::content::{AttachmentUpload, PostDraft, PostId, PostStatus};
use crate::types::{Result, SiteError};

/// Multipart field carrying the primary image
pub const THUMBNAIL_FIELD: &str = "thumbnail";

/// Proof that the request carried a valid signature
#[derive(Debug, Clone, Copy)]
pub struct Verified;

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Verified {
    type Rejection = SiteError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> std::result::Result<Self, Self::Rejection> {
        state.gate.authenticate(&parts.headers).await?;
        Ok(Verified)
    }
}

/// Post ids are plain decimal numbers; anything else matches no route.
fn parse_post_id(raw: &str) -> Result<PostId> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(no_route());
    }
    raw.parse()
        .map_err(|_| SiteError::NotFound(format!("Post {raw} not found")))
}

fn no_route() -> SiteError {
    SiteError::NotFound("No route was found matching the URL and request method".to_string())
}

/// Numeric `{id}` path segment
#[derive(Debug, Clone, Copy)]
pub struct PostIdPath(pub PostId);

#[async_trait]
impl<S> FromRequestParts<S> for PostIdPath
where
    S: Send + Sync,
{
    type Rejection = SiteError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|_| no_route())?;
        Ok(Self(parse_post_id(&raw)?))
    }
}

/// Text fields of an upsert, before validation
#[derive(Debug, Default, Deserialize)]
struct RawFields {
    title: Option<String>,
    body: Option<String>,
    status: Option<String>,
    excerpt: Option<String>,
    slug: Option<String>,
}

impl RawFields {
    fn set(&mut self, name: &str, value: String) {
        match name {
            "title" => self.title = Some(value),
            "body" => self.body = Some(value),
            "status" => self.status = Some(value),
            "excerpt" => self.excerpt = Some(value),
            "slug" => self.slug = Some(value),
            _ => {}
        }
    }

    fn into_draft(self) -> Result<PostDraft> {
        let status = self
            .status
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.parse::<PostStatus>())
            .transpose()
            .map_err(SiteError::BadRequest)?;

        Ok(PostDraft {
            title: self.title,
            body: self.body,
            status,
            excerpt: self.excerpt,
            slug: self.slug,
        })
    }
}

/// Post fields plus an optional thumbnail upload.
///
/// Accepts `multipart/form-data`, `application/x-www-form-urlencoded` or
/// `application/json`. Only multipart bodies can carry a thumbnail.
#[derive(Debug)]
pub struct UpsertBody {
    pub draft: PostDraft,
    pub thumbnail: Option<AttachmentUpload>,
}

#[async_trait]
impl<S> FromRequest<S> for UpsertBody
where
    S: Send + Sync,
{
    type Rejection = SiteError;

    async fn from_request(req: Request, state: &S) -> std::result::Result<Self, Self::Rejection> {
        let content_type = content_type(&req);

        if content_type.starts_with("multipart/form-data") {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| SiteError::BadRequest(e.body_text()))?;
            return read_multipart(multipart).await;
        }

        let fields = if content_type.starts_with("application/json") {
            let Json(fields) = Json::<RawFields>::from_request(req, state)
                .await
                .map_err(|e| SiteError::BadRequest(e.body_text()))?;
            fields
        } else if content_type.starts_with("application/x-www-form-urlencoded") {
            let Form(fields) = Form::<RawFields>::from_request(req, state)
                .await
                .map_err(|e| SiteError::BadRequest(e.body_text()))?;
            fields
        } else {
            let body = Bytes::from_request(req, state)
                .await
                .map_err(|e| SiteError::BadRequest(e.body_text()))?;
            if !body.is_empty() {
                return Err(SiteError::BadRequest(format!(
                    "Unsupported content type '{content_type}'"
                )));
            }
            RawFields::default()
        };

        Ok(Self {
            draft: fields.into_draft()?,
            thumbnail: None,
        })
    }
}

async fn read_multipart(mut multipart: Multipart) -> Result<UpsertBody> {
    let mut fields = RawFields::default();
    let mut thumbnail = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| SiteError::BadRequest(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();

        if name == THUMBNAIL_FIELD && field.file_name().is_some() {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| SiteError::BadRequest(e.body_text()))?;

            // A file input left empty still submits a nameless, empty part.
            if file_name.is_empty() && data.is_empty() {
                continue;
            }

            thumbnail = Some(AttachmentUpload {
                file_name,
                content_type,
                data,
            });
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| SiteError::BadRequest(e.body_text()))?;
            fields.set(&name, value);
        }
    }

    Ok(UpsertBody {
        draft: fields.into_draft()?,
        thumbnail,
    })
}

/// Body of a site-verification token update
#[derive(Debug)]
pub struct TokenBody {
    pub token: Option<String>,
}

#[async_trait]
impl<S> FromRequest<S> for TokenBody
where
    S: Send + Sync,
{
    type Rejection = SiteError;

    async fn from_request(req: Request, state: &S) -> std::result::Result<Self, Self::Rejection> {
        let content_type = content_type(&req);

        if content_type.starts_with("application/x-www-form-urlencoded") {
            let Form(mut fields) = Form::<HashMap<String, String>>::from_request(req, state)
                .await
                .map_err(|e| SiteError::BadRequest(e.body_text()))?;
            return Ok(Self {
                token: fields.remove("token"),
            });
        }

        let body = Bytes::from_request(req, state)
            .await
            .map_err(|e| SiteError::BadRequest(e.body_text()))?;
        if body.is_empty() {
            return Ok(Self { token: None });
        }

        // Anything but a JSON string under "token" counts as absent.
        let value: serde_json::Value = serde_json::from_slice(&body)
            .map_err(|e| SiteError::BadRequest(format!("Invalid JSON body: {e}")))?;
        Ok(Self {
            token: value
                .get("token")
                .and_then(|t| t.as_str())
                .map(str::to_string),
        })
    }
}

fn content_type(req: &Request) -> String {
    req.headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase()
}
