//! Search-engine site verification token
//!
//! The automation service registers the site with a search console on the
//! owner's behalf and parks the resulting token here. Pages embed it through
//! [`SiteVerification::meta_tag`].

use std::sync::Arc;

use crate::identity::{SettingsError, SettingsStore};

/// Token persistence under `<namespace>_site_verification_token`
#[derive(Clone)]
pub struct SiteVerification {
    settings: Arc<dyn SettingsStore>,
    key: String,
}

impl SiteVerification {
    pub fn new(settings: Arc<dyn SettingsStore>, namespace: &str) -> Self {
        Self {
            settings,
            key: format!("{namespace}_site_verification_token"),
        }
    }

    pub async fn token(&self) -> Result<Option<String>, SettingsError> {
        self.settings.get(&self.key).await
    }

    pub async fn set_token(&self, token: &str) -> Result<(), SettingsError> {
        self.settings.set(&self.key, token).await
    }

    /// Clear the token, returning whether one was stored
    pub async fn clear(&self) -> Result<bool, SettingsError> {
        self.settings.delete(&self.key).await
    }

    /// `<meta>` element for the page head, or `None` when no token is set
    pub async fn meta_tag(&self) -> Result<Option<String>, SettingsError> {
        Ok(self
            .token()
            .await?
            .filter(|t| !t.is_empty())
            .map(|t| {
                format!(
                    r#"<meta name="google-site-verification" content="{}">"#,
                    escape_attribute(&t)
                )
            }))
    }
}

fn escape_attribute(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            c => out.push(c),
        }
    }
    out
}
