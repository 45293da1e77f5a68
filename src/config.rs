//! Configuration for sitebridge
//!
//! CLI arguments with environment variable fallbacks, using clap.

use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::sync::UpdateScope;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    Pretty,
    /// One JSON object per line
    Json,
}

/// sitebridge - signed-request gateway for remote content automation
#[derive(Parser, Debug, Clone)]
#[command(name = "sitebridge")]
#[command(about = "Lets a remote automation service manage its own site content")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Route prefix, settings-key prefix and ownership tag key
    #[arg(long, env = "SITEBRIDGE_NAMESPACE", default_value = "sitebridge")]
    pub namespace: String,

    /// URL serving the automation service's current public key (PEM)
    #[arg(long, env = "KEY_ENDPOINT")]
    pub key_endpoint: String,

    /// Timeout for one public key fetch, in milliseconds
    #[arg(long, env = "KEY_FETCH_TIMEOUT_MS", default_value = "5000")]
    pub key_fetch_timeout_ms: u64,

    /// Directory holding persisted settings
    #[arg(long, env = "DATA_DIR", default_value = "./data")]
    pub data_dir: PathBuf,

    /// Public base URL of the site, used for permalinks and media URLs
    #[arg(long, env = "SITE_URL", default_value = "http://localhost:8080")]
    pub site_url: String,

    /// Refuse updates to posts this service did not create
    #[arg(long, env = "OWNED_UPDATES_ONLY", default_value = "false")]
    pub owned_updates_only: bool,

    /// JSON file listing site users
    #[arg(long, env = "USERS_FILE")]
    pub users_file: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value = "pretty")]
    pub log_format: LogFormat,
}

impl Args {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !(self.key_endpoint.starts_with("http://") || self.key_endpoint.starts_with("https://"))
        {
            return Err("KEY_ENDPOINT must be an http(s) URL".to_string());
        }

        if self.key_fetch_timeout_ms == 0 {
            return Err("KEY_FETCH_TIMEOUT_MS must be greater than zero".to_string());
        }

        if self.namespace.is_empty()
            || !self
                .namespace
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(
                "SITEBRIDGE_NAMESPACE may only contain letters, digits, '_' and '-'".to_string(),
            );
        }

        Ok(())
    }

    pub fn key_fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.key_fetch_timeout_ms)
    }

    pub fn update_scope(&self) -> UpdateScope {
        if self.owned_updates_only {
            UpdateScope::OwnedOnly
        } else {
            UpdateScope::Unscoped
        }
    }

    /// Where the identifier and verification token are persisted
    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join("settings.json")
    }

    /// Base URL for stored attachments
    pub fn media_base_url(&self) -> String {
        format!("{}/media", self.site_url.trim_end_matches('/'))
    }
}
