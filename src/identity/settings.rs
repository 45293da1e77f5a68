//! Key-value settings storage
//!
//! The site keeps a handful of named string values: the installation
//! identifier and the site verification token. `MemorySettings` is used in
//! tests, `FileSettings` persists to a JSON document on disk.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Errors from a settings backend
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt settings file {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Persistent string settings
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Read a value
    async fn get(&self, key: &str) -> Result<Option<String>, SettingsError>;

    /// Write a value only if the key is absent.
    ///
    /// Returns false when a value already exists; the existing value is untouched.
    async fn add(&self, key: &str, value: &str) -> Result<bool, SettingsError>;

    /// Write a value, replacing any existing one
    async fn set(&self, key: &str, value: &str) -> Result<(), SettingsError>;

    /// Remove a value, returning whether it existed
    async fn delete(&self, key: &str) -> Result<bool, SettingsError>;
}

/// In-memory settings
#[derive(Debug, Default)]
pub struct MemorySettings {
    values: DashMap<String, String>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SettingsStore for MemorySettings {
    async fn get(&self, key: &str) -> Result<Option<String>, SettingsError> {
        Ok(self.values.get(key).map(|v| v.value().clone()))
    }

    async fn add(&self, key: &str, value: &str) -> Result<bool, SettingsError> {
        match self.values.entry(key.to_string()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(value.to_string());
                Ok(true)
            }
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), SettingsError> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, SettingsError> {
        Ok(self.values.remove(key).is_some())
    }
}

/// Settings persisted as a JSON object in a single file.
///
/// Writes go to a sibling temp file that is then renamed over the original,
/// so a crash mid-write leaves the previous document intact.
pub struct FileSettings {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl FileSettings {
    /// Open (or lazily create) the settings file at `path`
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref().to_path_buf();

        let values = match tokio::fs::read(&path).await {
            Ok(raw) => serde_json::from_slice(&raw).map_err(|source| SettingsError::Corrupt {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "Settings file not found, starting empty");
                BTreeMap::new()
            }
            Err(source) => return Err(SettingsError::Io { path, source }),
        };

        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, values: &BTreeMap<String, String>) -> Result<(), SettingsError> {
        let io_err = |source| SettingsError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
            }
        }

        let raw = serde_json::to_vec_pretty(values).map_err(|source| SettingsError::Corrupt {
            path: self.path.clone(),
            source,
        })?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, raw).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(io_err)?;

        debug!(path = %self.path.display(), entries = values.len(), "Settings persisted");
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for FileSettings {
    async fn get(&self, key: &str) -> Result<Option<String>, SettingsError> {
        Ok(self.values.lock().await.get(key).cloned())
    }

    async fn add(&self, key: &str, value: &str) -> Result<bool, SettingsError> {
        let mut values = self.values.lock().await;
        if values.contains_key(key) {
            return Ok(false);
        }

        let mut next = values.clone();
        next.insert(key.to_string(), value.to_string());
        self.persist(&next).await?;
        *values = next;
        Ok(true)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), SettingsError> {
        let mut values = self.values.lock().await;
        let mut next = values.clone();
        next.insert(key.to_string(), value.to_string());
        self.persist(&next).await?;
        *values = next;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, SettingsError> {
        let mut values = self.values.lock().await;
        if !values.contains_key(key) {
            return Ok(false);
        }

        let mut next = values.clone();
        next.remove(key);
        self.persist(&next).await?;
        *values = next;
        Ok(true)
    }
}
