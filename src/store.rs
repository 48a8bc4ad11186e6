//! Configuration store implementations.
//!
//! The dispatcher reads integration settings through the `ConfigStore` trait
//! on every send, so any store here must return the current value rather
//! than a snapshot taken at construction time.

use crate::core::{ConfigEntry, ConfigStore};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to read config store file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config store file {path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("config store file {0} must contain a JSON object at the top level")]
    NotAnObject(PathBuf),

    #[error("in-memory config store lock was poisoned")]
    Poisoned,
}

/// A process-local store, useful for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    entries: RwLock<HashMap<String, ConfigEntry>>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores an already JSON-encoded value under `key`.
    pub fn set(&self, key: &str, value: impl Into<String>) -> Result<()> {
        self.set_entry(key, ConfigEntry::with_value(value))
    }

    /// Stores a raw entry, including entries whose `item` is empty.
    pub fn set_entry(&self, key: &str, entry: ConfigEntry) -> Result<()> {
        let mut entries = self.entries.write().map_err(|_| StoreError::Poisoned)?;
        entries.insert(key.to_string(), entry);
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.write().map_err(|_| StoreError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn get_config(&self, key: &str) -> Result<Option<ConfigEntry>> {
        let entries = self.entries.read().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }
}

/// A store backed by a JSON file that is re-read on every lookup.
///
/// The file holds a single object mapping store keys to either a
/// JSON-encoded string or an inline object:
///
/// ```json
/// {
///   "chatIntegration": { "status": true, "url": "https://hooks.example.com/T000" },
///   "emailIntegration": "{\"host\":\"smtp.example.com\",\"port\":587}"
/// }
/// ```
#[derive(Debug, Clone)]
pub struct JsonFileConfigStore {
    path: PathBuf,
}

impl JsonFileConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_document(&self) -> Result<Option<serde_json::Map<String, Value>>, StoreError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "Config store file does not exist");
                return Ok(None);
            }
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let document: Value =
            serde_json::from_str(&contents).map_err(|source| StoreError::Parse {
                path: self.path.clone(),
                source,
            })?;

        match document {
            Value::Object(map) => Ok(Some(map)),
            _ => Err(StoreError::NotAnObject(self.path.clone())),
        }
    }
}

#[async_trait]
impl ConfigStore for JsonFileConfigStore {
    async fn get_config(&self, key: &str) -> Result<Option<ConfigEntry>> {
        let Some(mut document) = self.read_document().await? else {
            return Ok(None);
        };

        let entry = match document.remove(key) {
            None => return Ok(None),
            Some(Value::Null) => ConfigEntry { item: None },
            Some(Value::String(encoded)) => ConfigEntry::with_value(encoded),
            Some(inline) => ConfigEntry::with_value(inline.to_string()),
        };
        Ok(Some(entry))
    }
}
