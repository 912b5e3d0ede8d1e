//! Database settings consumed by the manager.
//!
//! A settings document names the driver type, links channels to tables, and
//! carries the driver's pool configuration untouched:
//!
//! ```json
//! {
//!   "db_type": "sqlite",
//!   "db_link": { "calls": "call_records" },
//!   "db_config": { "path": "./data/records.db", "max_size": 8 }
//! }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Key the manager loads settings under unless told otherwise.
pub const DEFAULT_SETTINGS_KEY: &str = "records_db";

/// One settings document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// Registered driver type to instantiate
    pub db_type: String,
    /// Channel name → table name
    pub db_link: HashMap<String, String>,
    /// Driver-specific pool configuration
    #[serde(default)]
    pub db_config: Value,
}

impl DatabaseSettings {
    pub fn new(db_type: impl Into<String>, db_config: Value) -> Self {
        Self {
            db_type: db_type.into(),
            db_link: HashMap::new(),
            db_config,
        }
    }

    /// Builder-style channel link.
    #[must_use]
    pub fn link(mut self, channel: impl Into<String>, table: impl Into<String>) -> Self {
        self.db_link.insert(channel.into(), table.into());
        self
    }

    /// Table bound to `channel`.
    pub fn table_for(&self, channel: &str) -> Result<&str> {
        self.db_link
            .get(channel)
            .map(String::as_str)
            .ok_or_else(|| Error::UnknownChannel(channel.to_string()))
    }
}

/// Source of settings documents.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn load(&self, key: &str) -> Result<DatabaseSettings>;
}

/// Reads `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct JsonSettingsStore {
    dir: PathBuf,
}

impl JsonSettingsStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the document stored under `key`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Write `settings` under `key`, creating the directory if needed.
    pub async fn save(&self, key: &str, settings: &DatabaseSettings) -> Result<()> {
        let settings_error = |message: String| Error::Settings {
            key: key.to_string(),
            message,
        };

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| settings_error(e.to_string()))?;
        let json = serde_json::to_string_pretty(settings).map_err(|e| settings_error(e.to_string()))?;
        tokio::fs::write(self.path_for(key), json)
            .await
            .map_err(|e| settings_error(e.to_string()))
    }
}

#[async_trait]
impl SettingsStore for JsonSettingsStore {
    async fn load(&self, key: &str) -> Result<DatabaseSettings> {
        let path = self.path_for(key);
        let settings_error = |message: String| Error::Settings {
            key: key.to_string(),
            message,
        };

        let raw = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| settings_error(format!("{}: {e}", path.display())))?;
        let settings: DatabaseSettings = serde_json::from_str(&raw)
            .map_err(|e| settings_error(format!("{}: {e}", path.display())))?;

        tracing::debug!(
            key,
            path = %path.display(),
            db_type = %settings.db_type,
            channels = settings.db_link.len(),
            "Settings loaded"
        );
        Ok(settings)
    }
}

/// In-memory settings, keyed like a settings directory.
#[derive(Debug, Clone, Default)]
pub struct StaticSettingsStore {
    documents: HashMap<String, DatabaseSettings>,
}

impl StaticSettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, settings: DatabaseSettings) -> Self {
        self.documents.insert(key.into(), settings);
        self
    }
}

#[async_trait]
impl SettingsStore for StaticSettingsStore {
    async fn load(&self, key: &str) -> Result<DatabaseSettings> {
        self.documents
            .get(key)
            .cloned()
            .ok_or_else(|| Error::Settings {
                key: key.to_string(),
                message: "no such settings document".to_string(),
            })
    }
}
