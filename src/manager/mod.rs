//! Channel-bound driver loading.
//!
//! The [`Manager`] reads the settings document, finds the table linked to the
//! requested channel, resolves the configured driver type through the
//! [`DriverRegistry`] and builds the driver. It keeps no state between loads.

pub mod registry;

pub use registry::{DriverContext, DriverFactory, DriverRegistry};

use std::sync::Arc;

use crate::driver::Driver;
use crate::error::Result;
use crate::settings::{SettingsStore, DEFAULT_SETTINGS_KEY};

/// Factory for channel-bound drivers.
pub struct Manager {
    store: Arc<dyn SettingsStore>,
    registry: DriverRegistry,
    key: String,
}

impl Manager {
    /// Create a manager reading settings under [`DEFAULT_SETTINGS_KEY`].
    pub fn new(store: Arc<dyn SettingsStore>, registry: DriverRegistry) -> Self {
        Self {
            store,
            registry,
            key: DEFAULT_SETTINGS_KEY.to_string(),
        }
    }

    /// Read settings under a different key.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Build the driver bound to `channel`.
    ///
    /// # Errors
    ///
    /// Fails when the settings cannot be loaded, the channel has no linked
    /// table, the driver type is not registered, or the driver cannot be
    /// constructed. All of these are configuration errors.
    pub async fn load(&self, channel: &str) -> Result<Arc<dyn Driver>> {
        match self.try_load(channel).await {
            Ok(driver) => Ok(driver),
            Err(e) => {
                tracing::error!(channel, key = %self.key, error = %e, "Failed to load driver");
                Err(e)
            }
        }
    }

    async fn try_load(&self, channel: &str) -> Result<Arc<dyn Driver>> {
        let settings = self.store.load(&self.key).await?;
        let table = settings.table_for(channel)?.to_string();
        let factory = self.registry.resolve(&settings.db_type)?;

        let ctx = DriverContext {
            channel: channel.to_string(),
            table,
            config: settings.db_config,
        };

        tracing::info!(
            channel,
            table = %ctx.table,
            db_type = %settings.db_type,
            "Loading driver"
        );

        tokio::task::spawn_blocking(move || factory(&ctx)).await?
    }
}
