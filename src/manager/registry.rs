//! Driver registry.
//!
//! Maps a driver type identifier (the `db_type` setting) to the factory that
//! builds it. Populated at startup; lookups of unregistered types fail with
//! [`Error::UnknownDriver`] and never fall back to another driver.

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::driver::memory::MemoryDriver;
use crate::driver::Driver;
use crate::error::{Error, Result};
use crate::storage::sqlite;

/// Everything a factory needs to bind a driver.
#[derive(Debug, Clone)]
pub struct DriverContext {
    pub channel: String,
    pub table: String,
    /// The `db_config` setting, opaque to the manager
    pub config: Value,
}

/// Builds a driver for one channel. May block; the manager calls it off the
/// async runtime.
pub type DriverFactory = Arc<dyn Fn(&DriverContext) -> Result<Arc<dyn Driver>> + Send + Sync>;

/// Registry of driver factories keyed by type identifier.
#[derive(Clone, Default)]
pub struct DriverRegistry {
    factories: HashMap<String, DriverFactory>,
}

impl DriverRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the bundled drivers: `sqlite` and `memory`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("sqlite", sqlite::open_driver);
        registry.register("memory", |ctx: &DriverContext| {
            Ok(Arc::new(MemoryDriver::new(ctx.channel.clone(), ctx.table.clone())) as Arc<dyn Driver>)
        });
        registry
    }

    /// Register a factory, replacing any previous one for the same type.
    pub fn register<F>(&mut self, driver_type: impl Into<String>, factory: F)
    where
        F: Fn(&DriverContext) -> Result<Arc<dyn Driver>> + Send + Sync + 'static,
    {
        let driver_type = driver_type.into();
        if self
            .factories
            .insert(driver_type.clone(), Arc::new(factory))
            .is_some()
        {
            tracing::warn!(driver_type = %driver_type, "Replacing registered driver factory");
        }
    }

    /// Look up the factory for `driver_type`.
    pub fn resolve(&self, driver_type: &str) -> Result<DriverFactory> {
        self.factories
            .get(driver_type)
            .cloned()
            .ok_or_else(|| Error::UnknownDriver(driver_type.to_string()))
    }

    /// Registered type identifiers in sorted order.
    pub fn driver_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}

impl fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("driver_types", &self.driver_types())
            .finish()
    }
}
