//! rowkeep: operate on a channel's table from the command line.
//!
//! # Usage
//!
//! ```bash
//! rowkeep --config-dir ./config --channel calls gather
//! rowkeep -c calls insert '{"id": 7, "caller": "100"}'
//! rowkeep -c calls refresh --file records.json
//! ```
//!
//! Environment variables can also be used:
//! - `ROWKEEP_CONFIG_DIR`: Directory holding settings documents
//! - `ROWKEEP_CONFIG_KEY`: Settings document to load
//! - `ROWKEEP_CHANNEL`: Channel to operate on
//! - `RUST_LOG`: Log level (trace, debug, info, warn, error)

use anyhow::Context;
use rowkeep::commands;
use rowkeep::config::Config;
use rowkeep::observability::tracing::init_tracing;
use rowkeep::settings::JsonSettingsStore;
use rowkeep::{DriverRegistry, Manager};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse configuration from CLI arguments and environment
    let config = Config::parse_args();

    // Initialize tracing/logging
    init_tracing(&config.log_level);

    let store = JsonSettingsStore::new(&config.config_dir);
    let manager = Manager::new(Arc::new(store), DriverRegistry::with_defaults())
        .with_key(&config.config_key);

    let driver = manager
        .load(&config.channel)
        .await
        .with_context(|| format!("failed to load driver for channel '{}'", config.channel))?;

    let mut stdout = std::io::stdout().lock();
    commands::run(&config.command, driver.as_ref(), config.output, &mut stdout).await?;

    Ok(())
}
