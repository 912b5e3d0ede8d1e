//! rowkeep: channel-bound table persistence with record reconciliation.
//!
//! A [`Manager`](manager::Manager) reads a settings document, resolves the
//! configured driver type through an explicit registry and builds a driver
//! bound to one channel's table. Every driver exposes the same CRUD contract
//! plus batch application and reconciliation against an authoritative record
//! set.
//!
//! # Architecture
//!
//! - **Pluggable**: drivers are looked up by type identifier; unknown types fail
//! - **Pooled**: one connection per statement, always returned to the pool
//! - **Uniform failures**: every query error is logged once and propagated
//!
//! # Modules
//!
//! - [`commands`]: Command execution for the binary
//! - [`config`]: CLI and environment configuration
//! - [`driver`]: Driver contract, relational and in-memory drivers
//! - [`error`]: Error type shared by all components
//! - [`manager`]: Driver registry and channel-bound loading
//! - [`observability`]: Tracing setup
//! - [`record`]: Record and identifier types
//! - [`settings`]: Settings documents and stores
//! - [`storage`]: Pooled backend contract and the SQLite backend

// Lint configuration
#![warn(clippy::all)]
#![allow(
    clippy::module_name_repetitions,    // driver::relational::RelationalDriver is fine
    clippy::must_use_candidate,         // Not all functions need #[must_use]
    clippy::missing_errors_doc,         // Error docs can be verbose
    clippy::missing_panics_doc,         // Panic docs can be verbose
    clippy::needless_raw_string_hashes, // r#""# is fine for SQL
)]

pub mod commands;
pub mod config;
pub mod driver;
pub mod error;
pub mod manager;
pub mod observability;
pub mod record;
pub mod settings;
pub mod storage;

pub use driver::{Ack, Action, Batch, Driver, Outcome, Refresh};
pub use error::{Error, Result};
pub use manager::{DriverRegistry, Manager};
pub use record::{Record, RecordId};
