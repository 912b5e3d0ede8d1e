//! Configuration parsing for the rowkeep binary.
//!
//! Supports:
//! - CLI arguments via clap
//! - Environment variable overrides
//! - Sensible defaults for quick start

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::settings::DEFAULT_SETTINGS_KEY;

/// rowkeep: channel-bound table persistence with record reconciliation.
#[derive(Parser, Debug, Clone)]
#[command(name = "rowkeep")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Config {
    /// Directory holding settings documents
    #[arg(short = 'd', long, env = "ROWKEEP_CONFIG_DIR", default_value = "./config")]
    pub config_dir: PathBuf,

    /// Settings document to load (file name without .json)
    #[arg(short = 'k', long, env = "ROWKEEP_CONFIG_KEY", default_value = DEFAULT_SETTINGS_KEY)]
    pub config_key: String,

    /// Channel whose table the command operates on
    #[arg(short, long, env = "ROWKEEP_CHANNEL")]
    pub channel: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "warn")]
    pub log_level: String,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

/// How command results are printed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One compact JSON document per record
    Text,
    /// A single pretty-printed JSON document
    Json,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print every row of the table
    Gather,
    /// Print the row with the given id
    Select {
        /// Record id (integer or text)
        id: String,
    },
    /// Print rows matching a JSON object of column filters (first four used)
    Search {
        /// e.g. '{"caller": "100", "status": "answered"}'
        criteria: String,
    },
    /// Insert or overwrite a record given as a JSON object
    Insert { record: String },
    /// Update the record with the id contained in the JSON object
    Update { record: String },
    /// Delete the row with the given id
    Delete { id: String },
    /// Apply a batch file: {"insert": [...], "update": [...], "delete": [...]}
    Several {
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Reconcile the table with a JSON array of authoritative records
    Refresh {
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Remove every row
    Truncate,
}

impl Config {
    /// Parse configuration from CLI arguments and environment.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Create a configuration for tests.
    #[cfg(test)]
    pub fn test_config(config_dir: PathBuf, command: Command) -> Self {
        Self {
            config_dir,
            config_key: DEFAULT_SETTINGS_KEY.into(),
            channel: "calls".into(),
            log_level: "debug".into(),
            output: OutputFormat::Json,
            command,
        }
    }
}
