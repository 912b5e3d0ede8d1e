//! Error types for rowkeep.
//!
//! Every failure a driver or the manager can report funnels into [`Error`].
//! Configuration failures are fatal and never retried; query failures are
//! logged by the driver and handed back to the caller unchanged.

use thiserror::Error;

/// Result type for rowkeep operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for rowkeep.
#[derive(Debug, Error)]
pub enum Error {
    /// The configured `db_type` has no registered factory.
    #[error("unknown driver type: {0}")]
    UnknownDriver(String),

    /// The channel has no entry in `db_link`.
    #[error("no table linked to channel: {0}")]
    UnknownChannel(String),

    /// The settings document could not be read or parsed.
    #[error("failed to load settings '{key}': {message}")]
    Settings { key: String, message: String },

    /// A driver received a `db_config` it cannot use.
    #[error("invalid driver configuration: {0}")]
    InvalidConfig(String),

    /// A record-level operation was given a record without a usable `id`.
    #[error("{operation} requires a record with a non-null id")]
    MissingId { operation: &'static str },

    /// `refresh` was given no records while the table still holds rows.
    #[error("refresh requires at least one record when the table is not empty")]
    EmptyRefresh,

    /// No connection could be checked out of the pool.
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// A statement failed on the backend.
    #[error("query failed: {sql}")]
    Query {
        sql: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The blocking task running a statement panicked or was cancelled.
    #[error("query task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl Error {
    /// Wrap a backend error together with the statement that produced it.
    pub fn query<E>(sql: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Query {
            sql: sql.into(),
            source: Box::new(source),
        }
    }

    /// Whether this error comes from configuration rather than a running query.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::UnknownDriver(_)
                | Self::UnknownChannel(_)
                | Self::Settings { .. }
                | Self::InvalidConfig(_)
        )
    }
}
