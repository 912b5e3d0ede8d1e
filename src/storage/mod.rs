//! Storage backend contract.
//!
//! A backend is a pooled connection provider. Drivers need exactly three
//! capabilities from it:
//! - acquire a connection ([`Backend::acquire`])
//! - run a statement on it ([`Connection::query`])
//! - release it, which happens when the connection guard is dropped
//!
//! Provides:
//! - [`Statement`] and [`QueryResult`], the values crossing the boundary
//! - [`sqlite`]: the bundled r2d2 + rusqlite backend

pub mod sqlite;

use serde_json::Value;

use crate::driver::query::Dialect;
use crate::error::Result;
use crate::record::Record;

/// A SQL statement with positional `?` parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Append a positional parameter.
    #[must_use]
    pub fn bind(mut self, value: impl Into<Value>) -> Self {
        self.params.push(value.into());
        self
    }
}

/// Raw result of one statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    /// Rows returned by a query; empty for data-modifying statements.
    pub rows: Vec<Record>,
    /// Rows changed by a data-modifying statement.
    pub affected_rows: u64,
    pub last_insert_id: Option<i64>,
}

impl QueryResult {
    pub fn rows(rows: Vec<Record>) -> Self {
        Self {
            rows,
            ..Self::default()
        }
    }

    pub fn affected(affected_rows: u64) -> Self {
        Self {
            affected_rows,
            ..Self::default()
        }
    }
}

/// Snapshot of a pool's connection counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolState {
    /// Connections currently open, idle or checked out.
    pub connections: u32,
    /// Connections sitting idle in the pool.
    pub idle_connections: u32,
}

impl PoolState {
    pub fn in_use(&self) -> u32 {
        self.connections.saturating_sub(self.idle_connections)
    }
}

/// A checked-out connection. Dropping it returns it to the pool.
pub trait Connection {
    fn query(&mut self, statement: &Statement) -> Result<QueryResult>;
}

/// A pooled connection provider.
///
/// Methods block; drivers call them from `spawn_blocking`.
pub trait Backend: Send + Sync + 'static {
    type Conn: Connection + Send;

    /// Check a connection out of the pool.
    fn acquire(&self) -> Result<Self::Conn>;

    /// SQL flavour this backend speaks.
    fn dialect(&self) -> Dialect;

    /// Current pool state for monitoring.
    fn state(&self) -> PoolState;
}
