//! SQLite backend over an r2d2 connection pool.
//!
//! Uses r2d2 with r2d2_sqlite for pooled access. WAL mode lets readers run
//! alongside a writer; `busy_timeout` absorbs short writer contention.

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::{Value as SqlValue, ValueRef};
use serde::Deserialize;
use serde_json::{Number, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use super::{Backend, Connection, PoolState, QueryResult, Statement};
use crate::driver::query::Dialect;
use crate::driver::relational::RelationalDriver;
use crate::driver::Driver;
use crate::error::{Error, Result};
use crate::manager::DriverContext;
use crate::record::{Record, ID_COLUMN};

/// Pool configuration read from `db_config` when `db_type = "sqlite"`.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteConfig {
    /// Path to the database file
    pub path: PathBuf,
    /// Maximum number of connections in the pool
    #[serde(default = "default_max_size")]
    pub max_size: u32,
    /// How long `acquire` waits for a free connection
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,
    /// How long a statement waits on a locked database
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// When set, create the bound table with these columns (plus `id`) if missing
    #[serde(default)]
    pub columns: Option<Vec<String>>,
}

fn default_max_size() -> u32 {
    10
}

fn default_connection_timeout_ms() -> u64 {
    30_000
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

impl SqliteConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_size: default_max_size(),
            connection_timeout_ms: default_connection_timeout_ms(),
            busy_timeout_ms: default_busy_timeout_ms(),
            columns: None,
        }
    }

    pub fn with_max_size(mut self, max_size: u32) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }
}

/// Pooled SQLite backend.
#[derive(Clone)]
pub struct SqliteBackend {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteBackend {
    /// Create a pool for the database at `config.path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot be created.
    pub fn open(config: &SqliteConfig) -> Result<Self> {
        let manager = SqliteConnectionManager::file(&config.path);

        let pool = Pool::builder()
            .max_size(config.max_size)
            .connection_timeout(Duration::from_millis(config.connection_timeout_ms))
            .connection_customizer(Box::new(PragmaCustomizer {
                busy_timeout: Duration::from_millis(config.busy_timeout_ms),
            }))
            .build(manager)?;

        tracing::debug!(
            path = %config.path.display(),
            max_size = config.max_size,
            "SQLite pool created"
        );

        Ok(Self { pool })
    }

    /// Create `table` with an integer `id` primary key and untyped columns.
    pub fn ensure_table(&self, table: &str, columns: &[String]) -> Result<()> {
        let dialect = self.dialect();
        let mut defs = vec![format!(
            "{} INTEGER PRIMARY KEY",
            dialect.quote_identifier(ID_COLUMN)
        )];
        defs.extend(
            columns
                .iter()
                .filter(|c| c.as_str() != ID_COLUMN)
                .map(|c| dialect.quote_identifier(c)),
        );

        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            dialect.quote_identifier(table),
            defs.join(", ")
        );

        let mut conn = self.acquire()?;
        conn.query(&Statement::new(sql))?;
        Ok(())
    }
}

impl Backend for SqliteBackend {
    type Conn = SqliteConnection;

    fn acquire(&self) -> Result<SqliteConnection> {
        Ok(SqliteConnection(self.pool.get()?))
    }

    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn state(&self) -> PoolState {
        let state = self.pool.state();
        PoolState {
            connections: state.connections,
            idle_connections: state.idle_connections,
        }
    }
}

/// A connection checked out of [`SqliteBackend`].
pub struct SqliteConnection(PooledConnection<SqliteConnectionManager>);

impl Connection for SqliteConnection {
    fn query(&mut self, statement: &Statement) -> Result<QueryResult> {
        let sql = statement.sql.as_str();
        let params: Vec<SqlValue> = statement.params.iter().map(to_sql).collect();

        let mut stmt = self.0.prepare(sql).map_err(|e| Error::query(sql, e))?;

        if stmt.column_count() == 0 {
            // last_insert_rowid is per connection and survives pool checkouts,
            // so only a change made by this statement counts as an insert
            let rowid_before = self.0.last_insert_rowid();
            let affected = stmt
                .execute(rusqlite::params_from_iter(params.iter()))
                .map_err(|e| Error::query(sql, e))?;
            let rowid_after = self.0.last_insert_rowid();
            return Ok(QueryResult {
                rows: Vec::new(),
                affected_rows: affected as u64,
                last_insert_id: (affected > 0 && rowid_after != rowid_before).then_some(rowid_after),
            });
        }

        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let mut rows = stmt
            .query(rusqlite::params_from_iter(params.iter()))
            .map_err(|e| Error::query(sql, e))?;

        let mut records = Vec::new();
        while let Some(row) = rows.next().map_err(|e| Error::query(sql, e))? {
            let mut record = Record::new();
            for (i, name) in names.iter().enumerate() {
                let value = row.get_ref(i).map_err(|e| Error::query(sql, e))?;
                record.insert(name.clone(), from_sql(value));
            }
            records.push(record);
        }

        Ok(QueryResult::rows(records))
    }
}

/// Build a relational driver over SQLite from a manager context.
pub fn open_driver(ctx: &DriverContext) -> Result<Arc<dyn Driver>> {
    let config: SqliteConfig = serde_json::from_value(ctx.config.clone())
        .map_err(|e| Error::InvalidConfig(format!("sqlite db_config: {e}")))?;

    let backend = SqliteBackend::open(&config)?;
    if let Some(columns) = &config.columns {
        backend.ensure_table(&ctx.table, columns)?;
    }

    Ok(Arc::new(RelationalDriver::new(
        ctx.channel.clone(),
        ctx.table.clone(),
        backend,
    )))
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        nested => SqlValue::Text(nested.to_string()),
    }
}

fn from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Array(bytes.iter().map(|b| Value::from(*b)).collect()),
    }
}

/// Connection customizer that applies pool pragmas.
#[derive(Debug)]
struct PragmaCustomizer {
    busy_timeout: Duration,
}

impl r2d2::CustomizeConnection<rusqlite::Connection, rusqlite::Error> for PragmaCustomizer {
    fn on_acquire(&self, conn: &mut rusqlite::Connection) -> std::result::Result<(), rusqlite::Error> {
        conn.busy_timeout(self.busy_timeout)?;
        // journal_mode reports the resulting mode as a row
        conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))
    }
}
