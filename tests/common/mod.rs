//! Test utilities for rowkeep integration tests.
//!
//! Provides:
//! - Temporary database and settings directories
//! - SQLite-backed drivers bound to a fresh table
//! - A recording backend that captures statements and pool checkouts

#![allow(dead_code)]

use rowkeep::driver::query::Dialect;
use rowkeep::driver::relational::RelationalDriver;
use rowkeep::error::{Error, Result};
use rowkeep::record::Record;
use rowkeep::storage::sqlite::{SqliteBackend, SqliteConfig};
use rowkeep::storage::{Backend, Connection, PoolState, QueryResult, Statement};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Table every fixture driver binds to.
pub const TABLE: &str = "call_records";

/// Test fixture that manages a temporary directory.
///
/// The directory is automatically cleaned up when the fixture is dropped.
pub struct TestFixture {
    /// Temporary directory for databases and settings
    pub temp_dir: TempDir,
    /// Path to the database file
    pub db_path: PathBuf,
}

impl TestFixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");
        Self { temp_dir, db_path }
    }

    /// Directory for settings documents.
    pub fn config_dir(&self) -> PathBuf {
        self.temp_dir.path().join("config")
    }

    /// SQLite pool configuration for this fixture's database.
    pub fn sqlite_config(&self, max_size: u32) -> SqliteConfig {
        SqliteConfig::new(&self.db_path)
            .with_max_size(max_size)
            .with_columns(["caller", "callee", "duration", "status"])
    }

    /// A relational driver over a fresh `call_records` table.
    pub fn sqlite_driver(&self, max_size: u32) -> RelationalDriver<SqliteBackend> {
        let config = self.sqlite_config(max_size);
        let backend = SqliteBackend::open(&config).expect("failed to open pool");
        backend
            .ensure_table(TABLE, config.columns.as_deref().unwrap_or_default())
            .expect("failed to create table");
        RelationalDriver::new("calls", TABLE, backend)
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// A call record with the given id and caller.
pub fn call(id: i64, caller: &str) -> Record {
    Record::with_id(id)
        .set("caller", caller)
        .set("callee", "200")
        .set("duration", 30)
}

const RECORDING_POOL_SIZE: u32 = 4;

#[derive(Default)]
struct Recording {
    statements: Mutex<Vec<Statement>>,
    acquisitions: AtomicU32,
    checked_out: AtomicU32,
    fail_on: Mutex<Option<String>>,
    rows: Mutex<Vec<Record>>,
}

/// Backend double that records every statement it is asked to run.
///
/// Clones share the same recording, so a test can keep one clone while the
/// driver owns another.
#[derive(Clone, Default)]
pub struct RecordingBackend {
    inner: Arc<Recording>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every statement whose SQL contains `pattern`.
    pub fn fail_on(&self, pattern: &str) {
        *self.inner.fail_on.lock().unwrap() = Some(pattern.to_string());
    }

    /// Rows returned by every SELECT.
    pub fn return_rows(&self, rows: Vec<Record>) {
        *self.inner.rows.lock().unwrap() = rows;
    }

    /// Statements executed so far, in order.
    pub fn statements(&self) -> Vec<Statement> {
        self.inner.statements.lock().unwrap().clone()
    }

    /// Total number of connection checkouts.
    pub fn acquisitions(&self) -> u32 {
        self.inner.acquisitions.load(Ordering::SeqCst)
    }
}

impl Backend for RecordingBackend {
    type Conn = RecordingConnection;

    fn acquire(&self) -> Result<RecordingConnection> {
        self.inner.acquisitions.fetch_add(1, Ordering::SeqCst);
        self.inner.checked_out.fetch_add(1, Ordering::SeqCst);
        Ok(RecordingConnection {
            inner: Arc::clone(&self.inner),
        })
    }

    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn state(&self) -> PoolState {
        PoolState {
            connections: RECORDING_POOL_SIZE,
            idle_connections: RECORDING_POOL_SIZE
                - self.inner.checked_out.load(Ordering::SeqCst),
        }
    }
}

/// Connection handed out by [`RecordingBackend`].
pub struct RecordingConnection {
    inner: Arc<Recording>,
}

impl Connection for RecordingConnection {
    fn query(&mut self, statement: &Statement) -> Result<QueryResult> {
        self.inner
            .statements
            .lock()
            .unwrap()
            .push(statement.clone());

        let fail_on = self.inner.fail_on.lock().unwrap().clone();
        if let Some(pattern) = fail_on {
            if statement.sql.contains(&pattern) {
                let cause = std::io::Error::new(std::io::ErrorKind::Other, "injected failure");
                return Err(Error::query(statement.sql.clone(), cause));
            }
        }

        if statement.sql.starts_with("SELECT") {
            Ok(QueryResult::rows(self.inner.rows.lock().unwrap().clone()))
        } else {
            Ok(QueryResult::affected(1))
        }
    }
}

impl Drop for RecordingConnection {
    fn drop(&mut self) {
        self.inner.checked_out.fetch_sub(1, Ordering::SeqCst);
    }
}
