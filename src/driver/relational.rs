//! Relational driver over a pooled SQL backend.
//!
//! Every statement goes through [`RelationalDriver::execute`], which checks
//! out one connection per call on a blocking worker and always returns it to
//! the pool, whether the statement succeeded or not. Failures go through
//! [`RelationalDriver::failure`], which logs and hands the error back.

use async_trait::async_trait;
use std::sync::Arc;

use super::query::QueryBuilder;
use super::{Ack, Driver};
use crate::error::{Error, Result};
use crate::record::{Record, RecordId};
use crate::storage::{Backend, Connection, PoolState, QueryResult, Statement};

/// Driver bound to one table of a relational backend.
pub struct RelationalDriver<B: Backend> {
    channel: String,
    backend: Arc<B>,
    queries: QueryBuilder,
}

impl<B: Backend> RelationalDriver<B> {
    /// Bind a driver for `channel` to `table` on `backend`.
    pub fn new(channel: impl Into<String>, table: impl Into<String>, backend: B) -> Self {
        let queries = QueryBuilder::new(backend.dialect(), table);
        let channel = channel.into();

        tracing::info!(
            channel = %channel,
            table = queries.table(),
            dialect = queries.dialect().name(),
            "Driver ready"
        );

        Self {
            channel,
            backend: Arc::new(backend),
            queries,
        }
    }

    /// Current state of the driver's pool.
    pub fn pool_state(&self) -> PoolState {
        self.backend.state()
    }

    /// Run one statement on a pooled connection and hand its result to
    /// `continuation`.
    ///
    /// The connection is released before this returns on every path.
    pub async fn execute<T, F>(&self, statement: Statement, continuation: F) -> Result<T>
    where
        F: FnOnce(QueryResult) -> T,
    {
        let backend = Arc::clone(&self.backend);
        let sql = statement.sql.clone();

        let outcome = tokio::task::spawn_blocking(move || {
            let mut conn = backend.acquire()?;
            conn.query(&statement)
        })
        .await;

        match outcome {
            Ok(Ok(result)) => {
                tracing::debug!(
                    table = self.queries.table(),
                    sql = %sql,
                    rows = result.rows.len(),
                    affected_rows = result.affected_rows,
                    "Statement executed"
                );
                Ok(continuation(result))
            }
            Ok(Err(e)) => Err(self.failure(&format!("DB Error : SQL: {sql}"), e)),
            Err(e) => Err(self.failure(&format!("DB Error : SQL: {sql}"), Error::from(e))),
        }
    }

    /// Log a failure with its full source chain and return it for propagation.
    pub fn failure(&self, message: &str, error: Error) -> Error {
        tracing::error!(
            channel = %self.channel,
            table = self.queries.table(),
            error = %error,
            trace = %source_chain(&error),
            "{message}"
        );
        error
    }
}

fn source_chain(error: &Error) -> String {
    let mut chain = Vec::new();
    let mut source = std::error::Error::source(error);
    while let Some(err) = source {
        chain.push(err.to_string());
        source = err.source();
    }

    if chain.is_empty() {
        "No stack trace information.".to_string()
    } else {
        chain.join(": ")
    }
}

#[async_trait]
impl<B: Backend> Driver for RelationalDriver<B> {
    fn channel(&self) -> &str {
        &self.channel
    }

    fn table(&self) -> &str {
        self.queries.table()
    }

    async fn gather(&self) -> Result<Vec<Record>> {
        self.execute(self.queries.gather(), |r| r.rows).await
    }

    async fn select(&self, record: &Record) -> Result<Option<Record>> {
        let id = record.require_id("select")?;
        self.execute(self.queries.select(&id), |r| r.rows.into_iter().next())
            .await
    }

    async fn search(&self, criteria: &Record) -> Result<Vec<Record>> {
        self.execute(self.queries.search(criteria), |r| r.rows).await
    }

    async fn insert(&self, record: &Record) -> Result<Ack> {
        record.require_id("insert")?;
        self.execute(self.queries.upsert(record), Ack::from).await
    }

    async fn update(&self, record: &Record) -> Result<Ack> {
        let id = record.require_id("update")?;
        self.execute(self.queries.update(record, &id), Ack::from)
            .await
    }

    async fn delete(&self, record: &Record) -> Result<Ack> {
        let id = record.require_id("delete")?;
        self.execute(self.queries.delete(&id), Ack::from).await
    }

    async fn delete_after(&self, id: &RecordId) -> Result<Ack> {
        self.execute(self.queries.delete_after(id), Ack::from).await
    }

    async fn truncate(&self) -> Result<Ack> {
        let existing = self.gather().await?.len() as u64;

        self.execute(self.queries.truncate(), |r| {
            let mut ack = Ack::from(r);
            if existing > 0 {
                ack.destroyed_rows = Some(existing);
            }
            ack
        })
        .await
    }
}
