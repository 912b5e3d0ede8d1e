//! Driver contract and record reconciliation.
//!
//! A [`Driver`] is bound to one table for its whole lifetime. Implementors
//! provide the single-record primitives plus the range delete; batch
//! application ([`Driver::several`]) and reconciliation ([`Driver::refresh`])
//! are built on top of those and shared by every driver.
//!
//! # Modules
//!
//! - [`query`]: SQL construction rules and dialects
//! - [`relational`]: driver over any pooled SQL [`Backend`](crate::storage::Backend)
//! - [`memory`]: in-process driver with the same contract

pub mod memory;
pub mod query;
pub mod relational;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::record::{Record, RecordId};
use crate::storage::QueryResult;

/// Acknowledgment for data-modifying operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Ack {
    pub affected_rows: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_insert_id: Option<i64>,
    /// Rows removed by `truncate`. Only set when at least one row existed.
    #[serde(rename = "destroyedRows", skip_serializing_if = "Option::is_none")]
    pub destroyed_rows: Option<u64>,
}

impl From<QueryResult> for Ack {
    fn from(result: QueryResult) -> Self {
        Self {
            affected_rows: result.affected_rows,
            last_insert_id: result.last_insert_id,
            destroyed_rows: None,
        }
    }
}

/// Result of one record-level operation inside a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Outcome {
    Rows(Vec<Record>),
    Ack(Ack),
}

/// Result of [`Driver::refresh`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Refresh {
    /// Rows removed by the range delete, zero if none was needed.
    pub deleted_rows: u64,
    /// Outcome of the last upsert, `None` when no records were given.
    pub last: Option<Outcome>,
}

/// Record-level action a batch can apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Select,
    Search,
    Insert,
    Update,
    Delete,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::Search => "search",
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "select" => Ok(Self::Select),
            "search" => Ok(Self::Search),
            "insert" => Ok(Self::Insert),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            other => Err(format!("unknown batch action: {other}")),
        }
    }
}

/// Ordered action → records mapping for [`Driver::several`].
///
/// Deserializes from a JSON object such as
/// `{"insert": [{...}, {...}], "delete": [{...}]}`, keeping key order.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub struct Batch {
    groups: Vec<(Action, Vec<Record>)>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a group of records for one action.
    #[must_use]
    pub fn with(mut self, action: Action, records: impl IntoIterator<Item = Record>) -> Self {
        self.push(action, records);
        self
    }

    pub fn push(&mut self, action: Action, records: impl IntoIterator<Item = Record>) {
        self.groups.push((action, records.into_iter().collect()));
    }

    /// Every (action, record) pair in application order.
    pub fn iter(&self) -> impl Iterator<Item = (Action, &Record)> {
        self.groups
            .iter()
            .flat_map(|(action, records)| records.iter().map(move |r| (*action, r)))
    }

    /// Total number of records across all groups.
    pub fn len(&self) -> usize {
        self.groups.iter().map(|(_, records)| records.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TryFrom<Map<String, Value>> for Batch {
    type Error = String;

    fn try_from(map: Map<String, Value>) -> std::result::Result<Self, Self::Error> {
        let mut batch = Batch::new();
        for (key, value) in map {
            let action: Action = key.parse()?;
            let records: Vec<Record> = serde_json::from_value(value)
                .map_err(|e| format!("records for '{key}': {e}"))?;
            batch.push(action, records);
        }
        Ok(batch)
    }
}

/// CRUD + reconciliation contract over one bound table.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Channel this driver was loaded for.
    fn channel(&self) -> &str;

    /// Table this driver is bound to.
    fn table(&self) -> &str;

    /// All rows of the table.
    async fn gather(&self) -> Result<Vec<Record>>;

    /// The row matching `record.id`, if any.
    async fn select(&self, record: &Record) -> Result<Option<Record>>;

    /// Rows matching the leading truthy criteria (at most four), combined with AND.
    async fn search(&self, criteria: &Record) -> Result<Vec<Record>>;

    /// Insert the record, or overwrite the existing row with the same id.
    async fn insert(&self, record: &Record) -> Result<Ack>;

    /// Overwrite the supplied columns of the row matching `record.id`.
    async fn update(&self, record: &Record) -> Result<Ack>;

    /// Remove the row matching `record.id`.
    async fn delete(&self, record: &Record) -> Result<Ack>;

    /// Remove every row whose id is greater than `id`.
    async fn delete_after(&self, id: &RecordId) -> Result<Ack>;

    /// Remove all rows, reporting how many existed.
    async fn truncate(&self) -> Result<Ack>;

    /// Apply one action to one record.
    async fn apply(&self, action: Action, record: &Record) -> Result<Outcome> {
        Ok(match action {
            Action::Select => Outcome::Rows(self.select(record).await?.into_iter().collect()),
            Action::Search => Outcome::Rows(self.search(record).await?),
            Action::Insert => Outcome::Ack(self.insert(record).await?),
            Action::Update => Outcome::Ack(self.update(record).await?),
            Action::Delete => Outcome::Ack(self.delete(record).await?),
        })
    }

    /// Apply every record of every group, in order.
    ///
    /// `on_each` fires once per record as it completes. Returns the last
    /// outcome; results are not aggregated. The first failure stops the
    /// batch and earlier statements stay applied.
    async fn several(
        &self,
        batch: &Batch,
        on_each: &mut (dyn for<'o> FnMut(Action, &'o Outcome) + Send),
    ) -> Result<Option<Outcome>> {
        let mut last = None;
        for (action, record) in batch.iter() {
            let outcome = self.apply(action, record).await?;
            on_each(action, &outcome);
            last = Some(outcome);
        }
        Ok(last)
    }

    /// Move the table toward the authoritative `records`.
    ///
    /// When the table holds more rows than `records`, every row with an id
    /// greater than the last record's id is deleted; then all records are
    /// upserted. Rows with smaller ids that are absent from `records` are
    /// kept: this is a range delete by tail id, not a set difference, and it
    /// assumes ids grow monotonically.
    async fn refresh(&self, records: &[Record]) -> Result<Refresh> {
        let current = self.gather().await?;
        let mut deleted_rows = 0;

        if current.len() > records.len() {
            let tail = records.last().ok_or(Error::EmptyRefresh)?;
            let tail_id = tail.require_id("refresh")?;
            deleted_rows = self.delete_after(&tail_id).await?.affected_rows;
            tracing::info!(
                table = self.table(),
                tail_id = %tail_id,
                deleted_rows,
                "Removed rows beyond authoritative tail"
            );
        }

        let batch = Batch::new().with(Action::Insert, records.iter().cloned());
        let mut ignore = |_: Action, _: &Outcome| {};
        let last = self.several(&batch, &mut ignore).await?;

        Ok(Refresh { deleted_rows, last })
    }
}
