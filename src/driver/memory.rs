//! In-process driver with the same contract as the relational one.
//!
//! Rows live in an id-ordered map behind an async mutex. Useful for
//! embedding callers and for exercising the shared batch and reconciliation
//! logic without a database.

use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::Mutex;

use super::query::search_criteria;
use super::{Ack, Driver};
use crate::error::Result;
use crate::record::{Record, RecordId};

/// Driver keeping its table in memory.
pub struct MemoryDriver {
    channel: String,
    table: String,
    rows: Mutex<BTreeMap<RecordId, Record>>,
}

impl MemoryDriver {
    pub fn new(channel: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            table: table.into(),
            rows: Mutex::new(BTreeMap::new()),
        }
    }

    /// Number of rows currently held.
    pub async fn len(&self) -> usize {
        self.rows.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.lock().await.is_empty()
    }
}

fn merge(target: &mut Record, source: &Record) {
    for (column, value) in source.iter() {
        target.insert(column.clone(), value.clone());
    }
}

#[async_trait]
impl Driver for MemoryDriver {
    fn channel(&self) -> &str {
        &self.channel
    }

    fn table(&self) -> &str {
        &self.table
    }

    async fn gather(&self) -> Result<Vec<Record>> {
        Ok(self.rows.lock().await.values().cloned().collect())
    }

    async fn select(&self, record: &Record) -> Result<Option<Record>> {
        let id = record.require_id("select")?;
        Ok(self.rows.lock().await.get(&id).cloned())
    }

    async fn search(&self, criteria: &Record) -> Result<Vec<Record>> {
        let filter = search_criteria(criteria);
        let rows = self.rows.lock().await;

        Ok(rows
            .values()
            .filter(|row| filter.iter().all(|(c, v)| row.get(c) == Some(*v)))
            .cloned()
            .collect())
    }

    async fn insert(&self, record: &Record) -> Result<Ack> {
        let id = record.require_id("insert")?;
        let mut rows = self.rows.lock().await;

        rows.entry(id)
            .and_modify(|existing| merge(existing, record))
            .or_insert_with(|| record.clone());

        Ok(Ack {
            affected_rows: 1,
            ..Ack::default()
        })
    }

    async fn update(&self, record: &Record) -> Result<Ack> {
        let id = record.require_id("update")?;
        let mut rows = self.rows.lock().await;

        let affected_rows = match rows.get_mut(&id) {
            Some(existing) => {
                merge(existing, record);
                1
            }
            None => 0,
        };

        Ok(Ack {
            affected_rows,
            ..Ack::default()
        })
    }

    async fn delete(&self, record: &Record) -> Result<Ack> {
        let id = record.require_id("delete")?;
        let removed = self.rows.lock().await.remove(&id).is_some();

        Ok(Ack {
            affected_rows: u64::from(removed),
            ..Ack::default()
        })
    }

    async fn delete_after(&self, id: &RecordId) -> Result<Ack> {
        let mut rows = self.rows.lock().await;
        let before = rows.len();
        rows.retain(|key, _| key <= id);

        Ok(Ack {
            affected_rows: (before - rows.len()) as u64,
            ..Ack::default()
        })
    }

    async fn truncate(&self) -> Result<Ack> {
        let mut rows = self.rows.lock().await;
        let existing = rows.len() as u64;
        rows.clear();

        Ok(Ack {
            affected_rows: existing,
            last_insert_id: None,
            destroyed_rows: (existing > 0).then_some(existing),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{Action, Batch, Outcome};
    use crate::error::Error;
    use serde_json::json;

    async fn seeded(ids: &[i64]) -> MemoryDriver {
        let driver = MemoryDriver::new("calls", "calls");
        for id in ids {
            driver
                .insert(&Record::with_id(*id).set("value", "old"))
                .await
                .unwrap();
        }
        driver
    }

    fn ids(rows: &[Record]) -> Vec<i64> {
        rows.iter()
            .filter_map(|r| match r.id() {
                Some(RecordId::Int(id)) => Some(id),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_refresh_range_deletes_beyond_tail() {
        let driver = seeded(&[1, 2, 3, 5, 9]).await;

        let authoritative: Vec<Record> = [1, 2, 5]
            .iter()
            .map(|id| Record::with_id(*id).set("value", "new"))
            .collect();
        let refresh = driver.refresh(&authoritative).await.unwrap();

        assert_eq!(refresh.deleted_rows, 1);
        let rows = driver.gather().await.unwrap();
        // 3 is below the tail and is kept
        assert_eq!(ids(&rows), vec![1, 2, 3, 5]);
        assert_eq!(rows[2].get("value"), Some(&json!("old")));
        assert_eq!(rows[3].get("value"), Some(&json!("new")));
    }

    #[tokio::test]
    async fn test_refresh_without_excess_only_upserts() {
        let driver = seeded(&[1]).await;

        let authoritative = vec![Record::with_id(1), Record::with_id(2)];
        let refresh = driver.refresh(&authoritative).await.unwrap();

        assert_eq!(refresh.deleted_rows, 0);
        assert!(matches!(refresh.last, Some(Outcome::Ack(_))));
        assert_eq!(driver.len().await, 2);
    }

    #[tokio::test]
    async fn test_refresh_empty_set() {
        let empty = MemoryDriver::new("calls", "calls");
        let refresh = empty.refresh(&[]).await.unwrap();
        assert_eq!(refresh, Default::default());

        let driver = seeded(&[1]).await;
        let err = driver.refresh(&[]).await.unwrap_err();
        assert!(matches!(err, Error::EmptyRefresh));
        assert_eq!(driver.len().await, 1);
    }

    #[tokio::test]
    async fn test_several_fires_per_record_in_order() {
        let driver = seeded(&[3]).await;
        let batch = Batch::new()
            .with(Action::Insert, [Record::with_id(1), Record::with_id(2)])
            .with(Action::Delete, [Record::with_id(3)]);

        let mut seen = Vec::new();
        let last = driver
            .several(&batch, &mut |action: Action, _: &Outcome| seen.push(action))
            .await
            .unwrap();

        assert_eq!(seen, vec![Action::Insert, Action::Insert, Action::Delete]);
        assert_eq!(
            last,
            Some(Outcome::Ack(Ack {
                affected_rows: 1,
                ..Ack::default()
            }))
        );
        assert_eq!(ids(&driver.gather().await.unwrap()), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_truncate_reports_destroyed_rows_only_when_nonzero() {
        let driver = seeded(&[1, 2, 3]).await;
        assert_eq!(driver.truncate().await.unwrap().destroyed_rows, Some(3));
        assert_eq!(driver.truncate().await.unwrap().destroyed_rows, None);
    }
}
