//! SQL construction for the relational driver.
//!
//! Identifiers are always quoted by the dialect and values are always bound
//! as parameters. Every builder returns a [`Statement`] ready for
//! [`Connection::query`](crate::storage::Connection::query).

use serde_json::Value;

use crate::record::{Record, RecordId, ID_COLUMN};
use crate::storage::Statement;

/// Maximum number of criteria a `search` filter may combine.
pub const MAX_SEARCH_CRITERIA: usize = 4;

/// SQL flavour spoken by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Sqlite,
    Mysql,
}

impl Dialect {
    pub fn name(self) -> &'static str {
        match self {
            Self::Sqlite => "SQLite",
            Self::Mysql => "MySQL",
        }
    }

    /// Quote an identifier, doubling any embedded quote character.
    pub fn quote_identifier(self, name: &str) -> String {
        match self {
            Self::Sqlite => format!("\"{}\"", name.replace('"', "\"\"")),
            Self::Mysql => format!("`{}`", name.replace('`', "``")),
        }
    }

    /// Conflict clause that overwrites every listed column with the incoming row.
    fn upsert_clause(self, columns: &[String]) -> String {
        match self {
            Self::Sqlite => {
                let sets: Vec<String> = columns
                    .iter()
                    .map(|c| format!("{c} = excluded.{c}"))
                    .collect();
                format!(
                    " ON CONFLICT ({}) DO UPDATE SET {}",
                    self.quote_identifier(ID_COLUMN),
                    sets.join(", ")
                )
            }
            Self::Mysql => {
                let sets: Vec<String> = columns
                    .iter()
                    .map(|c| format!("{c} = VALUES({c})"))
                    .collect();
                format!(" ON DUPLICATE KEY UPDATE {}", sets.join(", "))
            }
        }
    }
}

/// Whether a criterion value takes part in a `search` filter.
///
/// `null`, `false`, zero and the empty string are skipped.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// The criteria a `search` filter will use: the leading truthy entries, in
/// column order, capped at [`MAX_SEARCH_CRITERIA`].
pub fn search_criteria(criteria: &Record) -> Vec<(&String, &Value)> {
    let selected: Vec<_> = criteria
        .iter()
        .filter(|(_, value)| is_truthy(value))
        .take(MAX_SEARCH_CRITERIA)
        .collect();

    let truthy = criteria.iter().filter(|(_, v)| is_truthy(v)).count();
    if truthy > selected.len() {
        tracing::debug!(
            supplied = truthy,
            used = selected.len(),
            "Dropping search criteria beyond the filter limit"
        );
    }

    selected
}

/// Statement builder bound to one table.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    dialect: Dialect,
    table: String,
}

impl QueryBuilder {
    pub fn new(dialect: Dialect, table: impl Into<String>) -> Self {
        Self {
            dialect,
            table: table.into(),
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn quoted_table(&self) -> String {
        self.dialect.quote_identifier(&self.table)
    }

    fn quoted_id(&self) -> String {
        self.dialect.quote_identifier(ID_COLUMN)
    }

    /// `SELECT * FROM t`
    pub fn gather(&self) -> Statement {
        Statement::new(format!("SELECT * FROM {}", self.quoted_table()))
    }

    /// `SELECT * FROM t WHERE id = ?`
    pub fn select(&self, id: &RecordId) -> Statement {
        Statement::new(format!(
            "SELECT * FROM {} WHERE {} = ?",
            self.quoted_table(),
            self.quoted_id()
        ))
        .bind(id.to_value())
    }

    /// Conjunctive filter over the leading truthy criteria.
    pub fn search(&self, criteria: &Record) -> Statement {
        let mut sql = format!("SELECT * FROM {}", self.quoted_table());
        let mut params = Vec::new();

        for (i, (column, value)) in search_criteria(criteria).into_iter().enumerate() {
            sql.push_str(if i == 0 { " WHERE " } else { " AND " });
            sql.push_str(&self.dialect.quote_identifier(column));
            sql.push_str(" = ?");
            params.push(value.clone());
        }

        Statement { sql, params }
    }

    /// Insert the record, overwriting every supplied column if the id exists.
    pub fn upsert(&self, record: &Record) -> Statement {
        let columns: Vec<String> = record
            .columns()
            .map(|c| self.dialect.quote_identifier(c))
            .collect();
        let placeholders = vec!["?"; columns.len()].join(", ");

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({}){}",
            self.quoted_table(),
            columns.join(", "),
            placeholders,
            self.dialect.upsert_clause(&columns)
        );

        Statement {
            sql,
            params: record.iter().map(|(_, v)| v.clone()).collect(),
        }
    }

    /// `UPDATE t SET c = ?, ... WHERE id = ?`
    pub fn update(&self, record: &Record, id: &RecordId) -> Statement {
        let sets: Vec<String> = record
            .columns()
            .map(|c| format!("{} = ?", self.dialect.quote_identifier(c)))
            .collect();

        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?",
            self.quoted_table(),
            sets.join(", "),
            self.quoted_id()
        );

        let mut params: Vec<Value> = record.iter().map(|(_, v)| v.clone()).collect();
        params.push(id.to_value());
        Statement { sql, params }
    }

    /// `DELETE FROM t WHERE id = ?`
    pub fn delete(&self, id: &RecordId) -> Statement {
        Statement::new(format!(
            "DELETE FROM {} WHERE {} = ?",
            self.quoted_table(),
            self.quoted_id()
        ))
        .bind(id.to_value())
    }

    /// `DELETE FROM t WHERE id > ?`
    pub fn delete_after(&self, id: &RecordId) -> Statement {
        Statement::new(format!(
            "DELETE FROM {} WHERE {} > ?",
            self.quoted_table(),
            self.quoted_id()
        ))
        .bind(id.to_value())
    }

    /// Remove every row. SQLite has no `TRUNCATE`.
    pub fn truncate(&self) -> Statement {
        match self.dialect {
            Dialect::Sqlite => Statement::new(format!("DELETE FROM {}", self.quoted_table())),
            Dialect::Mysql => Statement::new(format!("TRUNCATE TABLE {}", self.quoted_table())),
        }
    }
}
