//! Record and identifier types.
//!
//! A [`Record`] is one row: an ordered column → value mapping. Column order is
//! insertion order, which matters for `search` where only the leading
//! criteria participate in the filter.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::error::{Error, Result};

/// Name of the mandatory identifier column.
pub const ID_COLUMN: &str = "id";

/// Identifier of a record.
///
/// Integers order before text, matching SQLite's cross-type ordering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordId {
    Int(i64),
    Text(String),
}

impl RecordId {
    /// Extract an identifier from a column value.
    ///
    /// Signed 64-bit integers and strings are usable identifiers. Null,
    /// booleans, nested values, floats (even integral ones such as `5.0`) and
    /// unsigned integers above `i64::MAX` are not, since none of them round
    /// trips through an `INTEGER PRIMARY KEY` unchanged.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(Self::Int),
            Value::String(s) => Some(Self::Text(s.clone())),
            _ => None,
        }
    }

    /// Convert back into a JSON value for binding.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Int(i) => Value::from(*i),
            Self::Text(s) => Value::from(s.as_str()),
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{i}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for RecordId {
    fn from(id: i64) -> Self {
        Self::Int(id)
    }
}

impl From<i32> for RecordId {
    fn from(id: i32) -> Self {
        Self::Int(i64::from(id))
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        Self::Text(id.to_string())
    }
}

/// One row of a bound table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    /// Create an empty record.
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Create a record holding only an identifier.
    pub fn with_id(id: impl Into<RecordId>) -> Self {
        Self::new().set(ID_COLUMN, id.into().to_value())
    }

    /// Builder-style column assignment.
    #[must_use]
    pub fn set(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(column.into(), value.into());
        self
    }

    /// Assign a column in place, returning the previous value.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(column.into(), value.into())
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.get(column)
    }

    /// The record's identifier, if it carries a usable one.
    pub fn id(&self) -> Option<RecordId> {
        self.0.get(ID_COLUMN).and_then(RecordId::from_value)
    }

    /// The record's identifier, or [`Error::MissingId`] naming the operation.
    pub fn require_id(&self, operation: &'static str) -> Result<RecordId> {
        self.id().ok_or(Error::MissingId { operation })
    }

    /// Columns and values in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn columns(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for Record {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
