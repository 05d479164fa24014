use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::{Null, ToSql, ToSqlOutput};

use crate::error::{EtlError, Result};

/// A single typed cell. Empty CSV fields become `Null`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Text(String),
    Integer(i64),
    Float(f64),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Hashable form used for natural-key joins. Nulls never match anything,
    /// so they have no key.
    pub fn key(&self) -> Option<KeyValue> {
        match self {
            Self::Null => None,
            Self::Text(s) => Some(KeyValue::Text(s.clone())),
            Self::Integer(i) => Some(KeyValue::Integer(*i)),
            // -0.0 and 0.0 compare equal, so they must hash equal
            Self::Float(f) if *f == 0.0 => Some(KeyValue::Float(0f64.to_bits())),
            Self::Float(f) => Some(KeyValue::Float(f.to_bits())),
            Self::Date(d) => Some(KeyValue::Date(*d)),
            Self::Timestamp(t) => Some(KeyValue::Timestamp(*t)),
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Self::Null => ToSqlOutput::from(Null),
            Self::Text(s) => ToSqlOutput::from(s.as_str()),
            Self::Integer(i) => ToSqlOutput::from(*i),
            Self::Float(f) => ToSqlOutput::from(*f),
            Self::Date(d) => ToSqlOutput::from(d.format("%Y-%m-%d").to_string()),
            Self::Timestamp(t) => ToSqlOutput::from(t.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyValue {
    Text(String),
    Integer(i64),
    Float(u64),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

/// A natural key: the projected column tuple of one row.
pub type NaturalKey = Vec<KeyValue>;

/// Row-major in-memory table with named columns.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Dataset {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn require_column(&self, name: &str) -> Result<usize> {
        self.column_index(name)
            .ok_or_else(|| EtlError::UnknownColumn(name.to_string()))
    }

    pub fn require_columns(&self, names: &[&str]) -> Result<Vec<usize>> {
        names.iter().map(|n| self.require_column(n)).collect()
    }

    /// Natural key of `row` over `indices`, or `None` if any part is null.
    pub fn natural_key(row: &[Value], indices: &[usize]) -> Option<NaturalKey> {
        indices.iter().map(|&i| row[i].key()).collect()
    }
}
