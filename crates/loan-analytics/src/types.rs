//! Result-set types shared by the warehouse client, cache and executor

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Semantic column type used in declared result schemas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    String,
    Numeric,
    Date,
}

impl ColumnType {
    /// Map a warehouse type name (`BIGINT`, `DECIMAL(10,2)`, ...) to a semantic type
    #[must_use]
    pub fn from_sql_type(type_name: &str) -> Self {
        let base = type_name
            .split(['(', '<'])
            .next()
            .unwrap_or_default()
            .trim()
            .to_uppercase();
        match base.as_str() {
            "TINYINT" | "BYTE" | "SMALLINT" | "SHORT" | "INT" | "INTEGER" | "BIGINT" | "LONG"
            | "FLOAT" | "REAL" | "DOUBLE" | "DECIMAL" | "DEC" | "NUMERIC" => Self::Numeric,
            "DATE" | "TIMESTAMP" | "TIMESTAMP_NTZ" => Self::Date,
            _ => Self::String,
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Numeric => "numeric",
            Self::Date => "date",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single cell of a result row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Date(NaiveDate),
    Text(String),
}

impl Value {
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// One result row keyed by column name
pub type Row = BTreeMap<String, Value>;

/// Shared, immutable row sequence handed out by the executor and the cache
pub type Rows = Arc<[Row]>;

/// Column metadata reported by the warehouse
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMeta {
    pub name: String,
    /// Raw warehouse type name
    pub type_name: String,
}

impl ColumnMeta {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }

    #[must_use]
    pub fn column_type(&self) -> ColumnType {
        ColumnType::from_sql_type(&self.type_name)
    }
}

/// Statement result as returned by a warehouse client
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    pub columns: Vec<ColumnMeta>,
    pub rows: Vec<Row>,
}

impl ResultSet {
    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}
