//! Execution seam.
//!
//! The compiler only produces SQL. An [`Executor`] runs it: queries come back
//! as [`Row`]s of dynamically typed [`Value`]s, DDL and trigger scripts are
//! run as batches.

mod sqlite;

pub use sqlite::SqliteExecutor;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::sql::dialect::Dialect;
use crate::sql::expr::Literal;

/// Errors raised while running SQL.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Column {column}: expected {expected}, got {found}")]
    UnexpectedType {
        column: String,
        expected: &'static str,
        found: String,
    },

    #[error("Missing column in result row: {0}")]
    MissingColumn(String),
}

pub type ExecResult<T> = Result<T, ExecError>;

/// A value read from a result row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view; text is not parsed.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The literal selecting this value in a predicate.
    pub fn to_literal(&self) -> Literal {
        match self {
            Value::Null => Literal::Null,
            Value::Int(n) => Literal::Int(*n),
            Value::Float(f) => Literal::Float(*f),
            Value::Text(s) => Literal::String(s.clone()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

/// One result row with named-column access.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub columns: Vec<String>,
    pub values: Vec<Value>,
}

impl Row {
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|i| self.values.get(i))
    }

    /// Like [`Row::get`], failing on a missing column.
    pub fn try_get(&self, column: &str) -> ExecResult<&Value> {
        self.get(column)
            .ok_or_else(|| ExecError::MissingColumn(column.into()))
    }

    /// A numeric column; `NULL` reads as `None`.
    pub fn get_f64(&self, column: &str) -> ExecResult<Option<f64>> {
        match self.try_get(column)? {
            Value::Null => Ok(None),
            value => value
                .as_f64()
                .map(Some)
                .ok_or_else(|| ExecError::UnexpectedType {
                    column: column.into(),
                    expected: "number",
                    found: value.to_string(),
                }),
        }
    }
}

/// Runs SQL against a database.
pub trait Executor {
    /// Dialect the SQL handed to this executor must be rendered in.
    fn dialect(&self) -> Dialect;

    fn fetch(&self, sql: &str) -> ExecResult<Vec<Row>>;

    /// Run one or more statements, discarding results.
    fn execute_batch(&self, sql: &str) -> ExecResult<()>;
}
