//! SQL-level data types for catalog columns and DDL generation.
//!
//! Rollup tables are created with `CREATE TABLE ... AS SELECT`, so types are
//! mostly needed for casts (average division) and for describing reflected
//! catalog columns.

use std::fmt;

use serde::{Deserialize, Serialize};

/// SQL-level data type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// Boolean type.
    Bool,

    /// 32-bit signed integer (INT/INTEGER).
    Int32,

    /// 64-bit signed integer (BIGINT).
    Int64,

    /// 64-bit floating point (DOUBLE PRECISION/FLOAT8).
    Float64,

    /// Arbitrary precision number. Used as the cast target of average divisions.
    Numeric,

    /// Variable-length string.
    Text,

    /// Date without time.
    Date,

    /// Timestamp without timezone.
    Timestamp,
}

impl DataType {
    /// Parse a declared column type.
    ///
    /// Declared types are matched loosely, the way SQLite assigns column
    /// affinity: `varchar(32)` is text, `decimal(18,2)` is numeric.
    ///
    /// ```ignore
    /// use rolap::sql::types::DataType;
    ///
    /// assert_eq!(DataType::parse("bigint"), Some(DataType::Int64));
    /// assert_eq!(DataType::parse("varchar(255)"), Some(DataType::Text));
    /// ```
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_lowercase();
        let base = s.split('(').next().unwrap_or("").trim();

        let dt = match base {
            "bool" | "boolean" => DataType::Bool,
            "int" | "int4" | "int32" | "smallint" | "tinyint" | "mediumint" => DataType::Int32,
            "integer" | "bigint" | "int8" | "int64" => DataType::Int64,
            "real" | "float" | "float4" | "float8" | "float64" | "double"
            | "double precision" => DataType::Float64,
            "numeric" | "decimal" => DataType::Numeric,
            "text" | "string" | "varchar" | "char" | "character" | "character varying"
            | "nvarchar" | "clob" => DataType::Text,
            "date" => DataType::Date,
            "timestamp" | "datetime" | "timestamptz" => DataType::Timestamp,
            _ => return None,
        };
        Some(dt)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Bool => "bool",
            DataType::Int32 => "int32",
            DataType::Int64 => "int64",
            DataType::Float64 => "float64",
            DataType::Numeric => "numeric",
            DataType::Text => "text",
            DataType::Date => "date",
            DataType::Timestamp => "timestamp",
        };
        write!(f, "{}", name)
    }
}
