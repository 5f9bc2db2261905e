//! Relational catalog.
//!
//! The cube model refers to physical columns through [`ColumnRef`]s; the
//! [`Catalog`] knows which tables exist, which columns they carry and how they
//! are linked by foreign keys, and answers the join-path questions the
//! compiler asks when a fragment needs a table that is not yet in the FROM
//! clause.

mod catalog;
mod table;

pub use catalog::{Catalog, JoinEdge, JoinPath};
pub use table::{Column, ColumnRef, ForeignKey, Table};

/// Result type for catalog operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Catalog lookup and join-path errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaError {
    #[error("Unknown table: {0}")]
    UnknownTable(String),

    #[error("Unknown column: {table}.{column}")]
    UnknownColumn { table: String, column: String },

    #[error("No join path from {from} to {to}")]
    NoPath { from: String, to: String },

    #[error("Foreign key {table}.{column} references unknown table {references}")]
    DanglingForeignKey {
        table: String,
        column: String,
        references: String,
    },
}
