//! DuckDB SQL dialect.
//!
//! DuckDB is PostgreSQL-compatible for everything the query compiler emits.
//! It differs on the DDL side:
//! - no `ALTER TABLE ... ADD CONSTRAINT`
//! - no triggers, so rollups are rebuilt rather than maintained
//! - `NUMERIC` is a fixed-scale decimal; casts go through `DOUBLE`

use super::helpers;
use super::{SqlDialect, TriggerStyle};
use crate::sql::types::DataType;

/// DuckDB SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct DuckDb;

impl SqlDialect for DuckDb {
    fn name(&self) -> &'static str {
        "duckdb"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_literal(b)
    }

    fn remap_function(&self, name: &str) -> Option<&'static str> {
        helpers::remap_function_duckdb(name)
    }

    fn emit_data_type(&self, dt: &DataType) -> String {
        helpers::emit_data_type_duckdb(dt)
    }

    fn supports_add_constraint(&self) -> bool {
        false
    }

    fn trigger_style(&self) -> TriggerStyle {
        TriggerStyle::Unsupported
    }
}
