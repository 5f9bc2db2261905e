//! PostgreSQL SQL dialect.
//!
//! PostgreSQL features used by the compiler:
//! - ANSI identifier quoting (`"`)
//! - Native boolean type (true/false)
//! - `DATE_TRUNC` for computed time levels
//! - `ALTER TABLE ... ADD CONSTRAINT` on rollup tables
//! - PL/pgSQL trigger functions for incremental maintenance

use super::helpers;
use super::{SqlDialect, TriggerStyle};

/// PostgreSQL SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct Postgres;

impl SqlDialect for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_literal(b)
    }

    // Uses default emit_limit_offset (LIMIT ... OFFSET ...)

    fn remap_function(&self, name: &str) -> Option<&'static str> {
        helpers::remap_function_postgres(name)
    }

    fn trigger_style(&self) -> TriggerStyle {
        TriggerStyle::Procedural
    }
}
