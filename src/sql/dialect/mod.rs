//! SQL Dialect definitions and formatting rules.
//!
//! This module provides a trait-based abstraction for SQL dialect differences.
//! Each dialect implements `SqlDialect` to handle its specific syntax:
//!
//! - Identifier quoting: `"` everywhere we target
//! - Boolean literals: true/false vs 1/0
//! - Date truncation: `DATE_TRUNC` vs `strftime`
//! - Numeric cast target used by weighted averages
//! - DDL surface: `ALTER TABLE ... ADD CONSTRAINT`, trigger flavour
//!
//! # Usage
//!
//! ```ignore
//! use rolap::sql::dialect::{Dialect, SqlDialect};
//!
//! let dialect = Dialect::Postgres;
//! let quoted = dialect.quote_identifier("Unit Price");  // "Unit Price"
//! ```
//!
//! # Feature matrix
//!
//! | Feature | PostgreSQL | DuckDB | SQLite |
//! |---------|-----------|--------|--------|
//! | DATE_TRUNC | ✓ | ✓ | ❌ (strftime) |
//! | ALTER TABLE ADD CONSTRAINT | ✓ | ❌ | ❌ |
//! | Trigger functions (PL/pgSQL) | ✓ | ❌ | ❌ |
//! | Inline trigger bodies | ❌ | ❌ | ✓ |
//! | UPDATE ... FROM | ✓ | ✓ | 3.33+ |
//! | NULLS FIRST/LAST | ✓ | ✓ | 3.30+ |

mod duckdb;
pub mod helpers;
mod postgres;
mod sqlite;

pub use duckdb::DuckDb;
pub use postgres::Postgres;
pub use sqlite::Sqlite;

use serde::{Deserialize, Serialize};

use super::expr::TimeGrain;
use super::token::TokenStream;
use super::types::DataType;

/// How a dialect installs row-level maintenance triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerStyle {
    /// A PL/pgSQL function plus `CREATE TRIGGER ... EXECUTE PROCEDURE`.
    Procedural,
    /// `CREATE TRIGGER ... BEGIN <statements>; END`.
    Inline,
    /// No trigger support.
    Unsupported,
}

/// SQL dialect trait - defines how SQL constructs are rendered.
///
/// Implementations handle dialect-specific syntax differences.
/// The default implementations follow PostgreSQL where possible.
pub trait SqlDialect: std::fmt::Debug {
    /// Dialect name for display/logging.
    fn name(&self) -> &'static str;

    // =========================================================================
    // Identifier and Literal Quoting
    // =========================================================================

    /// Quote an identifier (table, column, alias).
    fn quote_identifier(&self, ident: &str) -> String;

    /// Quote a string literal.
    ///
    /// All dialects use single quotes with `''` for escaping.
    fn quote_string(&self, s: &str) -> String {
        helpers::quote_string_single(s)
    }

    /// Format a boolean literal.
    ///
    /// - PostgreSQL/DuckDB: `true`/`false`
    /// - SQLite: `1`/`0`
    fn format_bool(&self, b: bool) -> &'static str;

    // =========================================================================
    // Pagination
    // =========================================================================

    /// Emit LIMIT/OFFSET.
    fn emit_limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> TokenStream {
        helpers::emit_limit_offset_standard(limit, offset)
    }

    // =========================================================================
    // Operators
    // =========================================================================

    /// String concatenation operator.
    fn concat_operator(&self) -> &'static str {
        "||"
    }

    /// Whether this dialect supports NULLS FIRST/LAST in ORDER BY.
    fn supports_nulls_ordering(&self) -> bool {
        true
    }

    // =========================================================================
    // Function Remapping
    // =========================================================================

    /// Remap a function name for this dialect.
    ///
    /// Returns `Some(new_name)` if the function should be remapped, `None` to keep original.
    /// The input is matched case-insensitively.
    fn remap_function(&self, name: &str) -> Option<&'static str> {
        let _ = name;
        None
    }

    // =========================================================================
    // Types and date arithmetic
    // =========================================================================

    /// Emit a data type for this dialect.
    fn emit_data_type(&self, dt: &DataType) -> String {
        helpers::emit_data_type_standard(dt)
    }

    /// Truncate a date/timestamp expression to the start of its period.
    fn emit_date_trunc(&self, grain: TimeGrain, arg: &TokenStream) -> TokenStream {
        helpers::emit_date_trunc_standard(grain, arg)
    }

    // =========================================================================
    // DDL Support
    // =========================================================================

    /// Whether constraints can be added to an existing table.
    fn supports_add_constraint(&self) -> bool {
        true
    }

    /// How this dialect installs row triggers.
    fn trigger_style(&self) -> TriggerStyle {
        TriggerStyle::Procedural
    }
}

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Postgres,
    DuckDb,
    Sqlite,
}

impl Dialect {
    /// Get the dialect implementation.
    pub fn dialect(&self) -> &'static dyn SqlDialect {
        match self {
            Dialect::Postgres => &Postgres,
            Dialect::DuckDb => &DuckDb,
            Dialect::Sqlite => &Sqlite,
        }
    }
}

// Implement SqlDialect for Dialect enum by delegating to concrete types
impl SqlDialect for Dialect {
    fn name(&self) -> &'static str {
        self.dialect().name()
    }

    fn quote_identifier(&self, ident: &str) -> String {
        self.dialect().quote_identifier(ident)
    }

    fn quote_string(&self, s: &str) -> String {
        self.dialect().quote_string(s)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        self.dialect().format_bool(b)
    }

    fn emit_limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> TokenStream {
        self.dialect().emit_limit_offset(limit, offset)
    }

    fn concat_operator(&self) -> &'static str {
        self.dialect().concat_operator()
    }

    fn supports_nulls_ordering(&self) -> bool {
        self.dialect().supports_nulls_ordering()
    }

    fn remap_function(&self, name: &str) -> Option<&'static str> {
        self.dialect().remap_function(name)
    }

    fn emit_data_type(&self, dt: &DataType) -> String {
        self.dialect().emit_data_type(dt)
    }

    fn emit_date_trunc(&self, grain: TimeGrain, arg: &TokenStream) -> TokenStream {
        self.dialect().emit_date_trunc(grain, arg)
    }

    fn supports_add_constraint(&self) -> bool {
        self.dialect().supports_add_constraint()
    }

    fn trigger_style(&self) -> TriggerStyle {
        self.dialect().trigger_style()
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dialect().name())
    }
}
