//! SQLite SQL dialect.
//!
//! SQLite features:
//! - ANSI identifier quoting (`"`)
//! - No boolean type (1/0)
//! - No date type; time levels truncate with `strftime`
//! - Constraints only at `CREATE TABLE` time
//! - Triggers carry their statements inline (`BEGIN ... END`)

use super::helpers;
use super::{SqlDialect, TriggerStyle};
use crate::sql::expr::TimeGrain;
use crate::sql::token::TokenStream;
use crate::sql::types::DataType;

/// SQLite SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct Sqlite;

impl SqlDialect for Sqlite {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_numeric(b)
    }

    fn remap_function(&self, name: &str) -> Option<&'static str> {
        helpers::remap_function_sqlite(name)
    }

    fn emit_data_type(&self, dt: &DataType) -> String {
        helpers::emit_data_type_sqlite(dt)
    }

    fn emit_date_trunc(&self, grain: TimeGrain, arg: &TokenStream) -> TokenStream {
        helpers::emit_date_trunc_sqlite(grain, arg)
    }

    fn supports_add_constraint(&self) -> bool {
        false
    }

    fn trigger_style(&self) -> TriggerStyle {
        TriggerStyle::Inline
    }
}
