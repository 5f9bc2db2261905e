//! Shared helper functions for SQL dialect implementations.
//!
//! This module provides reusable building blocks that dialects can compose
//! to implement the `SqlDialect` trait with minimal duplication.

use super::super::expr::TimeGrain;
use super::super::token::{Token, TokenStream};
use super::super::types::DataType;

// =============================================================================
// Identifier Quoting
// =============================================================================

/// Quote identifier with double quotes (ANSI style).
/// Used by: Postgres, DuckDB, SQLite
pub fn quote_double(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

// =============================================================================
// String Quoting
// =============================================================================

/// Quote string with single quotes (standard SQL).
pub fn quote_string_single(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

// =============================================================================
// Boolean Formatting
// =============================================================================

/// Format boolean as literal true/false.
/// Used by: Postgres, DuckDB
pub fn format_bool_literal(b: bool) -> &'static str {
    if b {
        "true"
    } else {
        "false"
    }
}

/// Format boolean as numeric 1/0.
/// Used by: SQLite
pub fn format_bool_numeric(b: bool) -> &'static str {
    if b {
        "1"
    } else {
        "0"
    }
}

// =============================================================================
// Pagination
// =============================================================================

/// Emit LIMIT ... OFFSET ... (standard SQL).
pub fn emit_limit_offset_standard(limit: Option<u64>, offset: Option<u64>) -> TokenStream {
    let mut ts = TokenStream::new();

    if let Some(lim) = limit {
        ts.push(Token::Limit)
            .space()
            .push(Token::LitInt(lim as i64));
    }

    if let Some(off) = offset {
        if limit.is_some() {
            ts.space();
        }
        ts.push(Token::Offset)
            .space()
            .push(Token::LitInt(off as i64));
    }

    ts
}

// =============================================================================
// Function Remapping
// =============================================================================

/// Remap functions for Postgres dialect.
pub fn remap_function_postgres(name: &str) -> Option<&'static str> {
    match name.to_uppercase().as_str() {
        "NVL" => Some("COALESCE"),
        "IFNULL" => Some("COALESCE"),
        "ISNULL" => Some("COALESCE"),
        _ => None,
    }
}

/// Remap functions for DuckDB dialect.
pub fn remap_function_duckdb(name: &str) -> Option<&'static str> {
    match name.to_uppercase().as_str() {
        "NVL" => Some("COALESCE"),
        "IFNULL" => Some("COALESCE"),
        "ISNULL" => Some("COALESCE"),
        _ => None,
    }
}

/// Remap functions for SQLite dialect.
pub fn remap_function_sqlite(name: &str) -> Option<&'static str> {
    match name.to_uppercase().as_str() {
        "NVL" => Some("IFNULL"),
        "ISNULL" => Some("IFNULL"),
        _ => None,
    }
}

// =============================================================================
// Data types
// =============================================================================

/// Type names shared by PostgreSQL-family dialects.
pub fn emit_data_type_standard(dt: &DataType) -> String {
    match dt {
        DataType::Bool => "BOOLEAN".into(),
        DataType::Int32 => "INTEGER".into(),
        DataType::Int64 => "BIGINT".into(),
        DataType::Float64 => "DOUBLE PRECISION".into(),
        DataType::Numeric => "NUMERIC".into(),
        DataType::Text => "TEXT".into(),
        DataType::Date => "DATE".into(),
        DataType::Timestamp => "TIMESTAMP".into(),
    }
}

/// DuckDB's NUMERIC is a fixed DECIMAL(18,3); divisions go through DOUBLE.
pub fn emit_data_type_duckdb(dt: &DataType) -> String {
    match dt {
        DataType::Float64 | DataType::Numeric => "DOUBLE".into(),
        other => emit_data_type_standard(other),
    }
}

/// SQLite affinities. `NUMERIC` would keep integer division, so it maps to REAL.
pub fn emit_data_type_sqlite(dt: &DataType) -> String {
    match dt {
        DataType::Bool | DataType::Int32 | DataType::Int64 => "INTEGER".into(),
        DataType::Float64 | DataType::Numeric => "REAL".into(),
        DataType::Text => "TEXT".into(),
        DataType::Date => "DATE".into(),
        DataType::Timestamp => "TIMESTAMP".into(),
    }
}

// =============================================================================
// Date truncation
// =============================================================================

/// `DATE_TRUNC('grain', arg)`.
/// Used by: Postgres, DuckDB
pub fn emit_date_trunc_standard(grain: TimeGrain, arg: &TokenStream) -> TokenStream {
    let mut ts = TokenStream::new();
    ts.push(Token::FunctionName("DATE_TRUNC".into()))
        .lparen()
        .push(Token::LitString(grain.as_str().into()))
        .comma()
        .space()
        .append(arg)
        .rparen();
    ts
}

/// SQLite has no date type; truncation is expressed with `strftime`/`date`
/// and yields an ISO-8601 text value.
pub fn emit_date_trunc_sqlite(grain: TimeGrain, arg: &TokenStream) -> TokenStream {
    let mut ts = TokenStream::new();
    match grain {
        TimeGrain::Year | TimeGrain::Month => {
            let format = if grain == TimeGrain::Year {
                "%Y-01-01"
            } else {
                "%Y-%m-01"
            };
            ts.push(Token::FunctionName("STRFTIME".into()))
                .lparen()
                .push(Token::LitString(format.into()))
                .comma()
                .space()
                .append(arg)
                .rparen();
        }
        TimeGrain::Quarter => {
            // printf('%s-%02d-01', strftime('%Y', x), ((strftime('%m', x) - 1) / 3) * 3 + 1)
            ts.push(Token::FunctionName("PRINTF".into()))
                .lparen()
                .push(Token::LitString("%s-%02d-01".into()))
                .comma()
                .space()
                .push(Token::FunctionName("STRFTIME".into()))
                .lparen()
                .push(Token::LitString("%Y".into()))
                .comma()
                .space()
                .append(arg)
                .rparen()
                .comma()
                .space()
                .lparen()
                .lparen()
                .push(Token::Cast)
                .lparen()
                .push(Token::FunctionName("STRFTIME".into()))
                .lparen()
                .push(Token::LitString("%m".into()))
                .comma()
                .space()
                .append(arg)
                .rparen()
                .space()
                .push(Token::As)
                .space()
                .push(Token::Raw("INTEGER".into()))
                .rparen()
                .space()
                .push(Token::Minus)
                .space()
                .push(Token::LitInt(1))
                .rparen()
                .space()
                .push(Token::Div)
                .space()
                .push(Token::LitInt(3))
                .rparen()
                .space()
                .push(Token::Mul)
                .space()
                .push(Token::LitInt(3))
                .space()
                .push(Token::Plus)
                .space()
                .push(Token::LitInt(1))
                .rparen();
        }
        TimeGrain::Week => {
            // Monday of the ISO week
            ts.push(Token::FunctionName("DATE".into()))
                .lparen()
                .append(arg)
                .comma()
                .space()
                .push(Token::LitString("weekday 0".into()))
                .comma()
                .space()
                .push(Token::LitString("-6 days".into()))
                .rparen();
        }
        TimeGrain::Day => {
            ts.push(Token::FunctionName("DATE".into()))
                .lparen()
                .append(arg)
                .rparen();
        }
    }
    ts
}
