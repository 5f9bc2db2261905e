//! DML (Data Manipulation Language) support.
//!
//! Builders for the INSERT, UPDATE and `SELECT ... INTO` statements emitted
//! by fixtures and by rollup maintenance triggers.
//!
//! # Examples
//!
//! ```ignore
//! use rolap::sql::dml::{Insert, Update};
//! use rolap::sql::expr::{col, lit_int, lit_str, ExprExt};
//!
//! let insert = Insert::into("regions")
//!     .columns(["region_id", "name"])
//!     .values([lit_int(1), lit_str("Europe")]);
//!
//! let update = Update::table("agg_store_region")
//!     .set("qty", lit_int(10))
//!     .filter(col("store_region").eq(lit_int(1)));
//! ```

use super::dialect::Dialect;
use super::expr::{Expr, ExprExt};
use super::query::{Query, Source};
use super::token::{Token, TokenStream};

// ============================================================================
// INSERT
// ============================================================================

/// INSERT statement.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "DML statements have no effect until converted to SQL with to_sql()"]
pub struct Insert {
    pub table: String,
    pub columns: Vec<String>,
    pub values: Vec<Vec<Expr>>,
    pub select: Option<Box<Query>>,
}

impl Insert {
    /// Create a new INSERT statement.
    pub fn into(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            values: Vec::new(),
            select: None,
        }
    }

    /// Set the target columns.
    pub fn columns(mut self, cols: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.columns = cols.into_iter().map(|c| c.into()).collect();
        self
    }

    /// Add a row of values.
    pub fn values(mut self, vals: impl IntoIterator<Item = impl Into<Expr>>) -> Self {
        self.values.push(vals.into_iter().map(|v| v.into()).collect());
        self
    }

    /// INSERT ... SELECT
    pub fn from_select(mut self, query: Query) -> Self {
        self.select = Some(Box::new(query));
        self
    }

    /// Convert to SQL for the given dialect.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens(dialect).serialize(dialect)
    }

    /// Convert to token stream.
    pub fn to_tokens(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();

        ts.push(Token::Insert)
            .space()
            .push(Token::Into)
            .space()
            .ident(&self.table);

        if !self.columns.is_empty() {
            ts.space().ident_list(&self.columns);
        }

        if let Some(ref query) = self.select {
            ts.newline().append(&query.to_tokens_for_dialect(dialect));
        } else {
            ts.space().push(Token::Values).space();
            for (row_idx, row) in self.values.iter().enumerate() {
                if row_idx > 0 {
                    ts.comma().space();
                }
                ts.lparen();
                for (i, val) in row.iter().enumerate() {
                    if i > 0 {
                        ts.comma().space();
                    }
                    ts.append(&val.to_tokens_for_dialect(dialect));
                }
                ts.rparen();
            }
        }

        ts
    }
}

// ============================================================================
// UPDATE
// ============================================================================

/// UPDATE statement.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "DML statements have no effect until converted to SQL with to_sql()"]
pub struct Update {
    pub table: String,
    pub set: Vec<(String, Expr)>,
    pub filter: Option<Expr>,
}

impl Update {
    /// Create a new UPDATE statement.
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            set: Vec::new(),
            filter: None,
        }
    }

    /// Set a column to a value.
    pub fn set(mut self, column: impl Into<String>, value: impl Into<Expr>) -> Self {
        self.set.push((column.into(), value.into()));
        self
    }

    /// Set multiple columns.
    pub fn set_many(
        mut self,
        assignments: impl IntoIterator<Item = (impl Into<String>, impl Into<Expr>)>,
    ) -> Self {
        self.set
            .extend(assignments.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Add WHERE clause (ANDed with an existing one).
    pub fn filter(mut self, expr: Expr) -> Self {
        self.filter = Some(match self.filter {
            Some(existing) => existing.and(expr),
            None => expr,
        });
        self
    }

    /// Convert to SQL for the given dialect.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens(dialect).serialize(dialect)
    }

    /// Convert to token stream.
    pub fn to_tokens(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();

        ts.push(Token::Update).space().ident(&self.table);

        ts.space().push(Token::Set).space();
        for (i, (col, expr)) in self.set.iter().enumerate() {
            if i > 0 {
                ts.comma().space();
            }
            ts.ident(col)
                .space()
                .push(Token::Eq)
                .space()
                .append(&expr.to_tokens_for_dialect(dialect));
        }

        if let Some(ref filter) = self.filter {
            ts.newline()
                .push(Token::Where)
                .space()
                .append(&filter.to_tokens_for_dialect(dialect));
        }

        ts
    }
}

// ============================================================================
// SELECT ... INTO (PL/pgSQL)
// ============================================================================

/// `SELECT * INTO var FROM source`, assigning one row to a PL/pgSQL variable.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "DML statements have no effect until converted to SQL with to_sql()"]
pub struct SelectInto {
    pub target: String,
    pub source: Source,
}

impl SelectInto {
    pub fn new(target: impl Into<String>, source: Source) -> Self {
        Self {
            target: target.into(),
            source,
        }
    }

    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens(dialect).serialize(dialect)
    }

    pub fn to_tokens(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::Select)
            .space()
            .push(Token::Star)
            .space()
            .push(Token::Into)
            .space()
            .ident(&self.target)
            .newline()
            .push(Token::From)
            .space()
            .append(&self.source.to_tokens_for_dialect(dialect));
        ts
    }
}

// ============================================================================
// Tests
// ============================================================================
