//! SQL generation module.
//!
//! A type-safe SQL builder that emits the dialects rollup queries and
//! maintenance DDL are generated for. It includes:
//!
//! - [`query`] - SELECT query builder with derived-table sources
//! - [`expr`] - Expression AST and builder DSL
//! - [`ddl`] - CREATE TABLE/INDEX, constraints, trigger functions and triggers
//! - [`dml`] - INSERT, UPDATE, `SELECT ... INTO`
//! - [`token`] - Token types for SQL generation
//! - [`dialect`] - SQL dialect implementations

pub mod ddl;
pub mod dialect;
pub mod dml;
pub mod expr;
pub mod query;
pub mod token;
pub mod types;

// Re-export commonly used types at the sql module level
pub use dialect::{Dialect, SqlDialect, TriggerStyle};
pub use expr::{
    avg, case_when, cast, coalesce, col, count, count_distinct, date_trunc,
    dense_rank, func, lit_bool, lit_float, lit_int, lit_null, lit_str, max, min, new_field,
    old_field, paren, star, subquery, sum, table_col, BinaryOperator, Expr, ExprExt, Literal,
    TimeGrain, UnaryOperator, WindowExt, WindowOrderBy,
};
pub use query::{
    Join, JoinType, LimitOffset, NullsOrder, OrderByExpr, Query, SelectExpr, SortDir, Source,
    TableRef,
};
pub use token::{Token, TokenStream};
pub use types::DataType;

// Re-export DDL types
pub use ddl::{
    AlterTable, ColumnDef, CreateFunction, CreateIndex, CreateTable, CreateTrigger, DdlStatement,
    ProcStatement, TableConstraint, TriggerAction, TriggerEvent, TriggerTiming,
};

// Re-export DML types
pub use dml::{Insert, SelectInto, Update};
