//! # Rolap
//!
//! A ROLAP query compiler: cube queries in, SQL over a star schema out,
//! served from the smallest matching rollup table when one exists.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                Cube (Schema Model)                       │
//! │  (dimensions, hierarchies, levels, measures, catalog)    │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [query builder]
//! ┌─────────────────────────────────────────────────────────┐
//! │                 Query (axes, measures,                   │
//! │                 filters, orders)                         │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [aggregate navigator + adapt]
//! ┌─────────────────────────────────────────────────────────┐
//! │          Parts bound to the fact table or a rollup       │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [fragment compiler]
//! ┌─────────────────────────────────────────────────────────┐
//! │              SQL Query (nested layers)                   │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [executor]
//! ┌─────────────────────────────────────────────────────────┐
//! │                  Nested ResultSet                        │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Rollup tables are planned from a query by [`aggregate::AggBuilder`], which
//! also generates the triggers maintaining them incrementally.

pub mod aggregate;
pub mod compiler;
pub mod config;
pub mod cube;
pub mod error;
pub mod exec;
pub mod query;
pub mod schema;
pub mod sql;

pub use error::{CubeError, CubeResult, Error, Result};

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::aggregate::{AggBuilder, AggregatePlan, NamingConvention, Target};
    pub use crate::config::{CompilerSettings, ConnectionConfig, NamingSettings, Settings};
    pub use crate::cube::{
        Aggregator, Cube, CutPoint, Dimension, Filter, Hierarchy, Level, LevelRef, Measure,
        Member, OperandExt, OrderClause, FACT_COUNT,
    };
    pub use crate::error::{CubeError, CubeResult, Error, Result};
    pub use crate::exec::{Executor, Row, SqliteExecutor, Value};
    pub use crate::query::{Query, ResultNode, ResultSet};
    pub use crate::schema::{Catalog, ColumnRef, Table};
    pub use crate::sql::{DataType, Dialect, Literal, SqlDialect, TimeGrain};
}

pub use cube::Cube;
pub use query::{Query, ResultSet};
pub use sql::Dialect;
