//! Error taxonomy.
//!
//! Each layer has its own error enum; [`Error`] gathers them for callers that
//! drive the whole pipeline (build a query, compile it, run it).

use crate::config::SettingsError;
use crate::exec::ExecError;
use crate::schema::SchemaError;

/// Result type for cube-model, navigation and compilation operations.
pub type CubeResult<T> = std::result::Result<T, CubeError>;

/// Errors raised by the cube model, the navigator, the fragment compiler and
/// the aggregate builder.
///
/// An aggregate that does not fit a query is not an error: the navigator
/// expresses that with a negative score and falls back to the fact table.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CubeError {
    /// An expression cannot be rebound to the chosen aggregate.
    #[error("Cannot bind {what} to {target}")]
    SchemaBinding { what: String, target: String },

    #[error("Invalid cut point: {0}")]
    InvalidCutPoint(String),

    /// Fragment resolution did not reach a fixed point.
    #[error("Non-convergent query: gave up after {layers} layers")]
    NonConvergent { layers: usize },

    /// An aggregator has no incremental form.
    #[error("Aggregator {aggregator} cannot be maintained incrementally")]
    AggregationContract { aggregator: String },

    /// A query cannot be materialized as an aggregate table.
    #[error("Query is not suitable for an aggregate: {0}")]
    AggregateConstraint(String),

    #[error("Unknown dimension: {0}")]
    UnknownDimension(String),

    #[error("Unknown level: {dimension}.{level}")]
    UnknownLevel { dimension: String, level: String },

    #[error("Unknown measure: {0}")]
    UnknownMeasure(String),

    /// A relative measure wraps a measure without an aggregate function.
    #[error("Measure {0} has no aggregate function to evaluate over a window")]
    NoWindowFunction(String),

    #[error("Invalid cube definition: {0}")]
    InvalidDefinition(String),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Crate-level error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Cube(#[from] CubeError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error("failed to serialize result: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
