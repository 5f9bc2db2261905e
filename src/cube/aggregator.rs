//! Aggregators: how many fact rows collapse into one value.
//!
//! Each aggregator has three forms:
//!
//! - a bulk SQL form ([`Aggregator::apply`]) used by the fragment compiler,
//! - a Rust reduce form ([`Aggregator::reduce`]) used to compute subtotals
//!   while shaping results,
//! - an incremental form ([`Aggregator::accumulate`]) used by rollup
//!   maintenance triggers.

use std::fmt;

use crate::error::{CubeError, CubeResult};
use crate::sql::expr::{
    avg, case_when, cast, coalesce, count, count_distinct, func, lit_int, max, min, paren, sum,
    table_col, Expr, ExprExt,
};
use crate::sql::types::DataType;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Aggregator {
    Sum,
    Avg,
    Count,
    CountDistinct,
    Min,
    Max,
    /// No aggregation: the expression is used as is.
    Identity,
    /// Any SQL aggregate or window function, e.g. `DENSE_RANK`.
    Custom {
        function: String,
        takes_argument: bool,
    },
}

/// Aliases of the row sources an incremental accumulator reads from.
#[derive(Debug, Clone, Copy)]
pub struct AccumulatorRows<'a> {
    /// The changed fact row, shaped like an aggregate row.
    pub new: &'a str,
    /// The previous version of the row (updates only).
    pub old: Option<&'a str>,
    /// The aggregate row the change lands in, if any.
    pub existing: &'a str,
    /// Name of the fact-count column in all three sources.
    pub fact_count: &'a str,
}

impl Aggregator {
    pub fn custom(function: impl Into<String>, takes_argument: bool) -> Self {
        Aggregator::Custom {
            function: function.into(),
            takes_argument,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Aggregator::Sum => "sum",
            Aggregator::Avg => "avg",
            Aggregator::Count => "count",
            Aggregator::CountDistinct => "count_distinct",
            Aggregator::Min => "min",
            Aggregator::Max => "max",
            Aggregator::Identity => "identity",
            Aggregator::Custom { function, .. } => function,
        }
    }

    pub fn is_identity(&self) -> bool {
        matches!(self, Aggregator::Identity)
    }

    /// Bulk form.
    ///
    /// `fact_count` is the fact-count column of the source being aggregated,
    /// when it has one: averages are then weighted by it and counts become
    /// sums of it.
    pub fn apply(&self, expr: Expr, fact_count: Option<&Expr>) -> Expr {
        match (self, fact_count) {
            (Aggregator::Sum, _) => sum(expr),
            (Aggregator::Avg, Some(fc)) => {
                let total = sum(fc.clone());
                case_when(
                    total.clone().eq(lit_int(0)),
                    lit_int(0),
                    sum(paren(expr).mul(fc.clone())).div(cast(total, DataType::Numeric)),
                )
            }
            (Aggregator::Avg, None) => avg(expr),
            (Aggregator::Count, Some(fc)) => sum(fc.clone()),
            (Aggregator::Count, None) => count(expr),
            (Aggregator::CountDistinct, _) => count_distinct(expr),
            (Aggregator::Min, _) => min(expr),
            (Aggregator::Max, _) => max(expr),
            (Aggregator::Identity, _) => expr,
            (
                Aggregator::Custom {
                    function,
                    takes_argument,
                },
                _,
            ) => {
                if *takes_argument {
                    func(function, vec![expr])
                } else {
                    func(function, vec![])
                }
            }
        }
    }

    /// Reduce already-aggregated values into a subtotal.
    ///
    /// Averages are reduced unweighted. Returns `None` when the aggregator
    /// has no meaningful reduction.
    pub fn reduce(&self, values: &[f64]) -> Option<f64> {
        match self {
            Aggregator::Sum | Aggregator::Count => Some(values.iter().sum()),
            Aggregator::Avg => {
                if values.is_empty() {
                    None
                } else {
                    Some(values.iter().sum::<f64>() / values.len() as f64)
                }
            }
            Aggregator::Min => values.iter().copied().reduce(f64::min),
            Aggregator::Max => values.iter().copied().reduce(f64::max),
            Aggregator::CountDistinct | Aggregator::Identity | Aggregator::Custom { .. } => None,
        }
    }

    /// Incremental form: the new value of `column` once the change described
    /// by `rows` is folded into the existing aggregate row.
    pub fn accumulate(&self, column: &str, rows: &AccumulatorRows<'_>) -> CubeResult<Expr> {
        let new = table_col(rows.new, column);
        let existing = table_col(rows.existing, column);

        match self {
            Aggregator::Sum | Aggregator::Count => {
                Ok(delta(rows, column).add(coalesce(vec![existing, lit_int(0)])))
            }
            Aggregator::Avg => {
                let fc = rows.fact_count;
                let new_count = delta(rows, fc);
                let mut new_total = new.mul(table_col(rows.new, fc));
                if let Some(old) = rows.old {
                    new_total = new_total.sub(table_col(old, column).mul(table_col(old, fc)));
                }
                let existing_count = coalesce(vec![table_col(rows.existing, fc), lit_int(0)]);
                let total_count = existing_count.clone().add(paren(new_count));
                let weighted = coalesce(vec![existing, lit_int(0)])
                    .mul(existing_count)
                    .add(paren(new_total));

                Ok(case_when(
                    total_count.clone().eq(lit_int(0)),
                    lit_int(0),
                    paren(weighted).div(cast(total_count, DataType::Numeric)),
                ))
            }
            Aggregator::Min | Aggregator::Max => {
                let pick = |a: Expr, b: Expr| -> Expr {
                    let better = if *self == Aggregator::Min {
                        a.clone().lt(b.clone())
                    } else {
                        a.clone().gt(b.clone())
                    };
                    case_when(b.clone().is_null().or(better), a, b)
                };
                let mut candidate = new;
                if let Some(old) = rows.old {
                    candidate = pick(candidate, table_col(old, column));
                }
                Ok(pick(candidate, existing))
            }
            Aggregator::CountDistinct | Aggregator::Identity | Aggregator::Custom { .. } => {
                Err(CubeError::AggregationContract {
                    aggregator: self.name().into(),
                })
            }
        }
    }
}

/// `new.col` or `new.col - old.col`.
fn delta(rows: &AccumulatorRows<'_>, column: &str) -> Expr {
    let new = table_col(rows.new, column);
    match rows.old {
        Some(old) => new.sub(table_col(old, column)),
        None => new,
    }
}

impl fmt::Display for Aggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
