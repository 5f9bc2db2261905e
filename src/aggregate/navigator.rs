//! Aggregate navigation: pick the table a query reads from.

use tracing::debug;

use crate::cube::{Cube, Part};
use crate::sql::expr::Expr;

use super::Aggregate;

/// The schema a query is compiled against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Target<'a> {
    /// The fact table and its dimension tables.
    Cube,
    Aggregate(&'a Aggregate),
}

impl Target<'_> {
    /// Table the first compiler layer reads from.
    pub fn source_table<'c>(&'c self, cube: &'c Cube) -> &'c str {
        match self {
            Target::Cube => &cube.fact_table,
            Target::Aggregate(aggregate) => &aggregate.table,
        }
    }

    /// Fact-count column of the source, if it has one.
    pub fn fact_count(&self, cube: &Cube) -> Option<Expr> {
        match self {
            Target::Cube => cube.fact_count_column.as_ref().map(|c| c.expr()),
            Target::Aggregate(aggregate) => Some(aggregate.fact_count.expr()),
        }
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self, Target::Aggregate(_))
    }
}

/// The best aggregate for `parts`, or the cube itself.
///
/// The cube scores 0: an aggregate must score strictly more to be chosen.
/// Among equal scores the first registered aggregate wins.
pub fn find_best<'a>(aggregates: &'a [Aggregate], parts: &[Part]) -> Target<'a> {
    let mut best = Target::Cube;
    let mut best_score = 0.0;

    for aggregate in aggregates {
        let score = aggregate.score(parts);
        debug!(table = %aggregate.table, score, "scored aggregate");
        if score > best_score {
            best = Target::Aggregate(aggregate);
            best_score = score;
        }
    }

    match best {
        Target::Cube => debug!("no aggregate fits, using the fact table"),
        Target::Aggregate(aggregate) => {
            debug!(table = %aggregate.table, score = best_score, "selected aggregate")
        }
    }
    best
}
