//! Query parts: the flattened top-level pieces a query is made of.

use crate::aggregate::{Aggregate, Target};
use crate::compiler::{Fragment, FragmentContext, Projection};
use crate::error::CubeResult;

use super::filter::Filter;
use super::measure::Measure;
use super::operand::CutPoint;
use super::order::OrderClause;

/// One axis, measure, filter or order of a query.
///
/// The navigator scores parts against aggregates, the query adapts them to
/// the winner and the compiler asks them for fragments.
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Axis(CutPoint),
    Measure(Measure),
    Filter(Filter),
    Order(OrderClause),
}

impl Part {
    pub fn score(&self, aggregate: &Aggregate) -> f64 {
        match self {
            Part::Axis(cut) => cut.score(aggregate),
            Part::Measure(measure) => measure.score(aggregate),
            Part::Filter(filter) => filter.score(aggregate),
            Part::Order(order) => order.score(aggregate),
        }
    }

    /// Dimensions this part narrows. An axis on the `All` level narrows
    /// nothing.
    pub fn dimensions(&self, out: &mut Vec<String>) {
        match self {
            Part::Axis(cut) => {
                if cut.touches_dimension() && !out.iter().any(|d| d == cut.dimension()) {
                    out.push(cut.dimension().to_string());
                }
            }
            Part::Measure(measure) => measure.dimensions(out),
            Part::Filter(filter) => filter.dimensions(out),
            Part::Order(order) => order.dimensions(out),
        }
    }

    pub fn adapt(&self, target: &Target<'_>) -> CubeResult<Part> {
        Ok(match self {
            Part::Axis(cut) => Part::Axis(cut.adapt(target)?),
            Part::Measure(measure) => Part::Measure(measure.adapt(target)?),
            Part::Filter(filter) => Part::Filter(filter.adapt(target)?),
            Part::Order(order) => Part::Order(order.adapt(target)?),
        })
    }

    pub fn simplify(&self, projection: &Projection) -> Part {
        match self {
            Part::Axis(cut) => Part::Axis(cut.simplify(projection)),
            Part::Measure(measure) => Part::Measure(measure.simplify(projection)),
            Part::Filter(filter) => Part::Filter(filter.simplify(projection)),
            Part::Order(order) => Part::Order(order.simplify(projection)),
        }
    }

    pub fn fragments(&self, ctx: &FragmentContext) -> CubeResult<Vec<Fragment>> {
        match self {
            Part::Axis(cut) => Ok(cut.fragments()),
            Part::Measure(measure) => Ok(vec![measure.fragment(ctx)?]),
            Part::Filter(filter) => Ok(vec![filter.fragment(ctx)?]),
            Part::Order(order) => Ok(vec![order.fragment(ctx)?]),
        }
    }

    pub fn is_filter(&self) -> bool {
        matches!(self, Part::Filter(_))
    }
}

impl From<CutPoint> for Part {
    fn from(cut: CutPoint) -> Self {
        Part::Axis(cut)
    }
}

impl From<Measure> for Part {
    fn from(measure: Measure) -> Self {
        Part::Measure(measure)
    }
}

impl From<Filter> for Part {
    fn from(filter: Filter) -> Self {
        Part::Filter(filter)
    }
}

impl From<OrderClause> for Part {
    fn from(order: OrderClause) -> Self {
        Part::Order(order)
    }
}
