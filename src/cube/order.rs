//! Sort clauses.

use crate::aggregate::{Aggregate, Target};
use crate::compiler::{Fragment, FragmentContext, Projection};
use crate::error::CubeResult;

use super::operand::Operand;

/// `ORDER BY operand [DESC]`.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderClause {
    pub operand: Operand,
    pub desc: bool,
}

impl OrderClause {
    pub fn asc(operand: impl Into<Operand>) -> Self {
        Self {
            operand: operand.into(),
            desc: false,
        }
    }

    pub fn desc(operand: impl Into<Operand>) -> Self {
        Self {
            operand: operand.into(),
            desc: true,
        }
    }

    pub fn fragment(&self, ctx: &FragmentContext) -> CubeResult<Fragment> {
        let sorted = self.operand.fragment(ctx)?;
        Ok(Fragment::order(sorted.expr.clone(), self.desc).with_deps(vec![sorted]))
    }

    pub fn dimensions(&self, out: &mut Vec<String>) {
        self.operand.dimensions(out);
    }

    pub fn score(&self, aggregate: &Aggregate) -> f64 {
        self.operand.score(aggregate)
    }

    pub fn adapt(&self, target: &Target<'_>) -> CubeResult<OrderClause> {
        Ok(OrderClause {
            operand: self.operand.adapt(target)?,
            desc: self.desc,
        })
    }

    pub fn simplify(&self, projection: &Projection) -> OrderClause {
        OrderClause {
            operand: self.operand.simplify(projection),
            desc: self.desc,
        }
    }
}
