//! Filters over levels, members and measures.

use crate::aggregate::{Aggregate, Target};
use crate::compiler::{Fragment, FragmentContext, Projection};
use crate::error::{CubeError, CubeResult};
use crate::sql::expr::{paren, Expr, ExprExt};

use super::level::LevelRef;
use super::operand::{CutPoint, Operand};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
    /// Three operands: value, low, high.
    Between,
}

/// A comparison between operands.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub op: CompareOp,
    pub operands: Vec<Operand>,
}

impl Comparison {
    fn expr_and_deps(&self, ctx: &FragmentContext) -> CubeResult<(Expr, Vec<Fragment>)> {
        let subs = self
            .operands
            .iter()
            .map(|o| o.fragment(ctx))
            .collect::<CubeResult<Vec<_>>>()?;
        let mut exprs: Vec<Expr> = subs.iter().map(|f| paren(f.expr.clone())).collect();

        let expected = if self.op == CompareOp::Between { 3 } else { 2 };
        if exprs.len() != expected {
            return Err(CubeError::InvalidDefinition(format!(
                "{:?} takes {} operands, got {}",
                self.op,
                expected,
                exprs.len()
            )));
        }

        let first = exprs.remove(0);
        let second = exprs.remove(0);
        let expr = match self.op {
            CompareOp::Eq => first.eq(second),
            CompareOp::Ne => first.ne(second),
            CompareOp::Lt => first.lt(second),
            CompareOp::Le => first.lte(second),
            CompareOp::Gt => first.gt(second),
            CompareOp::Ge => first.gte(second),
            CompareOp::Like => first.like(second),
            CompareOp::Between => first.between(second, exprs.remove(0)),
        };

        // A level id must reach the layer that evaluates the predicate.
        let deps = subs.into_iter().filter(|f| !f.constant).collect();
        Ok((expr, deps))
    }

    fn score(&self, aggregate: &Aggregate) -> f64 {
        min_score(self.operands.iter().map(|o| o.score(aggregate)))
    }

    fn adapt(&self, target: &Target<'_>) -> CubeResult<Comparison> {
        Ok(Comparison {
            op: self.op,
            operands: self
                .operands
                .iter()
                .map(|o| o.adapt(target))
                .collect::<CubeResult<_>>()?,
        })
    }

    fn simplify(&self, projection: &Projection) -> Comparison {
        Comparison {
            op: self.op,
            operands: self.operands.iter().map(|o| o.simplify(projection)).collect(),
        }
    }
}

/// Minimum of the scores; any rejection rejects the whole.
pub(crate) fn min_score(scores: impl Iterator<Item = f64>) -> f64 {
    let mut min: Option<f64> = None;
    for score in scores {
        if score < 0.0 {
            return -1.0;
        }
        min = Some(min.map_or(score, |m: f64| m.min(score)));
    }
    min.unwrap_or(0.0)
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// A row predicate.
    Leaf(Comparison),
    And(Vec<Filter>),
    Or(Vec<Filter>),
    /// A predicate evaluated after aggregation, e.g. a rank threshold.
    Post(Comparison),
}

impl Filter {
    pub fn and(self, other: Filter) -> Filter {
        match self {
            Filter::And(mut filters) => {
                filters.push(other);
                Filter::And(filters)
            }
            this => Filter::And(vec![this, other]),
        }
    }

    pub fn or(self, other: Filter) -> Filter {
        match self {
            Filter::Or(mut filters) => {
                filters.push(other);
                Filter::Or(filters)
            }
            this => Filter::Or(vec![this, other]),
        }
    }

    /// Turn a leaf comparison into a post-aggregation predicate.
    pub fn post(self) -> Filter {
        match self {
            Filter::Leaf(cmp) => Filter::Post(cmp),
            other => other,
        }
    }

    /// Top-level conjuncts.
    pub fn conjuncts(self) -> Vec<Filter> {
        match self {
            Filter::And(filters) => filters.into_iter().flat_map(Filter::conjuncts).collect(),
            other => vec![other],
        }
    }

    fn expr_and_deps(&self, ctx: &FragmentContext) -> CubeResult<(Expr, Vec<Fragment>)> {
        match self {
            Filter::Leaf(cmp) | Filter::Post(cmp) => cmp.expr_and_deps(ctx),
            Filter::And(filters) | Filter::Or(filters) => {
                let mut combined: Option<Expr> = None;
                let mut deps: Vec<Fragment> = Vec::new();
                for filter in filters {
                    let (expr, sub_deps) = filter.expr_and_deps(ctx)?;
                    let expr = paren(expr);
                    combined = Some(match combined {
                        None => expr,
                        Some(acc) if matches!(self, Filter::And(_)) => acc.and(expr),
                        Some(acc) => acc.or(expr),
                    });
                    for dep in sub_deps {
                        if !deps.contains(&dep) {
                            deps.push(dep);
                        }
                    }
                }
                let expr = combined.ok_or_else(|| {
                    CubeError::InvalidDefinition("empty boolean filter".into())
                })?;
                Ok((expr, deps))
            }
        }
    }

    /// A single predicate fragment.
    pub fn fragment(&self, ctx: &FragmentContext) -> CubeResult<Fragment> {
        let (expr, deps) = self.expr_and_deps(ctx)?;
        let fragment = match self {
            Filter::Post(_) => Fragment::post_filter(expr),
            _ => Fragment::filter(expr),
        };
        Ok(fragment.with_deps(deps))
    }

    fn comparisons(&self) -> Vec<&Comparison> {
        match self {
            Filter::Leaf(cmp) | Filter::Post(cmp) => vec![cmp],
            Filter::And(filters) | Filter::Or(filters) => {
                filters.iter().flat_map(Filter::comparisons).collect()
            }
        }
    }

    /// Whether any side of any comparison is a measure.
    pub fn compares_measures(&self) -> bool {
        self.comparisons()
            .iter()
            .flat_map(|cmp| &cmp.operands)
            .any(|o| matches!(o, Operand::Measure(_)))
    }

    /// Levels compared by this filter.
    pub fn levels(&self) -> Vec<&LevelRef> {
        self.comparisons()
            .into_iter()
            .flat_map(|cmp| &cmp.operands)
            .filter_map(|o| match o {
                Operand::Cut(CutPoint::Level(level)) => Some(level),
                _ => None,
            })
            .collect()
    }

    pub fn dimensions(&self, out: &mut Vec<String>) {
        match self {
            Filter::Leaf(cmp) | Filter::Post(cmp) => {
                for operand in &cmp.operands {
                    operand.dimensions(out);
                }
            }
            Filter::And(filters) | Filter::Or(filters) => {
                for filter in filters {
                    filter.dimensions(out);
                }
            }
        }
    }

    pub fn score(&self, aggregate: &Aggregate) -> f64 {
        match self {
            Filter::Leaf(cmp) | Filter::Post(cmp) => cmp.score(aggregate),
            Filter::And(filters) | Filter::Or(filters) => {
                min_score(filters.iter().map(|f| f.score(aggregate)))
            }
        }
    }

    pub fn adapt(&self, target: &Target<'_>) -> CubeResult<Filter> {
        Ok(match self {
            Filter::Leaf(cmp) => Filter::Leaf(cmp.adapt(target)?),
            Filter::Post(cmp) => Filter::Post(cmp.adapt(target)?),
            Filter::And(filters) => Filter::And(
                filters
                    .iter()
                    .map(|f| f.adapt(target))
                    .collect::<CubeResult<_>>()?,
            ),
            Filter::Or(filters) => Filter::Or(
                filters
                    .iter()
                    .map(|f| f.adapt(target))
                    .collect::<CubeResult<_>>()?,
            ),
        })
    }

    pub fn simplify(&self, projection: &Projection) -> Filter {
        match self {
            Filter::Leaf(cmp) => Filter::Leaf(cmp.simplify(projection)),
            Filter::Post(cmp) => Filter::Post(cmp.simplify(projection)),
            Filter::And(filters) => {
                Filter::And(filters.iter().map(|f| f.simplify(projection)).collect())
            }
            Filter::Or(filters) => {
                Filter::Or(filters.iter().map(|f| f.simplify(projection)).collect())
            }
        }
    }
}
