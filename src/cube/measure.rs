//! The measure family.
//!
//! Measures are immutable trees. Every contract (`adapt`, `simplify`,
//! `score`, `fragment`) returns a new value and leaves the receiver intact.

use crate::aggregate::{Aggregate, Target};
use crate::compiler::{Fragment, FragmentContext, Projection};
use crate::error::{CubeError, CubeResult};
use crate::sql::expr::{
    cast, lit_int, paren, BinaryOperator, Expr, ExprExt, Literal, WindowExt, WindowOrderBy,
};
use crate::sql::types::DataType;

use super::aggregator::Aggregator;
use super::filter::min_score;
use super::level::LevelRef;
use super::metadata::Metadata;
use super::operand::Operand;

pub const FACT_COUNT: &str = "FACT_COUNT";

#[derive(Debug, Clone, PartialEq)]
pub enum Measure {
    /// An expression over fact rows plus the aggregator combining them.
    Base {
        name: String,
        expr: Expr,
        agg: Aggregator,
        metadata: Metadata,
    },
    /// A literal. Never rebound.
    Constant { value: Literal, agg: Aggregator },
    /// Arithmetic over sub-measures.
    Computed {
        name: String,
        op: BinaryOperator,
        operands: Vec<Measure>,
        agg: Aggregator,
    },
    /// A window over a measure, partitioned by `over` and ordered by `order`.
    Relative {
        name: String,
        measure: Box<Measure>,
        over: Vec<LevelRef>,
        order: Vec<Operand>,
        inner_agg: Aggregator,
        desc: bool,
    },
    /// Number of fact rows, or of distinct values of `expr`.
    Count {
        name: String,
        expr: Expr,
        distinct: bool,
    },
    /// Another name for a measure.
    Label { name: String, measure: Box<Measure> },
    /// Re-aggregate an already resolved measure.
    ForceAgg {
        measure: Box<Measure>,
        agg: Aggregator,
    },
    /// A column of a previous compiler layer.
    Projected {
        name: String,
        expr: Expr,
        agg: Aggregator,
        aggregated: Option<Aggregator>,
    },
}

impl Measure {
    // =========================================================================
    // Constructors
    // =========================================================================

    pub fn base(name: impl Into<String>, expr: Expr, agg: Aggregator) -> Self {
        Measure::Base {
            name: name.into(),
            expr,
            agg,
            metadata: Metadata::new(),
        }
    }

    pub fn sum(name: impl Into<String>, expr: Expr) -> Self {
        Self::base(name, expr, Aggregator::Sum)
    }

    pub fn avg(name: impl Into<String>, expr: Expr) -> Self {
        Self::base(name, expr, Aggregator::Avg)
    }

    pub fn min(name: impl Into<String>, expr: Expr) -> Self {
        Self::base(name, expr, Aggregator::Min)
    }

    pub fn max(name: impl Into<String>, expr: Expr) -> Self {
        Self::base(name, expr, Aggregator::Max)
    }

    /// Number of fact rows.
    pub fn count(name: impl Into<String>) -> Self {
        Measure::Count {
            name: name.into(),
            expr: lit_int(1),
            distinct: false,
        }
    }

    pub fn count_distinct(name: impl Into<String>, expr: Expr) -> Self {
        Measure::Count {
            name: name.into(),
            expr,
            distinct: true,
        }
    }

    pub fn constant(value: Literal) -> Self {
        Measure::Constant {
            value,
            agg: Aggregator::Identity,
        }
    }

    /// Dense rank of `by`, highest first when `desc`, restarting for every
    /// combination of `partition_by`.
    pub fn rank(by: Measure, partition_by: Vec<LevelRef>, desc: bool) -> Self {
        let rank_fn = Aggregator::custom("DENSE_RANK", false);
        Measure::Relative {
            name: format!("RANK OVER {}", by.name()),
            measure: Box::new(Measure::Constant {
                value: Literal::Int(1),
                agg: rank_fn.clone(),
            }),
            over: partition_by,
            order: vec![Operand::Measure(by)],
            inner_agg: rank_fn,
            desc,
        }
    }

    pub fn with_metadata(self, metadata: Metadata) -> Self {
        match self {
            Measure::Base {
                name, expr, agg, ..
            } => Measure::Base {
                name,
                expr,
                agg,
                metadata,
            },
            other => other,
        }
    }

    // =========================================================================
    // Combinators
    // =========================================================================

    fn combine(self, op: BinaryOperator, other: Measure) -> Measure {
        Measure::Computed {
            name: format!("{} {} {}", self.name(), op.symbol(), other.name()),
            op,
            operands: vec![self, other],
            agg: Aggregator::Sum,
        }
    }

    pub fn add(self, other: impl Into<Measure>) -> Measure {
        self.combine(BinaryOperator::Plus, other.into())
    }

    pub fn sub(self, other: impl Into<Measure>) -> Measure {
        self.combine(BinaryOperator::Minus, other.into())
    }

    pub fn mul(self, other: impl Into<Measure>) -> Measure {
        self.combine(BinaryOperator::Mul, other.into())
    }

    pub fn div(self, other: impl Into<Measure>) -> Measure {
        self.combine(BinaryOperator::Div, other.into())
    }

    /// This measure totalled over `levels`: `A OVER (l1, l2)`.
    pub fn over(self, levels: impl IntoIterator<Item = LevelRef>) -> Measure {
        let over: Vec<LevelRef> = levels.into_iter().collect();
        let names: Vec<&str> = over.iter().map(|l| l.name()).collect();
        Measure::Relative {
            name: format!("{} OVER ({})", self.name(), names.join(", ")),
            inner_agg: self.agg(),
            measure: Box::new(self),
            over,
            order: Vec::new(),
            desc: false,
        }
    }

    /// Share of the total over `levels`, in percent.
    pub fn percent_over(self, levels: impl IntoIterator<Item = LevelRef>) -> Measure {
        let total = self.clone().over(levels);
        self.div(total).mul(100i64)
    }

    pub fn label(self, name: impl Into<String>) -> Measure {
        Measure::Label {
            name: name.into(),
            measure: Box::new(self),
        }
    }

    /// Use `agg` to combine values of this measure.
    pub fn aggregate_with(self, agg: Aggregator) -> Measure {
        match self {
            Measure::Base {
                name,
                expr,
                metadata,
                ..
            } => Measure::Base {
                name,
                expr,
                agg,
                metadata,
            },
            Measure::Computed {
                name, op, operands, ..
            } => Measure::Computed {
                name,
                op,
                operands,
                agg,
            },
            Measure::Label { name, measure } => Measure::Label {
                name,
                measure: Box::new(measure.aggregate_with(agg)),
            },
            other => Measure::ForceAgg {
                measure: Box::new(other),
                agg,
            },
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn name(&self) -> String {
        match self {
            Measure::Base { name, .. }
            | Measure::Computed { name, .. }
            | Measure::Relative { name, .. }
            | Measure::Count { name, .. }
            | Measure::Label { name, .. }
            | Measure::Projected { name, .. } => name.clone(),
            Measure::Constant { value, .. } => value.to_string(),
            Measure::ForceAgg { measure, .. } => measure.name(),
        }
    }

    /// The aggregator combining values of this measure in SQL.
    pub fn agg(&self) -> Aggregator {
        match self {
            Measure::Base { agg, .. }
            | Measure::Constant { agg, .. }
            | Measure::Computed { agg, .. }
            | Measure::ForceAgg { agg, .. }
            | Measure::Projected { agg, .. } => agg.clone(),
            Measure::Relative { .. } => Aggregator::Identity,
            Measure::Count { distinct, .. } => {
                if *distinct {
                    Aggregator::CountDistinct
                } else {
                    Aggregator::Count
                }
            }
            Measure::Label { measure, .. } => measure.agg(),
        }
    }

    /// The aggregator rolling leaf values up into subtotals.
    ///
    /// Sums, differences and constant scalings of additive measures still
    /// add up; any other arithmetic result has no subtotal.
    pub fn subtotal_agg(&self) -> Aggregator {
        match self {
            Measure::Computed {
                op, operands, agg, ..
            } => {
                if *agg != Aggregator::Sum {
                    return agg.clone();
                }
                let constant = |m: &Measure| matches!(m, Measure::Constant { .. });
                let additive =
                    |m: &Measure| !constant(m) && m.subtotal_agg() == Aggregator::Sum;
                let sums = match (op, operands.as_slice()) {
                    (BinaryOperator::Plus | BinaryOperator::Minus, _) => {
                        operands.iter().all(additive)
                    }
                    (BinaryOperator::Mul, [a, b]) => {
                        (additive(a) && constant(b)) || (constant(a) && additive(b))
                    }
                    (BinaryOperator::Div, [a, b]) => additive(a) && constant(b),
                    _ => false,
                };
                if sums {
                    Aggregator::Sum
                } else {
                    Aggregator::Identity
                }
            }
            Measure::Label { measure, .. } => measure.subtotal_agg(),
            _ => self.agg(),
        }
    }

    pub fn metadata(&self) -> Option<&Metadata> {
        match self {
            Measure::Base { metadata, .. } => Some(metadata),
            Measure::Label { measure, .. } | Measure::ForceAgg { measure, .. } => {
                measure.metadata()
            }
            _ => None,
        }
    }

    /// Dimensions this measure narrows through window partitions and orders.
    pub fn dimensions(&self, out: &mut Vec<String>) {
        match self {
            Measure::Computed { operands, .. } => {
                for m in operands {
                    m.dimensions(out);
                }
            }
            Measure::Relative {
                measure,
                over,
                order,
                ..
            } => {
                measure.dimensions(out);
                for level in over.iter().filter(|l| !l.is_all()) {
                    if !out.iter().any(|d| d == level.dimension()) {
                        out.push(level.dimension().to_string());
                    }
                }
                for o in order {
                    o.dimensions(out);
                }
            }
            Measure::Label { measure, .. } | Measure::ForceAgg { measure, .. } => {
                measure.dimensions(out)
            }
            Measure::Base { .. }
            | Measure::Constant { .. }
            | Measure::Count { .. }
            | Measure::Projected { .. } => {}
        }
    }

    // =========================================================================
    // Contracts
    // =========================================================================

    /// Fitness of `aggregate` for this measure: 1 when it stores the measure,
    /// -1 when it cannot serve it.
    pub fn score(&self, aggregate: &Aggregate) -> f64 {
        match self {
            Measure::Base { name, .. } => {
                if aggregate.measure_column(name).is_some() {
                    1.0
                } else {
                    -1.0
                }
            }
            Measure::Constant { .. } => 0.0,
            Measure::Count { distinct, .. } => {
                if *distinct {
                    -1.0
                } else {
                    1.0
                }
            }
            Measure::Computed { operands, .. } => {
                min_score(operands.iter().map(|m| m.score(aggregate)))
            }
            Measure::Relative {
                measure,
                over,
                order,
                ..
            } => min_score(
                std::iter::once(measure.score(aggregate))
                    .chain(over.iter().map(|l| l.score(aggregate)))
                    .chain(order.iter().map(|o| o.score(aggregate))),
            ),
            Measure::Label { measure, .. } | Measure::ForceAgg { measure, .. } => {
                measure.score(aggregate)
            }
            Measure::Projected { .. } => 1.0,
        }
    }

    /// Rebind to the columns of `target`.
    pub fn adapt(&self, target: &Target<'_>) -> CubeResult<Measure> {
        match self {
            Measure::Base {
                name,
                agg,
                metadata,
                ..
            } => match target {
                Target::Cube => Ok(self.clone()),
                Target::Aggregate(aggregate) => {
                    let column = aggregate.measure_column(name).ok_or_else(|| {
                        CubeError::SchemaBinding {
                            what: format!("measure {name}"),
                            target: aggregate.table.clone(),
                        }
                    })?;
                    Ok(Measure::Base {
                        name: name.clone(),
                        expr: column.expr(),
                        agg: agg.clone(),
                        metadata: metadata.clone(),
                    })
                }
            },
            Measure::Count {
                name, distinct, ..
            } => match target {
                Target::Cube => Ok(self.clone()),
                Target::Aggregate(aggregate) => {
                    if *distinct {
                        return Err(CubeError::SchemaBinding {
                            what: format!("distinct count {name}"),
                            target: aggregate.table.clone(),
                        });
                    }
                    let column = aggregate
                        .measure_column(name)
                        .unwrap_or(&aggregate.fact_count);
                    Ok(Measure::Count {
                        name: name.clone(),
                        expr: column.expr(),
                        distinct: false,
                    })
                }
            },
            Measure::Constant { .. } | Measure::Projected { .. } => Ok(self.clone()),
            Measure::Computed {
                name,
                op,
                operands,
                agg,
            } => Ok(Measure::Computed {
                name: name.clone(),
                op: *op,
                operands: operands
                    .iter()
                    .map(|m| m.adapt(target))
                    .collect::<CubeResult<_>>()?,
                agg: agg.clone(),
            }),
            Measure::Relative {
                name,
                measure,
                over,
                order,
                inner_agg,
                desc,
            } => Ok(Measure::Relative {
                name: name.clone(),
                measure: Box::new(measure.adapt(target)?),
                over: over
                    .iter()
                    .map(|l| l.adapt(target))
                    .collect::<CubeResult<_>>()?,
                order: order
                    .iter()
                    .map(|o| o.adapt(target))
                    .collect::<CubeResult<_>>()?,
                inner_agg: inner_agg.clone(),
                desc: *desc,
            }),
            Measure::Label { name, measure } => Ok(Measure::Label {
                name: name.clone(),
                measure: Box::new(measure.adapt(target)?),
            }),
            Measure::ForceAgg { measure, agg } => Ok(Measure::ForceAgg {
                measure: Box::new(measure.adapt(target)?),
                agg: agg.clone(),
            }),
        }
    }

    /// Reuse columns a previous layer already computed.
    pub fn simplify(&self, projection: &Projection) -> Measure {
        if let Measure::Constant { .. } = self {
            return self.clone();
        }

        let name = self.name();
        if let Some(column) = projection.get(&name) {
            let reusable = match self {
                // a forced aggregate is only done once its own aggregator ran
                Measure::ForceAgg { agg, .. } => column.aggregated.as_ref() == Some(agg),
                _ => true,
            };
            if reusable {
                return Measure::Projected {
                    name: name.clone(),
                    expr: projection.column(&name),
                    agg: self.agg(),
                    aggregated: column.aggregated.clone(),
                };
            }
        }

        match self {
            Measure::Computed {
                name,
                op,
                operands,
                agg,
            } => Measure::Computed {
                name: name.clone(),
                op: *op,
                operands: operands.iter().map(|m| m.simplify(projection)).collect(),
                agg: agg.clone(),
            },
            Measure::Relative {
                name,
                measure,
                over,
                order,
                inner_agg,
                desc,
            } => Measure::Relative {
                name: name.clone(),
                measure: Box::new(measure.simplify(projection)),
                over: over.iter().map(|l| l.simplify(projection)).collect(),
                order: order.iter().map(|o| o.simplify(projection)).collect(),
                inner_agg: inner_agg.clone(),
                desc: *desc,
            },
            Measure::Label { name, measure } => Measure::Label {
                name: name.clone(),
                measure: Box::new(measure.simplify(projection)),
            },
            Measure::ForceAgg { measure, agg } => Measure::ForceAgg {
                measure: Box::new(measure.simplify(projection)),
                agg: agg.clone(),
            },
            _ => self.clone(),
        }
    }

    /// The fragment computing this measure.
    pub fn fragment(&self, ctx: &FragmentContext) -> CubeResult<Fragment> {
        match self {
            Measure::Base {
                name, expr, agg, ..
            } => {
                if agg.is_identity() {
                    Ok(Fragment::value(name, expr.clone()))
                } else {
                    Ok(Fragment::aggregate(
                        name,
                        agg.apply(expr.clone(), ctx.fact_count.as_ref()),
                        agg.clone(),
                    ))
                }
            }
            Measure::Constant { value, .. } => {
                Ok(Fragment::value(value.to_string(), Expr::Literal(value.clone())).constant())
            }
            Measure::Computed {
                name,
                op,
                operands,
                agg,
            } => {
                let subs = operands
                    .iter()
                    .map(|m| m.fragment(ctx))
                    .collect::<CubeResult<Vec<_>>>()?;
                let mut exprs = subs.iter().map(|f| paren(f.expr.clone()));
                let first = exprs.next().ok_or_else(|| {
                    CubeError::InvalidDefinition(format!("computed measure {name} has no operands"))
                })?;
                // integer division truncates
                let expr = exprs.fold(first, |acc, e| match op {
                    BinaryOperator::Div => acc.binary(*op, cast(e, DataType::Float64)),
                    _ => acc.binary(*op, e),
                });

                if subs.iter().all(Fragment::is_resolved) {
                    let tag = (!agg.is_identity()).then(|| agg.clone());
                    Ok(Fragment::value(name, expr)
                        .with_deps(subs)
                        .with_aggregated(tag))
                } else if agg.is_identity() {
                    Ok(Fragment::value(name, expr))
                } else {
                    Ok(Fragment::aggregate(
                        name,
                        agg.apply(expr, ctx.fact_count.as_ref()),
                        agg.clone(),
                    ))
                }
            }
            Measure::Relative {
                name,
                measure,
                over,
                order,
                inner_agg,
                desc,
            } => {
                if inner_agg.is_identity() {
                    return Err(CubeError::NoWindowFunction(measure.name()));
                }
                let inner = measure.fragment(ctx)?;
                let mut deps = vec![inner.clone()];

                let mut partition = Vec::new();
                for level in over {
                    let id = level.fragments().into_iter().next().ok_or_else(|| {
                        CubeError::InvalidCutPoint(level.id_name())
                    })?;
                    if !id.constant {
                        partition.push(id.expr.clone());
                        deps.push(id);
                    }
                }

                let mut order_by = Vec::new();
                for operand in order {
                    let f = operand.fragment(ctx)?;
                    order_by.push(if *desc {
                        WindowOrderBy::desc(f.expr.clone())
                    } else {
                        WindowOrderBy::asc(f.expr.clone())
                    });
                    if !deps.contains(&f) {
                        deps.push(f);
                    }
                }

                let expr = inner_agg
                    .apply(inner.expr, None)
                    .over()
                    .partition_by(partition)
                    .order_by(order_by)
                    .build();
                Ok(Fragment::window(name, expr).with_deps(deps))
            }
            Measure::Count {
                name,
                expr,
                distinct,
            } => {
                let agg = self.agg();
                let fact_count = if *distinct {
                    None
                } else {
                    ctx.fact_count.as_ref()
                };
                Ok(Fragment::aggregate(
                    name,
                    agg.apply(expr.clone(), fact_count),
                    agg,
                ))
            }
            Measure::Label { name, measure } => Ok(measure.fragment(ctx)?.renamed(name)),
            Measure::ForceAgg { measure, agg } => {
                let inner = measure.fragment(ctx)?;
                let name = inner.name.clone().unwrap_or_else(|| measure.name());
                Ok(
                    Fragment::aggregate(name, agg.apply(inner.expr.clone(), None), agg.clone())
                        .with_deps(vec![inner]),
                )
            }
            Measure::Projected {
                name,
                expr,
                agg,
                aggregated,
            } => {
                if aggregated.as_ref() == Some(agg) || agg.is_identity() {
                    Ok(Fragment::value(name, expr.clone()).with_aggregated(aggregated.clone()))
                } else {
                    Ok(Fragment::aggregate(
                        name,
                        agg.apply(expr.clone(), ctx.fact_count.as_ref()),
                        agg.clone(),
                    ))
                }
            }
        }
    }
}

impl From<i64> for Measure {
    fn from(n: i64) -> Self {
        Measure::constant(Literal::Int(n))
    }
}

impl From<f64> for Measure {
    fn from(f: f64) -> Self {
        Measure::constant(Literal::Float(f))
    }
}
