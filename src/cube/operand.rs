//! Cut points and filter operands.

use crate::aggregate::{Aggregate, Target};
use crate::compiler::{Fragment, FragmentContext, Projection};
use crate::error::{CubeError, CubeResult};
use crate::sql::expr::Literal;

use super::filter::{CompareOp, Comparison, Filter};
use super::level::LevelRef;
use super::measure::Measure;
use super::member::Member;

/// Anything that slices a dimension: a whole level or one member.
#[derive(Debug, Clone, PartialEq)]
pub enum CutPoint {
    Level(LevelRef),
    Member(Member),
}

impl CutPoint {
    pub fn level(&self) -> &LevelRef {
        match self {
            CutPoint::Level(level) => level,
            CutPoint::Member(member) => &member.level,
        }
    }

    pub fn dimension(&self) -> &str {
        self.level().dimension()
    }

    /// Whether this cut point narrows its dimension at all.
    pub fn touches_dimension(&self) -> bool {
        !matches!(self, CutPoint::Level(level) if level.is_all())
    }

    pub fn score(&self, aggregate: &Aggregate) -> f64 {
        match self {
            CutPoint::Level(level) => level.score(aggregate),
            CutPoint::Member(member) => member.score(aggregate),
        }
    }

    pub fn adapt(&self, target: &Target<'_>) -> CubeResult<CutPoint> {
        Ok(match self {
            CutPoint::Level(level) => CutPoint::Level(level.adapt(target)?),
            CutPoint::Member(member) => CutPoint::Member(member.adapt(target)?),
        })
    }

    pub fn simplify(&self, projection: &Projection) -> CutPoint {
        match self {
            CutPoint::Level(level) => CutPoint::Level(level.simplify(projection)),
            CutPoint::Member(member) => CutPoint::Member(member.simplify(projection)),
        }
    }

    pub fn fragments(&self) -> Vec<Fragment> {
        match self {
            CutPoint::Level(level) => level.fragments(),
            CutPoint::Member(member) => member.fragments(),
        }
    }
}

impl From<LevelRef> for CutPoint {
    fn from(level: LevelRef) -> Self {
        CutPoint::Level(level)
    }
}

impl From<Member> for CutPoint {
    fn from(member: Member) -> Self {
        CutPoint::Member(member)
    }
}

/// One side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Cut(CutPoint),
    Measure(Measure),
}

impl Operand {
    pub fn dimensions(&self, out: &mut Vec<String>) {
        match self {
            Operand::Cut(cut) => {
                if cut.touches_dimension() && !out.iter().any(|d| d == cut.dimension()) {
                    out.push(cut.dimension().to_string());
                }
            }
            Operand::Measure(measure) => measure.dimensions(out),
        }
    }

    pub fn score(&self, aggregate: &Aggregate) -> f64 {
        match self {
            Operand::Cut(cut) => cut.score(aggregate),
            Operand::Measure(measure) => measure.score(aggregate),
        }
    }

    pub fn adapt(&self, target: &Target<'_>) -> CubeResult<Operand> {
        Ok(match self {
            Operand::Cut(cut) => Operand::Cut(cut.adapt(target)?),
            Operand::Measure(measure) => Operand::Measure(measure.adapt(target)?),
        })
    }

    pub fn simplify(&self, projection: &Projection) -> Operand {
        match self {
            Operand::Cut(cut) => Operand::Cut(cut.simplify(projection)),
            Operand::Measure(measure) => Operand::Measure(measure.simplify(projection)),
        }
    }

    /// The fragment standing for this operand inside a larger expression: a
    /// level's id, a member's id or a measure's value.
    pub fn fragment(&self, ctx: &FragmentContext) -> CubeResult<Fragment> {
        match self {
            Operand::Cut(cut) => cut.fragments().into_iter().next().ok_or_else(|| {
                CubeError::InvalidCutPoint(format!("{} yields no column", cut.level().id_name()))
            }),
            Operand::Measure(measure) => measure.fragment(ctx),
        }
    }
}

impl From<CutPoint> for Operand {
    fn from(cut: CutPoint) -> Self {
        Operand::Cut(cut)
    }
}

impl From<LevelRef> for Operand {
    fn from(level: LevelRef) -> Self {
        Operand::Cut(CutPoint::Level(level))
    }
}

impl From<Member> for Operand {
    fn from(member: Member) -> Self {
        Operand::Cut(CutPoint::Member(member))
    }
}

impl From<Measure> for Operand {
    fn from(measure: Measure) -> Self {
        Operand::Measure(measure)
    }
}

impl From<i64> for Operand {
    fn from(n: i64) -> Self {
        Operand::Measure(Measure::constant(Literal::Int(n)))
    }
}

impl From<f64> for Operand {
    fn from(f: f64) -> Self {
        Operand::Measure(Measure::constant(Literal::Float(f)))
    }
}

impl From<&str> for Operand {
    fn from(s: &str) -> Self {
        Operand::Measure(Measure::constant(Literal::String(s.into())))
    }
}

/// Comparison builders for anything usable as an operand.
pub trait OperandExt: Sized {
    fn into_operand(self) -> Operand;

    fn compare(self, op: CompareOp, other: impl Into<Operand>) -> Filter {
        Filter::Leaf(Comparison {
            op,
            operands: vec![self.into_operand(), other.into()],
        })
    }

    fn eq(self, other: impl Into<Operand>) -> Filter {
        self.compare(CompareOp::Eq, other)
    }

    fn ne(self, other: impl Into<Operand>) -> Filter {
        self.compare(CompareOp::Ne, other)
    }

    fn lt(self, other: impl Into<Operand>) -> Filter {
        self.compare(CompareOp::Lt, other)
    }

    fn le(self, other: impl Into<Operand>) -> Filter {
        self.compare(CompareOp::Le, other)
    }

    fn gt(self, other: impl Into<Operand>) -> Filter {
        self.compare(CompareOp::Gt, other)
    }

    fn ge(self, other: impl Into<Operand>) -> Filter {
        self.compare(CompareOp::Ge, other)
    }

    fn like(self, pattern: impl Into<Operand>) -> Filter {
        self.compare(CompareOp::Like, pattern)
    }

    fn between(self, low: impl Into<Operand>, high: impl Into<Operand>) -> Filter {
        Filter::Leaf(Comparison {
            op: CompareOp::Between,
            operands: vec![self.into_operand(), low.into(), high.into()],
        })
    }
}

impl OperandExt for Operand {
    fn into_operand(self) -> Operand {
        self
    }
}

impl OperandExt for LevelRef {
    fn into_operand(self) -> Operand {
        self.into()
    }
}

impl OperandExt for Member {
    fn into_operand(self) -> Operand {
        self.into()
    }
}

impl OperandExt for Measure {
    fn into_operand(self) -> Operand {
        self.into()
    }
}
