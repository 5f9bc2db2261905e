//! Members: single coordinates of a level.

use crate::aggregate::{Aggregate, Target};
use crate::compiler::{Fragment, Projection};
use crate::error::{CubeError, CubeResult};
use crate::schema::Catalog;
use crate::sql::expr::{lit_str, Expr, ExprExt, Literal};
use crate::sql::query::Query;

use super::filter::{CompareOp, Comparison, Filter};
use super::operand::Operand;
use super::level::LevelRef;

/// One value of a level, e.g. the year 2010.
///
/// As an axis, a member pins the query to that coordinate: it contributes
/// its id and label as constants plus a filter on the level id. The filter is
/// applied once, in the innermost layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub level: LevelRef,
    pub id: Literal,
    pub label: String,
    applied: bool,
}

impl Member {
    pub fn new(level: LevelRef, id: Literal, label: impl Into<String>) -> Self {
        Self {
            level,
            id,
            label: label.into(),
            applied: false,
        }
    }

    pub fn dimension(&self) -> &str {
        self.level.dimension()
    }

    pub fn id_expr(&self) -> Expr {
        Expr::Literal(self.id.clone())
    }

    /// `level = id`.
    pub fn filter(&self) -> Filter {
        Filter::Leaf(Comparison {
            op: CompareOp::Eq,
            operands: vec![
                Operand::from(self.level.clone()),
                Operand::from(self.clone()),
            ],
        })
    }

    pub fn fragments(&self) -> Vec<Fragment> {
        let mut fragments = vec![
            Fragment::id(self.level.id_name(), self.id_expr()).constant(),
            Fragment::label(self.level.label_name(), lit_str(&self.label)).constant(),
        ];
        if !self.applied {
            fragments.push(Fragment::filter(self.level.id_expr().eq(self.id_expr())));
        }
        fragments
    }

    pub fn score(&self, aggregate: &Aggregate) -> f64 {
        self.level.score(aggregate)
    }

    pub fn adapt(&self, target: &Target<'_>) -> CubeResult<Member> {
        Ok(Member {
            level: self.level.adapt(target)?,
            ..self.clone()
        })
    }

    /// Past the first layer the member filter has already been applied.
    pub fn simplify(&self, projection: &Projection) -> Member {
        if projection.source.is_empty() {
            return self.clone();
        }
        Member {
            applied: true,
            ..self.clone()
        }
    }

    /// Members of the child level that roll up into this member.
    pub fn children_query(&self, catalog: &Catalog) -> CubeResult<Query> {
        let child = self.level.child().ok_or_else(|| {
            CubeError::InvalidCutPoint(format!(
                "{} is a leaf level and has no children",
                self.level.id_name()
            ))
        })?;
        let parent = self.level.declared();
        child.members_query_where(catalog, Some(parent.id_expr().eq(self.id_expr())))
    }
}
