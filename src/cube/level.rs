//! Levels and hierarchies.
//!
//! Levels are declared context-free and bound once, when their hierarchy is
//! attached to a dimension. Binding prepends the synthetic `All` level and
//! fixes parent/child links as indices into the hierarchy's level arena.
//!
//! A [`LevelRef`] points at one bound level and records which schema its
//! columns are currently read from: the cube's own tables, a rollup table
//! storing the level, a rollup table storing a finer level of the same
//! hierarchy, or the output of a previous compiler layer.

use std::sync::Arc;

use crate::aggregate::{Aggregate, Target};
use crate::compiler::{Fragment, Projection};
use crate::error::{CubeError, CubeResult};
use crate::schema::{Catalog, ColumnRef};
use crate::sql::expr::{date_trunc, lit_str, Expr, ExprExt, TimeGrain};
use crate::sql::query::{OrderByExpr, Query, TableRef};

use super::metadata::Metadata;

pub const ALL_LEVEL: &str = "All";

// =============================================================================
// Level declarations
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum LevelKind {
    /// The synthetic top level: one member covering everything.
    All,
    /// Id and label columns, usually on a dimension table.
    Column { id: ColumnRef, label: ColumnRef },
    /// A transform of a fact column, e.g. the month of a date.
    Computed { column: ColumnRef, grain: TimeGrain },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Level {
    pub name: String,
    pub kind: LevelKind,
    pub parent: Option<usize>,
    pub child: Option<usize>,
    pub metadata: Metadata,
}

impl Level {
    fn new(name: impl Into<String>, kind: LevelKind) -> Self {
        Self {
            name: name.into(),
            kind,
            parent: None,
            child: None,
            metadata: Metadata::new(),
        }
    }

    /// A level identified by a column. The label defaults to the id.
    pub fn column(name: impl Into<String>, id: ColumnRef) -> Self {
        let label = id.clone();
        Self::new(name, LevelKind::Column { id, label })
    }

    /// A level computed by truncating a date column.
    pub fn computed(name: impl Into<String>, column: ColumnRef, grain: TimeGrain) -> Self {
        Self::new(name, LevelKind::Computed { column, grain })
    }

    pub fn with_label(mut self, label: ColumnRef) -> Self {
        if let LevelKind::Column { label: l, .. } = &mut self.kind {
            *l = label;
        }
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn is_all(&self) -> bool {
        matches!(self.kind, LevelKind::All)
    }
}

/// An ordered chain of levels, coarsest first.
#[derive(Debug, Clone, PartialEq)]
pub struct Hierarchy {
    pub name: String,
    /// Owning dimension; empty until bound.
    pub dimension: String,
    pub levels: Vec<Level>,
}

impl Hierarchy {
    /// An unbound hierarchy.
    pub fn new(name: impl Into<String>, levels: Vec<Level>) -> Self {
        Self {
            name: name.into(),
            dimension: String::new(),
            levels,
        }
    }

    /// Attach to `dimension`: prepend `All` and link parents and children.
    pub fn bind(self, dimension: &str) -> CubeResult<Hierarchy> {
        let mut levels = Vec::with_capacity(self.levels.len() + 1);
        levels.push(Level::new(ALL_LEVEL, LevelKind::All));

        for level in self.levels {
            if level.is_all() {
                continue;
            }
            if levels.iter().any(|l: &Level| l.name == level.name) {
                return Err(CubeError::InvalidDefinition(format!(
                    "duplicate level {} in hierarchy {}.{}",
                    level.name, dimension, self.name
                )));
            }
            levels.push(level);
        }

        let last = levels.len() - 1;
        for (i, level) in levels.iter_mut().enumerate() {
            level.parent = i.checked_sub(1);
            level.child = (i < last).then_some(i + 1);
        }

        Ok(Hierarchy {
            name: self.name,
            dimension: dimension.into(),
            levels,
        })
    }

    pub fn position(&self, level: &str) -> Option<usize> {
        self.levels.iter().position(|l| l.name == level)
    }
}

// =============================================================================
// Level references
// =============================================================================

/// Where a level's columns are read from.
#[derive(Debug, Clone, PartialEq)]
pub enum LevelSource {
    /// The declared columns.
    Declared,
    /// A rollup table storing this very level.
    Rollup { column: ColumnRef },
    /// Rolled up from a finer level stored in a rollup table.
    Derived { from: Box<LevelRef> },
    /// Columns of a previous compiler layer.
    Projected { id: Expr, label: Expr },
}

#[derive(Debug, Clone, PartialEq)]
pub struct LevelRef {
    pub hierarchy: Arc<Hierarchy>,
    pub index: usize,
    pub source: LevelSource,
}

impl LevelRef {
    pub fn new(hierarchy: Arc<Hierarchy>, index: usize) -> Self {
        Self {
            hierarchy,
            index,
            source: LevelSource::Declared,
        }
    }

    pub fn level(&self) -> &Level {
        &self.hierarchy.levels[self.index]
    }

    pub fn name(&self) -> &str {
        &self.level().name
    }

    pub fn dimension(&self) -> &str {
        &self.hierarchy.dimension
    }

    /// Position in the hierarchy; `All` is 0.
    pub fn depth(&self) -> usize {
        self.index
    }

    pub fn is_all(&self) -> bool {
        self.level().is_all()
    }

    pub fn metadata(&self) -> &Metadata {
        &self.level().metadata
    }

    fn at(&self, index: usize) -> LevelRef {
        LevelRef::new(self.hierarchy.clone(), index)
    }

    pub fn parent(&self) -> Option<LevelRef> {
        self.level().parent.map(|i| self.at(i))
    }

    pub fn child(&self) -> Option<LevelRef> {
        self.level().child.map(|i| self.at(i))
    }

    /// The same level read from its declared columns.
    pub fn declared(&self) -> LevelRef {
        self.at(self.index)
    }

    /// Output column name of the level id.
    pub fn id_name(&self) -> String {
        format!("{}_{}", self.dimension(), self.name())
    }

    /// Output column name of the level label.
    pub fn label_name(&self) -> String {
        format!("{}_{}_label", self.dimension(), self.name())
    }

    pub fn id_expr(&self) -> Expr {
        match (&self.level().kind, &self.source) {
            (LevelKind::All, _) => lit_str(ALL_LEVEL),
            (_, LevelSource::Projected { id, .. }) => id.clone(),
            (LevelKind::Column { .. }, LevelSource::Rollup { column }) => column.expr(),
            (LevelKind::Column { id, .. }, _) => id.expr(),
            (LevelKind::Computed { column, grain }, LevelSource::Declared) => {
                date_trunc(*grain, column.expr())
            }
            (LevelKind::Computed { .. }, LevelSource::Rollup { column }) => column.expr(),
            (LevelKind::Computed { grain, .. }, LevelSource::Derived { from }) => {
                date_trunc(*grain, from.id_expr())
            }
        }
    }

    pub fn label_expr(&self) -> Expr {
        match (&self.level().kind, &self.source) {
            (LevelKind::All, _) => lit_str(ALL_LEVEL),
            (_, LevelSource::Projected { label, .. }) => label.clone(),
            (LevelKind::Column { id, label }, LevelSource::Rollup { column }) => {
                if label == id {
                    column.expr()
                } else {
                    label.expr()
                }
            }
            (LevelKind::Column { label, .. }, _) => label.expr(),
            (LevelKind::Computed { .. }, _) => self.id_expr(),
        }
    }

    /// `[Id, Label]`. The `All` level yields constants.
    pub fn fragments(&self) -> Vec<Fragment> {
        let id = Fragment::id(self.id_name(), self.id_expr());
        let label = Fragment::label(self.label_name(), self.label_expr());
        if self.is_all() {
            vec![id.constant(), label.constant()]
        } else {
            vec![id, label]
        }
    }

    /// Reuse the columns of a previous layer when they exist.
    pub fn simplify(&self, projection: &Projection) -> LevelRef {
        let id_name = self.id_name();
        if self.is_all() || !projection.contains(&id_name) {
            return self.clone();
        }
        let label_name = self.label_name();
        let label = if projection.contains(&label_name) {
            projection.column(&label_name)
        } else {
            projection.column(&id_name)
        };
        LevelRef {
            hierarchy: self.hierarchy.clone(),
            index: self.index,
            source: LevelSource::Projected {
                id: projection.column(&id_name),
                label,
            },
        }
    }

    /// Position, in this hierarchy, of the level `aggregate` stores for this
    /// dimension.
    fn stored_position(&self, aggregate: &Aggregate) -> Option<(usize, ColumnRef)> {
        let (level, column) = aggregate.level_for_dimension(self.dimension())?;
        let position = self.hierarchy.position(level.name())?;
        Some((position, column.clone()))
    }

    /// Fitness of `aggregate` for this level.
    ///
    /// 1 at an exact match, halved per step the stored level sits below this
    /// one, -1 when the stored level is coarser or the dimension is missing.
    /// For `All` a missing dimension is a perfect fit.
    pub fn score(&self, aggregate: &Aggregate) -> f64 {
        let q = self.index;
        let inner = match self.stored_position(aggregate) {
            Some((p, _)) if p == q => 1.0,
            Some((p, _)) if p > q => 0.5f64.powi((p - q) as i32),
            _ => -1.0,
        };
        if self.is_all() {
            if inner < 0.0 {
                1.0
            } else {
                inner * 0.5
            }
        } else {
            inner
        }
    }

    /// Rebind to the columns of `target`.
    pub fn adapt(&self, target: &Target<'_>) -> CubeResult<LevelRef> {
        let declared = self.declared();
        let aggregate = match target {
            Target::Cube => return Ok(declared),
            Target::Aggregate(aggregate) => aggregate,
        };
        if self.is_all() {
            return Ok(declared);
        }

        let q = self.index;
        match self.stored_position(aggregate) {
            Some((p, column)) if p == q => Ok(LevelRef {
                source: LevelSource::Rollup { column },
                ..declared
            }),
            Some((p, column)) if p > q => {
                let from = LevelRef {
                    source: LevelSource::Rollup { column },
                    ..self.at(p)
                };
                Ok(LevelRef {
                    source: LevelSource::Derived {
                        from: Box::new(from),
                    },
                    ..declared
                })
            }
            _ => Err(CubeError::SchemaBinding {
                what: format!("level {}.{}", self.dimension(), self.name()),
                target: aggregate.table.clone(),
            }),
        }
    }

    /// `SELECT DISTINCT id, label` over the declared columns of this level.
    pub fn members_query(&self, catalog: &Catalog) -> CubeResult<Query> {
        self.members_query_where(catalog, None)
    }

    pub(crate) fn members_query_where(
        &self,
        catalog: &Catalog,
        condition: Option<Expr>,
    ) -> CubeResult<Query> {
        let level = self.declared();
        if level.is_all() {
            return Err(CubeError::InvalidCutPoint(format!(
                "{} has no members to list",
                level.id_name()
            )));
        }

        let id = level.id_expr();
        let label = level.label_expr();
        let mut tables = id.tables();
        for t in label.tables() {
            if !tables.contains(&t) {
                tables.push(t);
            }
        }
        if let Some(cond) = &condition {
            for t in cond.tables() {
                if !tables.contains(&t) {
                    tables.push(t);
                }
            }
        }
        let Some(first) = tables.first() else {
            return Err(CubeError::InvalidDefinition(format!(
                "level {} reads no table",
                level.id_name()
            )));
        };

        let mut query = Query::new()
            .select(vec![id.clone().alias(&level.id_name()), label.alias(&level.label_name())])
            .distinct()
            .from(TableRef::new(first));
        let mut present = vec![first.clone()];
        query = catalog.extend_joins(query, &mut present, &tables[1..])?;
        if let Some(cond) = condition {
            query = query.filter(cond);
        }
        Ok(query.order_by(vec![OrderByExpr::asc(id)]))
    }
}
