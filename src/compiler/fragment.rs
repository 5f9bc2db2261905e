//! Fragments: the atomic units cube expressions compile to.
//!
//! A fragment is one output column or one predicate, tagged with what it is
//! (plain value, grouping key, aggregate, window, filter, order) and carrying
//! the fragments it depends on. The compiler sorts fragments into layers by
//! dependency depth and resolves one layer per SELECT.

use crate::cube::Aggregator;
use crate::sql::expr::{table_col, Expr};

// =============================================================================
// Fragment
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FragmentKind {
    /// A plain column.
    Value,
    /// Grouping key of an axis.
    Id,
    /// Display label of an axis, grouped alongside its id.
    Label,
    /// An aggregate expression.
    Aggregate,
    /// An analytic (window) expression.
    Window,
    /// A row predicate (`WHERE`).
    Filter,
    /// A predicate on already aggregated or ranked values.
    PostFilter,
    /// A sort key.
    Order,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub kind: FragmentKind,
    /// Output column name. Predicates and orders are unnamed.
    pub name: Option<String>,
    pub expr: Expr,
    pub deps: Vec<Fragment>,
    /// Tables the expression reads from, in first-seen order.
    pub joins: Vec<String>,
    /// Constant fragments are never emitted nor grouped.
    pub constant: bool,
    /// The aggregator already applied to this value, when known.
    pub aggregated: Option<Aggregator>,
    /// Sort direction of order fragments.
    pub descending: bool,
}

impl Fragment {
    fn new(kind: FragmentKind, name: Option<String>, expr: Expr) -> Self {
        let joins = expr.tables();
        Self {
            kind,
            name,
            expr,
            deps: Vec::new(),
            joins,
            constant: false,
            aggregated: None,
            descending: false,
        }
    }

    pub fn value(name: impl Into<String>, expr: Expr) -> Self {
        Self::new(FragmentKind::Value, Some(name.into()), expr)
    }

    pub fn id(name: impl Into<String>, expr: Expr) -> Self {
        Self::new(FragmentKind::Id, Some(name.into()), expr)
    }

    pub fn label(name: impl Into<String>, expr: Expr) -> Self {
        Self::new(FragmentKind::Label, Some(name.into()), expr)
    }

    pub fn aggregate(name: impl Into<String>, expr: Expr, agg: Aggregator) -> Self {
        let mut fragment = Self::new(FragmentKind::Aggregate, Some(name.into()), expr);
        fragment.aggregated = Some(agg);
        fragment
    }

    /// Window values are final per row: they are tagged with the identity
    /// aggregator.
    pub fn window(name: impl Into<String>, expr: Expr) -> Self {
        let mut fragment = Self::new(FragmentKind::Window, Some(name.into()), expr);
        fragment.aggregated = Some(Aggregator::Identity);
        fragment
    }

    pub fn filter(expr: Expr) -> Self {
        Self::new(FragmentKind::Filter, None, expr)
    }

    pub fn post_filter(expr: Expr) -> Self {
        Self::new(FragmentKind::PostFilter, None, expr)
    }

    pub fn order(expr: Expr, descending: bool) -> Self {
        let mut fragment = Self::new(FragmentKind::Order, None, expr);
        fragment.descending = descending;
        fragment
    }

    pub fn with_deps(mut self, deps: Vec<Fragment>) -> Self {
        self.deps = deps;
        self
    }

    pub fn with_aggregated(mut self, agg: Option<Aggregator>) -> Self {
        self.aggregated = agg;
        self
    }

    pub fn constant(mut self) -> Self {
        self.constant = true;
        self
    }

    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn is_aggregate(&self) -> bool {
        self.kind == FragmentKind::Aggregate
    }

    /// A level id or label.
    pub fn is_key(&self) -> bool {
        matches!(self.kind, FragmentKind::Id | FragmentKind::Label)
    }

    /// Whether the value no longer needs aggregating in its layer.
    pub fn is_resolved(&self) -> bool {
        self.constant
            || matches!(self.kind, FragmentKind::Aggregate | FragmentKind::Window)
            || self.aggregated.is_some()
    }

    /// Whether this fragment cannot be evaluated in the same SELECT as its
    /// dependencies.
    pub fn needs_subquery(&self) -> bool {
        match self.kind {
            FragmentKind::Value | FragmentKind::Aggregate | FragmentKind::PostFilter => self
                .deps
                .iter()
                .any(|d| matches!(d.kind, FragmentKind::Aggregate | FragmentKind::Window)),
            FragmentKind::Window
            | FragmentKind::Id
            | FragmentKind::Label
            | FragmentKind::Filter => self.deps.iter().any(Fragment::is_aggregate),
            FragmentKind::Order => false,
        }
    }

    /// Number of SELECT layers below the one this fragment is evaluated in.
    pub fn depth(&self) -> usize {
        let below = self.deps.iter().map(Fragment::depth).max().unwrap_or(0);
        below + usize::from(self.needs_subquery())
    }

    /// Names of every named dependency, transitively.
    pub fn dep_names(&self, out: &mut Vec<String>) {
        for dep in &self.deps {
            if let Some(name) = &dep.name {
                if !out.contains(name) {
                    out.push(name.clone());
                }
            }
            dep.dep_names(out);
        }
    }
}

// =============================================================================
// Projection
// =============================================================================

/// A column exposed by the previous layer.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedColumn {
    pub name: String,
    pub aggregated: Option<Aggregator>,
}

/// The columns a wrapped subquery exposes to the next layer.
///
/// `simplify` rewrites cube expressions whose output already exists here
/// into pass-through references.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projection {
    pub source: String,
    pub columns: Vec<ProjectedColumn>,
}

impl Projection {
    /// The empty projection of the first layer.
    pub fn base() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&ProjectedColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// `"source"."name"`.
    pub fn column(&self, name: &str) -> Expr {
        table_col(&self.source, name)
    }
}

/// Per-layer inputs of fragment generation.
#[derive(Debug, Clone, Default)]
pub struct FragmentContext {
    /// Fact-count column of the current source, used to weight averages and
    /// to serve counts.
    pub fact_count: Option<Expr>,
}
