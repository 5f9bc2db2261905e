//! Cube queries.
//!
//! [`Query`] is an immutable builder: every method returns a new query.
//! Compiling one runs the whole pipeline: the navigator picks a table, the
//! parts are adapted to it and the fragment compiler turns them into SQL.
//!
//! ```ignore
//! let region = cube.level("store", "region")?;
//! let result = cube
//!     .query()
//!     .axis(region)
//!     .measure(cube.measure("Quantity")?)
//!     .execute(&executor)?;
//! ```

mod result;

pub use result::{ResultNode, ResultSet};

use tracing::debug;

use crate::compiler;
use crate::cube::{
    Cube, CutPoint, Filter, LevelRef, Measure, Member, Operand, OperandExt, OrderClause, Part,
};
use crate::error::{CubeError, CubeResult, Result};
use crate::exec::Executor;
use crate::sql::dialect::Dialect;
use crate::sql::query::Query as SqlQuery;

#[derive(Debug, Clone)]
pub struct Query<'a> {
    cube: &'a Cube,
    axes: Vec<CutPoint>,
    measures: Vec<Measure>,
    /// Conjuncts of the filter.
    filters: Vec<Filter>,
    orders: Vec<OrderClause>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl<'a> Query<'a> {
    pub fn new(cube: &'a Cube) -> Self {
        Self {
            cube,
            axes: Vec::new(),
            measures: Vec::new(),
            filters: Vec::new(),
            orders: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    pub fn cube(&self) -> &'a Cube {
        self.cube
    }

    pub fn axes(&self) -> &[CutPoint] {
        &self.axes
    }

    pub fn measures(&self) -> &[Measure] {
        &self.measures
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn orders(&self) -> &[OrderClause] {
        &self.orders
    }

    // =========================================================================
    // Builder
    // =========================================================================

    /// Break results down by `cut`. A dimension has at most one axis: a new
    /// cut point on it replaces the previous one in place.
    pub fn axis(&self, cut: impl Into<CutPoint>) -> Self {
        let cut = cut.into();
        let mut query = self.clone();
        match query
            .axes
            .iter_mut()
            .find(|a| a.dimension() == cut.dimension())
        {
            Some(existing) => *existing = cut,
            None => query.axes.push(cut),
        }
        query
    }

    /// Pin the dimension of `member` to it.
    pub fn slice(&self, member: Member) -> Self {
        self.axis(CutPoint::Member(member))
    }

    /// Break results down by several cut points, in order.
    pub fn axes_from(&self, cuts: impl IntoIterator<Item = impl Into<CutPoint>>) -> Self {
        cuts.into_iter().fold(self.clone(), |q, cut| q.axis(cut))
    }

    pub fn measure(&self, measure: Measure) -> Self {
        let mut query = self.clone();
        if !query.measures.contains(&measure) {
            query.measures.push(measure);
        }
        query
    }

    pub fn measures_from(&self, measures: impl IntoIterator<Item = Measure>) -> Self {
        measures
            .into_iter()
            .fold(self.clone(), |q, measure| q.measure(measure))
    }

    /// AND `filter` into the query filter.
    pub fn filter(&self, filter: Filter) -> Self {
        let mut query = self.clone();
        query.filters.extend(filter.conjuncts());
        query
    }

    /// Keep facts belonging to any of `members`.
    pub fn filter_members(&self, members: impl IntoIterator<Item = Member>) -> CubeResult<Self> {
        let filter = members
            .into_iter()
            .map(|m| m.filter())
            .reduce(Filter::or)
            .ok_or_else(|| CubeError::InvalidCutPoint("no member to filter on".into()))?;
        Ok(self.filter(filter))
    }

    pub fn order_by(&self, order: OrderClause) -> Self {
        let mut query = self.clone();
        query.orders.push(order);
        query
    }

    /// Keep the `n` best values of `measure`, ranked within each combination
    /// of `partition_by`, best first.
    pub fn top(&self, n: i64, measure: Measure, partition_by: Vec<LevelRef>) -> Self {
        let rank = Measure::rank(measure, partition_by, true);
        self.order_by(OrderClause::asc(rank.clone()))
            .filter(rank.le(n).post())
    }

    pub fn limit(&self, n: u64) -> Self {
        Self {
            limit: Some(n),
            ..self.clone()
        }
    }

    pub fn offset(&self, n: u64) -> Self {
        Self {
            offset: Some(n),
            ..self.clone()
        }
    }

    // =========================================================================
    // Compilation
    // =========================================================================

    /// Axes, measures, filter conjuncts and orders, in that order.
    pub fn parts(&self) -> Vec<Part> {
        self.axes
            .iter()
            .cloned()
            .map(Part::Axis)
            .chain(self.measures.iter().cloned().map(Part::Measure))
            .chain(self.filters.iter().cloned().map(Part::Filter))
            .chain(self.orders.iter().cloned().map(Part::Order))
            .collect()
    }

    /// Levels that keep their own rows until the last layer must be
    /// determined by an axis: order keys, and levels compared in the same
    /// filter as a measure. A finer level would split the axis groups.
    fn check_grain(&self) -> CubeResult<()> {
        let mut levels: Vec<&LevelRef> = Vec::new();
        for order in &self.orders {
            match &order.operand {
                Operand::Cut(CutPoint::Level(level)) => levels.push(level),
                Operand::Cut(CutPoint::Member(member)) => {
                    return Err(CubeError::InvalidCutPoint(format!(
                        "cannot order by the single member {}",
                        member.label
                    )))
                }
                Operand::Measure(_) => {}
            }
        }
        for filter in self.filters.iter().filter(|f| f.compares_measures()) {
            levels.extend(filter.levels());
        }

        for level in levels.into_iter().filter(|l| !l.is_all()) {
            let covered = self.axes.iter().any(|cut| {
                let axis = cut.level();
                axis.dimension() == level.dimension()
                    && axis.hierarchy.name == level.hierarchy.name
                    && axis.depth() >= level.depth()
            });
            if !covered {
                return Err(CubeError::InvalidCutPoint(format!(
                    "{} is finer than the query axes",
                    level.id_name()
                )));
            }
        }
        Ok(())
    }

    pub fn compile(&self) -> CubeResult<SqlQuery> {
        self.check_grain()?;
        let parts = self.parts();
        let target = self.cube.find_best_aggregate(&parts);
        let adapted = parts
            .iter()
            .map(|p| p.adapt(&target))
            .collect::<CubeResult<Vec<_>>>()?;
        compiler::compile(self.cube, &target, &adapted, self.limit, self.offset)
    }

    /// The compiled query in the cube's dialect.
    pub fn sql(&self) -> CubeResult<String> {
        self.sql_for(self.cube.settings.dialect)
    }

    pub fn sql_for(&self, dialect: Dialect) -> CubeResult<String> {
        Ok(self.compile()?.to_sql(dialect))
    }

    pub fn execute(&self, executor: &dyn Executor) -> Result<ResultSet> {
        let sql = self.sql_for(executor.dialect())?;
        debug!(cube = %self.cube.name, %sql, "executing query");
        let rows = executor.fetch(&sql)?;

        let levels: Vec<LevelRef> = self
            .axes
            .iter()
            .filter_map(|cut| match cut {
                CutPoint::Level(level) if !level.is_all() => Some(level.clone()),
                _ => None,
            })
            .collect();
        let keep_order = self.axes.len() == 1 && !self.orders.is_empty();
        ResultSet::from_rows(&levels, &self.measures, &rows, keep_order)
    }
}
