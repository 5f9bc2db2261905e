//! The cube model.
//!
//! A [`Cube`] is a fact table seen through dimensions (each a hierarchy of
//! levels) and measures (expressions over fact rows with the aggregator
//! combining them). Every expression node of the model implements the same
//! contracts:
//!
//! - `score(aggregate)`: how well a rollup table can serve the node,
//! - `adapt(target)`: the node rebound to the columns of the chosen table,
//! - `simplify(projection)`: the node reusing columns a previous compiler
//!   layer already produced,
//! - `fragment(s)(ctx)`: the node as compiler fragments.

mod aggregator;
mod dimension;
mod filter;
mod level;
mod measure;
mod member;
mod metadata;
mod operand;
mod order;
mod part;

pub use aggregator::{AccumulatorRows, Aggregator};
pub use dimension::Dimension;
pub use filter::{CompareOp, Comparison, Filter};
pub use level::{Hierarchy, Level, LevelKind, LevelRef, LevelSource, ALL_LEVEL};
pub use measure::{Measure, FACT_COUNT};
pub use member::Member;
pub use metadata::{MetaValue, Metadata};
pub use operand::{CutPoint, Operand, OperandExt};
pub use order::OrderClause;
pub use part::Part;

use tracing::info;

use crate::aggregate::{self, Aggregate, AggregatePlan, NamingConvention, Target};
use crate::config::CompilerSettings;
use crate::error::{CubeError, CubeResult, Result};
use crate::exec::{Executor, Row};
use crate::query::Query;
use crate::schema::{Catalog, ColumnRef, Table};
use crate::sql::expr::Literal;

// =============================================================================
// Cube
// =============================================================================

/// A fact table, its dimensions, its measures and its rollup tables.
#[derive(Debug, Clone)]
pub struct Cube {
    pub name: String,
    pub fact_table: String,
    pub dimensions: Vec<Dimension>,
    /// Always contains the `FACT_COUNT` row count.
    pub measures: Vec<Measure>,
    /// Registered rollups, in registration order.
    pub aggregates: Vec<Aggregate>,
    /// Set when the fact table itself is pre-aggregated and carries a row
    /// count.
    pub fact_count_column: Option<ColumnRef>,
    pub catalog: Catalog,
    pub settings: CompilerSettings,
    pub metadata: Metadata,
}

impl Cube {
    pub fn new(name: impl Into<String>, fact_table: impl Into<String>, catalog: Catalog) -> Self {
        Self {
            name: name.into(),
            fact_table: fact_table.into(),
            dimensions: Vec::new(),
            measures: vec![Measure::count(FACT_COUNT)],
            aggregates: Vec::new(),
            fact_count_column: None,
            catalog,
            settings: CompilerSettings::default(),
            metadata: Metadata::new(),
        }
    }

    /// Add a dimension, replacing one with the same name.
    pub fn with_dimension(mut self, dimension: Dimension) -> Self {
        match self.dimensions.iter_mut().find(|d| d.name == dimension.name) {
            Some(existing) => *existing = dimension,
            None => self.dimensions.push(dimension),
        }
        self
    }

    /// Add a measure, replacing one with the same name.
    pub fn with_measure(mut self, measure: Measure) -> Self {
        let name = measure.name();
        match self.measures.iter_mut().find(|m| m.name() == name) {
            Some(existing) => *existing = measure,
            None => self.measures.push(measure),
        }
        self
    }

    pub fn with_fact_count_column(mut self, column: ColumnRef) -> Self {
        self.fact_count_column = Some(column);
        self
    }

    pub fn with_settings(mut self, settings: CompilerSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    pub fn dimension(&self, name: &str) -> CubeResult<&Dimension> {
        self.dimensions
            .iter()
            .find(|d| d.name == name)
            .ok_or_else(|| CubeError::UnknownDimension(name.into()))
    }

    /// A level of the default hierarchy of `dimension`.
    pub fn level(&self, dimension: &str, level: &str) -> CubeResult<LevelRef> {
        self.dimension(dimension)?.level(level)
    }

    pub fn measure(&self, name: &str) -> CubeResult<Measure> {
        self.measures
            .iter()
            .find(|m| m.name() == name)
            .cloned()
            .ok_or_else(|| CubeError::UnknownMeasure(name.into()))
    }

    /// A member built from a known id and label, without a database round
    /// trip.
    pub fn member(&self, level: &LevelRef, id: Literal, label: impl Into<String>) -> Member {
        Member::new(level.declared(), id, label)
    }

    /// An empty query on this cube.
    pub fn query(&self) -> Query<'_> {
        Query::new(self)
    }

    // =========================================================================
    // Aggregates
    // =========================================================================

    pub fn register_aggregate(&mut self, aggregate: Aggregate) {
        self.aggregates.push(aggregate);
    }

    /// The rollup best suited to `parts`, or the cube itself.
    pub fn find_best_aggregate(&self, parts: &[Part]) -> Target<'_> {
        aggregate::find_best(&self.aggregates, parts)
    }

    /// Run the DDL of `plan`, then its triggers, and register the new table.
    pub fn install(&mut self, plan: AggregatePlan, executor: &dyn Executor) -> Result<()> {
        executor.execute_batch(&plan.ddl_script())?;
        info!(table = %plan.table.name, "created aggregate table");
        if !plan.triggers.is_empty() {
            executor.execute_batch(&plan.trigger_script())?;
            info!(table = %plan.table.name, triggers = plan.triggers.len(), "installed triggers");
        }
        self.catalog.add_table(plan.table);
        self.register_aggregate(plan.aggregate);
        Ok(())
    }

    /// Register every table of `tables` the naming convention recognizes as
    /// a rollup of this cube. Returns how many were registered.
    pub fn reflect_aggregates(
        &mut self,
        naming: &NamingConvention,
        tables: &[Table],
    ) -> CubeResult<usize> {
        let found = naming.reflect(self, tables)?;
        let count = found.len();
        for (aggregate, table) in found {
            info!(table = %table.name, "registered reflected aggregate");
            self.catalog.add_table(table);
            self.register_aggregate(aggregate);
        }
        Ok(count)
    }

    // =========================================================================
    // Members
    // =========================================================================

    /// Every member of `level`, ordered by id.
    pub fn members(&self, level: &LevelRef, executor: &dyn Executor) -> Result<Vec<Member>> {
        let query = level.members_query(&self.catalog)?;
        let rows = executor.fetch(&query.to_sql(executor.dialect()))?;
        rows.iter().map(|row| to_member(level, row)).collect()
    }

    pub fn member_by_label(
        &self,
        level: &LevelRef,
        label: &str,
        executor: &dyn Executor,
    ) -> Result<Option<Member>> {
        Ok(self
            .members(level, executor)?
            .into_iter()
            .find(|m| m.label == label))
    }

    /// Members of the next level down that roll up into `member`. Members
    /// of the finest level have none.
    pub fn children(&self, member: &Member, executor: &dyn Executor) -> Result<Vec<Member>> {
        let Some(child) = member.level.child() else {
            return Ok(Vec::new());
        };
        let query = member.children_query(&self.catalog)?;
        let rows = executor.fetch(&query.to_sql(executor.dialect()))?;
        rows.iter().map(|row| to_member(&child, row)).collect()
    }
}

fn to_member(level: &LevelRef, row: &Row) -> Result<Member> {
    let id = row.try_get(&level.id_name())?.to_literal();
    let label = row.try_get(&level.label_name())?.to_string();
    Ok(Member::new(level.declared(), id, label))
}
