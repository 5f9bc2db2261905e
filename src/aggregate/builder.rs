//! Materializing a query as a rollup table.
//!
//! [`AggBuilder`] checks that a query can be stored (one level per
//! dimension, plain cube measures, no filter, no order), compiles it against
//! the fact table and wraps the result in the DDL creating, keying and
//! indexing the rollup table. Optionally it also generates the triggers that
//! keep the table current as facts are inserted or updated.

use tracing::info;

use crate::compiler;
use crate::cube::{Cube, CutPoint, LevelKind, LevelRef, Measure, Part, FACT_COUNT};
use crate::error::{CubeError, CubeResult};
use crate::query::Query;
use crate::schema::Table;
use crate::sql::ddl::{AlterTable, CreateIndex, CreateTable, DdlStatement, TableConstraint};
use crate::sql::dialect::{Dialect, SqlDialect};
use crate::sql::expr::{table_col, ExprExt};
use crate::sql::query::{Query as SqlQuery, Source};
use crate::sql::types::DataType;

use super::maintenance;
use super::naming::NamingConvention;
use super::{Aggregate, Target};

/// Alias of the compiled query inside the shaping SELECT.
const SHAPE_ALIAS: &str = "anon";

/// Everything needed to create and register a rollup table.
#[derive(Debug, Clone)]
pub struct AggregatePlan {
    /// Catalog description of the new table.
    pub table: Table,
    /// Registry entry to add to the cube once the DDL has run.
    pub aggregate: Aggregate,
    /// Table creation, constraints and indexes.
    pub ddl: Vec<DdlStatement>,
    /// Maintenance functions and triggers; empty unless requested.
    pub triggers: Vec<DdlStatement>,
    /// Dialect the statements were generated for.
    pub dialect: Dialect,
}

impl AggregatePlan {
    /// Table creation, constraints and indexes as one script.
    pub fn ddl_script(&self) -> String {
        script(&self.ddl, self.dialect)
    }

    /// Maintenance functions and triggers as one script.
    pub fn trigger_script(&self) -> String {
        script(&self.triggers, self.dialect)
    }

    /// Every statement as one script.
    pub fn script(&self) -> String {
        script(self.ddl.iter().chain(&self.triggers), self.dialect)
    }
}

/// `;`-terminated statements, skipping those the dialect renders empty.
fn script<'s>(statements: impl IntoIterator<Item = &'s DdlStatement>, dialect: Dialect) -> String {
    statements
        .into_iter()
        .map(|s| s.to_sql(dialect))
        .filter(|s| !s.is_empty())
        .map(|s| format!("{s};"))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Column layout of a rollup table.
#[derive(Debug, Clone)]
pub(super) struct Layout {
    pub table: String,
    pub levels: Vec<(LevelRef, String)>,
    pub measures: Vec<(Measure, String)>,
    pub fact_count: String,
}

impl Layout {
    /// Every column, in table order.
    pub fn columns(&self) -> Vec<String> {
        self.levels
            .iter()
            .map(|(_, c)| c.clone())
            .chain(self.measures.iter().map(|(_, c)| c.clone()))
            .chain(std::iter::once(self.fact_count.clone()))
            .collect()
    }

    pub fn level_columns(&self) -> Vec<String> {
        self.levels.iter().map(|(_, c)| c.clone()).collect()
    }

    /// The build query compiled against the fact table, its output renamed
    /// to the table's columns.
    pub fn shaped_query(&self, cube: &Cube) -> CubeResult<SqlQuery> {
        let fact_count = cube.measure(FACT_COUNT)?;
        let parts: Vec<Part> = self
            .levels
            .iter()
            .map(|(level, _)| Part::Axis(CutPoint::Level(level.clone())))
            .chain(self.measures.iter().map(|(m, _)| Part::Measure(m.clone())))
            .chain(std::iter::once(Part::Measure(fact_count)))
            .collect();
        let compiled = compiler::compile(cube, &Target::Cube, &parts, None, None)?;

        let mut select = Vec::new();
        for (level, column) in &self.levels {
            select.push(table_col(SHAPE_ALIAS, &level.id_name()).alias(column));
        }
        for (measure, column) in &self.measures {
            select.push(table_col(SHAPE_ALIAS, &measure.name()).alias(column));
        }
        select.push(table_col(SHAPE_ALIAS, FACT_COUNT).alias(&self.fact_count));

        Ok(SqlQuery::new()
            .select(select)
            .from(Source::derived(compiled, SHAPE_ALIAS)))
    }
}

/// Builds the DDL of a rollup table from a query.
#[derive(Debug, Clone)]
pub struct AggBuilder<'a> {
    cube: &'a Cube,
    levels: Vec<LevelRef>,
    measures: Vec<Measure>,
    naming: NamingConvention,
    table_name: Option<String>,
    with_triggers: bool,
}

impl<'a> AggBuilder<'a> {
    /// Validate `query` as the definition of a rollup table.
    pub fn new(cube: &'a Cube, query: &Query<'_>) -> CubeResult<Self> {
        if !query.filters().is_empty() {
            return Err(CubeError::AggregateConstraint(
                "an aggregate cannot be filtered".into(),
            ));
        }
        if !query.orders().is_empty() {
            return Err(CubeError::AggregateConstraint(
                "an aggregate cannot be ordered".into(),
            ));
        }

        let mut levels: Vec<LevelRef> = Vec::new();
        for cut in query.axes() {
            let level = match cut {
                CutPoint::Level(level) => level,
                CutPoint::Member(member) => {
                    return Err(CubeError::AggregateConstraint(format!(
                        "member axis on {} is not a level",
                        member.dimension()
                    )))
                }
            };
            if level.is_all() {
                continue;
            }
            if levels.iter().any(|l| l.dimension() == level.dimension()) {
                return Err(CubeError::AggregateConstraint(format!(
                    "more than one axis on dimension {}",
                    level.dimension()
                )));
            }
            levels.push(level.declared());
        }
        if levels.is_empty() {
            return Err(CubeError::AggregateConstraint(
                "an aggregate needs at least one level axis".into(),
            ));
        }

        let mut measures: Vec<Measure> = Vec::new();
        for measure in query.measures() {
            let name = measure.name();
            let known = cube.measure(&name).ok().filter(|m| m == measure);
            match known {
                Some(Measure::Base { .. }) => {
                    if !measures.contains(measure) {
                        measures.push(measure.clone());
                    }
                }
                // served by the fact-count column
                Some(Measure::Count {
                    distinct: false, ..
                }) => {}
                _ => {
                    return Err(CubeError::AggregateConstraint(format!(
                        "{name} is not a stored measure of cube {}",
                        cube.name
                    )))
                }
            }
        }

        Ok(Self {
            cube,
            levels,
            measures,
            naming: NamingConvention::default(),
            table_name: None,
            with_triggers: false,
        })
    }

    pub fn naming(mut self, naming: NamingConvention) -> Self {
        self.naming = naming;
        self
    }

    /// Override the generated table name.
    pub fn table_name(mut self, name: impl Into<String>) -> Self {
        self.table_name = Some(name.into());
        self
    }

    /// Also generate insert and update triggers on the fact table.
    pub fn with_triggers(mut self, with_triggers: bool) -> Self {
        self.with_triggers = with_triggers;
        self
    }

    fn layout(&self) -> Layout {
        let names: Vec<String> = self.measures.iter().map(Measure::name).collect();
        let table = self
            .table_name
            .clone()
            .unwrap_or_else(|| self.naming.table_name(&self.levels, &names));
        Layout {
            levels: self
                .levels
                .iter()
                .map(|l| (l.clone(), self.naming.level_column(l)))
                .collect(),
            measures: self
                .measures
                .iter()
                .map(|m| (m.clone(), self.naming.measure_column(&m.name())))
                .collect(),
            fact_count: self.naming.fact_count_column(),
            table,
        }
    }

    pub fn build(&self, dialect: Dialect) -> CubeResult<AggregatePlan> {
        let layout = self.layout();
        let table_name = layout.table.clone();
        let level_columns = layout.level_columns();

        let mut ddl = vec![DdlStatement::CreateTable(
            CreateTable::new(&table_name).as_select(layout.shaped_query(self.cube)?),
        )];

        let mut table = Table::new(&table_name);
        let mut aggregate = Aggregate::new(&table_name, &layout.fact_count);
        let mut foreign_keys = Vec::new();

        for (level, column) in &layout.levels {
            let data_type = match &level.level().kind {
                LevelKind::Column { id, .. } => {
                    foreign_keys.push((column.clone(), id.table.clone(), id.column.clone()));
                    self.cube
                        .catalog
                        .table(&id.table)
                        .ok()
                        .and_then(|t| t.get_column(&id.column))
                        .map(|c| c.data_type)
                        .unwrap_or(DataType::Int64)
                }
                LevelKind::Computed { .. } | LevelKind::All => DataType::Date,
            };
            table = table.column(column, data_type);
            aggregate = aggregate.with_level(level.clone(), column);
        }
        for (measure, column) in &layout.measures {
            table = table.column(column, DataType::Float64);
            aggregate = aggregate.with_measure(measure.name(), column);
        }
        table = table
            .column(&layout.fact_count, DataType::Int64)
            .primary_key(level_columns.clone());
        for (column, references, to) in &foreign_keys {
            table = table.foreign_key(column, references, to);
        }

        if dialect.supports_add_constraint() {
            ddl.push(DdlStatement::AlterTable(AlterTable::add_constraint(
                &table_name,
                TableConstraint::primary_key(level_columns.clone())
                    .named(format!("{table_name}_pkey")),
            )));
            for (column, references, to) in &foreign_keys {
                ddl.push(DdlStatement::AlterTable(AlterTable::add_constraint(
                    &table_name,
                    TableConstraint::foreign_key([column], references, [to])
                        .named(format!("{table_name}_{column}_fkey")),
                )));
            }
        }
        for column in &level_columns {
            ddl.push(DdlStatement::CreateIndex(
                CreateIndex::new(self.naming.index_name(&table_name, column), &table_name)
                    .column(column),
            ));
        }

        let triggers = if self.with_triggers {
            maintenance::triggers(self.cube, &layout, &self.naming, dialect)?
        } else {
            Vec::new()
        };

        info!(
            table = %table_name,
            levels = layout.levels.len(),
            measures = layout.measures.len(),
            triggers = triggers.len(),
            "planned aggregate"
        );
        Ok(AggregatePlan {
            table,
            aggregate,
            ddl,
            triggers,
            dialect,
        })
    }
}
