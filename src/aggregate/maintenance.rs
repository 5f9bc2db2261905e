//! Triggers keeping a rollup table in sync with the fact table.
//!
//! The changed fact row is turned into a one-row fact source
//! (`SELECT NEW.a AS a, ...`) and pushed through the same query that built
//! the rollup table, giving the row's contribution already shaped like a
//! rollup row. Joined with the rollup row of the same group, every column is
//! then folded with its aggregator's accumulator.

use crate::cube::{Aggregator, AccumulatorRows, Cube};
use crate::error::{CubeError, CubeResult};
use crate::sql::ddl::{
    CreateFunction, CreateTrigger, DdlStatement, ProcStatement, TriggerAction, TriggerEvent,
    TriggerTiming,
};
use crate::sql::dialect::{Dialect, SqlDialect, TriggerStyle};
use crate::sql::dml::{Insert, SelectInto, Update};
use crate::sql::expr::{exists, lit_int, new_field, old_field, subquery, table_col, Expr, ExprExt};
use crate::sql::query::{Query, SelectExpr, Source, TableRef};

use super::builder::Layout;
use super::naming::NamingConvention;

const NEW_ROW: &str = "new_row";
const OLD_ROW: &str = "old_row";
const EXISTING: &str = "existing";
const ACC: &str = "acc";
const TEMP_ROW: &str = "temp_row";

/// Which trigger row a fact source reads.
#[derive(Debug, Clone, Copy)]
enum RowVersion {
    New,
    Old,
}

/// Insert and update triggers for the rollup table described by `layout`.
pub(super) fn triggers(
    cube: &Cube,
    layout: &Layout,
    naming: &NamingConvention,
    dialect: Dialect,
) -> CubeResult<Vec<DdlStatement>> {
    let mut statements = Vec::new();
    for event in [TriggerEvent::Insert, TriggerEvent::Update] {
        let acc = accumulated_row(cube, layout, event)?;
        let prefix = match event {
            TriggerEvent::Insert => "ins",
            TriggerEvent::Update => "upd",
        };
        let trigger = naming.trigger_name(&format!("{prefix}_{}", layout.table));

        match dialect.trigger_style() {
            TriggerStyle::Procedural => {
                let function = naming.function_name(&format!("{prefix}_{}", layout.table));
                statements.push(DdlStatement::CreateFunction(procedural_function(
                    &function, layout, acc,
                )));
                statements.push(DdlStatement::CreateTrigger(CreateTrigger {
                    name: trigger,
                    timing: TriggerTiming::Before,
                    event,
                    table: cube.fact_table.clone(),
                    action: TriggerAction::Execute(function),
                }));
            }
            TriggerStyle::Inline => {
                statements.push(DdlStatement::CreateTrigger(CreateTrigger {
                    name: trigger,
                    timing: TriggerTiming::After,
                    event,
                    table: cube.fact_table.clone(),
                    action: TriggerAction::Inline(inline_body(layout, acc)),
                }));
            }
            TriggerStyle::Unsupported => {
                return Err(CubeError::AggregateConstraint(format!(
                    "{dialect} cannot maintain aggregates with triggers"
                )))
            }
        }
    }
    Ok(statements)
}

/// The rollup row once the changed fact row is folded in.
fn accumulated_row(cube: &Cube, layout: &Layout, event: TriggerEvent) -> CubeResult<Query> {
    let old = matches!(event, TriggerEvent::Update).then_some(OLD_ROW);
    let rows = AccumulatorRows {
        new: NEW_ROW,
        old,
        existing: EXISTING,
        fact_count: &layout.fact_count,
    };

    let mut select: Vec<SelectExpr> = Vec::new();
    for (_, column) in &layout.levels {
        select.push(table_col(NEW_ROW, column).alias(column));
    }
    for (measure, column) in &layout.measures {
        select.push(measure.agg().accumulate(column, &rows)?.alias(column));
    }
    select.push(
        Aggregator::Count
            .accumulate(&layout.fact_count, &rows)?
            .alias(&layout.fact_count),
    );

    let mut query = Query::new()
        .select(select)
        .from(Source::derived(row_contribution(cube, layout, RowVersion::New)?, NEW_ROW));
    if old.is_some() {
        query = query.cross_join(Source::derived(
            row_contribution(cube, layout, RowVersion::Old)?,
            OLD_ROW,
        ));
    }
    let on = match_levels(layout, EXISTING, NEW_ROW);
    Ok(query.left_join(TableRef::new(&layout.table).with_alias(EXISTING), on))
}

/// The build query evaluated over the trigger row alone.
fn row_contribution(cube: &Cube, layout: &Layout, version: RowVersion) -> CubeResult<Query> {
    let facts = cube.catalog.table(&cube.fact_table)?;
    let row: Vec<SelectExpr> = facts
        .columns
        .iter()
        .map(|c| {
            let field = match version {
                RowVersion::New => new_field(&c.name),
                RowVersion::Old => old_field(&c.name),
            };
            field.alias(&c.name)
        })
        .collect();
    let row_source = Source::derived(Query::new().select(row), &cube.fact_table);

    let mut query = layout.shaped_query(cube)?;
    if query.replace_source(&cube.fact_table, &row_source) == 0 {
        return Err(CubeError::AggregateConstraint(format!(
            "build query of {} does not read {}",
            layout.table, cube.fact_table
        )));
    }
    Ok(query)
}

/// `left.l1 = right.l1 AND ...` over every level column.
fn match_levels(layout: &Layout, left: &str, right: &str) -> Expr {
    layout
        .level_columns()
        .iter()
        .map(|c| table_col(left, c).eq(table_col(right, c)))
        .reduce(|a, b| a.and(b))
        .unwrap_or_else(|| lit_int(1).eq(lit_int(1)))
}

/// PL/pgSQL body: read the accumulated row, update the rollup row in place,
/// insert it when the group is new.
fn procedural_function(name: &str, layout: &Layout, acc: Query) -> CreateFunction {
    let update = Update::table(&layout.table)
        .set_many(
            layout
                .measures
                .iter()
                .map(|(_, c)| c)
                .chain(std::iter::once(&layout.fact_count))
                .map(|c| (c.clone(), table_col(TEMP_ROW, c))),
        )
        .filter(match_levels(layout, &layout.table, TEMP_ROW));
    let columns = layout.columns();
    let insert = Insert::into(&layout.table)
        .columns(columns.clone())
        .values(columns.iter().map(|c| table_col(TEMP_ROW, c)));

    CreateFunction::trigger(name)
        .declare_row(TEMP_ROW, &layout.table)
        .statement(ProcStatement::SelectInto(SelectInto::new(
            TEMP_ROW,
            Source::derived(acc, ACC),
        )))
        .statement(ProcStatement::Update(update))
        .statement(ProcStatement::IfNotFound(vec![ProcStatement::Insert(insert)]))
        .statement(ProcStatement::ReturnNew)
}

/// Inline trigger body: update the rollup row of the group if it exists,
/// then insert it if it does not.
fn inline_body(layout: &Layout, acc: Query) -> Vec<ProcStatement> {
    let from_acc = || Query::new().from(Source::derived(acc.clone(), ACC));

    let update = Update::table(&layout.table)
        .set_many(
            layout
                .measures
                .iter()
                .map(|(_, c)| c)
                .chain(std::iter::once(&layout.fact_count))
                .map(|c| (c.clone(), subquery(from_acc().select(vec![table_col(ACC, c)])))),
        )
        .filter(exists(
            from_acc()
                .select(vec![lit_int(1)])
                .filter(match_levels(layout, ACC, &layout.table)),
            false,
        ));

    let columns = layout.columns();
    let insert = Insert::into(&layout.table)
        .columns(columns.clone())
        .from_select(
            from_acc()
                .select(columns.iter().map(|c| table_col(ACC, c)).collect::<Vec<Expr>>())
                .filter(exists(
                    Query::new()
                        .select(vec![lit_int(1)])
                        .from(TableRef::new(&layout.table))
                        .filter(match_levels(layout, &layout.table, ACC)),
                    true,
                )),
        );

    vec![ProcStatement::Update(update), ProcStatement::Insert(insert)]
}
