//! Rollup discovery: tables following the naming convention are reflected
//! from the database and registered with the cube.

#[path = "../common/mod.rs"]
mod common;

use common::{assert_close, cube, executor, facts, quantity_by};
use rolap::aggregate::{AggBuilder, NamingConvention, Target};
use rolap::exec::{Executor, SqliteExecutor};
use rolap::schema::Table;
use rolap::sql::Dialect;

fn reflect_all(executor: &SqliteExecutor) -> Vec<Table> {
    executor
        .table_names()
        .unwrap()
        .iter()
        .map(|t| executor.reflect_table(t).unwrap())
        .collect()
}

/// Create the (month, store) rollup in the database without telling the
/// cube about it.
fn create_rollup(executor: &SqliteExecutor) {
    let cube = cube(executor);
    let query = cube
        .query()
        .axis(cube.level("time", "month").unwrap())
        .axis(cube.level("store", "store").unwrap())
        .measure(cube.measure("Quantity").unwrap())
        .measure(cube.measure("Unit Price").unwrap());
    let plan = AggBuilder::new(&cube, &query)
        .unwrap()
        .build(Dialect::Sqlite)
        .unwrap();
    executor.execute_batch(&plan.ddl_script()).unwrap();
}

#[test]
fn test_reflected_rollup_is_registered() {
    let executor = executor();
    create_rollup(&executor);
    let mut cube = cube(&executor);

    let count = cube
        .reflect_aggregates(&NamingConvention::default(), &reflect_all(&executor))
        .unwrap();
    assert_eq!(count, 1);

    let aggregate = &cube.aggregates[0];
    assert_eq!(aggregate.table, "agg_time_month_store_store");
    assert_eq!(aggregate.levels.len(), 2);
    assert!(aggregate.measure_column("Quantity").is_some());
    assert!(aggregate.measure_column("Unit Price").is_some());

    // a logical foreign key lets labels be joined back in
    let table = cube.catalog.table("agg_time_month_store_store").unwrap();
    assert!(table
        .foreign_keys
        .iter()
        .any(|fk| fk.column == "store_store" && fk.references_table == "stores"));
}

#[test]
fn test_queries_use_the_reflected_rollup() {
    let executor = executor();
    create_rollup(&executor);
    let mut cube = cube(&executor);
    cube.reflect_aggregates(&NamingConvention::default(), &reflect_all(&executor))
        .unwrap();

    let query = cube
        .query()
        .axis(cube.level("store", "region").unwrap())
        .measure(cube.measure("Quantity").unwrap());
    assert!(matches!(
        cube.find_best_aggregate(&query.parts()),
        Target::Aggregate(_)
    ));

    let result = query.execute(&executor).unwrap();
    assert_eq!(result.labels(), vec!["America", "Europe"]);
    for (region, quantity) in quantity_by(&facts(), |f| f.region_id()) {
        assert_close(result.get(region).unwrap().value("Quantity"), quantity);
    }
}

#[test]
fn test_unusable_tables_are_skipped() {
    let executor = executor();
    executor
        .execute_batch(
            "CREATE TABLE agg_time_month (time_month TEXT, quantity INTEGER);
             CREATE TABLE agg_store_store (store_store INTEGER, fact_count INTEGER);
             CREATE TABLE aggregates_log (time_month TEXT, quantity INTEGER, fact_count INTEGER);",
        )
        .unwrap();
    let mut cube = cube(&executor);

    let count = cube
        .reflect_aggregates(&NamingConvention::default(), &reflect_all(&executor))
        .unwrap();
    assert_eq!(count, 0);
    assert!(cube.aggregates.is_empty());
}

#[test]
fn test_custom_template_is_honoured() {
    let executor = executor();
    executor
        .execute_batch(
            "CREATE TABLE rollup_by_month (time_month TEXT, quantity INTEGER, fact_count INTEGER);
             CREATE TABLE agg_time_year (time_year TEXT, quantity INTEGER, fact_count INTEGER);",
        )
        .unwrap();
    let mut cube = cube(&executor);
    let naming = NamingConvention::new(rolap::config::NamingSettings {
        table_template: "rollup_{levels}".into(),
        ..Default::default()
    });

    let count = cube
        .reflect_aggregates(&naming, &reflect_all(&executor))
        .unwrap();
    assert_eq!(count, 1);
    assert_eq!(cube.aggregates[0].table, "rollup_by_month");
}
