//! Rollup planning: eager validation of the defining query and the DDL
//! emitted per dialect.

#[path = "../common/mod.rs"]
mod common;

use common::{cube, executor, validate_sql};
use rolap::aggregate::{AggBuilder, NamingConvention};
use rolap::config::NamingSettings;
use rolap::cube::{Measure, OperandExt, OrderClause};
use rolap::error::CubeError;
use rolap::exec::Executor;
use rolap::schema::ColumnRef;
use rolap::sql::{DataType, Dialect};

fn assert_constraint<T: std::fmt::Debug>(result: Result<T, CubeError>) {
    assert!(
        matches!(result, Err(CubeError::AggregateConstraint(_))),
        "expected an aggregate constraint error, got {result:?}"
    );
}

// ============================================================================
// Validation
// ============================================================================

#[test]
fn test_rejects_filtered_and_ordered_queries() {
    let cube = cube(&executor());
    let month = cube.level("time", "month").unwrap();
    let quantity = cube.measure("Quantity").unwrap();
    let base = cube.query().axis(month.clone()).measure(quantity.clone());

    assert_constraint(AggBuilder::new(&cube, &base.filter(quantity.clone().gt(3i64))));
    assert_constraint(AggBuilder::new(&cube, &base.order_by(OrderClause::asc(month))));
}

#[test]
fn test_rejects_non_cube_measures() {
    let cube = cube(&executor());
    let quantity = cube.measure("Quantity").unwrap();
    let base = cube.query().axis(cube.level("time", "month").unwrap());

    let computed = quantity.clone().mul(cube.measure("Unit Price").unwrap());
    assert_constraint(AggBuilder::new(&cube, &base.measure(computed)));

    let renamed = Measure::sum("Other", ColumnRef::new("facts", "qty").expr());
    assert_constraint(AggBuilder::new(&cube, &base.measure(renamed)));

    let redefined = Measure::max("Quantity", ColumnRef::new("facts", "qty").expr());
    assert_constraint(AggBuilder::new(&cube, &base.measure(redefined)));
}

#[test]
fn test_rejects_member_axes_and_missing_levels() {
    let executor = executor();
    let cube = cube(&executor);
    let region = cube.level("store", "region").unwrap();
    let europe = cube
        .member_by_label(&region, "Europe", &executor)
        .unwrap()
        .unwrap();
    let quantity = cube.measure("Quantity").unwrap();

    assert_constraint(AggBuilder::new(
        &cube,
        &cube.query().slice(europe).measure(quantity.clone()),
    ));
    assert_constraint(AggBuilder::new(&cube, &cube.query().measure(quantity.clone())));
    assert_constraint(AggBuilder::new(
        &cube,
        &cube
            .query()
            .axis(cube.dimension("time").unwrap().all())
            .measure(quantity),
    ));
}

#[test]
fn test_accepts_plain_rollups() {
    let cube = cube(&executor());
    let query = cube
        .query()
        .axis(cube.level("time", "month").unwrap())
        .axis(cube.level("product", "category").unwrap())
        .measure(cube.measure("Quantity").unwrap())
        .measure(cube.measure(rolap::cube::FACT_COUNT).unwrap());
    assert!(AggBuilder::new(&cube, &query).is_ok());
}

// ============================================================================
// DDL
// ============================================================================

#[test]
fn test_postgres_ddl() {
    let cube = cube(&executor());
    let query = cube
        .query()
        .axis(cube.level("time", "month").unwrap())
        .axis(cube.level("store", "store").unwrap())
        .measure(cube.measure("Quantity").unwrap());
    let plan = AggBuilder::new(&cube, &query)
        .unwrap()
        .build(Dialect::Postgres)
        .unwrap();

    let table = "agg_time_month_store_store";
    assert_eq!(plan.table.name, table);
    assert!(plan.triggers.is_empty());

    let script = plan.ddl_script();
    assert!(script.starts_with(&format!("CREATE TABLE \"{table}\" AS")));
    assert!(script.contains(&format!(
        "ALTER TABLE \"{table}\" ADD CONSTRAINT \"{table}_pkey\" PRIMARY KEY (\"time_month\", \"store_store\")"
    )));
    assert!(script.contains("REFERENCES \"stores\" (\"store_id\")"));
    assert!(script.contains(&format!(
        "CREATE INDEX \"idx_{table}_time_month\" ON \"{table}\" (\"time_month\")"
    )));
    for statement in script.split(";\n\n") {
        validate_sql(statement.trim_end_matches(';'), Dialect::Postgres);
    }

    // the catalog entry keeps keys and types
    assert_eq!(
        plan.table.primary_key,
        vec!["time_month".to_string(), "store_store".to_string()]
    );
    assert_eq!(plan.table.foreign_keys.len(), 1);
    assert_eq!(
        plan.table.get_column("time_month").unwrap().data_type,
        DataType::Date
    );
    assert_eq!(
        plan.table.get_column("fact_count").unwrap().data_type,
        DataType::Int64
    );

    assert_eq!(plan.aggregate.levels.len(), 2);
    assert!(plan.aggregate.measure_column("Quantity").is_some());
}

#[test]
fn test_sqlite_skips_constraints_but_keeps_foreign_keys() {
    let cube = cube(&executor());
    let query = cube
        .query()
        .axis(cube.level("store", "country").unwrap())
        .measure(cube.measure("Unit Price").unwrap());
    let plan = AggBuilder::new(&cube, &query)
        .unwrap()
        .build(Dialect::Sqlite)
        .unwrap();

    let script = plan.ddl_script();
    assert!(!script.contains("ALTER TABLE"));
    assert!(script.contains("CREATE INDEX"));
    assert_eq!(plan.table.foreign_keys.len(), 1);
    assert_eq!(plan.table.foreign_keys[0].references_table, "countries");
}

#[test]
fn test_custom_naming_and_table_name() {
    let cube = cube(&executor());
    let query = cube
        .query()
        .axis(cube.level("time", "year").unwrap())
        .measure(cube.measure("Unit Price").unwrap());
    let naming = NamingConvention::new(NamingSettings {
        table_template: "rollup_{levels}".into(),
        fact_count_column: "n".into(),
        ..NamingSettings::default()
    });

    let plan = AggBuilder::new(&cube, &query)
        .unwrap()
        .naming(naming.clone())
        .build(Dialect::Sqlite)
        .unwrap();
    assert_eq!(plan.table.name, "rollup_time_year");
    assert!(plan.table.has_column("n"));
    assert!(plan.table.has_column("unit_price"));

    let plan = AggBuilder::new(&cube, &query)
        .unwrap()
        .naming(naming)
        .table_name("yearly")
        .build(Dialect::Sqlite)
        .unwrap();
    assert_eq!(plan.table.name, "yearly");
}

#[test]
fn test_installed_rollup_holds_the_rolled_up_rows() {
    let executor = executor();
    let mut cube = cube(&executor);
    let plan = {
        let query = cube
            .query()
            .axis(cube.level("store", "region").unwrap())
            .measure(cube.measure("Quantity").unwrap());
        AggBuilder::new(&cube, &query)
            .unwrap()
            .build(Dialect::Sqlite)
            .unwrap()
    };
    let table = plan.table.name.clone();
    cube.install(plan, &executor).unwrap();

    assert!(cube.catalog.contains(&table));
    assert_eq!(cube.aggregates.len(), 1);

    let rows = executor
        .fetch(&format!(
            "SELECT store_region, quantity, fact_count FROM {table} ORDER BY store_region"
        ))
        .unwrap();
    assert_eq!(rows.len(), 2);
    let facts = common::facts();
    for row in &rows {
        let region = row.get("store_region").unwrap().as_i64().unwrap();
        let mine: Vec<_> = facts.iter().filter(|f| f.region_id() == region).collect();
        assert_eq!(
            row.get_f64("quantity").unwrap(),
            Some(mine.iter().map(|f| f.qty as f64).sum())
        );
        assert_eq!(row.get_f64("fact_count").unwrap(), Some(mine.len() as f64));
    }
}
