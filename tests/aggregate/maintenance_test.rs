//! Trigger maintenance: a rollup kept current by insert and update triggers
//! must match the same rollup rebuilt from scratch.

#[path = "../common/mod.rs"]
mod common;

use common::{cube, executor, Fact};
use rolap::aggregate::AggBuilder;
use rolap::cube::{Cube, Measure};
use rolap::error::CubeError;
use rolap::exec::{Executor, Row, SqliteExecutor, Value};
use rolap::schema::ColumnRef;
use rolap::sql::Dialect;

const ROLLUP: &str = "agg_time_month_store_store";
const COLUMNS: &str = "time_month, store_store, quantity, unit_price, fact_count";

fn maintained_cube(executor: &SqliteExecutor) -> Cube {
    let mut cube = cube(executor);
    let plan = AggBuilder::new(&cube, &rollup_query(&cube))
        .unwrap()
        .with_triggers(true)
        .build(Dialect::Sqlite)
        .unwrap();
    assert_eq!(plan.triggers.len(), 2);
    cube.install(plan, executor).unwrap();
    cube
}

fn rollup_query(cube: &Cube) -> rolap::Query<'_> {
    cube.query()
        .axis(cube.level("time", "month").unwrap())
        .axis(cube.level("store", "store").unwrap())
        .measure(cube.measure("Quantity").unwrap())
        .measure(cube.measure("Unit Price").unwrap())
}

fn rows(executor: &SqliteExecutor, table: &str) -> Vec<Row> {
    executor
        .fetch(&format!(
            "SELECT {COLUMNS} FROM {table} ORDER BY time_month, store_store"
        ))
        .unwrap()
}

fn group(executor: &SqliteExecutor, month: &str, store: i64) -> Row {
    executor
        .fetch(&format!(
            "SELECT {COLUMNS} FROM {ROLLUP} WHERE time_month = '{month}' AND store_store = {store}"
        ))
        .unwrap()
        .into_iter()
        .next()
        .expect("group is missing")
}

/// Row-by-row equality of two rollups of [`rollup_query`]. Averages are
/// compared with a tolerance.
fn assert_same_rows(maintained: &[Row], rebuilt: &[Row]) {
    assert_eq!(maintained.len(), rebuilt.len());
    for (m, r) in maintained.iter().zip(rebuilt) {
        assert_eq!(m.get("time_month"), r.get("time_month"));
        assert_eq!(m.get("store_store"), r.get("store_store"));
        for column in ["quantity", "fact_count"] {
            assert_eq!(m.get_f64(column).unwrap(), r.get_f64(column).unwrap());
        }
        let (a, b) = (
            m.get_f64("unit_price").unwrap().unwrap(),
            r.get_f64("unit_price").unwrap().unwrap(),
        );
        assert!((a - b).abs() < 1e-9, "unit price {a} != {b}");
    }
}

/// Build the same rollup under another name and compare it row by row with
/// the maintained one.
fn assert_matches_rebuild(cube: &Cube, executor: &SqliteExecutor) {
    let fresh = AggBuilder::new(cube, &rollup_query(cube))
        .unwrap()
        .table_name("agg_fresh")
        .build(Dialect::Sqlite)
        .unwrap();
    executor.execute_batch(&fresh.ddl_script()).unwrap();
    assert_same_rows(&rows(executor, ROLLUP), &rows(executor, "agg_fresh"));
    executor.execute_batch("DROP TABLE agg_fresh").unwrap();
}

fn new_fact(fact_id: i64, store_id: i64, date: &str, qty: i64, price: f64) -> Fact {
    Fact {
        fact_id,
        store_id,
        product_id: 1,
        date: date.into(),
        qty,
        price,
    }
}

#[test]
fn test_inserts_match_a_rebuild() {
    let executor = executor();
    let cube = maintained_cube(&executor);

    // an existing group, then a new one
    let inserted = [
        Fact {
            fact_id: 100,
            store_id: 100,
            product_id: 1,
            date: "2022-01-20".into(),
            qty: 4,
            price: 3.5,
        },
        Fact {
            fact_id: 101,
            store_id: 211,
            product_id: 2,
            date: "2024-06-10".into(),
            qty: 9,
            price: 2.0,
        },
        Fact {
            fact_id: 102,
            store_id: 211,
            product_id: 3,
            date: "2024-06-11".into(),
            qty: 1,
            price: 4.0,
        },
    ];
    for fact in &inserted {
        executor.execute_batch(&fact.insert_sql()).unwrap();
    }

    let new_group = group(&executor, "2024-06-01", 211);
    assert_eq!(new_group.get_f64("quantity").unwrap(), Some(10.0));
    assert_eq!(new_group.get_f64("fact_count").unwrap(), Some(2.0));
    assert_eq!(new_group.get_f64("unit_price").unwrap(), Some(3.0));

    assert_matches_rebuild(&cube, &executor);
}

#[test]
fn test_update_applies_the_delta() {
    let executor = executor();
    let cube = maintained_cube(&executor);
    let fact = common::facts().into_iter().next().unwrap();
    assert_eq!(fact.qty, 5);

    let before = group(&executor, &fact.month(), fact.store_id);
    executor
        .execute_batch(&format!(
            "UPDATE facts SET qty = 8 WHERE fact_id = {}",
            fact.fact_id
        ))
        .unwrap();
    let after = group(&executor, &fact.month(), fact.store_id);

    let quantity = |row: &Row| row.get_f64("quantity").unwrap().unwrap();
    assert_eq!(quantity(&after), quantity(&before) + 3.0);
    assert_eq!(
        after.get_f64("fact_count").unwrap(),
        before.get_f64("fact_count").unwrap()
    );
    let price = |row: &Row| row.get_f64("unit_price").unwrap().unwrap();
    assert!((price(&after) - price(&before)).abs() < 1e-9);

    assert_matches_rebuild(&cube, &executor);
}

#[test]
fn test_queries_see_maintained_values() {
    let executor = executor();
    let cube = maintained_cube(&executor);
    let query = cube
        .query()
        .axis(cube.level("time", "year").unwrap())
        .measure(cube.measure("Quantity").unwrap());
    let before = query.execute(&executor).unwrap().value("Quantity").unwrap();

    let fact = Fact {
        fact_id: 200,
        store_id: 110,
        product_id: 1,
        date: "2023-03-03".into(),
        qty: 6,
        price: 1.0,
    };
    executor.execute_batch(&fact.insert_sql()).unwrap();

    let sql = query.sql().unwrap();
    assert!(sql.contains(ROLLUP));
    let after = query.execute(&executor).unwrap();
    assert_eq!(after.value("Quantity"), Some(before + 6.0));
}

#[test]
fn test_postgres_trigger_functions() {
    let cube = cube(&executor());
    let plan = AggBuilder::new(&cube, &rollup_query(&cube))
        .unwrap()
        .with_triggers(true)
        .build(Dialect::Postgres)
        .unwrap();

    let script = plan.trigger_script();
    assert_eq!(plan.triggers.len(), 4);
    assert!(script.contains(&format!(
        "CREATE OR REPLACE FUNCTION \"trigger_function_ins_{ROLLUP}\"() RETURNS TRIGGER"
    )));
    assert!(script.contains(&format!(
        "CREATE TRIGGER \"trigger_upd_{ROLLUP}\" BEFORE UPDATE ON \"facts\" FOR EACH ROW \
         EXECUTE PROCEDURE \"trigger_function_upd_{ROLLUP}\"()"
    )));
    assert!(script.contains("NEW.\"qty\""));
    assert!(script.contains("OLD.\"qty\""));
    assert!(script.contains("IF NOT FOUND THEN"));
    assert!(script.contains("$$ LANGUAGE plpgsql"));
}

#[test]
fn test_measures_without_accumulator_are_rejected() {
    let executor = executor();
    let cube = cube(&executor).with_measure(Measure::base(
        "Raw",
        ColumnRef::new("facts", "qty").expr(),
        rolap::cube::Aggregator::Identity,
    ));
    let query = cube
        .query()
        .axis(cube.level("time", "month").unwrap())
        .measure(cube.measure("Raw").unwrap());
    let builder = AggBuilder::new(&cube, &query).unwrap().with_triggers(true);

    assert!(builder.build(Dialect::Sqlite).is_err());
    assert!(matches!(
        builder.build(Dialect::Postgres),
        Err(CubeError::AggregationContract { .. })
    ));
    // without triggers the table can still be planned
    assert!(builder.with_triggers(false).build(Dialect::Sqlite).is_ok());
}

#[test]
fn test_update_to_the_same_value_changes_nothing() {
    let executor = executor();
    let cube = maintained_cube(&executor);
    let before = rows(&executor, ROLLUP);

    executor.execute_batch("UPDATE facts SET qty = qty").unwrap();
    executor
        .execute_batch("UPDATE facts SET price = price WHERE store_id = 100")
        .unwrap();

    assert_same_rows(&rows(&executor, ROLLUP), &before);
    assert_matches_rebuild(&cube, &executor);
}

#[test]
fn test_min_and_max_match_a_rebuild() {
    const EXTREMES: &str = "time_month, store_store, min_qty, max_qty, fact_count";
    let executor = executor();
    let mut cube = cube(&executor)
        .with_measure(Measure::min("Min Qty", ColumnRef::new("facts", "qty").expr()))
        .with_measure(Measure::max("Max Qty", ColumnRef::new("facts", "qty").expr()));
    fn extremes_query(cube: &Cube) -> rolap::Query<'_> {
        cube.query()
            .axis(cube.level("time", "month").unwrap())
            .axis(cube.level("store", "store").unwrap())
            .measure(cube.measure("Min Qty").unwrap())
            .measure(cube.measure("Max Qty").unwrap())
    }
    let plan = AggBuilder::new(&cube, &extremes_query(&cube))
        .unwrap()
        .with_triggers(true)
        .build(Dialect::Sqlite)
        .unwrap();
    cube.install(plan, &executor).unwrap();

    // the existing group holds 5, 8 and 2; the second group is new
    let inserted = [
        new_fact(100, 100, "2022-01-15", 1, 1.0),
        new_fact(101, 100, "2022-01-16", 9, 1.0),
        new_fact(102, 100, "2022-01-17", 6, 1.0),
        new_fact(103, 211, "2024-06-10", 7, 1.0),
        new_fact(104, 211, "2024-06-11", 4, 1.0),
    ];
    for fact in &inserted {
        executor.execute_batch(&fact.insert_sql()).unwrap();
    }

    let select = |table: &str| {
        executor
            .fetch(&format!(
                "SELECT {EXTREMES} FROM {table} ORDER BY time_month, store_store"
            ))
            .unwrap()
    };
    let maintained = select(ROLLUP);
    let existing = maintained
        .iter()
        .find(|r| {
            r.get("time_month") == Some(&Value::Text("2022-01-01".into()))
                && r.get("store_store") == Some(&Value::Int(100))
        })
        .unwrap();
    assert_eq!(existing.get_f64("min_qty").unwrap(), Some(1.0));
    assert_eq!(existing.get_f64("max_qty").unwrap(), Some(9.0));
    assert_eq!(existing.get_f64("fact_count").unwrap(), Some(6.0));

    let fresh = AggBuilder::new(&cube, &extremes_query(&cube))
        .unwrap()
        .table_name("agg_fresh")
        .build(Dialect::Sqlite)
        .unwrap();
    executor.execute_batch(&fresh.ddl_script()).unwrap();
    let rebuilt = select("agg_fresh");
    assert_eq!(maintained.len(), rebuilt.len());
    for (m, r) in maintained.iter().zip(&rebuilt) {
        assert_eq!(m.get("time_month"), r.get("time_month"));
        assert_eq!(m.get("store_store"), r.get("store_store"));
        for column in ["min_qty", "max_qty", "fact_count"] {
            assert_eq!(m.get_f64(column).unwrap(), r.get_f64(column).unwrap());
        }
    }
}

#[test]
fn test_inserts_one_at_a_time_match_one_batch() {
    let inserted: Vec<Fact> = (0..5)
        .map(|i| {
            let date = format!("2025-02-{:02}", 1 + i);
            new_fact(300 + i, 100, &date, 1 + i * 2, 0.5 * i as f64)
        })
        .collect();

    let one_by_one = executor();
    let _cube = maintained_cube(&one_by_one);
    for fact in &inserted {
        one_by_one.execute_batch(&fact.insert_sql()).unwrap();
    }

    let batched = executor();
    let cube = maintained_cube(&batched);
    let values: Vec<String> = inserted
        .iter()
        .map(|f| {
            format!(
                "({}, {}, {}, '{}', {}, {})",
                f.fact_id, f.store_id, f.product_id, f.date, f.qty, f.price
            )
        })
        .collect();
    batched
        .execute_batch(&format!(
            "INSERT INTO facts (fact_id, store_id, product_id, date, qty, price) VALUES {}",
            values.join(", ")
        ))
        .unwrap();

    let row = group(&batched, "2025-02-01", 100);
    let quantity: i64 = inserted.iter().map(|f| f.qty).sum();
    let price = inserted.iter().map(|f| f.price).sum::<f64>() / inserted.len() as f64;
    assert_eq!(row.get_f64("quantity").unwrap(), Some(quantity as f64));
    assert_eq!(row.get_f64("fact_count").unwrap(), Some(inserted.len() as f64));
    let unit_price = row.get_f64("unit_price").unwrap().unwrap();
    assert!((unit_price - price).abs() < 1e-9, "unit price {unit_price} != {price}");

    assert_same_rows(&rows(&one_by_one, ROLLUP), &rows(&batched, ROLLUP));
    assert_matches_rebuild(&cube, &batched);
}
