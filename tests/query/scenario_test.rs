//! End-to-end query scenarios against the SQLite fixture: fact-table
//! fallback, rollup navigation and top-n ranking.

#[path = "../common/mod.rs"]
mod common;

use common::{assert_close, cube, executor, facts, mean_price_by, quantity_by, validate_sql};
use rolap::aggregate::{AggBuilder, Target};
use rolap::cube::Cube;
use rolap::exec::{SqliteExecutor, Value};
use rolap::sql::Dialect;

const ROLLUP: &str = "agg_time_month_store_store";

/// The fixture cube with a (month, store) rollup of both measures installed.
fn cube_with_rollup(executor: &SqliteExecutor) -> Cube {
    let mut cube = cube(executor);
    let plan = {
        let query = cube
            .query()
            .axis(cube.level("time", "month").unwrap())
            .axis(cube.level("store", "store").unwrap())
            .measure(cube.measure("Unit Price").unwrap())
            .measure(cube.measure("Quantity").unwrap());
        AggBuilder::new(&cube, &query)
            .unwrap()
            .build(Dialect::Sqlite)
            .unwrap()
    };
    assert_eq!(plan.table.name, ROLLUP);
    cube.install(plan, executor).unwrap();
    cube
}

/// Months whose quantity has a dense rank of at most `n`.
fn top_months(n: usize) -> Vec<String> {
    let by_month = quantity_by(&facts(), |f| f.month());
    let mut distinct: Vec<f64> = by_month.values().copied().collect();
    distinct.sort_by(|a, b| b.partial_cmp(a).unwrap());
    distinct.dedup();
    distinct.truncate(n);
    by_month
        .into_iter()
        .filter(|(_, q)| distinct.contains(q))
        .map(|(m, _)| m)
        .collect()
}

// ============================================================================
// Fact-table fallback
// ============================================================================

#[test]
fn test_region_totals_from_the_fact_table() {
    let executor = executor();
    let cube = cube(&executor);
    let query = cube
        .query()
        .axis(cube.level("store", "region").unwrap())
        .measure(cube.measure("Quantity").unwrap());

    let sql = query.sql().unwrap();
    validate_sql(&sql, Dialect::Sqlite);
    assert!(sql.contains("FROM \"facts\""));

    let result = query.execute(&executor).unwrap();
    assert_eq!(result.labels(), vec!["America", "Europe"]);

    let expected = quantity_by(&facts(), |f| f.region_id());
    for (region, quantity) in &expected {
        assert_close(result.get(*region).unwrap().value("Quantity"), *quantity);
    }
    assert_close(result.value("Quantity"), expected.values().sum());
}

#[test]
fn test_day_is_too_fine_for_the_rollup() {
    let executor = executor();
    let cube = cube_with_rollup(&executor);
    let query = cube
        .query()
        .axis(cube.level("time", "day").unwrap())
        .measure(cube.measure("Quantity").unwrap());

    assert_eq!(cube.find_best_aggregate(&query.parts()), Target::Cube);
    let sql = query.sql().unwrap();
    assert!(sql.contains("FROM \"facts\""));
    assert!(!sql.contains(ROLLUP));

    let result = query.execute(&executor).unwrap();
    let expected = quantity_by(&facts(), |f| f.date.clone());
    assert_eq!(result.len(), expected.len());
    for (day, quantity) in &expected {
        assert_close(result.get(day.as_str()).unwrap().value("Quantity"), *quantity);
    }
}

#[test]
fn test_nested_axes_subtotal_each_level() {
    let executor = executor();
    let cube = cube(&executor);
    let result = cube
        .query()
        .axis(cube.level("store", "region").unwrap())
        .axis(cube.level("product", "category").unwrap())
        .measure(cube.measure("Quantity").unwrap())
        .execute(&executor)
        .unwrap();

    let europe = result.by_label("Europe").unwrap();
    assert_eq!(europe.labels(), vec!["Food", "Tools"]);
    let expected = quantity_by(&facts(), |f| f.region_id());
    assert_close(europe.value("Quantity"), expected[&2]);
}

// ============================================================================
// Rollup navigation
// ============================================================================

#[test]
fn test_year_query_reads_the_rollup() {
    let executor = executor();
    let cube = cube_with_rollup(&executor);
    let query = cube
        .query()
        .axis(cube.level("time", "year").unwrap())
        .measure(cube.measure("Quantity").unwrap())
        .measure(cube.measure("Unit Price").unwrap());

    match cube.find_best_aggregate(&query.parts()) {
        Target::Aggregate(aggregate) => {
            assert_eq!(aggregate.table, ROLLUP);
            assert!(aggregate.score(&query.parts()) > 0.0);
        }
        Target::Cube => panic!("expected the rollup to be chosen"),
    }

    let sql = query.sql().unwrap();
    validate_sql(&sql, Dialect::Sqlite);
    assert!(sql.contains(ROLLUP));
    assert!(!sql.contains("FROM \"facts\""));

    let result = query.execute(&executor).unwrap();
    let quantities = quantity_by(&facts(), |f| f.year());
    let prices = mean_price_by(&facts(), |f| f.year());
    assert_eq!(result.len(), 2);
    for (year, quantity) in &quantities {
        let node = result.get(year.as_str()).unwrap();
        assert_close(node.value("Quantity"), *quantity);
        // weighted by the fact count of each rolled-up month
        assert_close(node.value("Unit Price"), prices[year]);
    }
}

#[test]
fn test_rollup_and_fact_table_agree() {
    let executor = executor();
    let plain = cube(&executor);
    let rolled = cube_with_rollup(&executor);

    let run = |cube: &Cube| {
        cube.query()
            .axis(cube.level("store", "country").unwrap())
            .axis(cube.level("time", "month").unwrap())
            .measure(cube.measure("Quantity").unwrap())
            .measure(cube.measure("Unit Price").unwrap())
            .execute(&executor)
            .unwrap()
    };
    let expected = run(&plain);
    let actual = run(&rolled);

    assert_eq!(actual.keys(), expected.keys());
    for country in expected.nodes() {
        let other = actual.get(country.key.clone()).unwrap();
        assert_eq!(other.keys(), country.keys());
        assert_close(other.value("Quantity"), country.value("Quantity").unwrap());
        assert_close(other.value("Unit Price"), country.value("Unit Price").unwrap());
    }
}

// ============================================================================
// Top n
// ============================================================================

fn assert_top_months(cube: &Cube, executor: &SqliteExecutor) {
    let quantity = cube.measure("Quantity").unwrap();
    let query = cube
        .query()
        .axis(cube.level("time", "month").unwrap())
        .measure(quantity.clone())
        .top(3, quantity, vec![]);
    validate_sql(&query.sql().unwrap(), Dialect::Sqlite);

    let result = query.execute(executor).unwrap();
    let mut keys: Vec<String> = result
        .keys()
        .into_iter()
        .map(|k| k.as_str().unwrap().to_string())
        .collect();

    // ranked order is kept
    let values: Vec<f64> = result
        .nodes()
        .iter()
        .map(|n| n.value("Quantity").unwrap())
        .collect();
    assert!(values.windows(2).all(|w| w[0] >= w[1]));

    keys.sort();
    assert_eq!(keys, top_months(3));
}

#[test]
fn test_top_months_from_the_fact_table() {
    let executor = executor();
    let cube = cube(&executor);
    assert_top_months(&cube, &executor);
}

#[test]
fn test_top_months_through_the_rollup() {
    let executor = executor();
    let cube = cube_with_rollup(&executor);
    let query = cube
        .query()
        .axis(cube.level("time", "month").unwrap())
        .measure(cube.measure("Quantity").unwrap());
    assert!(matches!(
        cube.find_best_aggregate(&query.parts()),
        Target::Aggregate(_)
    ));
    assert_top_months(&cube, &executor);
}

#[test]
fn test_top_store_per_region() {
    let executor = executor();
    let cube = cube(&executor);
    let region = cube.level("store", "region").unwrap();
    let quantity = cube.measure("Quantity").unwrap();
    let result = cube
        .query()
        .axis(region.clone())
        .axis(cube.level("store", "store").unwrap())
        .measure(quantity.clone())
        .top(1, quantity, vec![region])
        .execute(&executor)
        .unwrap();

    let by_store = quantity_by(&facts(), |f| f.store_id);
    for (region_id, _) in common::REGIONS {
        let stores: Vec<(i64, f64)> = by_store
            .iter()
            .filter(|(store, _)| {
                facts()
                    .iter()
                    .any(|f| f.store_id == **store && f.region_id() == *region_id)
            })
            .map(|(s, q)| (*s, *q))
            .collect();
        let best = stores.iter().map(|(_, q)| *q).fold(f64::MIN, f64::max);
        let expected: Vec<Value> = stores
            .iter()
            .filter(|(_, q)| *q == best)
            .map(|(s, _)| Value::Int(*s))
            .collect();

        let node = result.get(*region_id).unwrap();
        let actual: Vec<Value> = node.keys().into_iter().cloned().collect();
        assert_eq!(actual, expected);
    }
}

// ============================================================================
// Slicing
// ============================================================================

#[test]
fn test_member_slice_restricts_the_facts() {
    let executor = executor();
    let cube = cube(&executor);
    let region = cube.level("store", "region").unwrap();
    let europe = cube
        .member_by_label(&region, "Europe", &executor)
        .unwrap()
        .unwrap();

    let result = cube
        .query()
        .slice(europe)
        .axis(cube.level("time", "year").unwrap())
        .measure(cube.measure("Quantity").unwrap())
        .execute(&executor)
        .unwrap();

    let european: Vec<_> = facts().into_iter().filter(|f| f.region_id() == 2).collect();
    let expected = quantity_by(&european, |f| f.year());
    for (year, quantity) in &expected {
        assert_close(result.get(year.as_str()).unwrap().value("Quantity"), *quantity);
    }
}

#[test]
fn test_filter_members_is_a_disjunction() {
    let executor = executor();
    let cube = cube(&executor);
    let country = cube.level("store", "country").unwrap();
    let members = cube.members(&country, &executor).unwrap();
    let picked: Vec<_> = members
        .into_iter()
        .filter(|m| m.label == "USA" || m.label == "France")
        .collect();

    let result = cube
        .query()
        .axis(country)
        .measure(cube.measure("Quantity").unwrap())
        .filter_members(picked)
        .unwrap()
        .execute(&executor)
        .unwrap();
    assert_eq!(result.labels(), vec!["USA", "France"]);
}

#[test]
fn test_limit_and_offset() {
    let executor = executor();
    let cube = cube(&executor);
    let result = cube
        .query()
        .axis(cube.level("store", "store").unwrap())
        .measure(cube.measure("Quantity").unwrap())
        .order_by(rolap::cube::OrderClause::asc(cube.level("store", "store").unwrap()))
        .limit(2)
        .offset(1)
        .execute(&executor)
        .unwrap();
    assert_eq!(result.keys(), vec![&Value::Int(101), &Value::Int(110)]);
}
