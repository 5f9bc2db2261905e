//! Layered compilation: composed and relative measures, post-aggregation
//! filters, the layer bound and SQL validity across dialects.

#[path = "../common/mod.rs"]
mod common;

use common::{
    assert_close, assert_grouping_valid, cube, executor, facts, quantity_by, validate_sql,
};
use rolap::config::CompilerSettings;
use rolap::cube::{Measure, OperandExt, OrderClause};
use rolap::error::CubeError;
use rolap::sql::Dialect;

// ============================================================================
// Composed measures
// ============================================================================

#[test]
fn test_percent_of_region() {
    let executor = executor();
    let cube = cube(&executor);
    let region = cube.level("store", "region").unwrap();
    let quantity = cube.measure("Quantity").unwrap();
    let share = quantity.clone().percent_over([region.clone()]).label("Share");

    let query = cube
        .query()
        .axis(region)
        .axis(cube.level("store", "country").unwrap())
        .measure(quantity)
        .measure(share);
    validate_sql(&query.sql().unwrap(), Dialect::Sqlite);
    let result = query.execute(&executor).unwrap();

    for region in result.nodes() {
        let total = region.value("Quantity").unwrap();
        let mut shares = 0.0;
        for country in &region.children {
            let share = country.value("Share").unwrap();
            assert_close(Some(share), country.value("Quantity").unwrap() / total * 100.0);
            shares += share;
        }
        assert!((shares - 100.0).abs() < 1e-6);
    }
}

#[test]
fn test_measure_over_a_measure_needs_two_layers() {
    let executor = executor();
    let cube = cube(&executor);
    let quantity = cube.measure("Quantity").unwrap();
    let per_fact = quantity
        .div(cube.measure(rolap::cube::FACT_COUNT).unwrap())
        .label("Per Fact");

    let query = cube
        .query()
        .axis(cube.level("store", "region").unwrap())
        .measure(per_fact);
    let result = query.execute(&executor).unwrap();

    for (region, quantity) in quantity_by(&facts(), |f| f.region_id()) {
        let count = facts().iter().filter(|f| f.region_id() == region).count() as f64;
        assert_close(result.get(region).unwrap().value("Per Fact"), quantity / count);
    }
}

#[test]
fn test_post_aggregation_filter() {
    let executor = executor();
    let cube = cube(&executor);
    let quantity = cube.measure("Quantity").unwrap();
    let by_store = quantity_by(&facts(), |f| f.store_id);
    let threshold = 26.0;

    let query = cube
        .query()
        .axis(cube.level("store", "store").unwrap())
        .measure(quantity.clone())
        .filter(quantity.gt(threshold).post());
    let sql = query.sql().unwrap();
    validate_sql(&sql, Dialect::Sqlite);

    let result = query.execute(&executor).unwrap();
    let expected: Vec<i64> = by_store
        .iter()
        .filter(|(_, q)| **q > threshold)
        .map(|(s, _)| *s)
        .collect();
    let actual: Vec<i64> = result.keys().iter().map(|k| k.as_i64().unwrap()).collect();
    assert_eq!(actual, expected);
}

#[test]
fn test_row_filter_on_a_level() {
    let executor = executor();
    let cube = cube(&executor);
    let category = cube.level("product", "category").unwrap();
    let result = cube
        .query()
        .axis(cube.level("store", "region").unwrap())
        .measure(cube.measure("Quantity").unwrap())
        .filter(category.eq(2i64))
        .execute(&executor)
        .unwrap();

    let tools: Vec<_> = facts().into_iter().filter(|f| f.product_id == 3).collect();
    let expected = quantity_by(&tools, |f| f.region_id());
    assert_close(result.value("Quantity"), expected.values().sum());
}

#[test]
fn test_order_by_measure_descending() {
    let executor = executor();
    let cube = cube(&executor);
    let quantity = cube.measure("Quantity").unwrap();
    let result = cube
        .query()
        .axis(cube.level("store", "country").unwrap())
        .measure(quantity.clone())
        .order_by(OrderClause::desc(quantity))
        .execute(&executor)
        .unwrap();
    let values: Vec<f64> = result
        .nodes()
        .iter()
        .map(|n| n.value("Quantity").unwrap())
        .collect();
    assert!(values.windows(2).all(|w| w[0] >= w[1]));
}

#[test]
fn test_level_or_measure_filter() {
    let executor = executor();
    let cube = cube(&executor);
    let region = cube.level("store", "region").unwrap();
    let quantity = cube.measure("Quantity").unwrap();
    let threshold = 30.0;

    let query = cube
        .query()
        .axis(cube.level("store", "country").unwrap())
        .measure(quantity.clone())
        .filter(region.eq(1i64).or(quantity.gt(threshold)));
    assert_grouping_valid(&query.sql_for(Dialect::Postgres).unwrap());

    let facts = facts();
    let expected: Vec<i64> = quantity_by(&facts, |f| f.country_id())
        .into_iter()
        .filter(|(country, q)| {
            *q > threshold || facts.iter().any(|f| f.country_id() == *country && f.region_id() == 1)
        })
        .map(|(country, _)| country)
        .collect();
    assert_eq!(expected, vec![10, 11, 21]);

    let result = query.execute(&executor).unwrap();
    let actual: Vec<i64> = result.keys().iter().map(|k| k.as_i64().unwrap()).collect();
    assert_eq!(actual, expected);
}

#[test]
fn test_post_filter_on_a_level() {
    let executor = executor();
    let cube = cube(&executor);
    let region = cube.level("store", "region").unwrap();
    let query = cube
        .query()
        .axis(cube.level("store", "country").unwrap())
        .measure(cube.measure("Quantity").unwrap())
        .filter(region.eq(2i64).post());
    assert_grouping_valid(&query.sql_for(Dialect::Postgres).unwrap());

    let result = query.execute(&executor).unwrap();
    let actual: Vec<i64> = result.keys().iter().map(|k| k.as_i64().unwrap()).collect();
    assert_eq!(actual, vec![20, 21]);
    let europe: Vec<_> = facts().into_iter().filter(|f| f.region_id() == 2).collect();
    assert_close(result.value("Quantity"), europe.iter().map(|f| f.qty as f64).sum());
}

#[test]
fn test_level_next_to_a_measure_must_be_on_an_axis() {
    let executor = executor();
    let cube = cube(&executor);
    let quantity = cube.measure("Quantity").unwrap();
    let query = cube
        .query()
        .axis(cube.level("store", "region").unwrap())
        .measure(quantity.clone())
        .filter(cube.level("store", "store").unwrap().eq(100i64).or(quantity.gt(10i64)));
    assert!(matches!(query.compile(), Err(CubeError::InvalidCutPoint(_))));
}

#[test]
fn test_order_by_a_coarser_level() {
    let executor = executor();
    let cube = cube(&executor);
    let region = cube.level("store", "region").unwrap();
    let query = cube
        .query()
        .axis(cube.level("store", "store").unwrap())
        .measure(cube.measure("Quantity").unwrap())
        .order_by(OrderClause::desc(region));
    let sql = query.sql_for(Dialect::Postgres).unwrap();
    assert_grouping_valid(&sql);
    let group_by = &sql[sql.find("GROUP BY").unwrap()..];
    assert!(group_by.contains("\"regions\".\"region_id\""));

    let result = query.execute(&executor).unwrap();
    assert_eq!(result.len(), common::STORES.len());
    let regions: Vec<i64> = result
        .keys()
        .iter()
        .map(|k| {
            let store = k.as_i64().unwrap();
            facts().iter().find(|f| f.store_id == store).unwrap().region_id()
        })
        .collect();
    assert!(regions.windows(2).all(|w| w[0] >= w[1]));
    assert_eq!(regions[0], 2);
}

#[test]
fn test_order_by_a_coarser_level_after_a_measure_filter() {
    let executor = executor();
    let cube = cube(&executor);
    let quantity = cube.measure("Quantity").unwrap();
    let query = cube
        .query()
        .axis(cube.level("store", "store").unwrap())
        .measure(quantity.clone())
        .filter(quantity.gt(8i64).post())
        .order_by(OrderClause::asc(cube.level("store", "region").unwrap()));
    assert_grouping_valid(&query.sql_for(Dialect::Postgres).unwrap());

    let result = query.execute(&executor).unwrap();
    let by_store = quantity_by(&facts(), |f| f.store_id);
    assert_eq!(
        result.len(),
        by_store.values().filter(|q| **q > 8.0).count()
    );
    let regions: Vec<i64> = result
        .keys()
        .iter()
        .map(|k| {
            let store = k.as_i64().unwrap();
            facts().iter().find(|f| f.store_id == store).unwrap().region_id()
        })
        .collect();
    assert!(regions.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn test_order_by_a_finer_level_is_rejected() {
    let executor = executor();
    let cube = cube(&executor);
    let query = cube
        .query()
        .axis(cube.level("store", "region").unwrap())
        .measure(cube.measure("Quantity").unwrap())
        .order_by(OrderClause::desc(cube.level("store", "store").unwrap()));
    assert!(matches!(query.compile(), Err(CubeError::InvalidCutPoint(_))));
    assert!(query.sql().is_err());
}

#[test]
fn test_grouped_selects_are_valid() {
    let executor = executor();
    let cube = cube(&executor);
    let region = cube.level("store", "region").unwrap();
    let year = cube.level("time", "year").unwrap();
    let quantity = cube.measure("Quantity").unwrap();
    let base = cube.query().axis(region.clone()).axis(year.clone());

    let queries = [
        base.measure(quantity.clone())
            .measure(cube.measure("Unit Price").unwrap()),
        base.measure(quantity.clone().percent_over([region.clone()])),
        base.measure(quantity.clone())
            .order_by(OrderClause::desc(quantity.clone())),
        base.measure(quantity.clone())
            .order_by(OrderClause::asc(year.clone())),
        base.measure(quantity.clone())
            .top(1, quantity.clone(), vec![region.clone()]),
        cube.query()
            .axis(cube.level("store", "country").unwrap())
            .measure(quantity.clone())
            .filter(quantity.clone().gt(20i64).post())
            .order_by(OrderClause::desc(region)),
    ];
    for query in &queries {
        assert_grouping_valid(&query.sql_for(Dialect::Postgres).unwrap());
    }
}

// ============================================================================
// Bounds and dialects
// ============================================================================

#[test]
fn test_layer_bound_is_enforced() {
    let executor = executor();
    let cube = cube(&executor).with_settings(CompilerSettings {
        max_layers: 1,
        ..CompilerSettings::default()
    });
    let quantity = cube.measure("Quantity").unwrap();
    let query = cube
        .query()
        .axis(cube.level("time", "month").unwrap())
        .measure(quantity.clone())
        .top(3, quantity, vec![]);
    assert!(matches!(
        query.compile(),
        Err(CubeError::NonConvergent { layers: 1 })
    ));
}

#[test]
fn test_queries_parse_in_every_dialect() {
    let executor = executor();
    let cube = cube(&executor);
    let region = cube.level("store", "region").unwrap();
    let quantity = cube.measure("Quantity").unwrap();
    let query = cube
        .query()
        .axis(region.clone())
        .axis(cube.level("time", "year").unwrap())
        .measure(quantity.clone())
        .measure(cube.measure("Unit Price").unwrap())
        .measure(quantity.clone().over([region]))
        .order_by(OrderClause::desc(quantity))
        .limit(5);

    for dialect in [Dialect::Postgres, Dialect::DuckDb, Dialect::Sqlite] {
        let sql = query.sql_for(dialect).unwrap();
        validate_sql(&sql, dialect);
    }
}

#[test]
fn test_constant_measure_is_not_grouped() {
    let executor = executor();
    let cube = cube(&executor);
    let doubled = cube
        .measure("Quantity")
        .unwrap()
        .mul(Measure::from(2i64))
        .label("Double");
    let query = cube
        .query()
        .axis(cube.level("store", "region").unwrap())
        .measure(doubled);
    validate_sql(&query.sql().unwrap(), Dialect::Sqlite);

    let result = query.execute(&executor).unwrap();
    let total: f64 = facts().iter().map(|f| f.qty as f64).sum();
    assert_close(result.value("Double"), total * 2.0);
}
