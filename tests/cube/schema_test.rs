//! The cube schema against a live database: reflected catalog, member
//! listing, hierarchy navigation and settings.

#[path = "../common/mod.rs"]
mod common;

use common::{cube, executor, COUNTRIES, REGIONS, STORES};
use rolap::config::{ConnectionConfig, Settings};
use rolap::cube::{Metadata, ALL_LEVEL};
use rolap::error::CubeError;
use rolap::exec::{SqliteExecutor, Value};
use rolap::sql::expr::Literal;
use rolap::sql::Dialect;

#[test]
fn test_catalog_is_reflected_with_keys() {
    let executor = executor();
    let cube = cube(&executor);
    let stores = cube.catalog.table("stores").unwrap();
    assert_eq!(stores.primary_key, vec!["store_id".to_string()]);
    assert_eq!(stores.foreign_keys[0].references_table, "countries");

    let path = cube.catalog.find_path("facts", "regions").unwrap();
    assert_eq!(path.len(), 3);
    assert!(cube.catalog.validate().is_ok());
}

#[test]
fn test_members_are_listed_by_id() {
    let executor = executor();
    let cube = cube(&executor);
    let country = cube.level("store", "country").unwrap();

    let members = cube.members(&country, &executor).unwrap();
    let labels: Vec<&str> = members.iter().map(|m| m.label.as_str()).collect();
    let expected: Vec<&str> = COUNTRIES.iter().map(|(_, _, name)| *name).collect();
    assert_eq!(labels, expected);
    assert_eq!(members[0].id, Literal::Int(10));
    assert_eq!(members[0].dimension(), "store");
}

#[test]
fn test_computed_level_members() {
    let executor = executor();
    let cube = cube(&executor);
    let year = cube.level("time", "year").unwrap();
    let members = cube.members(&year, &executor).unwrap();
    let ids: Vec<Literal> = members.into_iter().map(|m| m.id).collect();
    assert_eq!(
        ids,
        vec![
            Literal::String("2022-01-01".into()),
            Literal::String("2023-01-01".into())
        ]
    );
}

#[test]
fn test_children_follow_the_hierarchy() {
    let executor = executor();
    let cube = cube(&executor);
    let region = cube.level("store", "region").unwrap();
    let america = cube
        .member_by_label(&region, "America", &executor)
        .unwrap()
        .unwrap();

    let countries = cube.children(&america, &executor).unwrap();
    let labels: Vec<&str> = countries.iter().map(|m| m.label.as_str()).collect();
    assert_eq!(labels, vec!["USA", "Canada"]);

    let usa = &countries[0];
    let stores = cube.children(usa, &executor).unwrap();
    let expected: Vec<&str> = STORES
        .iter()
        .filter(|(_, c, _)| *c == 10)
        .map(|(_, _, name)| *name)
        .collect();
    let labels: Vec<&str> = stores.iter().map(|m| m.label.as_str()).collect();
    assert_eq!(labels, expected);

    // the finest level has no children
    assert!(cube.children(&stores[0], &executor).unwrap().is_empty());
}

#[test]
fn test_unknown_label_is_none() {
    let executor = executor();
    let cube = cube(&executor);
    let region = cube.level("store", "region").unwrap();
    assert!(cube
        .member_by_label(&region, "Atlantis", &executor)
        .unwrap()
        .is_none());
    assert_eq!(REGIONS.len(), cube.members(&region, &executor).unwrap().len());
}

#[test]
fn test_all_level() {
    let executor = executor();
    let cube = cube(&executor);
    let all = cube.dimension("store").unwrap().all();
    assert!(all.is_all());
    assert_eq!(all.name(), ALL_LEVEL);
    assert!(matches!(
        cube.members(&all, &executor),
        Err(rolap::Error::Cube(CubeError::InvalidCutPoint(_)))
    ));

    // an All axis adds no key column, only the grand total
    let result = cube
        .query()
        .axis(all)
        .measure(cube.measure("Quantity").unwrap())
        .execute(&executor)
        .unwrap();
    assert!(result.is_empty());
    let total: f64 = common::facts().iter().map(|f| f.qty as f64).sum();
    common::assert_close(result.value("Quantity"), total);
}

#[test]
fn test_metadata_is_typed() {
    let executor = executor();
    let cube = cube(&executor).with_metadata(
        Metadata::new()
            .with("currency", "EUR")
            .with("decimals", 2i64)
            .with("public", true),
    );
    assert_eq!(cube.metadata.get_str("currency"), Some("EUR"));
    assert_eq!(cube.metadata.get_int("decimals"), Some(2));
    assert_eq!(cube.metadata.get_bool("public"), Some(true));
    assert_eq!(cube.metadata.get_str("decimals"), None);
}

// ============================================================================
// Settings
// ============================================================================

#[test]
fn test_settings_drive_the_cube() {
    let settings = Settings::from_toml(
        r#"
        [compiler]
        max_layers = 4
        dialect = "sqlite"

        [naming]
        table_template = "rollup_{levels}"

        [connection]
        path = ":memory:"
        "#,
    )
    .unwrap();
    assert_eq!(settings.compiler.max_layers, 4);
    assert_eq!(settings.compiler.dialect, Dialect::Sqlite);
    assert_eq!(settings.naming.fact_count_column, "fact_count");

    let config = ConnectionConfig::from_settings(&settings.connection).unwrap();
    assert!(config.is_memory());
    let executor = SqliteExecutor::open(&config).unwrap();
    assert!(executor.table_names().unwrap().is_empty());

    let fixture = common::executor();
    let cube = cube(&fixture).with_settings(settings.compiler);
    let sql = cube
        .query()
        .axis(cube.level("time", "year").unwrap())
        .measure(cube.measure("Quantity").unwrap())
        .sql()
        .unwrap();
    assert!(sql.contains("STRFTIME('%Y-01-01'"));
}

#[test]
fn test_invalid_settings_are_rejected() {
    assert!(Settings::from_toml("[compiler]\nmax_layers = 0\n").is_err());
    assert!(Settings::from_toml("[naming]\ntable_template = \"agg\"\n").is_err());
}

#[test]
fn test_result_keys_are_values() {
    let executor = executor();
    let cube = cube(&executor);
    let result = cube
        .query()
        .axis(cube.level("store", "country").unwrap())
        .measure(cube.measure("Quantity").unwrap())
        .execute(&executor)
        .unwrap();
    assert_eq!(result.keys()[0], &Value::Int(10));
    assert_eq!(result.get(21i64).unwrap().label, "Germany");
}
