//! Shared fixture: a small sales star schema in in-memory SQLite.
//!
//! Store dimension: region → country → store. Product dimension:
//! category → product. Time dimension: year → month → day, computed from
//! `facts.date`. Expected values are recomputed in Rust from [`facts`].

#![allow(dead_code)]

use std::collections::BTreeMap;

use rolap::config::CompilerSettings;
use rolap::cube::{Cube, Dimension, Hierarchy, Level, Measure};
use rolap::exec::{Executor, SqliteExecutor};
use rolap::schema::{Catalog, ColumnRef};
use rolap::sql::{Dialect, TimeGrain};

pub const REGIONS: &[(i64, &str)] = &[(1, "America"), (2, "Europe")];

pub const COUNTRIES: &[(i64, i64, &str)] = &[
    (10, 1, "USA"),
    (11, 1, "Canada"),
    (20, 2, "France"),
    (21, 2, "Germany"),
];

pub const STORES: &[(i64, i64, &str)] = &[
    (100, 10, "New York"),
    (101, 10, "Boston"),
    (110, 11, "Toronto"),
    (200, 20, "Paris"),
    (210, 21, "Berlin"),
    (211, 21, "Munich"),
];

pub const CATEGORIES: &[(i64, &str)] = &[(1, "Food"), (2, "Tools")];

pub const PRODUCTS: &[(i64, i64, &str)] = &[(1, 1, "Apple"), (2, 1, "Bread"), (3, 2, "Hammer")];

#[derive(Debug, Clone, PartialEq)]
pub struct Fact {
    pub fact_id: i64,
    pub store_id: i64,
    pub product_id: i64,
    pub date: String,
    pub qty: i64,
    pub price: f64,
}

impl Fact {
    pub fn country_id(&self) -> i64 {
        STORES
            .iter()
            .find(|(id, _, _)| *id == self.store_id)
            .map(|(_, country, _)| *country)
            .unwrap()
    }

    pub fn region_id(&self) -> i64 {
        let country = self.country_id();
        COUNTRIES
            .iter()
            .find(|(id, _, _)| *id == country)
            .map(|(_, region, _)| *region)
            .unwrap()
    }

    /// `YYYY-01-01`, the key of the year level.
    pub fn year(&self) -> String {
        format!("{}-01-01", &self.date[..4])
    }

    /// `YYYY-MM-01`, the key of the month level.
    pub fn month(&self) -> String {
        format!("{}-01", &self.date[..7])
    }

    pub fn insert_sql(&self) -> String {
        format!(
            "INSERT INTO facts (fact_id, store_id, product_id, date, qty, price) \
             VALUES ({}, {}, {}, '{}', {}, {})",
            self.fact_id, self.store_id, self.product_id, self.date, self.qty, self.price
        )
    }
}

/// Thirty deterministic facts over two years. Fact 1 sells 5 units.
pub fn facts() -> Vec<Fact> {
    (0..30)
        .map(|i: i64| Fact {
            fact_id: i + 1,
            store_id: STORES[(i % 6) as usize].0,
            product_id: 1 + i % 3,
            date: format!(
                "{}-{:02}-{:02}",
                2022 + i % 2,
                1 + (i * 5) % 12,
                1 + (i * 3) % 28
            ),
            qty: 1 + (i * 7 + 4) % 9,
            price: 1.0 + (i % 4) as f64 * 0.5,
        })
        .collect()
}

const SCHEMA: &str = "
CREATE TABLE regions (region_id INTEGER PRIMARY KEY, name TEXT);
CREATE TABLE countries (
    country_id INTEGER PRIMARY KEY,
    region_id INTEGER REFERENCES regions (region_id),
    name TEXT
);
CREATE TABLE stores (
    store_id INTEGER PRIMARY KEY,
    country_id INTEGER REFERENCES countries (country_id),
    name TEXT
);
CREATE TABLE categories (category_id INTEGER PRIMARY KEY, name TEXT);
CREATE TABLE products (
    product_id INTEGER PRIMARY KEY,
    category_id INTEGER REFERENCES categories (category_id),
    name TEXT
);
CREATE TABLE facts (
    fact_id INTEGER PRIMARY KEY,
    store_id INTEGER REFERENCES stores (store_id),
    product_id INTEGER REFERENCES products (product_id),
    date DATE,
    qty INTEGER,
    price REAL
);
";

/// In-memory database with the schema and every fixture row loaded.
pub fn executor() -> SqliteExecutor {
    let executor = SqliteExecutor::in_memory().unwrap();
    let mut script = String::from(SCHEMA);
    for (id, name) in REGIONS {
        script.push_str(&format!("INSERT INTO regions VALUES ({id}, '{name}');\n"));
    }
    for (id, region, name) in COUNTRIES {
        script.push_str(&format!(
            "INSERT INTO countries VALUES ({id}, {region}, '{name}');\n"
        ));
    }
    for (id, country, name) in STORES {
        script.push_str(&format!(
            "INSERT INTO stores VALUES ({id}, {country}, '{name}');\n"
        ));
    }
    for (id, name) in CATEGORIES {
        script.push_str(&format!("INSERT INTO categories VALUES ({id}, '{name}');\n"));
    }
    for (id, category, name) in PRODUCTS {
        script.push_str(&format!(
            "INSERT INTO products VALUES ({id}, {category}, '{name}');\n"
        ));
    }
    for fact in facts() {
        script.push_str(&fact.insert_sql());
        script.push_str(";\n");
    }
    executor.execute_batch(&script).unwrap();
    executor
}

/// The catalog as reflected from the database.
pub fn catalog(executor: &SqliteExecutor) -> Catalog {
    let tables = ["regions", "countries", "stores", "categories", "products", "facts"]
        .into_iter()
        .map(|t| executor.reflect_table(t).unwrap());
    Catalog::with_tables(tables)
}

pub fn cube(executor: &SqliteExecutor) -> Cube {
    let store = Dimension::new(
        "store",
        vec![Hierarchy::new(
            "default",
            vec![
                Level::column("region", ColumnRef::new("regions", "region_id"))
                    .with_label(ColumnRef::new("regions", "name")),
                Level::column("country", ColumnRef::new("countries", "country_id"))
                    .with_label(ColumnRef::new("countries", "name")),
                Level::column("store", ColumnRef::new("stores", "store_id"))
                    .with_label(ColumnRef::new("stores", "name")),
            ],
        )],
    )
    .unwrap();
    let product = Dimension::new(
        "product",
        vec![Hierarchy::new(
            "default",
            vec![
                Level::column("category", ColumnRef::new("categories", "category_id"))
                    .with_label(ColumnRef::new("categories", "name")),
                Level::column("product", ColumnRef::new("products", "product_id"))
                    .with_label(ColumnRef::new("products", "name")),
            ],
        )],
    )
    .unwrap();
    let date = ColumnRef::new("facts", "date");
    let time = Dimension::new(
        "time",
        vec![Hierarchy::new(
            "default",
            vec![
                Level::computed("year", date.clone(), TimeGrain::Year),
                Level::computed("month", date.clone(), TimeGrain::Month),
                Level::computed("day", date, TimeGrain::Day),
            ],
        )],
    )
    .unwrap();

    Cube::new("sales", "facts", catalog(executor))
        .with_settings(CompilerSettings {
            dialect: Dialect::Sqlite,
            ..CompilerSettings::default()
        })
        .with_dimension(store)
        .with_dimension(product)
        .with_dimension(time)
        .with_measure(Measure::sum("Quantity", ColumnRef::new("facts", "qty").expr()))
        .with_measure(Measure::avg(
            "Unit Price",
            ColumnRef::new("facts", "price").expr(),
        ))
}

/// Sum of `qty` per key.
pub fn quantity_by<K: Ord>(facts: &[Fact], key: impl Fn(&Fact) -> K) -> BTreeMap<K, f64> {
    let mut out = BTreeMap::new();
    for fact in facts {
        *out.entry(key(fact)).or_insert(0.0) += fact.qty as f64;
    }
    out
}

/// Mean of `price` per key.
pub fn mean_price_by<K: Ord>(facts: &[Fact], key: impl Fn(&Fact) -> K) -> BTreeMap<K, f64> {
    let mut sums: BTreeMap<K, (f64, f64)> = BTreeMap::new();
    for fact in facts {
        let entry = sums.entry(key(fact)).or_insert((0.0, 0.0));
        entry.0 += fact.price;
        entry.1 += 1.0;
    }
    sums.into_iter().map(|(k, (s, n))| (k, s / n)).collect()
}

pub fn assert_close(actual: Option<f64>, expected: f64) {
    let actual = actual.expect("value is NULL");
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}

/// Check that `sql` parses in `dialect`.
pub fn validate_sql(sql: &str, dialect: Dialect) {
    use sqlparser::dialect::{PostgreSqlDialect, SQLiteDialect};
    use sqlparser::parser::Parser;

    let result = match dialect {
        Dialect::Sqlite => Parser::parse_sql(&SQLiteDialect {}, sql),
        _ => Parser::parse_sql(&PostgreSqlDialect {}, sql),
    };
    if let Err(e) = result {
        panic!("invalid SQL for {dialect}: {e}\n{sql}");
    }
}

/// Check that every grouped SELECT in `sql`, derived tables included, only
/// selects and sorts on grouped expressions or aggregates, as Postgres
/// requires.
pub fn assert_grouping_valid(sql: &str) {
    use sqlparser::ast::{Expr, GroupByExpr, Query, SelectItem, SetExpr, Statement, TableFactor};
    use sqlparser::dialect::PostgreSqlDialect;
    use sqlparser::parser::Parser;

    fn aggregated(expr: &Expr) -> bool {
        let text = expr.to_string().to_uppercase();
        ["SUM(", "AVG(", "COUNT(", "MIN(", "MAX(", " OVER "]
            .iter()
            .any(|f| text.contains(f))
    }

    fn check(query: &Query, sql: &str) {
        let SetExpr::Select(select) = query.body.as_ref() else {
            return;
        };
        for table in &select.from {
            let factors = std::iter::once(&table.relation)
                .chain(table.joins.iter().map(|j| &j.relation));
            for factor in factors {
                if let TableFactor::Derived { subquery, .. } = factor {
                    check(subquery, sql);
                }
            }
        }

        let keys: Vec<String> = match &select.group_by {
            GroupByExpr::Expressions(exprs, _) => exprs.iter().map(|e| e.to_string()).collect(),
            GroupByExpr::All(_) => return,
        };
        let selected: Vec<&Expr> = select
            .projection
            .iter()
            .filter_map(|item| match item {
                SelectItem::UnnamedExpr(expr) | SelectItem::ExprWithAlias { expr, .. } => {
                    Some(expr)
                }
                _ => None,
            })
            .collect();
        if keys.is_empty() && !selected.iter().any(|e| aggregated(e)) {
            return;
        }

        let sorted = query
            .order_by
            .iter()
            .flat_map(|o| o.exprs.iter().map(|e| &e.expr));
        for expr in selected.into_iter().chain(sorted) {
            let valid = aggregated(expr)
                || matches!(expr, Expr::Value(_))
                || keys.contains(&expr.to_string());
            assert!(valid, "{expr} is neither grouped nor aggregated:\n{sql}");
        }
    }

    let statements = Parser::parse_sql(&PostgreSqlDialect {}, sql)
        .unwrap_or_else(|e| panic!("invalid SQL: {e}\n{sql}"));
    for statement in &statements {
        if let Statement::Query(query) = statement {
            check(query, sql);
        }
    }
}
