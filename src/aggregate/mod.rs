//! Rollup aggregates.
//!
//! An [`Aggregate`] is a pre-computed table storing measures rolled up to one
//! level per dimension. This module holds the registry type, the navigator
//! choosing which table a query reads from, the naming convention used to
//! create and rediscover rollup tables, the builder emitting their DDL, and
//! the generator of triggers keeping them in sync with the fact table.

mod builder;
mod maintenance;
mod naming;
mod navigator;

pub use builder::{AggBuilder, AggregatePlan};
pub use naming::NamingConvention;
pub use navigator::{find_best, Target};

use crate::cube::{LevelRef, Part, FACT_COUNT};
use crate::schema::ColumnRef;

/// A rollup table registered with a cube.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    pub table: String,
    /// Stored level per dimension and the column holding its id.
    pub levels: Vec<(LevelRef, ColumnRef)>,
    /// Stored measures by cube measure name, `FACT_COUNT` included.
    pub measures: Vec<(String, ColumnRef)>,
    pub fact_count: ColumnRef,
}

impl Aggregate {
    pub fn new(table: impl Into<String>, fact_count: impl Into<String>) -> Self {
        let table = table.into();
        let fact_count = ColumnRef::new(&table, fact_count);
        Self {
            measures: vec![(FACT_COUNT.to_string(), fact_count.clone())],
            levels: Vec::new(),
            table,
            fact_count,
        }
    }

    pub fn with_level(mut self, level: LevelRef, column: impl Into<String>) -> Self {
        let column = ColumnRef::new(&self.table, column);
        self.levels.push((level.declared(), column));
        self
    }

    pub fn with_measure(mut self, name: impl Into<String>, column: impl Into<String>) -> Self {
        let column = ColumnRef::new(&self.table, column);
        self.measures.push((name.into(), column));
        self
    }

    pub fn level_for_dimension(&self, dimension: &str) -> Option<&(LevelRef, ColumnRef)> {
        self.levels.iter().find(|(l, _)| l.dimension() == dimension)
    }

    pub fn measure_column(&self, name: &str) -> Option<&ColumnRef> {
        self.measures
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, column)| column)
    }

    /// Fitness of this aggregate for a query made of `parts`.
    ///
    /// -100 as soon as one part cannot be served. Otherwise the sum of the
    /// part scores plus `0.3^depth` for each stored level whose dimension the
    /// query does not touch, so less detailed leftovers win.
    pub fn score(&self, parts: &[Part]) -> f64 {
        let mut total = 0.0;
        for part in parts {
            let score = part.score(self);
            if score < 0.0 {
                return -100.0;
            }
            total += score;
        }

        let mut touched = Vec::new();
        for part in parts {
            part.dimensions(&mut touched);
        }
        for (level, _) in &self.levels {
            if !touched.iter().any(|d| d == level.dimension()) {
                total += 0.3f64.powi(level.depth() as i32);
            }
        }
        total
    }
}
