//! Naming convention for rollup tables, and reflection of existing ones.

use regex::Regex;
use tracing::{debug, warn};

use crate::config::NamingSettings;
use crate::cube::{Cube, LevelKind, LevelRef, Measure};
use crate::error::{CubeError, CubeResult};
use crate::schema::Table;

use super::Aggregate;

/// Longest identifier Postgres keeps.
const MAX_IDENTIFIER: usize = 63;

/// Generates names for rollup tables, their columns, indexes and triggers
/// from the `[naming]` templates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamingConvention {
    settings: NamingSettings,
}

impl NamingConvention {
    pub fn new(settings: NamingSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &NamingSettings {
        &self.settings
    }

    pub fn level_column(&self, level: &LevelRef) -> String {
        let name = self
            .settings
            .level_column
            .replace("{dimension}", level.dimension())
            .replace("{level}", level.name());
        truncate(sanitize(&name))
    }

    pub fn measure_column(&self, measure: &str) -> String {
        truncate(sanitize(measure))
    }

    pub fn fact_count_column(&self) -> String {
        truncate(sanitize(&self.settings.fact_count_column))
    }

    pub fn table_name(&self, levels: &[LevelRef], measures: &[String]) -> String {
        let levels: Vec<String> = levels.iter().map(|l| self.level_column(l)).collect();
        let measures: Vec<String> = measures.iter().map(|m| self.measure_column(m)).collect();
        let name = self
            .settings
            .table_template
            .replace("{levels}", &levels.join("_"))
            .replace("{measures}", &measures.join("_"));
        truncate(name)
    }

    pub fn function_name(&self, table: &str) -> String {
        truncate(self.settings.function_template.replace("{table}", table))
    }

    pub fn trigger_name(&self, table: &str) -> String {
        truncate(self.settings.trigger_template.replace("{table}", table))
    }

    pub fn index_name(&self, table: &str, column: &str) -> String {
        truncate(
            self.settings
                .index_template
                .replace("{table}", table)
                .replace("{column}", column),
        )
    }

    /// Regex matching every table name the table template can produce.
    pub fn table_pattern(&self) -> CubeResult<Regex> {
        let pattern = regex::escape(&self.settings.table_template)
            .replace(r"\{levels\}", ".+")
            .replace(r"\{measures\}", ".+");
        Regex::new(&format!("^{pattern}$"))
            .map_err(|e| CubeError::InvalidDefinition(format!("table template: {e}")))
    }

    /// Recognize rollup tables of `cube` among `tables`.
    ///
    /// A table qualifies when its name matches the table template and its
    /// columns name at least one level, one measure and the fact count.
    /// Column levels get a logical foreign key to their id column so that
    /// labels can still be joined in.
    pub fn reflect(&self, cube: &Cube, tables: &[Table]) -> CubeResult<Vec<(Aggregate, Table)>> {
        let pattern = self.table_pattern()?;
        let fact_count = self.fact_count_column();

        let mut levels: Vec<(String, LevelRef)> = Vec::new();
        for dimension in &cube.dimensions {
            for level in dimension.levels().into_iter().filter(|l| !l.is_all()) {
                levels.push((self.level_column(&level), level));
            }
        }
        let measures: Vec<(String, String)> = cube
            .measures
            .iter()
            .filter(|m| matches!(m, Measure::Base { .. }))
            .map(|m| (self.measure_column(&m.name()), m.name()))
            .collect();

        let mut found = Vec::new();
        for table in tables.iter().filter(|t| pattern.is_match(&t.name)) {
            let mut aggregate = Aggregate::new(&table.name, &fact_count);
            let mut reflected = table.clone();
            let mut has_fact_count = false;

            for column in &table.columns {
                if column.name == fact_count {
                    has_fact_count = true;
                } else if let Some((_, level)) = levels.iter().find(|(c, _)| *c == column.name) {
                    if aggregate.level_for_dimension(level.dimension()).is_some() {
                        warn!(
                            table = %table.name,
                            column = %column.name,
                            "second level of the same dimension ignored"
                        );
                        continue;
                    }
                    if let LevelKind::Column { id, .. } = &level.level().kind {
                        if !reflected.foreign_keys.iter().any(|fk| fk.column == column.name) {
                            reflected = reflected.foreign_key(&column.name, &id.table, &id.column);
                        }
                    }
                    aggregate = aggregate.with_level(level.clone(), &column.name);
                } else if let Some((_, name)) = measures.iter().find(|(c, _)| *c == column.name) {
                    aggregate = aggregate.with_measure(name, &column.name);
                }
            }

            // the fact count is always one of the measures
            if aggregate.levels.is_empty() || aggregate.measures.len() < 2 || !has_fact_count {
                warn!(
                    table = %table.name,
                    levels = aggregate.levels.len(),
                    measures = aggregate.measures.len() - 1,
                    has_fact_count,
                    "table matches the rollup naming but is not a usable aggregate"
                );
                continue;
            }

            debug!(table = %table.name, levels = aggregate.levels.len(), "reflected aggregate");
            found.push((aggregate, reflected));
        }
        Ok(found)
    }
}

/// Lowercase, anything but ASCII letters and digits replaced by `_`.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

fn truncate(mut name: String) -> String {
    if name.len() > MAX_IDENTIFIER {
        let mut end = MAX_IDENTIFIER;
        while !name.is_char_boundary(end) {
            end -= 1;
        }
        name.truncate(end);
    }
    name
}
