//! TOML-based configuration.
//!
//! Every section is optional and falls back to its defaults.
//!
//! Example configuration:
//! ```toml
//! [compiler]
//! max_layers = 10
//! dialect = "postgres"
//!
//! [naming]
//! table_template = "agg_{levels}"
//! level_column = "{dimension}_{level}"
//! fact_count_column = "fact_count"
//! function_template = "trigger_function_{table}"
//! trigger_template = "trigger_{table}"
//! index_template = "idx_{table}_{column}"
//!
//! [connection]
//! path = "${ROLAP_DB}"
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::sql::dialect::Dialect;

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub compiler: CompilerSettings,
    pub naming: NamingSettings,
    pub connection: ConnectionSettings,
}

/// Fragment compiler configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CompilerSettings {
    /// Number of nested SELECT layers after which compilation gives up.
    pub max_layers: usize,

    /// Dialect queries and maintenance DDL are rendered in.
    pub dialect: Dialect,
}

impl Default for CompilerSettings {
    fn default() -> Self {
        Self {
            max_layers: 10,
            dialect: Dialect::Postgres,
        }
    }
}

/// Templates naming rollup tables and their columns, functions and triggers.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct NamingSettings {
    /// Rollup table name; `{levels}` and `{measures}` are replaced by the
    /// underscore-joined level column and measure names.
    pub table_template: String,

    /// Column storing a level; `{dimension}` and `{level}` placeholders.
    pub level_column: String,

    pub fact_count_column: String,

    /// Trigger function name; `{table}` placeholder.
    pub function_template: String,

    /// Trigger name; `{table}` placeholder.
    pub trigger_template: String,

    /// Index name; `{table}` and `{column}` placeholders.
    pub index_template: String,
}

impl Default for NamingSettings {
    fn default() -> Self {
        Self {
            table_template: "agg_{levels}".to_string(),
            level_column: "{dimension}_{level}".to_string(),
            fact_count_column: "fact_count".to_string(),
            function_template: "trigger_function_{table}".to_string(),
            trigger_template: "trigger_{table}".to_string(),
            index_template: "idx_{table}_{column}".to_string(),
        }
    }
}

/// Database connection configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Database file (supports `${ENV_VAR}` expansion); `:memory:` for an
    /// in-memory database.
    pub path: String,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            path: ":memory:".to_string(),
        }
    }
}

impl ConnectionSettings {
    /// The path with environment variables expanded.
    pub fn resolved_path(&self) -> Result<String, SettingsError> {
        expand_env_vars(&self.path)
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate settings from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.compiler.max_layers == 0 {
            return Err(SettingsError::InvalidConfig(
                "compiler.max_layers must be at least 1".into(),
            ));
        }

        let naming = &self.naming;
        let required = [
            ("table_template", &naming.table_template, "{levels}"),
            ("level_column", &naming.level_column, "{level}"),
            ("function_template", &naming.function_template, "{table}"),
            ("trigger_template", &naming.trigger_template, "{table}"),
            ("index_template", &naming.index_template, "{column}"),
        ];
        for (key, template, placeholder) in required {
            if !template.contains(placeholder) {
                return Err(SettingsError::InvalidConfig(format!(
                    "naming.{key} must contain {placeholder}"
                )));
            }
        }
        if naming.fact_count_column.is_empty() {
            return Err(SettingsError::InvalidConfig(
                "naming.fact_count_column must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        let mut var_name = String::new();
        if chars.peek() == Some(&'{') {
            chars.next();
            for ch in chars.by_ref() {
                if ch == '}' {
                    break;
                }
                var_name.push(ch);
            }
        } else {
            while let Some(ch) = chars.next_if(|ch| ch.is_alphanumeric() || *ch == '_') {
                var_name.push(ch);
            }
            if var_name.is_empty() {
                // a lone $
                result.push('$');
                continue;
            }
        }

        let value =
            env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
        result.push_str(&value);
    }

    Ok(result)
}
