//! Database connection configuration.
//!
//! Supports configuration via environment variables:
//! - `ROLAP_DB_PATH`: SQLite database file, `:memory:` when unset

use std::env;

use super::settings::{ConnectionSettings, SettingsError};

pub const MEMORY: &str = ":memory:";

/// Where the SQLite executor opens its database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub path: String,
}

impl ConnectionConfig {
    pub fn memory() -> Self {
        Self {
            path: MEMORY.to_string(),
        }
    }

    pub fn file(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    /// From the `[connection]` settings section, expanding `${VAR}`s.
    pub fn from_settings(settings: &ConnectionSettings) -> Result<Self, SettingsError> {
        let path = settings.resolved_path()?;
        if path.is_empty() {
            return Err(SettingsError::InvalidConfig(
                "connection.path must not be empty".into(),
            ));
        }
        Ok(Self { path })
    }

    /// From `ROLAP_DB_PATH`, in memory when unset.
    pub fn from_env() -> Self {
        match env::var("ROLAP_DB_PATH") {
            Ok(path) if !path.is_empty() => Self { path },
            _ => Self::memory(),
        }
    }

    pub fn is_memory(&self) -> bool {
        self.path == MEMORY
    }
}
