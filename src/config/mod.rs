//! Configuration module.
//!
//! Handles compiler, naming and connection settings and environment
//! variables.

mod connection;
mod settings;

pub use connection::{ConnectionConfig, MEMORY};
pub use settings::{
    expand_env_vars, CompilerSettings, ConnectionSettings, NamingSettings, Settings,
    SettingsError,
};
