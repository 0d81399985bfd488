//! Configuration for the depot package index server.
//!
//! Settings are read from a TOML file (see [`config::config_path`]), completed
//! with defaults and overridden by `DEPOT_*` environment variables.

pub mod annotations;
pub mod config;
pub mod error;
pub mod utils;

#[cfg(test)]
pub mod test_utils;

pub use config::{config_path, generate_default_config, Config};
pub use error::{ConfigError, Result};
