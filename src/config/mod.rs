//! Configuration for the `rotalog` command-line front end
//!
//! Settings are layered from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use rotalog::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! let writer = rotalog::Writer::new(config.rotation.to_writer_config());
//! ```
//!
//! # Environment Variables
//!
//! Any value can be overridden with `ROTALOG__<section>__<key>`:
//! - `ROTALOG__ROTATION__PREFIX=/var/log/app/service`
//! - `ROTALOG__ROTATION__MAX_SIZE=10MB`
//! - `ROTALOG__ROTATION__MAX_AGE=24h`
//! - `ROTALOG__LOGGING__LEVEL=debug`
//!
//! # Configuration File
//!
//! Loaded from `config/rotalog.toml` unless `ROTALOG_CONFIG` points elsewhere.

mod models;
mod sources;
mod validation;

pub use crate::humanize::{ByteSize, HumanDuration};
pub use models::{Config, LoggingConfig, RotationConfig};
pub use sources::default_path;
pub use validation::ValidationError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    pub fn load() -> Result<Self, ConfigError> {
        Ok(sources::load()?)
    }

    /// Load configuration from a specific path plus the environment
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        Ok(sources::load_from_sources(path)?)
    }

    /// Check the configuration once command-line overrides are applied.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validation::validate(self)?;
        Ok(())
    }
}
