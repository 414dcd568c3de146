use crate::humanize::{ByteSize, HumanDuration};
use crate::rotation::{DEFAULT_MAX_AGE, DEFAULT_MAX_BACKUPS, DEFAULT_MAX_SIZE, WriterConfig};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub rotation: RotationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Rotation settings for the managed log file
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RotationConfig {
    /// Path prefix of the active file and archives (required)
    #[serde(default)]
    pub prefix: Option<PathBuf>,
    #[serde(default = "default_max_size")]
    pub max_size: ByteSize,
    #[serde(default = "default_max_backups")]
    pub max_backups: usize,
    #[serde(default = "default_max_age")]
    pub max_age: HumanDuration,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            prefix: None,
            max_size: default_max_size(),
            max_backups: default_max_backups(),
            max_age: default_max_age(),
        }
    }
}

impl RotationConfig {
    /// Writer settings; a missing prefix yields an empty one, which the
    /// writer rejects.
    pub fn to_writer_config(&self) -> WriterConfig {
        WriterConfig {
            prefix: self.prefix.clone().unwrap_or_default(),
            max_size: self.max_size.as_u64(),
            max_backups: self.max_backups,
            max_age: self.max_age.as_duration(),
        }
    }
}

fn default_max_size() -> ByteSize {
    ByteSize(DEFAULT_MAX_SIZE)
}

fn default_max_backups() -> usize {
    DEFAULT_MAX_BACKUPS
}

fn default_max_age() -> HumanDuration {
    HumanDuration(DEFAULT_MAX_AGE)
}

/// Diagnostics of the tool itself (never written into the managed file)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert!(config.rotation.prefix.is_none());
        assert_eq!(config.rotation.max_size.as_u64(), 1024 * 1024);
        assert_eq!(config.rotation.max_backups, 3);
        assert_eq!(config.rotation.max_age.as_duration(), Duration::from_secs(7 * 86400));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_parse_toml() {
        let config: Config = toml::from_str(
            r#"
[rotation]
prefix = "/var/log/app/service"
max_size = "10MB"
max_backups = 5
max_age = "24h"

[logging]
level = "debug"
        "#,
        )
        .unwrap();

        let writer = config.rotation.to_writer_config();
        assert_eq!(writer.prefix, PathBuf::from("/var/log/app/service"));
        assert_eq!(writer.max_size, 10 * 1024 * 1024);
        assert_eq!(writer.max_backups, 5);
        assert_eq!(writer.max_age, Duration::from_secs(86400));
        assert_eq!(config.logging.level, "debug");
    }
}
