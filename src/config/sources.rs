use super::models::Config;
use config::{ConfigError, Environment, File};
use std::env;
use std::path::PathBuf;

const CONFIG_ENV_VAR: &str = "ROTALOG_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/rotalog.toml";
const ENV_PREFIX: &str = "ROTALOG";
const ENV_SEPARATOR: &str = "__";

/// Path of the configuration file: `ROTALOG_CONFIG` or the default location
pub fn default_path() -> PathBuf {
    env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Load configuration with priority (lowest to highest):
/// 1. Defaults (embedded in structs)
/// 2. TOML file (if exists)
/// 3. Environment variables from .env file (via dotenvy)
/// 4. System environment variables
pub fn load() -> Result<Config, ConfigError> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    load_from_sources(default_path())
}

/// Load configuration from a specific path and the environment
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!("Loading configuration from: {}", config_path.display());
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::debug!(
            "Configuration file not found at {}, using defaults and environment overrides",
            config_path.display()
        );
    }

    // ROTALOG__ROTATION__MAX_SIZE -> rotation.max_size
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_load_defaults_only() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.toml");

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.rotation.max_backups, 3);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("rotalog.toml");

        fs::write(
            &config_path,
            r#"
[rotation]
prefix = "logs/worker"
max_size = "256KB"
max_backups = 7
max_age = "2d"
        "#,
        )
        .unwrap();

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.rotation.prefix, Some(PathBuf::from("logs/worker")));
        assert_eq!(config.rotation.max_size.as_u64(), 256 * 1024);
        assert_eq!(config.rotation.max_backups, 7);
        assert_eq!(config.rotation.max_age.as_duration(), Duration::from_secs(2 * 86400));
    }

    #[test]
    fn test_numeric_values_accepted() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("rotalog.toml");

        fs::write(
            &config_path,
            r#"
[rotation]
prefix = "app"
max_size = 4096
max_age = 3600
        "#,
        )
        .unwrap();

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.rotation.max_size.as_u64(), 4096);
        assert_eq!(config.rotation.max_age.as_duration(), Duration::from_secs(3600));
    }
}
