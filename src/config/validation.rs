use super::models::Config;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("rotation.prefix is required")]
    MissingPrefix,

    #[error("rotation.prefix must name a file, not a directory: {0}")]
    PrefixIsDirectory(String),

    #[error("Invalid logging.level '{level}': {reason}")]
    InvalidLogLevel { level: String, reason: String },
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_rotation(config)?;
    validate_logging(config)?;
    Ok(())
}

fn validate_rotation(config: &Config) -> Result<(), ValidationError> {
    let prefix = match &config.rotation.prefix {
        Some(prefix) if !prefix.as_os_str().is_empty() => prefix,
        _ => return Err(ValidationError::MissingPrefix),
    };

    let text = prefix.to_string_lossy();
    if text.ends_with('/') || text.ends_with(std::path::MAIN_SEPARATOR) || prefix.file_name().is_none() {
        return Err(ValidationError::PrefixIsDirectory(text.into_owned()));
    }

    if config.rotation.max_backups == 0 {
        tracing::warn!("rotation.max_backups is 0, the writer default applies");
    }
    if config.rotation.max_size.as_u64() == 0 {
        tracing::warn!("rotation.max_size is 0, the writer default applies");
    }

    Ok(())
}

fn validate_logging(config: &Config) -> Result<(), ValidationError> {
    EnvFilter::try_new(&config.logging.level).map_err(|err| ValidationError::InvalidLogLevel {
        level: config.logging.level.clone(),
        reason: err.to_string(),
    })?;
    Ok(())
}
