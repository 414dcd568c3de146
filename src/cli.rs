use clap::{Parser, Subcommand};
use rotalog::config::{ByteSize, Config, ConfigError, HumanDuration};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "rotalog")]
#[command(about = "Rotating, compressing log file writer", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Copy stdin line by line into a rotating log file
    Pipe(PipeArgs),
    /// List the archives kept for a prefix, oldest first
    List(ListArgs),
}

#[derive(clap::Args, Debug)]
pub struct SourceArgs {
    /// Configuration file (defaults to $ROTALOG_CONFIG, then config/rotalog.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Path prefix of the log files, e.g. /var/log/app/service
    #[arg(long)]
    pub prefix: Option<PathBuf>,
}

impl SourceArgs {
    /// Load the layered configuration and apply the prefix override.
    pub fn load(&self) -> Result<Config, ConfigError> {
        let mut config = match &self.config {
            Some(path) => Config::load_from_path(path.clone())?,
            None => Config::load()?,
        };
        if let Some(prefix) = &self.prefix {
            config.rotation.prefix = Some(prefix.clone());
        }
        Ok(config)
    }
}

#[derive(clap::Args, Debug)]
pub struct PipeArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Rotate once the active file would exceed this size (e.g. 10MB)
    #[arg(long)]
    pub max_size: Option<ByteSize>,

    /// Number of archives to keep
    #[arg(long)]
    pub max_backups: Option<usize>,

    /// Remove archives older than this (e.g. 7d, 24h)
    #[arg(long)]
    pub max_age: Option<HumanDuration>,
}

impl PipeArgs {
    pub fn load(&self) -> Result<Config, ConfigError> {
        let mut config = self.source.load()?;
        if let Some(max_size) = self.max_size {
            config.rotation.max_size = max_size;
        }
        if let Some(max_backups) = self.max_backups {
            config.rotation.max_backups = max_backups;
        }
        if let Some(max_age) = self.max_age {
            config.rotation.max_age = max_age;
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    pub source: SourceArgs,
}

impl ListArgs {
    pub fn load(&self) -> Result<Config, ConfigError> {
        let config = self.source.load()?;
        config.validate()?;
        Ok(config)
    }
}
