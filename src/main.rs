mod cli;
mod list;
mod pipe;

use clap::Parser;
use cli::{Cli, Commands};
use rotalog::observability;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let log_level = observability::init_tracing("info");

    let cli = Cli::parse();

    match cli.command {
        Commands::Pipe(args) => {
            let config = args.load()?;
            log_level.set(&config.logging.level);
            pipe::run(config.rotation.to_writer_config()).await?
        }
        Commands::List(args) => {
            let config = args.load()?;
            log_level.set(&config.logging.level);
            let prefix = config.rotation.to_writer_config().prefix;
            list::run(&prefix)?
        }
    }

    Ok(())
}
