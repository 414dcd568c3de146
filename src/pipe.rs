use rotalog::rotation::{Writer, WriterConfig};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Copy stdin into the rotating writer until EOF or a shutdown signal.
///
/// Every line is one write, so a line never spans two files.
pub async fn run(config: WriterConfig) -> Result<(), AnyError> {
    let writer = Arc::new(Writer::new(config)?);
    info!(path = %writer.active_path().display(), "Piping stdin into log file");

    let mut reader = BufReader::new(tokio::io::stdin());
    let mut line = Vec::with_capacity(4096);

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        line.clear();
        tokio::select! {
            read = reader.read_until(b'\n', &mut line) => {
                if read? == 0 {
                    break;
                }
                writer.write(&line)?;
            }
            _ = &mut shutdown => {
                // keep whatever part of a line was already read
                if !line.is_empty() {
                    writer.write(&line)?;
                }
                break;
            }
        }
    }

    let closing = Arc::clone(&writer);
    tokio::task::spawn_blocking(move || closing.close()).await??;

    let metrics = writer.metrics();
    info!(
        bytes = metrics.bytes_written,
        rotations = metrics.rotations,
        archives = metrics.archives_created,
        "Log file closed"
    );
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
