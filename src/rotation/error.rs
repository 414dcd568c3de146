use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WriterError {
    #[error("Invalid writer config: {0}")]
    Config(String),

    #[error("Failed to {action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to compress into {}: {source}", path.display())]
    Compression {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Writer is closed")]
    Closed,

    #[error("Writer faulted by an earlier failure: {0}")]
    Faulted(String),

    #[error("Failed to format archive timestamp: {0}")]
    Timestamp(#[from] time::error::Format),

    #[error("Rotation worker unavailable: {0}")]
    WorkerUnavailable(String),

    #[error("{primary} (cleanup of {} also failed: {cleanup})", path.display())]
    Cleanup {
        primary: Box<WriterError>,
        path: PathBuf,
        cleanup: Box<WriterError>,
    },
}

impl WriterError {
    /// Build a closure that wraps an `io::Error` with the failed action and path.
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| WriterError::Io {
            action,
            path,
            source,
        }
    }
}

impl From<WriterError> for io::Error {
    fn from(err: WriterError) -> Self {
        let kind = match &err {
            WriterError::Io { source, .. } | WriterError::Compression { source, .. } => {
                source.kind()
            }
            WriterError::Closed => io::ErrorKind::BrokenPipe,
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}

pub type Result<T> = std::result::Result<T, WriterError>;
