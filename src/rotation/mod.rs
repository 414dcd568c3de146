//! Rotating, compressing log file writer
//!
//! The [`Writer`] appends raw bytes to `<prefix>.log`. When a write would
//! push the file past `max_size`, the current content is sealed into
//! `<prefix>-<UTC timestamp>.log.gz` and the active file starts empty again.
//! Every rotation first applies the retention policy:
//!
//! - archives older than `max_age` are removed
//! - the oldest archives are removed until `max_backups - 1` remain
//!
//! Triggered rotations compress on a background worker so writers are never
//! blocked on gzip. [`Writer::close`] waits for them and seals the remaining
//! bytes synchronously.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use rotalog::rotation::{Writer, WriterConfig};
//!
//! let writer = Writer::new(WriterConfig::builder().prefix("logs/app").build())?;
//! writer.write(b"service started\n")?;
//! writer.close()?;
//! # Ok::<(), rotalog::rotation::WriterError>(())
//! ```

pub mod archive;
pub mod clock;
pub mod error;
pub mod name;
pub mod retention;
pub mod writer;

pub use archive::{ArchiveSink, write_archive};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Result, WriterError};
pub use retention::{ArchiveEntry, PruneStats, RetentionPolicy};
pub use writer::{
    DEFAULT_MAX_AGE, DEFAULT_MAX_BACKUPS, DEFAULT_MAX_SIZE, FailureHook, Writer, WriterConfig,
};
