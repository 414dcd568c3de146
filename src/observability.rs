//! Observability: writer counters and tracing setup

use std::sync::atomic::{AtomicU64, Ordering};

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry, fmt, reload};

/// Counters recorded by a [`crate::rotation::Writer`]
#[derive(Debug, Default)]
pub struct Metrics {
    bytes_written: AtomicU64,
    rotations: AtomicU64,
    archives_created: AtomicU64,
    archives_expired: AtomicU64,
    archives_capped: AtomicU64,
    rotation_failures: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bytes_written(&self, n: u64) {
        self.bytes_written.fetch_add(n, Ordering::Relaxed);
    }

    pub fn rotation_started(&self) {
        self.rotations.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "rotations", "Metric incremented");
    }

    pub fn archive_created(&self) {
        self.archives_created.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "archives_created", "Metric incremented");
    }

    pub fn archives_pruned(&self, expired: usize, capped: usize) {
        self.archives_expired.fetch_add(expired as u64, Ordering::Relaxed);
        self.archives_capped.fetch_add(capped as u64, Ordering::Relaxed);
    }

    pub fn rotation_failed(&self) {
        self.rotation_failures.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "rotation_failures", "Metric incremented");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            rotations: self.rotations.load(Ordering::Relaxed),
            archives_created: self.archives_created.load(Ordering::Relaxed),
            archives_expired: self.archives_expired.load(Ordering::Relaxed),
            archives_capped: self.archives_capped.load(Ordering::Relaxed),
            rotation_failures: self.rotation_failures.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub bytes_written: u64,
    pub rotations: u64,
    pub archives_created: u64,
    pub archives_expired: u64,
    pub archives_capped: u64,
    pub rotation_failures: u64,
}

/// Handle to the installed log filter
#[derive(Clone)]
pub struct LogLevel(reload::Handle<EnvFilter, Registry>);

impl LogLevel {
    /// Switch to `level`, unless `RUST_LOG` is set.
    pub fn set(&self, level: &str) {
        if let Err(err) = self.0.reload(env_filter(level)) {
            tracing::warn!(error = %err, level, "Failed to apply log level");
        }
    }
}

/// Install the global fmt subscriber on stderr.
///
/// `RUST_LOG` takes precedence over `default_level`. The returned handle
/// swaps in the configured level once configuration has been loaded.
pub fn init_tracing(default_level: &str) -> LogLevel {
    let (filter, handle) = reload::Layer::new(env_filter(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    LogLevel(handle)
}

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}
