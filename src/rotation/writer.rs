//! Size-bounded active log file with compressing rotation.
//!
//! Two locks with different hold times:
//! - the write lock (`active`) covers the size check, the buffer snapshot and
//!   the append, so a payload never straddles a rotation boundary;
//! - the rotation lock covers retention plus archive creation, which may take
//!   long and normally runs on the background worker.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bon::Builder;
use crossbeam_channel::{Receiver, Sender};
use time::OffsetDateTime;
use tracing::{error, info, warn};

use super::archive::write_archive;
use super::clock::{Clock, SystemClock};
use super::error::{Result, WriterError};
use super::name::active_path;
use super::retention::{self, RetentionPolicy};
use crate::observability::{Metrics, MetricsSnapshot};

pub const DEFAULT_MAX_SIZE: u64 = 1024 * 1024; // 1 MiB
pub const DEFAULT_MAX_BACKUPS: usize = 3;
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Callback receiving background rotation failures
pub type FailureHook = Arc<dyn Fn(&WriterError) + Send + Sync>;

/// Writer settings. Zero numeric values fall back to the defaults.
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
pub struct WriterConfig {
    /// Path prefix: the active file is `<prefix>.log`
    #[builder(into)]
    pub prefix: PathBuf,
    /// Active file size that triggers a rotation, in bytes
    #[builder(default = DEFAULT_MAX_SIZE)]
    pub max_size: u64,
    /// Archives kept after a rotation, including the new one
    #[builder(default = DEFAULT_MAX_BACKUPS)]
    pub max_backups: usize,
    /// Archives older than this are removed on the next rotation
    #[builder(default = DEFAULT_MAX_AGE)]
    pub max_age: Duration,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            prefix: PathBuf::new(),
            max_size: DEFAULT_MAX_SIZE,
            max_backups: DEFAULT_MAX_BACKUPS,
            max_age: DEFAULT_MAX_AGE,
        }
    }
}

impl WriterConfig {
    fn normalized(mut self) -> Result<Self> {
        if self.prefix.as_os_str().is_empty() {
            return Err(WriterError::Config("prefix must be provided".to_string()));
        }
        // Retention matches archives by the prefix's last component.
        let base = self.prefix.file_name().and_then(|name| name.to_str());
        match base {
            Some(base) if self.prefix.as_os_str().as_encoded_bytes().ends_with(base.as_bytes()) => {}
            _ => {
                return Err(WriterError::Config(format!(
                    "prefix {} must end in a UTF-8 file name",
                    self.prefix.display()
                )));
            }
        }
        if self.max_size == 0 {
            self.max_size = DEFAULT_MAX_SIZE;
        }
        if self.max_backups == 0 {
            self.max_backups = DEFAULT_MAX_BACKUPS;
        }
        if self.max_age.is_zero() {
            self.max_age = DEFAULT_MAX_AGE;
        }
        Ok(self)
    }

    fn retention(&self) -> RetentionPolicy {
        RetentionPolicy {
            max_backups: self.max_backups,
            max_age: self.max_age,
        }
    }
}

/// Snapshot of the active file taken at rotation time
struct RotationBuffer {
    bytes: Vec<u8>,
    sealed_at: OffsetDateTime,
}

enum Job {
    Rotate(RotationBuffer),
    Barrier(Sender<()>),
}

struct ActiveFile {
    file: File,
    written: u64,
    closed: bool,
}

/// State shared with the rotation worker
struct Shared {
    config: WriterConfig,
    active_path: PathBuf,
    clock: Arc<dyn Clock>,
    metrics: Metrics,
    rotate_lock: Mutex<()>,
    fault: OnceLock<String>,
    on_failure: RwLock<FailureHook>,
}

impl Shared {
    /// Run retention, then compress the buffer into a new archive.
    fn archive_and_prune(&self, buffer: RotationBuffer) -> Result<PathBuf> {
        let _rotating = self.rotate_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let prefix = &self.config.prefix;
        let stats = retention::prune(prefix, self.clock.now_utc(), self.config.retention())?;
        self.metrics.archives_pruned(stats.expired, stats.capped);

        let path = write_archive(prefix, buffer.sealed_at, &buffer.bytes)?;
        self.metrics.archive_created();
        info!(
            archive = %path.display(),
            bytes = buffer.bytes.len(),
            expired = stats.expired,
            capped = stats.capped,
            "Rotated log file"
        );

        Ok(path)
    }

    fn run_worker(&self, jobs: Receiver<Job>) {
        for job in jobs {
            match job {
                Job::Rotate(buffer) => {
                    if let Err(err) = self.archive_and_prune(buffer) {
                        self.report(err);
                    }
                }
                Job::Barrier(done) => {
                    let _ = done.send(());
                }
            }
        }
    }

    fn report(&self, err: WriterError) {
        self.metrics.rotation_failed();
        let err = self.poison(err);
        let hook = self
            .on_failure
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        (*hook)(&err);
    }

    /// Record an unrecoverable failure; later writes fail with `Faulted`.
    fn poison(&self, err: WriterError) -> WriterError {
        let _ = self.fault.set(err.to_string());
        err
    }

    fn check_fault(&self) -> Result<()> {
        match self.fault.get() {
            Some(reason) => Err(WriterError::Faulted(reason.clone())),
            None => Ok(()),
        }
    }
}

fn log_failure(err: &WriterError) {
    error!(error = %err, "Background log rotation failed");
}

/// Rotating, compressing log file writer.
///
/// Share it between threads with an `Arc`; every method takes `&self`.
pub struct Writer {
    shared: Arc<Shared>,
    active: Mutex<ActiveFile>,
    jobs: Mutex<Option<Sender<Job>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Writer {
    pub fn new(config: WriterConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Open the writer with a custom time source.
    ///
    /// A non-empty active file left by a previous run is archived before the
    /// fresh active file is opened.
    pub fn with_clock(config: WriterConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let config = config.normalized()?;
        let active_path = active_path(&config.prefix);

        if let Some(parent) = active_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(WriterError::io("create log directory", parent))?;
            }
        }

        let default_hook: FailureHook = Arc::new(log_failure);
        let shared = Arc::new(Shared {
            config,
            active_path,
            clock,
            metrics: Metrics::new(),
            rotate_lock: Mutex::new(()),
            fault: OnceLock::new(),
            on_failure: RwLock::new(default_hook),
        });

        let path = &shared.active_path;
        let leftover = match fs::metadata(path) {
            Ok(meta) => meta.len() > 0,
            Err(err) if err.kind() == io::ErrorKind::NotFound => false,
            Err(err) => return Err(WriterError::io("stat log file", path)(err)),
        };
        if leftover {
            let bytes = fs::read(path).map_err(WriterError::io("read leftover log file", path))?;
            info!(path = %path.display(), bytes = bytes.len(), "Archiving log file left by a previous run");
            shared.metrics.rotation_started();
            shared.archive_and_prune(RotationBuffer {
                bytes,
                sealed_at: shared.clock.now_utc(),
            })?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(WriterError::io("open log file", path))?;

        let (sender, receiver) = crossbeam_channel::unbounded();
        let worker = thread::Builder::new()
            .name("rotalog-rotation".to_string())
            .spawn({
                let shared = Arc::clone(&shared);
                move || shared.run_worker(receiver)
            })
            .map_err(|err| WriterError::WorkerUnavailable(err.to_string()))?;

        info!(path = %path.display(), max_size = shared.config.max_size, "Opened log file");

        Ok(Self {
            shared,
            active: Mutex::new(ActiveFile {
                file,
                written: 0,
                closed: false,
            }),
            jobs: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Replace the callback that receives background rotation failures.
    ///
    /// The default hook logs the failure at `error` level. Either way the
    /// writer is faulted afterwards.
    ///
    /// The hook runs on the rotation worker thread. Calling
    /// [`Writer::flush_rotations`] or [`Writer::close`] from inside it
    /// deadlocks, since both wait for that thread.
    pub fn on_failure(self, hook: impl Fn(&WriterError) + Send + Sync + 'static) -> Self {
        let hook: FailureHook = Arc::new(hook);
        *self
            .shared
            .on_failure
            .write()
            .unwrap_or_else(PoisonError::into_inner) = hook;
        self
    }

    /// Append `data` as one unit, rotating first if it would overflow the
    /// active file. Returns the number of bytes accepted.
    pub fn write(&self, data: &[u8]) -> Result<usize> {
        let mut active = self.lock_active()?;
        if active.closed {
            return Err(WriterError::Closed);
        }
        self.shared.check_fault()?;

        let len = data.len() as u64;
        if active.written > 0 && active.written + len > self.shared.config.max_size {
            let buffer = self
                .drain(&mut active)
                .map_err(|err| self.shared.poison(err))?;
            self.submit(buffer)?;
        }

        if let Err(err) = active.file.write_all(data) {
            let err = WriterError::io("append to log file", &self.shared.active_path)(err);
            return Err(self.shared.poison(err));
        }
        active.written += len;
        self.shared.metrics.bytes_written(len);

        Ok(data.len())
    }

    /// Close the writer, sealing any pending bytes into a final archive.
    ///
    /// Waits for triggered rotations still in flight, then rotates
    /// synchronously. Closing twice is a no-op.
    pub fn close(&self) -> Result<()> {
        let pending = {
            let mut active = self.lock_active()?;
            if active.closed {
                return Ok(());
            }
            active.closed = true;

            if active.written > 0 {
                self.drain(&mut active).map(Some)
            } else {
                Ok(None)
            }
        };

        let stopped = self.stop_worker();
        let buffer = pending.map_err(|err| self.shared.poison(err))?;

        let sealed = match buffer {
            Some(buffer) => self
                .shared
                .archive_and_prune(buffer)
                .map(|_| ())
                .map_err(|err| self.shared.poison(err)),
            None => Ok(()),
        };

        stopped?;
        sealed?;
        self.shared.check_fault()?;

        info!(path = %self.shared.active_path.display(), "Closed log file");
        Ok(())
    }

    /// Block until every rotation triggered so far has been archived.
    pub fn flush_rotations(&self) -> Result<()> {
        let sender = self
            .jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        if let Some(sender) = sender {
            let (done, wait) = crossbeam_channel::bounded(1);
            if sender.send(Job::Barrier(done)).is_ok() {
                wait.recv().map_err(|_| {
                    WriterError::WorkerUnavailable("rotation worker stopped".to_string())
                })?;
            }
        }

        self.shared.check_fault()
    }

    /// Bytes appended to the active file since the last rotation.
    pub fn written(&self) -> u64 {
        match self.active.lock() {
            Ok(active) => active.written,
            Err(poisoned) => poisoned.into_inner().written,
        }
    }

    pub fn prefix(&self) -> &Path {
        &self.shared.config.prefix
    }

    pub fn active_path(&self) -> &Path {
        &self.shared.active_path
    }

    /// Effective configuration, with defaults applied
    pub fn config(&self) -> &WriterConfig {
        &self.shared.config
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.snapshot()
    }

    fn lock_active(&self) -> Result<MutexGuard<'_, ActiveFile>> {
        self.active
            .lock()
            .map_err(|_| WriterError::Faulted("active file lock poisoned".to_string()))
    }

    /// Move the active file's content into a buffer and truncate it.
    fn drain(&self, active: &mut ActiveFile) -> Result<RotationBuffer> {
        let path = &self.shared.active_path;
        let sealed_at = self.shared.clock.now_utc();

        active
            .file
            .seek(SeekFrom::Start(0))
            .map_err(WriterError::io("seek log file", path))?;
        let mut bytes = Vec::with_capacity(active.written as usize);
        active
            .file
            .read_to_end(&mut bytes)
            .map_err(WriterError::io("read log file", path))?;
        active
            .file
            .set_len(0)
            .map_err(WriterError::io("truncate log file", path))?;
        active
            .file
            .seek(SeekFrom::Start(0))
            .map_err(WriterError::io("seek log file", path))?;
        active.written = 0;

        self.shared.metrics.rotation_started();
        Ok(RotationBuffer { bytes, sealed_at })
    }

    /// Hand a buffer to the rotation worker, or archive it inline if the
    /// worker is gone.
    fn submit(&self, buffer: RotationBuffer) -> Result<()> {
        let jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        let job = match jobs.as_ref() {
            Some(sender) => match sender.send(Job::Rotate(buffer)) {
                Ok(()) => return Ok(()),
                Err(returned) => returned.into_inner(),
            },
            None => Job::Rotate(buffer),
        };
        drop(jobs);

        warn!("Rotation worker unavailable, archiving synchronously");
        if let Job::Rotate(buffer) = job {
            self.shared
                .archive_and_prune(buffer)
                .map_err(|err| self.shared.poison(err))?;
        }
        Ok(())
    }

    fn stop_worker(&self) -> Result<()> {
        drop(self.jobs.lock().unwrap_or_else(PoisonError::into_inner).take());

        let worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner).take();
        match worker {
            Some(handle) => handle
                .join()
                .map_err(|_| WriterError::WorkerUnavailable("rotation worker panicked".to_string())),
            None => Ok(()),
        }
    }

    fn flush_active(&self) -> Result<()> {
        let mut active = self.lock_active()?;
        active
            .file
            .flush()
            .map_err(|err| WriterError::io("flush log file", &self.shared.active_path)(err))
    }
}

impl Write for &Writer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Writer::write(*self, buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_active().map_err(io::Error::from)
    }
}

impl Write for Writer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Write::write(&mut &*self, buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Write::flush(&mut &*self)
    }
}

impl Drop for Writer {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            error!(error = %err, path = %self.shared.active_path.display(), "Failed to close log writer");
        }
    }
}

impl std::fmt::Debug for Writer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Writer")
            .field("config", &self.shared.config)
            .field("active_path", &self.shared.active_path)
            .field("written", &self.written())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_empty_prefix_rejected() {
        let result = Writer::new(WriterConfig::default());
        assert!(matches!(result, Err(WriterError::Config(_))));
    }

    #[test]
    fn test_prefix_without_file_name_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().to_string_lossy().into_owned();

        for prefix in [
            format!("{dir}/app/"),
            format!("{dir}/app/."),
            format!("{dir}/.."),
            ".".to_string(),
        ] {
            let result = Writer::new(WriterConfig::builder().prefix(&prefix).build());
            assert!(matches!(result, Err(WriterError::Config(_))), "accepted {prefix}");
        }
        assert!(!temp_dir.path().join("app").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_prefix_rejected() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let temp_dir = TempDir::new().unwrap();
        let prefix = temp_dir.path().join(OsStr::from_bytes(b"app\xff"));

        let result = Writer::new(WriterConfig::builder().prefix(prefix).build());
        assert!(matches!(result, Err(WriterError::Config(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_leftover_file_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let active = temp_dir.path().join("app.log");
        std::os::unix::fs::symlink(&active, &active).unwrap();

        let result = Writer::new(WriterConfig::builder().prefix(temp_dir.path().join("app")).build());
        assert!(matches!(result, Err(WriterError::Io { action: "stat log file", .. })));
    }

    #[test]
    fn test_failed_append_faults_writer() {
        let temp_dir = TempDir::new().unwrap();
        let writer = Writer::new(WriterConfig::builder().prefix(temp_dir.path().join("app")).build()).unwrap();

        // Swap in a read-only handle so the next append fails.
        writer.active.lock().unwrap().file = File::open(writer.active_path()).unwrap();

        let err = writer.write(b"lost").unwrap_err();
        assert!(matches!(err, WriterError::Io { action: "append to log file", .. }));
        assert_eq!(writer.written(), 0);

        assert!(matches!(writer.write(b"later"), Err(WriterError::Faulted(_))));
        assert!(matches!(writer.flush_rotations(), Err(WriterError::Faulted(_))));
        assert!(matches!(writer.close(), Err(WriterError::Faulted(_))));
    }

    #[test]
    fn test_zero_values_fall_back_to_defaults() {
        let config = WriterConfig {
            prefix: PathBuf::from("logs/app"),
            max_size: 0,
            max_backups: 0,
            max_age: Duration::ZERO,
        }
        .normalized()
        .unwrap();

        assert_eq!(config.max_size, DEFAULT_MAX_SIZE);
        assert_eq!(config.max_backups, DEFAULT_MAX_BACKUPS);
        assert_eq!(config.max_age, DEFAULT_MAX_AGE);
    }

    #[test]
    fn test_builder_defaults() {
        let config = WriterConfig::builder().prefix("logs/app").max_size(100).build();

        assert_eq!(config.prefix, PathBuf::from("logs/app"));
        assert_eq!(config.max_size, 100);
        assert_eq!(config.max_backups, DEFAULT_MAX_BACKUPS);
        assert_eq!(config.max_age, DEFAULT_MAX_AGE);
    }

    #[test]
    fn test_creates_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let prefix = temp_dir.path().join("nested").join("dir").join("app");

        let writer = Writer::new(WriterConfig::builder().prefix(&prefix).build()).unwrap();

        assert!(writer.active_path().exists());
        assert_eq!(writer.active_path(), temp_dir.path().join("nested/dir/app.log"));
        writer.close().unwrap();
    }

    #[test]
    fn test_written_tracks_counter() {
        let temp_dir = TempDir::new().unwrap();
        let writer = Writer::new(
            WriterConfig::builder()
                .prefix(temp_dir.path().join("app"))
                .max_size(10)
                .build(),
        )
        .unwrap();

        writer.write(b"1234").unwrap();
        assert_eq!(writer.written(), 4);
        writer.write(b"5678").unwrap();
        assert_eq!(writer.written(), 8);
        writer.write(b"abc").unwrap();
        assert_eq!(writer.written(), 3);

        writer.close().unwrap();
        assert_eq!(writer.written(), 0);
    }

    #[test]
    fn test_io_write_impl() {
        let temp_dir = TempDir::new().unwrap();
        let writer = Writer::new(WriterConfig::builder().prefix(temp_dir.path().join("app")).build()).unwrap();

        writeln!(&writer, "line {}", 1).unwrap();
        (&writer).flush().unwrap();

        assert_eq!(fs::read(writer.active_path()).unwrap(), b"line 1\n");
    }

    #[test]
    fn test_closed_maps_to_broken_pipe() {
        let temp_dir = TempDir::new().unwrap();
        let writer = Writer::new(WriterConfig::builder().prefix(temp_dir.path().join("app")).build()).unwrap();
        writer.close().unwrap();

        let err = Write::write(&mut &writer, b"late").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }
}
