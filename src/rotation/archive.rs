//! Single-use gzip sink producing one archive per rotation.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use flate2::Compression;
use flate2::write::GzEncoder;
use time::OffsetDateTime;
use tracing::{debug, warn};

use super::error::{Result, WriterError};
use super::name::archive_path;

/// How many one-second steps to try when archive names collide.
const MAX_NAME_ATTEMPTS: u32 = 60;

/// Compressing writer for exactly one archive file
pub struct ArchiveSink {
    path: PathBuf,
    encoder: GzEncoder<File>,
}

impl ArchiveSink {
    /// Create the archive for a rotation sealed at `at`.
    ///
    /// The file is created exclusively. If an archive for the same second
    /// already exists, the encoded timestamp moves forward one second at a time
    /// so the name stays decodable and newer than its predecessor.
    pub fn create(prefix: &Path, at: OffsetDateTime) -> Result<Self> {
        let mut stamp = at;
        for _ in 0..MAX_NAME_ATTEMPTS {
            let path = archive_path(prefix, stamp)?;
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => {
                    debug!(path = %path.display(), "Created archive");
                    return Ok(Self {
                        path,
                        encoder: GzEncoder::new(file, Compression::default()),
                    });
                }
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                    warn!(path = %path.display(), "Archive name taken, shifting timestamp");
                    stamp += Duration::from_secs(1);
                }
                Err(err) => return Err(WriterError::io("create archive", path)(err)),
            }
        }

        let path = archive_path(prefix, stamp)?;
        Err(WriterError::io("create archive", path)(io::Error::new(
            io::ErrorKind::AlreadyExists,
            "no free archive name",
        )))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.encoder
            .write_all(bytes)
            .map_err(|source| WriterError::Compression {
                path: self.path.clone(),
                source,
            })
    }

    /// Finish the gzip stream and sync the file. Returns the archive path.
    pub fn close(self) -> Result<PathBuf> {
        let Self { path, encoder } = self;

        let file = encoder.finish().map_err(|source| WriterError::Compression {
            path: path.clone(),
            source,
        })?;
        file.sync_all()
            .map_err(WriterError::io("sync archive", path.clone()))?;

        Ok(path)
    }

    /// Close and delete a partially written archive.
    pub fn close_and_remove(self) -> Result<()> {
        let path = self.path.clone();
        let closed = self.close();

        let removed = fs::remove_file(&path).map_err(WriterError::io("remove partial archive", path));
        closed.and(removed)
    }
}

/// Compress `bytes` into a fresh archive sealed at `at`.
///
/// A failed write removes the partial archive before the error is returned.
pub fn write_archive(prefix: &Path, at: OffsetDateTime, bytes: &[u8]) -> Result<PathBuf> {
    seal(ArchiveSink::create(prefix, at)?, bytes)
}

fn seal(mut sink: ArchiveSink, bytes: &[u8]) -> Result<PathBuf> {
    if let Err(err) = sink.write(bytes) {
        let path = sink.path().to_path_buf();
        return Err(match sink.close_and_remove() {
            Ok(()) => err,
            Err(cleanup) => WriterError::Cleanup {
                primary: Box::new(err),
                path,
                cleanup: Box::new(cleanup),
            },
        });
    }

    sink.close()
}
