/// Archive retention: scanning, age expiry and count capping
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use time::OffsetDateTime;
use tracing::{debug, info};

use super::error::{Result, WriterError};
use super::name::{ARCHIVE_EXT, STAMP_LEN, archive_time};

/// An archive found on disk, dated by its file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub path: PathBuf,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub max_backups: usize,
    pub max_age: Duration,
}

/// Pruning statistics
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PruneStats {
    pub expired: usize,
    pub capped: usize,
}

/// List the archives managed under `prefix`, in directory order.
///
/// Only names of the exact shape `<base>-<stamp>.log.gz` are returned, so the
/// active file and archives of other prefixes are never candidates.
pub fn scan(prefix: &Path) -> Result<Vec<ArchiveEntry>> {
    let dir = match prefix.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let Some(base) = prefix.file_name().and_then(|name| name.to_str()) else {
        return Err(WriterError::Config(format!(
            "prefix {} has no UTF-8 file name",
            prefix.display()
        )));
    };
    let expected_len = base.len() + 1 + STAMP_LEN + ARCHIVE_EXT.len();

    let mut entries = Vec::new();
    for entry in fs::read_dir(dir).map_err(WriterError::io("read log directory", dir))? {
        let entry = entry.map_err(WriterError::io("read log directory", dir))?;
        let file_type = entry
            .file_type()
            .map_err(WriterError::io("stat", entry.path()))?;
        if file_type.is_dir() {
            continue;
        }

        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        if name.len() != expected_len
            || !name.starts_with(base)
            || name.as_bytes()[base.len()] != b'-'
            || !name.ends_with(ARCHIVE_EXT)
        {
            continue;
        }

        if let Some(created_at) = archive_time(name) {
            entries.push(ArchiveEntry {
                path: entry.path(),
                created_at,
            });
        }
    }

    Ok(entries)
}

/// Remove archives older than `max_age` and return the survivors.
pub fn expire(
    entries: Vec<ArchiveEntry>,
    now: OffsetDateTime,
    max_age: Duration,
) -> Result<(Vec<ArchiveEntry>, usize)> {
    let mut kept = Vec::with_capacity(entries.len());
    let mut removed = 0;

    for entry in entries {
        if now - entry.created_at > max_age {
            remove(&entry, "remove expired archive")?;
            removed += 1;
        } else {
            kept.push(entry);
        }
    }

    Ok((kept, removed))
}

/// Remove the oldest archives until at most `keep` remain.
pub fn cap(mut entries: Vec<ArchiveEntry>, keep: usize) -> Result<usize> {
    if entries.len() <= keep {
        return Ok(0);
    }

    entries.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    let excess = entries.len() - keep;
    for entry in &entries[..excess] {
        remove(entry, "remove old archive")?;
    }

    Ok(excess)
}

/// Apply the retention policy ahead of creating a new archive.
///
/// Expiry runs first; the count cap then keeps `max_backups - 1` archives so
/// the one about to be written fits.
pub fn prune(prefix: &Path, now: OffsetDateTime, policy: RetentionPolicy) -> Result<PruneStats> {
    let entries = scan(prefix)?;
    let (kept, expired) = expire(entries, now, policy.max_age)?;
    let capped = cap(kept, policy.max_backups.saturating_sub(1))?;

    let stats = PruneStats { expired, capped };
    if expired + capped > 0 {
        info!(prefix = %prefix.display(), ?stats, "Pruned archives");
    }
    Ok(stats)
}

fn remove(entry: &ArchiveEntry, action: &'static str) -> Result<()> {
    fs::remove_file(&entry.path).map_err(WriterError::io(action, entry.path.clone()))?;
    debug!(path = %entry.path.display(), created_at = %entry.created_at, "Removed archive");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rotation::name::archive_path;
    use tempfile::TempDir;
    use time::macros::datetime;

    const HOUR: Duration = Duration::from_secs(3600);

    fn touch_archive(prefix: &Path, at: OffsetDateTime) -> PathBuf {
        let path = archive_path(prefix, at).unwrap();
        fs::write(&path, b"").unwrap();
        path
    }

    fn names(entries: &[ArchiveEntry]) -> Vec<String> {
        let mut names: Vec<String> = entries
            .iter()
            .map(|e| e.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_scan_filters_unmanaged_files() {
        let temp_dir = TempDir::new().unwrap();
        let prefix = temp_dir.path().join("app");
        let at = datetime!(2024-01-01 00:00:00 UTC);

        touch_archive(&prefix, at);
        fs::write(temp_dir.path().join("app.log"), b"active").unwrap();
        fs::write(temp_dir.path().join("app-garbage-garbage-x.log.gz"), b"").unwrap();
        fs::write(temp_dir.path().join("app-server-2024-01-01T00-00-00.log.gz"), b"").unwrap();
        fs::write(temp_dir.path().join("other-2024-01-01T00-00-00.log.gz"), b"").unwrap();
        fs::create_dir(temp_dir.path().join("app-2024-01-02T00-00-00.log.gz")).unwrap();

        let entries = scan(&prefix).unwrap();
        assert_eq!(names(&entries), vec!["app-2024-01-01T00-00-00.log.gz"]);
        assert_eq!(entries[0].created_at, at);
    }

    #[test]
    fn test_scan_missing_directory_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let prefix = temp_dir.path().join("nope").join("app");
        assert!(scan(&prefix).is_err());
    }

    #[test]
    fn test_scan_prefix_without_base_is_error() {
        assert!(matches!(scan(Path::new("..")), Err(WriterError::Config(_))));
        assert!(matches!(scan(Path::new("/")), Err(WriterError::Config(_))));
    }

    #[test]
    fn test_expire_by_age() {
        let temp_dir = TempDir::new().unwrap();
        let prefix = temp_dir.path().join("app");
        let now = datetime!(2024-01-02 12:00:00 UTC);

        let old = touch_archive(&prefix, now - 25 * HOUR);
        let recent = touch_archive(&prefix, now - 23 * HOUR);

        let (kept, removed) = expire(scan(&prefix).unwrap(), now, 24 * HOUR).unwrap();

        assert_eq!(removed, 1);
        assert_eq!(kept.len(), 1);
        assert!(!old.exists());
        assert!(recent.exists());
    }

    #[test]
    fn test_cap_keeps_newest() {
        let temp_dir = TempDir::new().unwrap();
        let prefix = temp_dir.path().join("app");
        let start = datetime!(2024-01-01 00:00:00 UTC);

        let paths: Vec<PathBuf> = (0..5u32).map(|i| touch_archive(&prefix, start + i * HOUR)).collect();

        let removed = cap(scan(&prefix).unwrap(), 2).unwrap();

        assert_eq!(removed, 3);
        assert!(paths[..3].iter().all(|p| !p.exists()));
        assert!(paths[3..].iter().all(|p| p.exists()));
    }

    #[test]
    fn test_prune_reserves_slot_for_new_archive() {
        let temp_dir = TempDir::new().unwrap();
        let prefix = temp_dir.path().join("app");
        let now = datetime!(2024-01-10 00:00:00 UTC);
        let policy = RetentionPolicy {
            max_backups: 3,
            max_age: 7 * 24 * HOUR,
        };

        for i in 1..=4u32 {
            touch_archive(&prefix, now - i * HOUR);
        }
        let stats = prune(&prefix, now, policy).unwrap();

        assert_eq!(stats, PruneStats { expired: 0, capped: 2 });
        assert_eq!(scan(&prefix).unwrap().len(), 2);
    }

    #[test]
    fn test_prune_expires_before_capping() {
        let temp_dir = TempDir::new().unwrap();
        let prefix = temp_dir.path().join("app");
        let now = datetime!(2024-01-10 00:00:00 UTC);
        let policy = RetentionPolicy {
            max_backups: 3,
            max_age: 24 * HOUR,
        };

        touch_archive(&prefix, now - 48 * HOUR);
        touch_archive(&prefix, now - 30 * HOUR);
        touch_archive(&prefix, now - 2 * HOUR);
        let newest = touch_archive(&prefix, now - HOUR);

        let stats = prune(&prefix, now, policy).unwrap();

        assert_eq!(stats, PruneStats { expired: 2, capped: 0 });
        assert!(newest.exists());
        assert_eq!(scan(&prefix).unwrap().len(), 2);
    }

    #[test]
    fn test_prune_never_touches_active_file() {
        let temp_dir = TempDir::new().unwrap();
        let prefix = temp_dir.path().join("app");
        let active = temp_dir.path().join("app.log");
        fs::write(&active, b"live data").unwrap();

        let policy = RetentionPolicy {
            max_backups: 1,
            max_age: Duration::from_secs(1),
        };
        prune(&prefix, datetime!(2030-01-01 00:00:00 UTC), policy).unwrap();

        assert_eq!(fs::read(&active).unwrap(), b"live data");
    }
}
