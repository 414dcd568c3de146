//! Active/archive file naming.
//!
//! Layout next to the configured prefix:
//! - `<prefix>.log`: the active file
//! - `<prefix>-YYYY-MM-DDTHH-MM-SS.log.gz`: one archive per rotation (UTC)

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};

pub const ACTIVE_EXT: &str = ".log";
pub const ARCHIVE_EXT: &str = ".log.gz";

/// Length of the encoded timestamp, e.g. `2024-03-09T17-04-55`.
pub const STAMP_LEN: usize = 19;

/// Path of the active file: `<prefix>.log`
pub fn active_path(prefix: &Path) -> PathBuf {
    with_suffix(prefix, ACTIVE_EXT)
}

/// Path of the archive sealed at `at`: `<prefix>-<stamp>.log.gz`
pub fn archive_path(prefix: &Path, at: OffsetDateTime) -> Result<PathBuf, time::error::Format> {
    let stamp = encode_stamp(at)?;
    Ok(with_suffix(prefix, &format!("-{stamp}{ARCHIVE_EXT}")))
}

/// Encode `at` (converted to UTC) with second resolution.
pub fn encode_stamp(at: OffsetDateTime) -> Result<String, time::error::Format> {
    at.to_offset(UtcOffset::UTC).format(format_description!(
        "[year]-[month]-[day]T[hour]-[minute]-[second]"
    ))
}

/// Decode the creation time of an archive from its file name.
///
/// Returns `None` for names this writer does not manage.
pub fn archive_time(name: &str) -> Option<OffsetDateTime> {
    let base = Path::new(name).file_name()?.to_str()?;
    let stem = base.strip_suffix(ARCHIVE_EXT).unwrap_or(base);
    let stamp = stem.get(stem.len().checked_sub(STAMP_LEN)?..)?;

    PrimitiveDateTime::parse(
        stamp,
        format_description!("[year]-[month]-[day]T[hour]-[minute]-[second]"),
    )
    .ok()
    .map(PrimitiveDateTime::assume_utc)
}

fn with_suffix(prefix: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(prefix.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}
