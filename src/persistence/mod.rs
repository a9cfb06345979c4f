//! File-backed state that survives restarts
//!
//! Every file is replaced atomically: the new contents go to a sibling
//! temp file which is then renamed over the target.

pub mod snapshot_store;

pub use snapshot_store::SnapshotStore;

use crate::error::Result;
use chrono::{DateTime, NaiveDateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};

/// Write `contents` to `path` through a temp file and rename
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    write_all_atomic(&[(path, contents)])
}

/// Replace several files together.
///
/// Every temp file is written before the first rename, so a failed write
/// leaves all targets untouched.
pub fn write_all_atomic(files: &[(&Path, &[u8])]) -> Result<()> {
    let mut staged: Vec<(PathBuf, &Path)> = Vec::with_capacity(files.len());

    for (path, contents) in files {
        let tmp = temp_path(path);
        if let Err(e) = stage(path, &tmp, contents) {
            let _ = fs::remove_file(&tmp);
            discard(&staged);
            return Err(e);
        }
        staged.push((tmp, *path));
    }

    for (i, (tmp, path)) in staged.iter().enumerate() {
        if let Err(e) = fs::rename(tmp, path) {
            discard(&staged[i..]);
            return Err(e.into());
        }
    }
    Ok(())
}

fn stage(path: &Path, tmp: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(tmp, contents)?;
    Ok(())
}

fn discard(staged: &[(PathBuf, &Path)]) {
    for (tmp, _) in staged {
        let _ = fs::remove_file(tmp);
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Parse a timestamp from a state file.
///
/// RFC 3339 is what this crate writes; `2024-03-01 00:30:00+00:00` (space
/// separated, optional fraction) is accepted for files written by other
/// tools. A value without an offset is taken as UTC.
pub fn parse_stored_time(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Some(t.with_timezone(&Utc));
    }
    if let Ok(t) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(t.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|t| t.and_utc())
}
