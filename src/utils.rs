//! Utility functions shared across clipvault
//!
//! Atomic file writing and the backup file naming scheme. Backup files
//! are named `clip_backup_<timestamp>.cvb` so a plain descending sort of
//! file names yields newest-first order.

use crate::error::Result;
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::trace;

/// Prefix of rotated backup snapshot files
pub const BACKUP_PREFIX: &str = "clip_backup_";

/// Extension of rotated backup snapshot files
pub const BACKUP_EXT: &str = "cvb";

/// Atomic file write (write to a temp file then rename)
///
/// Writes to a temporary file in the target's directory and renames it
/// over the target, so the target is never observable in a partially
/// written state. The parent directory is created if missing.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;

    // Temp file must live on the same filesystem for the rename to be atomic
    let tmp = NamedTempFile::new_in(dir)?;
    fs::write(tmp.path(), content)?;
    tmp.persist(path).map_err(|e| e.error)?;

    trace!("Atomically wrote {} bytes to {:?}", content.len(), path);
    Ok(())
}

/// Path for a backup written at `ts`, distinct from every existing file
///
/// Names carry millisecond timestamps; two writes landing within the
/// same millisecond would share a name and the atomic rename would
/// silently replace the earlier backup, shrinking the retained set. A
/// collision instead gets a numeric suffix chosen so the descending
/// name sort still yields newest-first.
pub fn unique_backup_path(dir: &Path, ts: DateTime<Utc>) -> PathBuf {
    let stem = format!("{}{}", BACKUP_PREFIX, ts.format("%Y%m%d_%H%M%S%3f"));
    let mut path = dir.join(format!("{}.{}", stem, BACKUP_EXT));
    let mut seq = 1u32;
    while path.exists() {
        path = dir.join(format!("{}_{:02}.{}", stem, seq, BACKUP_EXT));
        seq += 1;
    }
    path
}

/// List backup files in `dir`, newest first
///
/// Only files matching the backup naming scheme are returned. A missing
/// directory yields an empty list rather than an error.
pub fn list_backups(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut backups = Vec::new();
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(backups),
        Err(e) => return Err(e.into()),
    };

    for entry in entries {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if path.is_file()
            && name.starts_with(BACKUP_PREFIX)
            && name.ends_with(&format!(".{}", BACKUP_EXT))
        {
            backups.push(path);
        }
    }

    // Timestamps embed in the name, so lexicographic descending is newest-first
    backups.sort_by(|a, b| b.file_name().cmp(&a.file_name()));
    Ok(backups)
}
