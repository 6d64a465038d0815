//! Filesystem helpers shared by the file-backed stores.
//!
//! Every helper reports its outcome; the stores decide what to do with a
//! failure (see [`crate::error::log_failure`]).

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;

use chrono::Utc;

use crate::error::{CacheError, Result};

/// Reads a whole file. A missing file is `Ok(None)`.
pub fn read_bytes(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(CacheError::io(path, e)),
    }
}

/// Replaces the contents of `path` with a single whole-file write.
pub fn write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    fs::write(path, bytes).map_err(|e| CacheError::io(path, e))
}

/// Deletes `path`. Returns whether a file was removed.
pub fn remove(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(CacheError::io(path, e)),
    }
}

// == Atomic Write ==
/// Writes bytes to a file atomically.
///
/// 1. Creates a unique temporary file in the same directory.
/// 2. Writes data, flushes, and syncs.
/// 3. Renames the temporary file over the target path.
/// 4. Cleans up the temporary file on failure.
pub fn atomic_write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    // Try a few times to create a unique temporary file
    for _ in 0..3 {
        let tmp_path = unique_tmp_path(path);
        match write_and_rename(&tmp_path, path, bytes) {
            Ok(()) => return Ok(()),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => {
                let _ = fs::remove_file(&tmp_path);
                return Err(CacheError::io(path, e));
            }
        }
    }

    Err(CacheError::io(
        path,
        io::Error::new(
            io::ErrorKind::AlreadyExists,
            "failed to create unique temporary file after retries",
        ),
    ))
}

fn unique_tmp_path(path: &Path) -> PathBuf {
    let nanos = Utc::now().timestamp_subsec_nanos();
    let file_name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("cache");

    // .<filename>.tmp.<pid>.<nanos>
    path.with_file_name(format!(".{}.tmp.{}.{}", file_name, process::id(), nanos))
}

fn write_and_rename(tmp_path: &Path, target_path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(tmp_path)?;

    file.write_all(bytes)?;
    file.flush()?;
    file.sync_all()?;

    // Windows refuses to rename over an existing file.
    #[cfg(not(unix))]
    {
        if target_path.exists() {
            let _ = fs::remove_file(target_path);
        }
    }

    fs::rename(tmp_path, target_path)
}
