// crates/checkpoint-store-file/src/atomic.rs
// ============================================================================
// Module: Atomic File Replace
// Description: Temp-file write, fsync, and rename over the destination.
// Purpose: Ensure readers see the complete old or complete new file.
// Dependencies: std
// ============================================================================

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Attempts to find an unused temp name before giving up.
const TEMP_ATTEMPTS: usize = 16;
/// Per-process counter making temp names unique across threads.
static TEMP_COUNTER: AtomicUsize = AtomicUsize::new(0);

// ============================================================================
// SECTION: Write
// ============================================================================

/// Atomically replaces `path` with `contents`.
///
/// The destination is never removed before the rename; a failed rename leaves
/// the prior file in place and discards the temp file.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let (temp_path, mut file) = create_temp(path)?;
    let written = file.write_all(contents).and_then(|()| file.sync_all());
    drop(file);
    if let Err(err) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(err);
    }
    persist(&temp_path, path)?;
    sync_parent(path);
    Ok(())
}

/// Creates a unique temporary file alongside the destination.
fn create_temp(path: &Path) -> std::io::Result<(PathBuf, fs::File)> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| std::io::Error::new(ErrorKind::InvalidInput, "path has no file name"))?;
    for _ in 0 .. TEMP_ATTEMPTS {
        let attempt = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let temp_name = format!(".{file_name}.tmp.{}.{}", std::process::id(), attempt);
        let temp_path = parent.join(temp_name);
        match OpenOptions::new().write(true).create_new(true).open(&temp_path) {
            Ok(file) => return Ok((temp_path, file)),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {}
            Err(err) => return Err(err),
        }
    }
    Err(std::io::Error::new(ErrorKind::AlreadyExists, "failed to allocate temporary path"))
}

/// Moves the temporary file over the destination in one rename.
fn persist(temp_path: &Path, path: &Path) -> std::io::Result<()> {
    fs::rename(temp_path, path).inspect_err(|_| {
        let _ = fs::remove_file(temp_path);
    })
}

/// Flushes the directory entry for the rename.
#[cfg(unix)]
fn sync_parent(path: &Path) {
    if let Some(parent) = path.parent()
        && let Ok(dir) = fs::File::open(parent)
    {
        let _ = dir.sync_all();
    }
}

/// Directory handles cannot be synced on this platform.
#[cfg(not(unix))]
const fn sync_parent(_path: &Path) {}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only assertions are permitted."
    )]

    use super::*;

    #[test]
    fn replaces_existing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("state");
        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"second");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn failed_rename_keeps_destination_and_drops_temp() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("state");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("prior"), b"prior").unwrap();

        assert!(write_atomic(&path, b"new").is_err());

        assert_eq!(fs::read(path.join("prior")).unwrap(), b"prior");
        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["state".to_string()]);
    }
}
