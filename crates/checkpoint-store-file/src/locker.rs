// crates/checkpoint-store-file/src/locker.rs
// ============================================================================
// Module: File Locker
// Description: Advisory per-key lock files in a directory.
// Purpose: Default mutual exclusion for the local file backend.
// Dependencies: checkpoint-store-core, fs2, tracing
// ============================================================================

//! ## Overview
//! Each key maps to `<dir>/FileLocker_<digest>.lock`. Acquisition opens the
//! file and takes an exclusive advisory lock, blocking until it is granted.
//! Release removes the lock file and then unlocks it. A waiter that wakes
//! up holding an unlinked file retries, so two holders never coexist across
//! a concurrent release.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::fs::File;
use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;

use checkpoint_store_core::LockError;
use checkpoint_store_core::LockHandle;
use checkpoint_store_core::Locker;
use checkpoint_store_core::derive_storage_id;
use tracing::debug;
use tracing::warn;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Type name scoping lock file names.
pub const FILE_LOCKER_TYPE: &str = "FileLocker";
/// Lock file extension.
const LOCK_EXTENSION: &str = "lock";

// ============================================================================
// SECTION: Locker
// ============================================================================

/// Token carried by handles from [`FileLocker`].
#[derive(Debug)]
struct FileLockToken {
    /// Open, locked lock file.
    file: File,
    /// Path of the lock file.
    path: PathBuf,
}

/// Advisory file locker rooted at a directory.
#[derive(Debug, Clone)]
pub struct FileLocker {
    /// Directory holding lock files.
    dir: PathBuf,
}

impl FileLocker {
    /// Creates a locker rooted at `dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Io`] when the directory cannot be created.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, LockError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|err| LockError::Io(err.to_string()))?;
        Ok(Self {
            dir,
        })
    }

    /// Returns the lock directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the lock file path for a key.
    #[must_use]
    pub fn lock_path(&self, key: &str) -> PathBuf {
        let mut name = derive_storage_id(FILE_LOCKER_TYPE, key);
        name.push('.');
        name.push_str(LOCK_EXTENSION);
        self.dir.join(name)
    }
}

impl Locker for FileLocker {
    /// Blocks until the lock file is held and still linked at its path.
    ///
    /// A waiter that wakes on a lock file its holder already unlinked re-opens
    /// the path and waits again.
    fn acquire(&self, key: &str) -> Result<LockHandle, LockError> {
        let path = self.lock_path(key);
        loop {
            let file = OpenOptions::new()
                .create(true)
                .read(true)
                .write(true)
                .truncate(false)
                .open(&path)
                .map_err(|err| LockError::Io(err.to_string()))?;
            fs2::FileExt::lock_exclusive(&file).map_err(|err| LockError::Io(err.to_string()))?;
            if still_linked(&file, &path)? {
                debug!(lock_path = %path.display(), "file lock acquired");
                return Ok(LockHandle::new(
                    key,
                    FileLockToken {
                        file,
                        path,
                    },
                ));
            }
            let _ = fs2::FileExt::unlock(&file);
        }
    }

    fn release(&self, handle: &mut LockHandle) -> Result<(), LockError> {
        if !handle.is_held() {
            return Ok(());
        }
        let Some(token) = handle.take_token::<FileLockToken>() else {
            return Err(LockError::Invalid("handle was not issued by a file locker".to_string()));
        };
        match fs::remove_file(&token.path) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => {
                warn!(lock_path = %token.path.display(), error = %err, "lock file removal failed");
            }
        }
        fs2::FileExt::unlock(&token.file).map_err(|err| LockError::Io(err.to_string()))?;
        debug!(lock_path = %token.path.display(), "file lock released");
        Ok(())
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns true when `path` still names the locked file.
fn still_linked(file: &File, path: &Path) -> Result<bool, LockError> {
    let on_disk = match fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(LockError::Io(err.to_string())),
    };
    let held = file.metadata().map_err(|err| LockError::Io(err.to_string()))?;
    Ok(same_file(&held, &on_disk))
}

/// Compares file identity by device and inode.
#[cfg(unix)]
fn same_file(a: &fs::Metadata, b: &fs::Metadata) -> bool {
    use std::os::unix::fs::MetadataExt;
    a.dev() == b.dev() && a.ino() == b.ino()
}

/// Without inode identity, presence of the path is the only signal.
#[cfg(not(unix))]
const fn same_file(_a: &fs::Metadata, _b: &fs::Metadata) -> bool {
    true
}
