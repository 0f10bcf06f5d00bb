// crates/checkpoint-store-file/src/storage.rs
// ============================================================================
// Module: File State Storage
// Description: StateStorage writing JSON envelopes into a base directory.
// Purpose: Crash-recoverable pipeline state on the local filesystem.
// Dependencies: checkpoint-store-core, tracing
// ============================================================================

//! ## Overview
//! The envelope for key `K` lives at `<dir>/JsonLocalStorage_<digest(K)>`.
//! Saving replaces the whole file atomically; loading a missing or empty file
//! yields `None`; any other read failure or undecodable content propagates.
//! Unless told otherwise, the storage locks keys with a [`FileLocker`] rooted
//! in the same directory, resolved once at construction.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use checkpoint_store_core::Envelope;
use checkpoint_store_core::ExternalLocker;
use checkpoint_store_core::LockGuard;
use checkpoint_store_core::Locker;
use checkpoint_store_core::LockerChoice;
use checkpoint_store_core::StatePayload;
use checkpoint_store_core::StateStorage;
use checkpoint_store_core::StorageError;
use tracing::debug;
use tracing::warn;

use crate::atomic::write_atomic;
use crate::locker::FileLocker;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Backend type name scoping file names.
pub const FILE_BACKEND_TYPE: &str = "JsonLocalStorage";

// ============================================================================
// SECTION: Config
// ============================================================================

/// Construction options for [`FileStorage`].
#[derive(Debug, Clone)]
pub struct FileStorageConfig {
    /// Directory holding envelopes.
    pub dir: PathBuf,
    /// Locker selection; `Default` means a [`FileLocker`] on `dir`.
    pub locker: LockerChoice,
}

impl Default for FileStorageConfig {
    fn default() -> Self {
        Self {
            dir: std::env::temp_dir(),
            locker: LockerChoice::Default,
        }
    }
}

impl FileStorageConfig {
    /// Returns options for `dir` with the default locker.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            locker: LockerChoice::Default,
        }
    }

    /// Replaces the locker selection.
    #[must_use]
    pub fn with_locker(mut self, locker: LockerChoice) -> Self {
        self.locker = locker;
        self
    }
}

// ============================================================================
// SECTION: Storage
// ============================================================================

/// Local filesystem state storage.
#[derive(Debug, Clone)]
pub struct FileStorage {
    /// Directory holding envelopes.
    dir: PathBuf,
    /// Resolved locker.
    locker: ExternalLocker,
}

impl FileStorage {
    /// Creates a storage, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the directory or default locker cannot
    /// be set up.
    pub fn new(config: FileStorageConfig) -> Result<Self, StorageError> {
        let FileStorageConfig {
            dir,
            locker,
        } = config;
        fs::create_dir_all(&dir).map_err(|err| StorageError::Io(err.to_string()))?;
        let locker = ExternalLocker::resolve(locker, || {
            let nearby = FileLocker::new(dir.clone())?;
            Ok(Some(Arc::new(nearby) as Arc<dyn Locker>))
        })?;
        Ok(Self {
            dir,
            locker,
        })
    }

    /// Creates a storage in `dir` with the default nearby file locker.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the directory cannot be set up.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        Self::new(FileStorageConfig::new(dir))
    }

    /// Returns the envelope directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the resolved locker slot.
    #[must_use]
    pub const fn locker(&self) -> &ExternalLocker {
        &self.locker
    }

    /// Returns the envelope path for a key.
    #[must_use]
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(self.storage_id(key))
    }
}

impl StateStorage for FileStorage {
    fn backend_type_name(&self) -> &'static str {
        FILE_BACKEND_TYPE
    }

    fn lock(&self, key: &str) -> Result<LockGuard, StorageError> {
        self.locker.lock(key)
    }

    fn save_payload(&self, key: &str, payload: &StatePayload) -> Result<(), StorageError> {
        let path = self.path_for(key);
        let bytes = Envelope::seal(key, payload).to_json_bytes()?;
        write_atomic(&path, &bytes).map_err(|err| StorageError::Io(err.to_string()))?;
        debug!(path = %path.display(), bytes = bytes.len(), "state saved");
        Ok(())
    }

    fn load_payload(&self, key: &str) -> Result<Option<StatePayload>, StorageError> {
        let path = self.path_for(key);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no stored state");
                return Ok(None);
            }
            Err(err) => return Err(StorageError::Io(err.to_string())),
        };
        if bytes.is_empty() {
            return Ok(None);
        }
        let payload = Envelope::from_json_bytes(&bytes)?.payload()?;
        debug!(path = %path.display(), bytes = bytes.len(), "state loaded");
        Ok(Some(payload))
    }

    fn cleanup(&self, key: &str, lock: &mut LockGuard) -> Result<(), StorageError> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => debug!(path = %path.display(), "state removed"),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => warn!(path = %path.display(), error = %err, "cleanup delete suppressed"),
        }
        self.locker.release(lock)
    }
}
