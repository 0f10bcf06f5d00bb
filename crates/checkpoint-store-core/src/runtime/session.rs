// crates/checkpoint-store-core/src/runtime/session.rs
// ============================================================================
// Module: Checkpoint Session
// Description: Lock, resume, checkpoint, and release for one pipeline key.
// Purpose: Drive the storage contract the way an iteration runner does.
// Dependencies: crate::interfaces, serde, tracing
// ============================================================================

//! ## Overview
//! A [`CheckpointSession`] holds the lock for one key for the lifetime of a
//! pipeline run. Opening it loads any prior state; each iteration boundary
//! calls [`CheckpointSession::checkpoint`]; the run ends with either
//! [`CheckpointSession::complete`] (delete state, release lock) or
//! [`CheckpointSession::suspend`] (keep state, release lock). Dropping the
//! session without either still releases the lock.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use tracing::info;

use crate::interfaces::LockGuard;
use crate::interfaces::StateStorage;
use crate::interfaces::StateStorageExt;
use crate::interfaces::StorageError;

// ============================================================================
// SECTION: Session
// ============================================================================

/// Locked checkpointing scope for one pipeline key.
pub struct CheckpointSession {
    /// Storage backend, used polymorphically.
    storage: Arc<dyn StateStorage>,
    /// Pipeline key.
    key: String,
    /// Lock held for the session.
    guard: LockGuard,
    /// Number of checkpoints written in this session.
    checkpoints: u64,
}

impl CheckpointSession {
    /// Locks `key` and loads the prior state, if any.
    ///
    /// If loading fails the lock is released before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when locking or loading fails.
    pub fn open<T: DeserializeOwned>(
        storage: Arc<dyn StateStorage>,
        key: impl Into<String>,
    ) -> Result<(Self, Option<T>), StorageError> {
        let key = key.into();
        let guard = storage.lock(&key)?;
        let restored = storage.load::<T>(&key)?;
        info!(
            storage_id = %storage.storage_id(&key),
            locking = guard.is_locking(),
            restored = restored.is_some(),
            "checkpoint session opened"
        );
        let session = Self {
            storage,
            key,
            guard,
            checkpoints: 0,
        };
        Ok((session, restored))
    }

    /// Returns the session key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the number of checkpoints written so far.
    #[must_use]
    pub const fn checkpoints(&self) -> u64 {
        self.checkpoints
    }

    /// Returns true when the session holds a real lock.
    #[must_use]
    pub const fn is_locking(&self) -> bool {
        self.guard.is_locking()
    }

    /// Saves the full current state, replacing the previous checkpoint.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the save fails; the caller should treat
    /// the iteration as failed.
    pub fn checkpoint<T: Serialize + ?Sized>(&mut self, state: &T) -> Result<(), StorageError> {
        self.storage.save(&self.key, state)?;
        self.checkpoints += 1;
        debug!(checkpoints = self.checkpoints, "checkpoint written");
        Ok(())
    }

    /// Deletes the stored state and releases the lock.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Lock`] when the lock cannot be released.
    pub fn complete(mut self) -> Result<(), StorageError> {
        self.storage.cleanup(&self.key, &mut self.guard)?;
        info!(checkpoints = self.checkpoints, "checkpoint session completed");
        Ok(())
    }

    /// Releases the lock and keeps the stored state for the next run.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Lock`] when the lock cannot be released.
    pub fn suspend(mut self) -> Result<(), StorageError> {
        self.guard.release()?;
        info!(checkpoints = self.checkpoints, "checkpoint session suspended");
        Ok(())
    }
}
