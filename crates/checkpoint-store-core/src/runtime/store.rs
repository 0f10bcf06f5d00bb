// crates/checkpoint-store-core/src/runtime/store.rs
// ============================================================================
// Module: In-Memory State Storage
// Description: Process-local storage backend and shared storage wrapper.
// Purpose: Provide a dependency-free backend for tests and embedding.
// Dependencies: crate::core, crate::interfaces, crate::runtime::lock
// ============================================================================

//! ## Overview
//! [`InMemoryStateStorage`] keeps payloads in a map keyed by storage id. It
//! follows the same contract as the durable backends (absent on first use,
//! idempotent cleanup, full replace on save) but nothing survives the
//! process. [`SharedStateStorage`] wraps any backend in a clonable handle.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;

use tracing::debug;
use tracing::warn;

use crate::core::StatePayload;
use crate::interfaces::LockGuard;
use crate::interfaces::StateStorage;
use crate::interfaces::StorageError;
use crate::runtime::lock::ExternalLocker;
use crate::runtime::lock::LockerChoice;

/// Backend type name for the in-memory storage.
pub const IN_MEMORY_BACKEND_TYPE: &str = "InMemoryStorage";

// ============================================================================
// SECTION: In-Memory Storage
// ============================================================================

/// In-memory state storage for tests and examples.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStateStorage {
    /// Payloads keyed by storage id.
    entries: Arc<Mutex<BTreeMap<String, StatePayload>>>,
    /// Resolved locker; none by default.
    locker: ExternalLocker,
}

impl InMemoryStateStorage {
    /// Creates an empty storage without locking.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty storage with the given locker choice.
    ///
    /// `LockerChoice::Default` resolves to no locker.
    #[must_use]
    pub fn with_locker(choice: LockerChoice) -> Self {
        let locker = match choice {
            LockerChoice::Custom(locker) => ExternalLocker::from_locker(locker),
            LockerChoice::Default | LockerChoice::Disabled => ExternalLocker::disabled(),
        };
        Self {
            entries: Arc::new(Mutex::new(BTreeMap::new())),
            locker,
        }
    }

    /// Returns the number of stored keys.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] when the map mutex is poisoned.
    pub fn len(&self) -> Result<usize, StorageError> {
        Ok(self.entries()?.len())
    }

    /// Returns true when nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] when the map mutex is poisoned.
    pub fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.entries()?.is_empty())
    }

    /// Locks the payload map.
    fn entries(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, StatePayload>>, StorageError> {
        self.entries
            .lock()
            .map_err(|_| StorageError::Io("in-memory storage mutex poisoned".to_string()))
    }
}

impl StateStorage for InMemoryStateStorage {
    fn backend_type_name(&self) -> &'static str {
        IN_MEMORY_BACKEND_TYPE
    }

    fn lock(&self, key: &str) -> Result<LockGuard, StorageError> {
        self.locker.lock(key)
    }

    fn save_payload(&self, key: &str, payload: &StatePayload) -> Result<(), StorageError> {
        let storage_id = self.storage_id(key);
        debug!(storage_id = %storage_id, bytes = payload.as_bytes().len(), "saving state");
        self.entries()?.insert(storage_id, payload.clone());
        Ok(())
    }

    fn load_payload(&self, key: &str) -> Result<Option<StatePayload>, StorageError> {
        let storage_id = self.storage_id(key);
        let payload = self.entries()?.get(&storage_id).cloned();
        debug!(storage_id = %storage_id, found = payload.is_some(), "loaded state");
        Ok(payload)
    }

    fn cleanup(&self, key: &str, lock: &mut LockGuard) -> Result<(), StorageError> {
        let storage_id = self.storage_id(key);
        match self.entries() {
            Ok(mut entries) => {
                entries.remove(&storage_id);
            }
            Err(err) => {
                warn!(storage_id = %storage_id, error = %err, "cleanup delete suppressed");
            }
        }
        self.locker.release(lock)
    }
}

// ============================================================================
// SECTION: Shared Storage Wrapper
// ============================================================================

/// Shared state storage backed by an `Arc` trait object.
#[derive(Clone)]
pub struct SharedStateStorage {
    /// Inner storage implementation.
    inner: Arc<dyn StateStorage>,
}

impl SharedStateStorage {
    /// Wraps a storage backend in a shared, clonable wrapper.
    #[must_use]
    pub fn from_storage(storage: impl StateStorage + 'static) -> Self {
        Self {
            inner: Arc::new(storage),
        }
    }

    /// Wraps an existing shared storage.
    #[must_use]
    pub const fn new(storage: Arc<dyn StateStorage>) -> Self {
        Self {
            inner: storage,
        }
    }

    /// Returns the inner trait object.
    #[must_use]
    pub fn as_dyn(&self) -> Arc<dyn StateStorage> {
        Arc::clone(&self.inner)
    }
}

impl StateStorage for SharedStateStorage {
    fn backend_type_name(&self) -> &'static str {
        self.inner.backend_type_name()
    }

    fn storage_id(&self, key: &str) -> String {
        self.inner.storage_id(key)
    }

    fn lock(&self, key: &str) -> Result<LockGuard, StorageError> {
        self.inner.lock(key)
    }

    fn save_payload(&self, key: &str, payload: &StatePayload) -> Result<(), StorageError> {
        self.inner.save_payload(key, payload)
    }

    fn load_payload(&self, key: &str) -> Result<Option<StatePayload>, StorageError> {
        self.inner.load_payload(key)
    }

    fn cleanup(&self, key: &str, lock: &mut LockGuard) -> Result<(), StorageError> {
        self.inner.cleanup(key, lock)
    }
}
