// crates/checkpoint-store-core/src/interfaces/mod.rs
// ============================================================================
// Module: Checkpoint Store Interfaces
// Description: Storage contract and locker capability.
// Purpose: Define the surfaces pipeline runners and backends agree on.
// Dependencies: crate::core, serde, thiserror, tracing
// ============================================================================

//! ## Overview
//! [`StateStorage`] is the uniform contract every backend implements:
//! `lock`, `save`, `load`, and `cleanup`. Runners hold it as a trait object and
//! never branch on the concrete backend. [`Locker`] is the consumed
//! mutual-exclusion capability; the core only moves its [`LockHandle`] around
//! and never inspects what is inside.
//!
//! Storage calls are blocking. Async callers should move them onto a
//! blocking-capable executor thread.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::warn;

use crate::core::EnvelopeError;
use crate::core::StatePayload;
use crate::core::derive_storage_id;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Storage errors surfaced to pipeline runners.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Local I/O failure.
    #[error("state storage io error: {0}")]
    Io(String),
    /// Stored envelope exists but cannot be decoded.
    #[error("state storage corruption: {0}")]
    Corrupt(String),
    /// Value could not be encoded for storage.
    #[error("state storage codec error: {0}")]
    Codec(String),
    /// Object-store transport or permission failure.
    #[error("state storage transport error: {0}")]
    Transport(String),
    /// Locker failure.
    #[error("state storage lock error: {0}")]
    Lock(#[from] LockError),
    /// Invalid construction input.
    #[error("state storage invalid: {0}")]
    Invalid(String),
}

impl From<EnvelopeError> for StorageError {
    fn from(error: EnvelopeError) -> Self {
        match error {
            EnvelopeError::Codec(message) => Self::Codec(message),
            EnvelopeError::Corrupt(message) => Self::Corrupt(message),
        }
    }
}

/// Locker errors.
#[derive(Debug, Error)]
pub enum LockError {
    /// Lock artifact I/O failure.
    #[error("lock io error: {0}")]
    Io(String),
    /// Locker internal state is poisoned.
    #[error("lock state poisoned: {0}")]
    Poisoned(String),
    /// Handle or input is not valid for this locker.
    #[error("lock invalid: {0}")]
    Invalid(String),
    /// Lock backend reported an error.
    #[error("lock backend error: {0}")]
    Backend(String),
}

// ============================================================================
// SECTION: Lock Handle
// ============================================================================

/// Opaque token issued by a [`Locker`] for one key.
///
/// The token is owned by whoever acquired it until released. Only the issuing
/// locker knows its concrete type.
pub struct LockHandle {
    /// Key the lock was acquired for.
    key: String,
    /// Locker-specific token; `None` once released or for inert handles.
    token: Option<Box<dyn Any + Send + Sync>>,
}

impl LockHandle {
    /// Creates a held handle carrying a locker-specific token.
    #[must_use]
    pub fn new<T: Any + Send + Sync>(key: impl Into<String>, token: T) -> Self {
        Self {
            key: key.into(),
            token: Some(Box::new(token)),
        }
    }

    /// Creates a handle that represents "no locking performed".
    #[must_use]
    pub fn inert(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            token: None,
        }
    }

    /// Returns the key the handle was issued for.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns true while the handle still carries a token.
    #[must_use]
    pub const fn is_held(&self) -> bool {
        self.token.is_some()
    }

    /// Borrows the token when it has the expected type.
    #[must_use]
    pub fn token<T: Any>(&self) -> Option<&T> {
        self.token.as_ref().and_then(|token| token.downcast_ref::<T>())
    }

    /// Removes the token when it has the expected type.
    ///
    /// A token of another type is left in place.
    pub fn take_token<T: Any + Send + Sync>(&mut self) -> Option<Box<T>> {
        let token = self.token.take()?;
        match token.downcast::<T>() {
            Ok(token) => Some(token),
            Err(other) => {
                self.token = Some(other);
                None
            }
        }
    }

    /// Drops the token, marking the handle as released.
    pub fn clear(&mut self) {
        self.token = None;
    }
}

impl fmt::Debug for LockHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockHandle").field("key", &self.key).field("held", &self.is_held()).finish()
    }
}

// ============================================================================
// SECTION: Locker
// ============================================================================

/// Mutual-exclusion capability guarding keys across pipeline instances.
///
/// Implementations decide the algorithm (advisory file locks, coordination
/// services, in-process maps) and bound their own waiting time.
pub trait Locker: Send + Sync {
    /// Acquires the lock for a key, blocking until it is granted.
    ///
    /// # Errors
    ///
    /// Returns [`LockError`] when the lock cannot be acquired.
    fn acquire(&self, key: &str) -> Result<LockHandle, LockError>;

    /// Releases a handle and any residual lock artifacts.
    ///
    /// Releasing a handle that is no longer held is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`LockError`] when the release fails or the handle was issued
    /// by another locker.
    fn release(&self, handle: &mut LockHandle) -> Result<(), LockError>;
}

// ============================================================================
// SECTION: Lock Guard
// ============================================================================

/// Scoped lock returned by [`StateStorage::lock`].
///
/// The guard releases its handle when dropped, so every exit path of the
/// protected region (early return, `?`, panic) gives the lock back. Callers
/// that need the release outcome call [`LockGuard::release`] explicitly.
pub struct LockGuard {
    /// Locker that issued the handle; `None` for inert guards.
    locker: Option<Arc<dyn Locker>>,
    /// Handle issued for the guarded key.
    handle: LockHandle,
}

impl LockGuard {
    /// Acquires a lock for `key` through `locker`.
    ///
    /// # Errors
    ///
    /// Returns [`LockError`] when the locker fails to acquire.
    pub fn acquire(locker: Arc<dyn Locker>, key: &str) -> Result<Self, LockError> {
        let handle = locker.acquire(key)?;
        Ok(Self {
            locker: Some(locker),
            handle,
        })
    }

    /// Returns a guard that performs no locking.
    #[must_use]
    pub fn inert(key: &str) -> Self {
        Self {
            locker: None,
            handle: LockHandle::inert(key),
        }
    }

    /// Returns the guarded key.
    #[must_use]
    pub fn key(&self) -> &str {
        self.handle.key()
    }

    /// Returns true when a locker backs this guard.
    ///
    /// An inert guard gives no exclusivity guarantee.
    #[must_use]
    pub const fn is_locking(&self) -> bool {
        self.locker.is_some()
    }

    /// Returns true while the underlying handle is held.
    #[must_use]
    pub const fn is_held(&self) -> bool {
        self.handle.is_held()
    }

    /// Borrows the underlying handle.
    #[must_use]
    pub const fn handle(&self) -> &LockHandle {
        &self.handle
    }

    /// Releases the lock now.
    ///
    /// Idempotent: a second call after a successful release does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`LockError`] when the locker fails to release.
    pub fn release(&mut self) -> Result<(), LockError> {
        if let Some(locker) = &self.locker
            && self.handle.is_held()
        {
            locker.release(&mut self.handle)?;
            self.handle.clear();
        }
        Ok(())
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            warn!(error = %err, "lock release on scope exit failed");
        }
    }
}

impl fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockGuard")
            .field("locking", &self.is_locking())
            .field("handle", &self.handle)
            .finish()
    }
}

// ============================================================================
// SECTION: State Storage
// ============================================================================

/// Uniform storage contract implemented by every backend.
pub trait StateStorage: Send + Sync {
    /// Returns the backend type name used to scope storage ids.
    fn backend_type_name(&self) -> &'static str;

    /// Returns the backend-local storage id for a key.
    fn storage_id(&self, key: &str) -> String {
        derive_storage_id(self.backend_type_name(), key)
    }

    /// Acquires the configured lock for a key.
    ///
    /// Returns an inert guard when no locker is configured.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Lock`] when acquisition fails.
    fn lock(&self, key: &str) -> Result<LockGuard, StorageError>;

    /// Persists an encoded payload, fully replacing any prior value.
    ///
    /// Readers observe either the complete prior envelope or the complete new
    /// one.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the write fails.
    fn save_payload(&self, key: &str, payload: &StatePayload) -> Result<(), StorageError>;

    /// Loads the encoded payload for a key.
    ///
    /// Returns `Ok(None)` when nothing has been stored under the key.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Corrupt`] for present but undecodable data and
    /// other variants for I/O or transport failures.
    fn load_payload(&self, key: &str) -> Result<Option<StatePayload>, StorageError>;

    /// Deletes stored state for a key, then releases the lock.
    ///
    /// Deletion is best-effort and idempotent; lock release errors propagate.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Lock`] when the lock cannot be released.
    fn cleanup(&self, key: &str, lock: &mut LockGuard) -> Result<(), StorageError>;
}

/// Typed save/load helpers for any [`StateStorage`].
pub trait StateStorageExt: StateStorage {
    /// Encodes and saves a value under a key.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when encoding or persisting fails.
    fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let payload = StatePayload::encode(value)?;
        self.save_payload(key, &payload)
    }

    /// Loads and decodes the value stored under a key.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Corrupt`] when the stored value does not decode
    /// as `T`.
    fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        match self.load_payload(key)? {
            Some(payload) => Ok(Some(payload.decode()?)),
            None => Ok(None),
        }
    }
}

impl<S: StateStorage + ?Sized> StateStorageExt for S {}
