// crates/checkpoint-store-core/src/runtime/locker.rs
// ============================================================================
// Module: In-Process Locker
// Description: Per-key exclusive locks shared within one process.
// Purpose: Serialize pipelines that share a key inside a single process.
// Dependencies: crate::interfaces
// ============================================================================

//! ## Overview
//! [`InMemoryLocker`] blocks on a condition variable until the key is free.
//! Clones share state, so every clone handed to a backend guards the same key
//! space. It gives no guarantee across processes.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::Condvar;
use std::sync::Mutex;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use crate::interfaces::LockError;
use crate::interfaces::LockHandle;
use crate::interfaces::Locker;

/// Source of distinct locker identities.
static NEXT_LOCKER_ID: AtomicU64 = AtomicU64::new(1);

/// Shared lock table.
#[derive(Debug, Default)]
struct LockTable {
    /// Keys currently held.
    held: Mutex<BTreeSet<String>>,
    /// Signalled whenever a key is released.
    released: Condvar,
}

/// Token stored in handles issued by [`InMemoryLocker`].
#[derive(Debug)]
struct InMemoryLockToken {
    /// Identity of the issuing locker.
    locker_id: u64,
}

/// In-process locker keyed by string.
#[derive(Debug, Clone)]
pub struct InMemoryLocker {
    /// Identity used to reject foreign handles.
    id: u64,
    /// Lock table shared by clones.
    table: Arc<LockTable>,
}

impl Default for InMemoryLocker {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryLocker {
    /// Creates an empty locker.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: NEXT_LOCKER_ID.fetch_add(1, Ordering::Relaxed),
            table: Arc::new(LockTable::default()),
        }
    }

    /// Acquires the key only when it is free right now.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Poisoned`] when the lock table is poisoned.
    pub fn try_acquire(&self, key: &str) -> Result<Option<LockHandle>, LockError> {
        let mut held = self.held()?;
        if held.contains(key) {
            return Ok(None);
        }
        held.insert(key.to_string());
        drop(held);
        Ok(Some(self.issue(key)))
    }

    /// Returns true while some handle holds the key.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Poisoned`] when the lock table is poisoned.
    pub fn is_locked(&self, key: &str) -> Result<bool, LockError> {
        Ok(self.held()?.contains(key))
    }

    /// Locks the held-key set.
    fn held(&self) -> Result<std::sync::MutexGuard<'_, BTreeSet<String>>, LockError> {
        self.table.held.lock().map_err(|_| LockError::Poisoned("in-memory lock table".to_string()))
    }

    /// Builds a handle owned by this locker.
    fn issue(&self, key: &str) -> LockHandle {
        LockHandle::new(
            key,
            InMemoryLockToken {
                locker_id: self.id,
            },
        )
    }
}

impl Locker for InMemoryLocker {
    fn acquire(&self, key: &str) -> Result<LockHandle, LockError> {
        let mut held = self.held()?;
        while held.contains(key) {
            held = self
                .table
                .released
                .wait(held)
                .map_err(|_| LockError::Poisoned("in-memory lock table".to_string()))?;
        }
        held.insert(key.to_string());
        drop(held);
        Ok(self.issue(key))
    }

    fn release(&self, handle: &mut LockHandle) -> Result<(), LockError> {
        if !handle.is_held() {
            return Ok(());
        }
        match handle.token::<InMemoryLockToken>() {
            Some(token) if token.locker_id == self.id => {}
            _ => {
                return Err(LockError::Invalid(
                    "handle was not issued by this in-memory locker".to_string(),
                ));
            }
        }
        let mut held = self.held()?;
        held.remove(handle.key());
        drop(held);
        handle.clear();
        self.table.released.notify_all();
        Ok(())
    }
}
