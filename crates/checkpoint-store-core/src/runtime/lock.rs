// crates/checkpoint-store-core/src/runtime/lock.rs
// ============================================================================
// Module: Locker Resolution
// Description: Constructor-time locker selection shared by all backends.
// Purpose: Resolve an optional locker once and apply it uniformly per call.
// Dependencies: crate::interfaces
// ============================================================================

//! ## Overview
//! Backends accept a [`LockerChoice`] at construction. `Default` means "use
//! the backend's default", which may itself be no locker at all; `Disabled` is
//! an explicit opt-out that no default ever overrides. The choice is resolved
//! into an [`ExternalLocker`] exactly once and stored on the backend.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use crate::interfaces::LockError;
use crate::interfaces::LockGuard;
use crate::interfaces::Locker;
use crate::interfaces::StorageError;

// ============================================================================
// SECTION: Locker Choice
// ============================================================================

/// Caller's locker selection at backend construction.
#[derive(Clone, Default)]
pub enum LockerChoice {
    /// Apply the backend-specific default.
    #[default]
    Default,
    /// Perform no locking.
    Disabled,
    /// Use the supplied locker.
    Custom(Arc<dyn Locker>),
}

impl LockerChoice {
    /// Wraps a locker as an explicit choice.
    #[must_use]
    pub fn custom(locker: impl Locker + 'static) -> Self {
        Self::Custom(Arc::new(locker))
    }
}

impl From<Arc<dyn Locker>> for LockerChoice {
    fn from(locker: Arc<dyn Locker>) -> Self {
        Self::Custom(locker)
    }
}

impl fmt::Debug for LockerChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("Default"),
            Self::Disabled => f.write_str("Disabled"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

// ============================================================================
// SECTION: External Locker
// ============================================================================

/// Resolved locker slot held by a backend.
#[derive(Clone, Default)]
pub struct ExternalLocker {
    /// Resolved locker; `None` means no locking.
    locker: Option<Arc<dyn Locker>>,
}

impl ExternalLocker {
    /// Resolves a choice, calling `default` only for [`LockerChoice::Default`].
    ///
    /// # Errors
    ///
    /// Returns [`LockError`] when the default locker cannot be built.
    pub fn resolve<F>(choice: LockerChoice, default: F) -> Result<Self, LockError>
    where
        F: FnOnce() -> Result<Option<Arc<dyn Locker>>, LockError>,
    {
        let locker = match choice {
            LockerChoice::Default => default()?,
            LockerChoice::Disabled => None,
            LockerChoice::Custom(locker) => Some(locker),
        };
        Ok(Self {
            locker,
        })
    }

    /// Returns a slot backed by the given locker.
    #[must_use]
    pub fn from_locker(locker: Arc<dyn Locker>) -> Self {
        Self {
            locker: Some(locker),
        }
    }

    /// Returns a slot that performs no locking.
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            locker: None,
        }
    }

    /// Returns true when a locker is configured.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.locker.is_some()
    }

    /// Returns the configured locker.
    #[must_use]
    pub fn locker(&self) -> Option<&Arc<dyn Locker>> {
        self.locker.as_ref()
    }

    /// Acquires a guard for `key`, or an inert guard without a locker.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Lock`] when acquisition fails.
    pub fn lock(&self, key: &str) -> Result<LockGuard, StorageError> {
        match &self.locker {
            Some(locker) => Ok(LockGuard::acquire(Arc::clone(locker), key)?),
            None => Ok(LockGuard::inert(key)),
        }
    }

    /// Releases a guard as the final step of cleanup.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Lock`] when the release fails.
    pub fn release(&self, guard: &mut LockGuard) -> Result<(), StorageError> {
        guard.release()?;
        Ok(())
    }
}

impl fmt::Debug for ExternalLocker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternalLocker").field("enabled", &self.is_enabled()).finish()
    }
}
