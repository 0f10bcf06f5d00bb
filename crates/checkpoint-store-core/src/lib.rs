// crates/checkpoint-store-core/src/lib.rs
// ============================================================================
// Module: Checkpoint Store Core Library
// Description: Public API surface for the checkpoint store core.
// Purpose: Expose the storage contract, locker capability, and envelope codec.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Checkpoint store core defines how a long-running pipeline persists its full
//! in-memory state at every iteration boundary and resumes after a restart.
//! Backends implement [`StateStorage`]; mutual exclusion comes from an
//! injected [`Locker`]. This crate performs no durable I/O itself; see the
//! file and object-store backend crates.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use crate::core::*;

pub use interfaces::LockError;
pub use interfaces::LockGuard;
pub use interfaces::LockHandle;
pub use interfaces::Locker;
pub use interfaces::StateStorage;
pub use interfaces::StateStorageExt;
pub use interfaces::StorageError;
pub use runtime::CheckpointSession;
pub use runtime::ExternalLocker;
pub use runtime::IN_MEMORY_BACKEND_TYPE;
pub use runtime::InMemoryLocker;
pub use runtime::InMemoryStateStorage;
pub use runtime::LockerChoice;
pub use runtime::SharedStateStorage;
