// crates/checkpoint-store-file/src/lib.rs
// ============================================================================
// Module: Checkpoint Store File Backend
// Description: Local filesystem StateStorage and its default locker.
// Purpose: Persist pipeline state as JSON envelopes in a directory.
// Dependencies: checkpoint-store-core, fs2, tracing
// ============================================================================

//! ## Overview
//! This crate provides [`FileStorage`], a [`StateStorage`] that writes one JSON
//! envelope per key into a base directory, and [`FileLocker`], the advisory
//! file locker it uses by default. Writes go through a temp file and an atomic
//! rename so readers never see a torn envelope.
//!
//! [`StateStorage`]: checkpoint_store_core::StateStorage

// ============================================================================
// SECTION: Modules
// ============================================================================

mod atomic;
pub mod locker;
pub mod storage;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use locker::FILE_LOCKER_TYPE;
pub use locker::FileLocker;
pub use storage::FILE_BACKEND_TYPE;
pub use storage::FileStorage;
pub use storage::FileStorageConfig;
