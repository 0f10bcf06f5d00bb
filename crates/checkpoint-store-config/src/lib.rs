// crates/checkpoint-store-config/src/lib.rs
// ============================================================================
// Module: Checkpoint Store Config Library
// Description: Configuration model, validation, and backend construction.
// Purpose: Single source of truth for checkpoint-store.toml semantics.
// Dependencies: checkpoint-store-core, checkpoint-store-file, checkpoint-store-s3
// ============================================================================

//! ## Overview
//! `checkpoint-store-config` parses `checkpoint-store.toml`, validates it
//! fail-closed, and builds the configured backend as an
//! `Arc<dyn StateStorage>`.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
