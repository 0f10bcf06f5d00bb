// crates/checkpoint-store-core/src/core/mod.rs
// ============================================================================
// Module: Checkpoint Store Core Types
// Description: Key digest and stored value envelope.
// Purpose: Group the backend-independent data model.
// Dependencies: crate::core::{digest, envelope}
// ============================================================================

//! ## Overview
//! Core types are pure data and codec logic. They perform no I/O.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod digest;
pub mod envelope;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use digest::KEY_DIGEST_LEN;
pub use digest::derive_storage_id;
pub use digest::is_storage_safe;
pub use digest::key_digest;
pub use envelope::Envelope;
pub use envelope::EnvelopeError;
pub use envelope::PRODUCER_NAME;
pub use envelope::PRODUCER_VERSION;
pub use envelope::StatePayload;
pub use envelope::StoredMeta;
