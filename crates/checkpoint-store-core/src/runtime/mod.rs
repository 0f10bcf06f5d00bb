// crates/checkpoint-store-core/src/runtime/mod.rs
// ============================================================================
// Module: Checkpoint Store Runtime
// Description: Locker resolution, in-process backends, and session driver.
// Purpose: Provide the reusable runtime pieces shared by every backend.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! Runtime helpers sit between the interfaces and concrete backends: locker
//! resolution used by every backend constructor, an in-process locker and
//! storage, and the session type pipeline runners drive.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod lock;
pub mod locker;
pub mod session;
pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use lock::ExternalLocker;
pub use lock::LockerChoice;
pub use locker::InMemoryLocker;
pub use session::CheckpointSession;
pub use store::IN_MEMORY_BACKEND_TYPE;
pub use store::InMemoryStateStorage;
pub use store::SharedStateStorage;
