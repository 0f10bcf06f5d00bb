// crates/checkpoint-store-s3/src/lib.rs
// ============================================================================
// Module: Checkpoint Store Object Backend
// Description: Object-storage StateStorage over a supplied bucket capability.
// Purpose: Persist pipeline state as objects with provenance metadata.
// Dependencies: checkpoint-store-core, base64, thiserror, tracing, aws-sdk-s3
// ============================================================================

//! ## Overview
//! [`ObjectStorage`] stores one object per key in a [`Bucket`]: the body is
//! the base64 payload, and provenance travels as object metadata so it can be
//! inspected without downloading the body. The bucket is a caller-supplied
//! capability; the caller owns credentials, region, and session setup.
//! [`InMemoryBucket`] backs tests and demos. With the `s3` feature,
//! `S3Bucket` adapts `aws-sdk-s3`.
//!
//! There is no default locker. Without one, concurrent writers of the same
//! key are not serialized.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod bucket;
#[cfg(feature = "s3")]
pub mod s3;
pub mod storage;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use bucket::Bucket;
pub use bucket::BucketError;
pub use bucket::InMemoryBucket;
pub use bucket::ObjectMetadata;
#[cfg(feature = "s3")]
pub use s3::S3Bucket;
#[cfg(feature = "s3")]
pub use s3::S3BucketConfig;
pub use storage::KEY_B64_METADATA_FIELD;
pub use storage::KEY_DIGEST_METADATA_FIELD;
pub use storage::KEY_METADATA_FIELD;
pub use storage::OBJECT_BACKEND_TYPE;
pub use storage::ObjectStorage;
pub use storage::normalize_prefix;
