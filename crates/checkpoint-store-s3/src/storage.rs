// crates/checkpoint-store-s3/src/storage.rs
// ============================================================================
// Module: Object State Storage
// Description: StateStorage writing one object per key into a bucket.
// Purpose: Crash-recoverable pipeline state in object storage.
// Dependencies: checkpoint-store-core, base64, tracing
// ============================================================================

//! ## Overview
//! The object for key `K` is named `<prefix>ObjectStorage_<digest(K)>`. Its
//! body is the base64 payload; the original key and write provenance are
//! attached as object metadata. A missing object or an empty body loads as
//! `None`. Any other bucket failure propagates, except during cleanup, where
//! deletion failures are logged and suppressed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use checkpoint_store_core::ExternalLocker;
use checkpoint_store_core::LockGuard;
use checkpoint_store_core::LockerChoice;
use checkpoint_store_core::StatePayload;
use checkpoint_store_core::StateStorage;
use checkpoint_store_core::StorageError;
use checkpoint_store_core::StoredMeta;
use checkpoint_store_core::key_digest;
use tracing::debug;
use tracing::warn;

use crate::bucket::Bucket;
use crate::bucket::BucketError;
use crate::bucket::ObjectMetadata;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Backend type name scoping object names.
pub const OBJECT_BACKEND_TYPE: &str = "ObjectStorage";
/// Metadata field holding a printable original key.
pub const KEY_METADATA_FIELD: &str = "key";
/// Metadata field holding a base64 original key.
pub const KEY_B64_METADATA_FIELD: &str = "key-b64";
/// Metadata field holding the key digest when the key is too long to attach.
pub const KEY_DIGEST_METADATA_FIELD: &str = "key-digest";
/// Largest key metadata value; S3 caps all user metadata at 2 KB.
const MAX_KEY_METADATA_LENGTH: usize = 1024;
/// Maximum length of a single prefix segment.
const MAX_PREFIX_SEGMENT_LENGTH: usize = 255;
/// Maximum total prefix length.
const MAX_PREFIX_LENGTH: usize = 512;

// ============================================================================
// SECTION: Storage
// ============================================================================

/// Object-storage state storage.
#[derive(Clone)]
pub struct ObjectStorage {
    /// Caller-supplied bucket.
    bucket: Arc<dyn Bucket>,
    /// Normalized object-name prefix; empty or ending in `/`.
    prefix: String,
    /// Resolved locker.
    locker: ExternalLocker,
}

impl ObjectStorage {
    /// Creates a storage over `bucket`.
    ///
    /// There is no default locker: `LockerChoice::Default` resolves to no
    /// locking, the same as `Disabled`.
    #[must_use]
    pub fn new(bucket: Arc<dyn Bucket>, locker: LockerChoice) -> Self {
        let locker = match locker {
            LockerChoice::Custom(locker) => ExternalLocker::from_locker(locker),
            LockerChoice::Default | LockerChoice::Disabled => ExternalLocker::disabled(),
        };
        Self {
            bucket,
            prefix: String::new(),
            locker,
        }
    }

    /// Places all objects under a prefix such as `pipelines/prod`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Invalid`] when the prefix is absolute or
    /// contains traversal segments.
    pub fn with_prefix(mut self, prefix: &str) -> Result<Self, StorageError> {
        self.prefix = normalize_prefix(prefix)?;
        Ok(self)
    }

    /// Returns the normalized prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns the resolved locker slot.
    #[must_use]
    pub const fn locker(&self) -> &ExternalLocker {
        &self.locker
    }

    /// Returns the object name for a key.
    #[must_use]
    pub fn object_name(&self, key: &str) -> String {
        format!("{}{}", self.prefix, self.storage_id(key))
    }
}

impl fmt::Debug for ObjectStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectStorage")
            .field("prefix", &self.prefix)
            .field("locker", &self.locker)
            .finish_non_exhaustive()
    }
}

impl StateStorage for ObjectStorage {
    fn backend_type_name(&self) -> &'static str {
        OBJECT_BACKEND_TYPE
    }

    fn lock(&self, key: &str) -> Result<LockGuard, StorageError> {
        self.locker.lock(key)
    }

    fn save_payload(&self, key: &str, payload: &StatePayload) -> Result<(), StorageError> {
        let name = self.object_name(key);
        let body = payload.to_base64().into_bytes();
        let bytes = body.len();
        self.bucket.put_object(&name, body, &object_metadata(key))?;
        debug!(object = %name, bytes, "state saved");
        Ok(())
    }

    fn load_payload(&self, key: &str) -> Result<Option<StatePayload>, StorageError> {
        let name = self.object_name(key);
        let body = match self.bucket.get_object(&name) {
            Ok(body) => body,
            Err(BucketError::NotFound(_)) => {
                debug!(object = %name, "no stored state");
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };
        if body.is_empty() {
            return Ok(None);
        }
        let payload = StatePayload::from_base64(&body)?;
        debug!(object = %name, bytes = body.len(), "state loaded");
        Ok(Some(payload))
    }

    fn cleanup(&self, key: &str, lock: &mut LockGuard) -> Result<(), StorageError> {
        let name = self.object_name(key);
        match self.bucket.delete_object(&name) {
            Ok(()) | Err(BucketError::NotFound(_)) => debug!(object = %name, "state removed"),
            Err(err) => warn!(object = %name, error = %err, "cleanup delete suppressed"),
        }
        self.locker.release(lock)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds object metadata: the original key plus write provenance.
///
/// Printable keys travel as-is, other keys as base64. A key whose encoded form
/// exceeds [`MAX_KEY_METADATA_LENGTH`] is recorded by digest only.
fn object_metadata(key: &str) -> ObjectMetadata {
    let mut metadata = StoredMeta::current().to_metadata();
    let (field, value) = if is_metadata_safe(key) {
        (KEY_METADATA_FIELD, key.to_string())
    } else {
        (KEY_B64_METADATA_FIELD, STANDARD.encode(key.as_bytes()))
    };
    if value.len() <= MAX_KEY_METADATA_LENGTH {
        metadata.insert(field.to_string(), value);
    } else {
        metadata.insert(KEY_DIGEST_METADATA_FIELD.to_string(), key_digest(key));
    }
    metadata
}

/// Returns true when a value survives as a printable ASCII header unchanged.
///
/// Surrounding spaces are trimmed by HTTP header parsing.
fn is_metadata_safe(value: &str) -> bool {
    !value.starts_with(' ')
        && !value.ends_with(' ')
        && value.bytes().all(|byte| byte.is_ascii_graphic() || byte == b' ')
}

/// Normalizes an object-name prefix into `""` or `"segment/.../"`.
///
/// # Errors
///
/// Returns [`StorageError::Invalid`] when the prefix is absolute, too long,
/// or contains empty, `.`, `..`, or backslash segments.
pub fn normalize_prefix(raw: &str) -> Result<String, StorageError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(String::new());
    }
    if trimmed.starts_with('/') {
        return Err(StorageError::Invalid(
            "prefix must be relative (no leading slash)".to_string(),
        ));
    }
    let normalized = trimmed.strip_suffix('/').unwrap_or(trimmed);
    if normalized.len() > MAX_PREFIX_LENGTH {
        return Err(StorageError::Invalid("prefix exceeds length limit".to_string()));
    }
    for segment in normalized.split('/') {
        validate_segment(segment)?;
    }
    Ok(format!("{normalized}/"))
}

/// Validates a single prefix segment.
fn validate_segment(value: &str) -> Result<(), StorageError> {
    if value.is_empty() || value == "." || value == ".." {
        return Err(StorageError::Invalid(format!("prefix segment is invalid: '{value}'")));
    }
    if value.len() > MAX_PREFIX_SEGMENT_LENGTH {
        return Err(StorageError::Invalid("prefix segment exceeds length limit".to_string()));
    }
    if value.contains('\\') || value.chars().any(char::is_control) {
        return Err(StorageError::Invalid(
            "prefix segment contains invalid characters".to_string(),
        ));
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only assertions are permitted."
    )]

    use super::*;

    #[test]
    fn prefix_normalization() {
        assert_eq!(normalize_prefix("").unwrap(), "");
        assert_eq!(normalize_prefix("  ").unwrap(), "");
        assert_eq!(normalize_prefix("pipelines").unwrap(), "pipelines/");
        assert_eq!(normalize_prefix("a/b/").unwrap(), "a/b/");
        assert!(normalize_prefix("/abs").is_err());
        assert!(normalize_prefix("a//b").is_err());
        assert!(normalize_prefix("a/../b").is_err());
        assert!(normalize_prefix("a\\b").is_err());
    }

    #[test]
    fn metadata_carries_printable_key_directly() {
        let metadata = object_metadata("pipeline-1");
        assert_eq!(metadata.get(KEY_METADATA_FIELD).map(String::as_str), Some("pipeline-1"));
        assert!(!metadata.contains_key(KEY_B64_METADATA_FIELD));
    }

    #[test]
    fn metadata_encodes_non_ascii_key() {
        let metadata = object_metadata("ключ");
        assert!(!metadata.contains_key(KEY_METADATA_FIELD));
        assert_eq!(
            metadata.get(KEY_B64_METADATA_FIELD).map(String::as_str),
            Some(STANDARD.encode("ключ".as_bytes()).as_str())
        );
    }

    #[test]
    fn metadata_encodes_key_with_surrounding_spaces() {
        let metadata = object_metadata(" job ");
        assert!(!metadata.contains_key(KEY_METADATA_FIELD));
        assert_eq!(
            metadata.get(KEY_B64_METADATA_FIELD).map(String::as_str),
            Some(STANDARD.encode(b" job ").as_str())
        );
        assert_eq!(
            object_metadata("a b").get(KEY_METADATA_FIELD).map(String::as_str),
            Some("a b")
        );
    }

    #[test]
    fn metadata_records_digest_for_oversized_key() {
        let key = "k".repeat(4096);
        let metadata = object_metadata(&key);
        assert!(!metadata.contains_key(KEY_METADATA_FIELD));
        assert!(!metadata.contains_key(KEY_B64_METADATA_FIELD));
        assert_eq!(
            metadata.get(KEY_DIGEST_METADATA_FIELD).map(String::as_str),
            Some(key_digest(&key).as_str())
        );
        let total: usize = metadata.iter().map(|(name, value)| name.len() + value.len()).sum();
        assert!(total < 2048);
    }
}
