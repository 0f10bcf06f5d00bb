// crates/checkpoint-store-s3/src/bucket.rs
// ============================================================================
// Module: Bucket Capability
// Description: Minimal object-store surface consumed by ObjectStorage.
// Purpose: Decouple the backend from any particular object-store client.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! [`Bucket`] is the three-call surface the object backend needs. Clients
//! report a missing object as [`BucketError::NotFound`]; every other failure
//! is [`BucketError::Transport`] and is never treated as "absent".

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;

use checkpoint_store_core::StorageError;
use thiserror::Error;

// ============================================================================
// SECTION: Types
// ============================================================================

/// String metadata attached to an object.
pub type ObjectMetadata = BTreeMap<String, String>;

/// Error code/message pair some clients use for a missing object.
const NOT_FOUND_FIELDS: (&str, &str) = ("404", "Not Found");
/// S3 error code for a missing key.
const NO_SUCH_KEY_CODE: &str = "NoSuchKey";

/// Bucket client errors.
#[derive(Debug, Error)]
pub enum BucketError {
    /// The object does not exist.
    #[error("object not found: {0}")]
    NotFound(String),
    /// Any other transport, permission, or service failure.
    #[error("object store transport error: {0}")]
    Transport(String),
    /// The request or client configuration is invalid.
    #[error("object store invalid: {0}")]
    Invalid(String),
}

impl BucketError {
    /// Classifies a structured error code/message pair.
    ///
    /// `("404", "Not Found")` and the `NoSuchKey` code are not-found; anything
    /// else is a transport failure.
    #[must_use]
    pub fn from_error_fields(code: &str, message: &str) -> Self {
        if (code, message) == NOT_FOUND_FIELDS || code == NO_SUCH_KEY_CODE {
            return Self::NotFound(format!("{code} {message}"));
        }
        Self::Transport(format!("{code}: {message}"))
    }

    /// Returns true for the not-found signal.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<BucketError> for StorageError {
    fn from(error: BucketError) -> Self {
        match error {
            BucketError::NotFound(message) | BucketError::Transport(message) => {
                Self::Transport(message)
            }
            BucketError::Invalid(message) => Self::Invalid(message),
        }
    }
}

// ============================================================================
// SECTION: Bucket
// ============================================================================

/// Caller-supplied bucket-like resource.
///
/// Each call is a single request: `put_object` replaces the object atomically
/// from a reader's point of view.
pub trait Bucket: Send + Sync {
    /// Writes an object, replacing any existing one.
    ///
    /// # Errors
    ///
    /// Returns [`BucketError`] when the upload fails.
    fn put_object(
        &self,
        name: &str,
        body: Vec<u8>,
        metadata: &ObjectMetadata,
    ) -> Result<(), BucketError>;

    /// Reads an object body.
    ///
    /// # Errors
    ///
    /// Returns [`BucketError::NotFound`] for a missing object and other
    /// variants for failures.
    fn get_object(&self, name: &str) -> Result<Vec<u8>, BucketError>;

    /// Deletes an object.
    ///
    /// # Errors
    ///
    /// Returns [`BucketError`] when the delete fails.
    fn delete_object(&self, name: &str) -> Result<(), BucketError>;
}

// ============================================================================
// SECTION: In-Memory Bucket
// ============================================================================

/// Stored object in an [`InMemoryBucket`].
#[derive(Debug, Clone)]
struct StoredObject {
    /// Object body.
    body: Vec<u8>,
    /// Object metadata.
    metadata: ObjectMetadata,
}

/// Process-local bucket for tests and demos.
///
/// Clones share the same objects. Deleting a missing object succeeds, as it
/// does on S3.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBucket {
    /// Objects keyed by name.
    objects: Arc<Mutex<BTreeMap<String, StoredObject>>>,
}

impl InMemoryBucket {
    /// Creates an empty bucket.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the metadata of an object, if present.
    ///
    /// # Errors
    ///
    /// Returns [`BucketError::Transport`] when the bucket mutex is poisoned.
    pub fn metadata(&self, name: &str) -> Result<Option<ObjectMetadata>, BucketError> {
        Ok(self.objects()?.get(name).map(|object| object.metadata.clone()))
    }

    /// Returns the names of all stored objects in order.
    ///
    /// # Errors
    ///
    /// Returns [`BucketError::Transport`] when the bucket mutex is poisoned.
    pub fn object_names(&self) -> Result<Vec<String>, BucketError> {
        Ok(self.objects()?.keys().cloned().collect())
    }

    /// Locks the object map.
    fn objects(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, StoredObject>>, BucketError> {
        self.objects
            .lock()
            .map_err(|_| BucketError::Transport("in-memory bucket mutex poisoned".to_string()))
    }
}

impl Bucket for InMemoryBucket {
    fn put_object(
        &self,
        name: &str,
        body: Vec<u8>,
        metadata: &ObjectMetadata,
    ) -> Result<(), BucketError> {
        let object = StoredObject {
            body,
            metadata: metadata.clone(),
        };
        self.objects()?.insert(name.to_string(), object);
        Ok(())
    }

    fn get_object(&self, name: &str) -> Result<Vec<u8>, BucketError> {
        self.objects()?
            .get(name)
            .map(|object| object.body.clone())
            .ok_or_else(|| BucketError::NotFound(name.to_string()))
    }

    fn delete_object(&self, name: &str) -> Result<(), BucketError> {
        self.objects()?.remove(name);
        Ok(())
    }
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
    fn error_fields_classify_not_found() {
        assert!(BucketError::from_error_fields("404", "Not Found").is_not_found());
        assert!(BucketError::from_error_fields("NoSuchKey", "missing").is_not_found());
        assert!(!BucketError::from_error_fields("404", "Gone Fishing").is_not_found());
        assert!(!BucketError::from_error_fields("403", "Forbidden").is_not_found());
        assert!(matches!(
            BucketError::from_error_fields("500", "Internal Error"),
            BucketError::Transport(_)
        ));
    }

    #[test]
    fn in_memory_bucket_round_trips_body_and_metadata() {
        let bucket = InMemoryBucket::new();
        let mut metadata = ObjectMetadata::new();
        metadata.insert("key".to_string(), "k".to_string());
        bucket.put_object("obj", b"body".to_vec(), &metadata).unwrap();

        assert_eq!(bucket.get_object("obj").unwrap(), b"body".to_vec());
        assert_eq!(bucket.metadata("obj").unwrap(), Some(metadata));
        assert_eq!(bucket.object_names().unwrap(), vec!["obj".to_string()]);

        bucket.delete_object("obj").unwrap();
        bucket.delete_object("obj").unwrap();
        assert!(bucket.get_object("obj").unwrap_err().is_not_found());
    }
}
