// crates/checkpoint-store-s3/tests/object_storage.rs
// ============================================================================
// Module: Object Storage Tests
// Description: Verifies object layout, not-found mapping, and cleanup policy.
// ============================================================================
//! ## Overview
//! Runs [`ObjectStorage`] against the in-memory bucket, a scripted failing
//! bucket, and a directory-backed bucket shared with the file backend.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use checkpoint_store_core::InMemoryLocker;
use checkpoint_store_core::LockerChoice;
use checkpoint_store_core::StateStorage;
use checkpoint_store_core::StateStorageExt;
use checkpoint_store_core::StorageError;
use checkpoint_store_core::key_digest;
use checkpoint_store_file::FileStorage;
use checkpoint_store_s3::Bucket;
use checkpoint_store_s3::BucketError;
use checkpoint_store_s3::InMemoryBucket;
use checkpoint_store_s3::KEY_DIGEST_METADATA_FIELD;
use checkpoint_store_s3::ObjectMetadata;
use checkpoint_store_s3::ObjectStorage;
use serde::Deserialize;
use serde::Serialize;
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Progress {
    offset: u64,
}

/// Bucket whose every call fails with a fixed code/message pair.
struct ScriptedBucket {
    code: &'static str,
    message: &'static str,
}

impl Bucket for ScriptedBucket {
    fn put_object(&self, _: &str, _: Vec<u8>, _: &ObjectMetadata) -> Result<(), BucketError> {
        Err(BucketError::from_error_fields(self.code, self.message))
    }

    fn get_object(&self, _: &str) -> Result<Vec<u8>, BucketError> {
        Err(BucketError::from_error_fields(self.code, self.message))
    }

    fn delete_object(&self, _: &str) -> Result<(), BucketError> {
        Err(BucketError::from_error_fields(self.code, self.message))
    }
}

/// Bucket storing objects as files in a directory.
struct DirBucket {
    dir: PathBuf,
}

impl Bucket for DirBucket {
    fn put_object(&self, name: &str, body: Vec<u8>, _: &ObjectMetadata) -> Result<(), BucketError> {
        fs::write(self.dir.join(name), body).map_err(|err| BucketError::Transport(err.to_string()))
    }

    fn get_object(&self, name: &str) -> Result<Vec<u8>, BucketError> {
        fs::read(self.dir.join(name)).map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => BucketError::NotFound(name.to_string()),
            _ => BucketError::Transport(err.to_string()),
        })
    }

    fn delete_object(&self, name: &str) -> Result<(), BucketError> {
        fs::remove_file(self.dir.join(name)).map_err(|err| BucketError::Transport(err.to_string()))
    }
}

fn storage_over(bucket: &InMemoryBucket) -> ObjectStorage {
    ObjectStorage::new(Arc::new(bucket.clone()), LockerChoice::Default)
}

#[test]
fn save_then_load_returns_value() {
    let bucket = InMemoryBucket::new();
    let storage = storage_over(&bucket);
    storage.save("job", &Progress { offset: 5 }).unwrap();
    storage.save("job", &Progress { offset: 6 }).unwrap();
    assert_eq!(storage.load::<Progress>("job").unwrap(), Some(Progress { offset: 6 }));
    assert_eq!(bucket.object_names().unwrap().len(), 1);
}

#[test]
fn load_of_unknown_key_is_absent() {
    let storage = storage_over(&InMemoryBucket::new());
    assert_eq!(storage.load::<Progress>("never-saved").unwrap(), None);
}

#[test]
fn structured_not_found_loads_as_absent() {
    let bucket = ScriptedBucket {
        code: "404",
        message: "Not Found",
    };
    let storage = ObjectStorage::new(Arc::new(bucket), LockerChoice::Default);
    assert_eq!(storage.load::<Progress>("unseeded").unwrap(), None);
}

#[test]
fn other_bucket_failures_propagate() {
    let bucket = ScriptedBucket {
        code: "403",
        message: "Forbidden",
    };
    let storage = ObjectStorage::new(Arc::new(bucket), LockerChoice::Default);

    let err = storage.load::<Progress>("job").unwrap_err();
    assert!(matches!(err, StorageError::Transport(_)), "unexpected error: {err}");
    let err = storage.save("job", &Progress { offset: 1 }).unwrap_err();
    assert!(matches!(err, StorageError::Transport(_)), "unexpected error: {err}");
}

#[test]
fn cleanup_suppresses_delete_failure_and_releases_lock() {
    let locker = InMemoryLocker::new();
    let bucket = ScriptedBucket {
        code: "500",
        message: "Internal Error",
    };
    let storage = ObjectStorage::new(Arc::new(bucket), LockerChoice::custom(locker.clone()));

    let mut guard = storage.lock("job").unwrap();
    assert!(locker.is_locked("job").unwrap());
    storage.cleanup("job", &mut guard).unwrap();
    storage.cleanup("job", &mut guard).unwrap();
    assert!(!locker.is_locked("job").unwrap());
}

#[test]
fn cleanup_removes_object() {
    let bucket = InMemoryBucket::new();
    let storage = storage_over(&bucket);
    storage.save("job", &Progress { offset: 1 }).unwrap();

    let mut guard = storage.lock("job").unwrap();
    storage.cleanup("job", &mut guard).unwrap();
    assert!(bucket.object_names().unwrap().is_empty());
    assert_eq!(storage.load::<Progress>("job").unwrap(), None);
}

#[test]
fn default_choice_means_no_locking() {
    let storage = storage_over(&InMemoryBucket::new());
    assert!(!storage.locker().is_enabled());
    let guard = storage.lock("job").unwrap();
    assert!(!guard.is_locking());
}

#[test]
fn object_body_is_base64_payload_and_metadata_has_provenance() {
    let bucket = InMemoryBucket::new();
    let storage = storage_over(&bucket);
    storage.save("pipeline-1", &Progress { offset: 42 }).unwrap();

    let name = storage.object_name("pipeline-1");
    assert_eq!(name, format!("ObjectStorage_{}", key_digest("pipeline-1")));
    assert_eq!(bucket.get_object(&name).unwrap(), b"eyJvZmZzZXQiOjQyfQ==".to_vec());

    let metadata = bucket.metadata(&name).unwrap().unwrap();
    assert_eq!(metadata.get("key").map(String::as_str), Some("pipeline-1"));
    assert_eq!(metadata.get("producer").map(String::as_str), Some("checkpoint-store"));
    assert!(metadata.contains_key("stored-at"));
    assert!(metadata.contains_key("host-pid"));
}

#[test]
fn long_key_round_trips_with_bounded_metadata() {
    let bucket = InMemoryBucket::new();
    let storage = storage_over(&bucket);
    let key = "pipeline/".repeat(512);
    storage.save(&key, &Progress { offset: 9 }).unwrap();

    assert_eq!(storage.load::<Progress>(&key).unwrap(), Some(Progress { offset: 9 }));
    let metadata = bucket.metadata(&storage.object_name(&key)).unwrap().unwrap();
    assert_eq!(
        metadata.get(KEY_DIGEST_METADATA_FIELD).map(String::as_str),
        Some(key_digest(&key).as_str())
    );
    let total: usize = metadata.iter().map(|(name, value)| name.len() + value.len()).sum();
    assert!(total < 2048);
}

#[test]
fn prefix_is_applied_to_object_names() {
    let bucket = InMemoryBucket::new();
    let storage = storage_over(&bucket).with_prefix("pipelines/prod/").unwrap();
    assert_eq!(storage.prefix(), "pipelines/prod/");
    storage.save("job", &Progress { offset: 2 }).unwrap();
    assert_eq!(
        bucket.object_names().unwrap(),
        vec![format!("pipelines/prod/ObjectStorage_{}", key_digest("job"))]
    );
    assert!(storage_over(&bucket).with_prefix("../escape").is_err());
}

#[test]
fn empty_body_loads_as_absent() {
    let bucket = InMemoryBucket::new();
    let storage = storage_over(&bucket);
    bucket.put_object(&storage.object_name("job"), Vec::new(), &ObjectMetadata::new()).unwrap();
    assert_eq!(storage.load::<Progress>("job").unwrap(), None);
}

#[test]
fn corrupt_body_is_an_error() {
    let bucket = InMemoryBucket::new();
    let storage = storage_over(&bucket);
    bucket
        .put_object(&storage.object_name("job"), b"%%% not base64".to_vec(), &ObjectMetadata::new())
        .unwrap();
    let err = storage.load::<Progress>("job").unwrap_err();
    assert!(matches!(err, StorageError::Corrupt(_)), "unexpected error: {err}");
}

#[test]
fn backends_sharing_a_directory_do_not_alias() {
    let dir = TempDir::new().unwrap();
    let file_storage = FileStorage::open(dir.path()).unwrap();
    let object_storage = ObjectStorage::new(
        Arc::new(DirBucket {
            dir: dir.path().to_path_buf(),
        }),
        LockerChoice::Default,
    );

    file_storage.save("shared", &Progress { offset: 1 }).unwrap();
    assert_eq!(object_storage.load::<Progress>("shared").unwrap(), None);

    object_storage.save("shared", &Progress { offset: 2 }).unwrap();
    assert_eq!(file_storage.load::<Progress>("shared").unwrap(), Some(Progress { offset: 1 }));
    assert_eq!(object_storage.load::<Progress>("shared").unwrap(), Some(Progress { offset: 2 }));
}

#[test]
fn storage_is_usable_as_trait_object() {
    let bucket = InMemoryBucket::new();
    let storage: Arc<dyn StateStorage> = Arc::new(storage_over(&bucket));
    storage.save("job", &Progress { offset: 9 }).unwrap();
    assert_eq!(storage.load::<Progress>("job").unwrap(), Some(Progress { offset: 9 }));
}
