// crates/checkpoint-store-file/tests/file_locker.rs
// ============================================================================
// Module: File Locker Tests
// Description: Verifies exclusion, release, and handle validation.
// ============================================================================
//! ## Overview
//! Checks that [`FileLocker`] serializes holders of the same key and cleans up
//! its lock files on release.

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

use std::sync::Arc;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use checkpoint_store_core::InMemoryLocker;
use checkpoint_store_core::LockError;
use checkpoint_store_core::Locker;
use checkpoint_store_core::key_digest;
use checkpoint_store_file::FileLocker;
use tempfile::TempDir;

#[test]
fn lock_path_is_scoped_by_locker_type() {
    let dir = TempDir::new().unwrap();
    let locker = FileLocker::new(dir.path()).unwrap();
    let expected = dir.path().join(format!("FileLocker_{}.lock", key_digest("job")));
    assert_eq!(locker.lock_path("job"), expected);
    assert_eq!(locker.dir(), dir.path());
}

#[test]
fn release_removes_lock_file_and_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let locker = FileLocker::new(dir.path()).unwrap();

    let mut handle = locker.acquire("job").unwrap();
    assert!(handle.is_held());
    assert!(locker.lock_path("job").exists());

    locker.release(&mut handle).unwrap();
    assert!(!handle.is_held());
    assert!(!locker.lock_path("job").exists());
    locker.release(&mut handle).unwrap();
}

#[test]
fn holders_of_same_key_are_serialized() {
    let dir = TempDir::new().unwrap();
    let locker = Arc::new(FileLocker::new(dir.path()).unwrap());
    let log = Arc::new(Mutex::new(Vec::new()));

    let workers: Vec<_> = (0 .. 4)
        .map(|id| {
            let locker = Arc::clone(&locker);
            let log = Arc::clone(&log);
            thread::spawn(move || {
                let mut handle = locker.acquire("shared").unwrap();
                log.lock().unwrap().push(format!("enter-{id}"));
                thread::sleep(Duration::from_millis(20));
                log.lock().unwrap().push(format!("exit-{id}"));
                locker.release(&mut handle).unwrap();
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let log = log.lock().unwrap();
    assert_eq!(log.len(), 8);
    for pair in log.chunks(2) {
        let entered = pair[0].strip_prefix("enter-").unwrap();
        let exited = pair[1].strip_prefix("exit-").unwrap();
        assert_eq!(entered, exited, "overlapping holders: {log:?}");
    }
    assert!(!locker.lock_path("shared").exists());
}

#[test]
fn distinct_keys_do_not_block_each_other() {
    let dir = TempDir::new().unwrap();
    let locker = FileLocker::new(dir.path()).unwrap();
    let mut first = locker.acquire("a").unwrap();
    let mut second = locker.acquire("b").unwrap();
    locker.release(&mut first).unwrap();
    locker.release(&mut second).unwrap();
}

#[test]
fn foreign_handle_is_rejected() {
    let dir = TempDir::new().unwrap();
    let locker = FileLocker::new(dir.path()).unwrap();
    let other = InMemoryLocker::new();

    let mut handle = other.acquire("job").unwrap();
    let err = locker.release(&mut handle).unwrap_err();
    assert!(matches!(err, LockError::Invalid(_)));
    assert!(handle.is_held());
    other.release(&mut handle).unwrap();
}

#[test]
fn acquire_keeps_waiting_through_release_churn() {
    let dir = TempDir::new().unwrap();
    let locker = Arc::new(FileLocker::new(dir.path()).unwrap());
    let acquired = Arc::new(Mutex::new(0_usize));

    let workers: Vec<_> = (0 .. 8)
        .map(|_| {
            let locker = Arc::clone(&locker);
            let acquired = Arc::clone(&acquired);
            thread::spawn(move || {
                for _ in 0 .. 100 {
                    let mut handle = locker.acquire("churn").unwrap();
                    *acquired.lock().unwrap() += 1;
                    locker.release(&mut handle).unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(*acquired.lock().unwrap(), 800);
    assert!(!locker.lock_path("churn").exists());
}
