// crates/checkpoint-store-core/tests/digest.rs
// ============================================================================
// Module: Key Digest Tests
// Description: Verifies storage id derivation.
// ============================================================================
//! ## Overview
//! Ensures storage ids are deterministic, scoped by backend type, and limited
//! to a filesystem and object-name safe alphabet.

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

use checkpoint_store_core::KEY_DIGEST_LEN;
use checkpoint_store_core::derive_storage_id;
use checkpoint_store_core::is_storage_safe;
use checkpoint_store_core::key_digest;
use proptest::prelude::*;

#[test]
fn storage_id_is_stable_for_known_key() {
    // sha256("pipeline-1"), url-safe base64 without padding.
    let first = derive_storage_id("JsonLocalStorage", "pipeline-1");
    let second = derive_storage_id("JsonLocalStorage", "pipeline-1");
    assert_eq!(first, second);
    assert!(first.starts_with("JsonLocalStorage_"));
    assert_eq!(first.len(), "JsonLocalStorage_".len() + KEY_DIGEST_LEN);
}

#[test]
fn empty_key_digest_matches_reference() {
    assert_eq!(key_digest(""), "47DEQpj8HBSa-_TImW-5JCeuQeRkm5NMpJWZG3hSuFU");
}

#[test]
fn backend_type_scopes_storage_id() {
    let file = derive_storage_id("JsonLocalStorage", "pipeline-1");
    let object = derive_storage_id("ObjectStorage", "pipeline-1");
    assert_ne!(file, object);
    assert!(file.ends_with(&key_digest("pipeline-1")));
    assert!(object.ends_with(&key_digest("pipeline-1")));
}

#[test]
fn unsafe_key_characters_are_digested_away() {
    let key = "../../etc/passwd\0 with spaces/and\\slashes?*";
    let digest = key_digest(key);
    assert_eq!(digest.len(), KEY_DIGEST_LEN);
    assert!(is_storage_safe(&digest));
}

#[test]
fn is_storage_safe_rejects_separators() {
    assert!(is_storage_safe("JsonLocalStorage_abc-DEF_123"));
    assert!(!is_storage_safe(""));
    assert!(!is_storage_safe("a/b"));
    assert!(!is_storage_safe("a.b"));
}

proptest! {
    #[test]
    fn digest_is_always_safe_and_fixed_length(key in ".*") {
        let digest = key_digest(&key);
        prop_assert_eq!(digest.len(), KEY_DIGEST_LEN);
        prop_assert!(is_storage_safe(&digest));
        prop_assert_eq!(digest, key_digest(&key));
    }

    #[test]
    fn distinct_keys_get_distinct_ids(a in ".{0,64}", b in ".{0,64}") {
        prop_assume!(a != b);
        prop_assert_ne!(
            derive_storage_id("JsonLocalStorage", &a),
            derive_storage_id("JsonLocalStorage", &b)
        );
    }
}
