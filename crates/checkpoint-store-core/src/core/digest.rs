// crates/checkpoint-store-core/src/core/digest.rs
// ============================================================================
// Module: Key Digest
// Description: Storage id derivation from caller-chosen keys.
// Purpose: Map arbitrary keys to collision-resistant, filesystem-safe names.
// Dependencies: base64, sha2
// ============================================================================

//! ## Overview
//! Keys are opaque caller strings and may contain anything, including path
//! separators and characters object stores reject. Storage ids are derived by
//! hashing the key with SHA-256 and encoding the digest with the URL-safe
//! base64 alphabet, then prefixing the backend type name so two backend types
//! sharing one directory or bucket never alias the same physical name.

// ============================================================================
// SECTION: Imports
// ============================================================================

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::Digest;
use sha2::Sha256;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Length of the encoded key digest (32 bytes, unpadded base64).
pub const KEY_DIGEST_LEN: usize = 43;

/// Separator between the backend type name and the key digest.
const STORAGE_ID_SEPARATOR: char = '_';

// ============================================================================
// SECTION: Derivation
// ============================================================================

/// Returns the URL-safe base64 SHA-256 digest of a key.
#[must_use]
pub fn key_digest(key: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(key.as_bytes()))
}

/// Derives the backend-local storage id for a key.
///
/// The result is `<backend_type_name>_<digest>` where the digest uses only
/// `[A-Za-z0-9_-]`. The function is pure: identical inputs always produce the
/// same id, across calls and process restarts.
#[must_use]
pub fn derive_storage_id(backend_type_name: &str, key: &str) -> String {
    let digest = key_digest(key);
    let mut id = String::with_capacity(backend_type_name.len() + 1 + digest.len());
    id.push_str(backend_type_name);
    id.push(STORAGE_ID_SEPARATOR);
    id.push_str(&digest);
    id
}

/// Returns true when a string only uses the digest alphabet.
#[must_use]
pub fn is_storage_safe(value: &str) -> bool {
    !value.is_empty()
        && value.bytes().all(|byte| byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-')
}
