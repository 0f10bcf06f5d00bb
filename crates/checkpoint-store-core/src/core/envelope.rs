// crates/checkpoint-store-core/src/core/envelope.rs
// ============================================================================
// Module: Stored Value Envelope
// Description: Payload codec, provenance metadata, and the persisted envelope.
// Purpose: Give every backend one reversible representation of stored state.
// Dependencies: base64, serde, serde_json, time
// ============================================================================

//! ## Overview
//! A stored value passes through two layers before it reaches a backend:
//! the [`StatePayload`] codec (`serde_json` bytes) and the base64 text form of
//! those bytes. The local file backend wraps the text in an [`Envelope`] JSON
//! document together with the base64 key and [`StoredMeta`]; the object backend
//! uploads the text as the body and attaches the metadata out of band.
//!
//! Decoding never guesses: malformed base64, malformed JSON, or a payload that
//! does not match the requested type is reported as [`EnvelopeError::Corrupt`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::ser::PrettyFormatter;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Producer name recorded in stored metadata.
pub const PRODUCER_NAME: &str = "checkpoint-store";
/// Producer version recorded in stored metadata.
pub const PRODUCER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Indentation used for envelope documents.
const ENVELOPE_INDENT: &[u8] = b"    ";

/// Metadata field names used when meta is flattened into string pairs.
pub mod meta_fields {
    /// Producer name.
    pub const PRODUCER: &str = "producer";
    /// Producer version.
    pub const PRODUCER_VERSION: &str = "producer-version";
    /// RFC 3339 write timestamp.
    pub const STORED_AT: &str = "stored-at";
    /// Process id of the writer.
    pub const HOST_PID: &str = "host-pid";
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while encoding or decoding stored values.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// Value could not be serialized by the codec.
    #[error("state codec error: {0}")]
    Codec(String),
    /// Stored bytes are present but cannot be decoded.
    #[error("stored envelope corrupt: {0}")]
    Corrupt(String),
}

// ============================================================================
// SECTION: Payload
// ============================================================================

/// Codec-encoded bytes of a stored value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatePayload {
    /// Raw codec bytes.
    bytes: Vec<u8>,
}

impl StatePayload {
    /// Encodes a value with the state codec.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::Codec`] when the value cannot be serialized.
    pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Self, EnvelopeError> {
        let bytes =
            serde_json::to_vec(value).map_err(|err| EnvelopeError::Codec(err.to_string()))?;
        Ok(Self {
            bytes,
        })
    }

    /// Decodes the payload into a value.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::Corrupt`] when the bytes do not decode as `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, EnvelopeError> {
        serde_json::from_slice(&self.bytes).map_err(|err| EnvelopeError::Corrupt(err.to_string()))
    }

    /// Wraps raw codec bytes.
    #[must_use]
    pub const fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
        }
    }

    /// Returns the raw codec bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consumes the payload and returns the raw codec bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Returns the base64 text form stored by backends.
    #[must_use]
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }

    /// Parses the base64 text form stored by backends.
    ///
    /// Surrounding ASCII whitespace is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::Corrupt`] when the text is not valid base64.
    pub fn from_base64(text: &[u8]) -> Result<Self, EnvelopeError> {
        let bytes = STANDARD
            .decode(text.trim_ascii())
            .map_err(|err| EnvelopeError::Corrupt(format!("payload is not base64: {err}")))?;
        Ok(Self {
            bytes,
        })
    }
}

// ============================================================================
// SECTION: Stored Meta
// ============================================================================

/// Provenance recorded alongside every stored value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StoredMeta {
    /// Name of the producing library.
    pub producer: String,
    /// Version of the producing library.
    pub producer_version: String,
    /// RFC 3339 UTC timestamp of the write.
    pub stored_at: String,
    /// Process id of the writer.
    pub host_pid: u32,
}

impl StoredMeta {
    /// Returns provenance for a write happening now in this process.
    #[must_use]
    pub fn current() -> Self {
        Self {
            producer: PRODUCER_NAME.to_string(),
            producer_version: PRODUCER_VERSION.to_string(),
            stored_at: now_rfc3339(),
            host_pid: std::process::id(),
        }
    }

    /// Flattens the provenance into string pairs for object metadata.
    #[must_use]
    pub fn to_metadata(&self) -> BTreeMap<String, String> {
        let mut metadata = BTreeMap::new();
        metadata.insert(meta_fields::PRODUCER.to_string(), self.producer.clone());
        metadata.insert(meta_fields::PRODUCER_VERSION.to_string(), self.producer_version.clone());
        metadata.insert(meta_fields::STORED_AT.to_string(), self.stored_at.clone());
        metadata.insert(meta_fields::HOST_PID.to_string(), self.host_pid.to_string());
        metadata
    }

    /// Rebuilds provenance from object metadata.
    ///
    /// Missing fields fall back to defaults; an unparsable pid reads as zero.
    #[must_use]
    pub fn from_metadata(metadata: &BTreeMap<String, String>) -> Self {
        let field = |name: &str| metadata.get(name).cloned().unwrap_or_default();
        Self {
            producer: field(meta_fields::PRODUCER),
            producer_version: field(meta_fields::PRODUCER_VERSION),
            stored_at: field(meta_fields::STORED_AT),
            host_pid: metadata
                .get(meta_fields::HOST_PID)
                .and_then(|pid| pid.parse().ok())
                .unwrap_or_default(),
        }
    }
}

/// Formats the current UTC time as RFC 3339.
fn now_rfc3339() -> String {
    let now = OffsetDateTime::now_utc();
    now.format(&Rfc3339).unwrap_or_else(|_| now.unix_timestamp().to_string())
}

// ============================================================================
// SECTION: Envelope
// ============================================================================

/// Persisted record for one key.
///
/// # Invariants
/// - `key` and `value` are standard base64 text.
/// - Reading back a freshly written envelope yields the original payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Base64-encoded original key (diagnostics only).
    pub key: String,
    /// Base64-encoded codec payload.
    pub value: String,
    /// Write provenance.
    #[serde(default)]
    pub meta: StoredMeta,
}

impl Envelope {
    /// Builds an envelope for a payload written now.
    #[must_use]
    pub fn seal(key: &str, payload: &StatePayload) -> Self {
        Self::with_meta(key, payload, StoredMeta::current())
    }

    /// Builds an envelope with explicit provenance.
    #[must_use]
    pub fn with_meta(key: &str, payload: &StatePayload, meta: StoredMeta) -> Self {
        Self {
            key: STANDARD.encode(key.as_bytes()),
            value: payload.to_base64(),
            meta,
        }
    }

    /// Recovers the original key.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::Corrupt`] when the key field does not decode.
    pub fn original_key(&self) -> Result<String, EnvelopeError> {
        let bytes = STANDARD
            .decode(self.key.as_bytes())
            .map_err(|err| EnvelopeError::Corrupt(format!("key is not base64: {err}")))?;
        String::from_utf8(bytes)
            .map_err(|_| EnvelopeError::Corrupt("key is not utf-8".to_string()))
    }

    /// Returns the payload carried by the envelope.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::Corrupt`] when the value field does not decode.
    pub fn payload(&self) -> Result<StatePayload, EnvelopeError> {
        StatePayload::from_base64(self.value.as_bytes())
    }

    /// Serializes the envelope as an indented JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::Codec`] when serialization fails.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, EnvelopeError> {
        let mut out = Vec::new();
        let formatter = PrettyFormatter::with_indent(ENVELOPE_INDENT);
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
        self.serialize(&mut serializer).map_err(|err| EnvelopeError::Codec(err.to_string()))?;
        Ok(out)
    }

    /// Parses an envelope JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::Corrupt`] when the document is malformed.
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        serde_json::from_slice(bytes)
            .map_err(|err| EnvelopeError::Corrupt(format!("envelope is not valid json: {err}")))
    }
}
