//! JSON message codec over the payload region of a shared buffer.
//!
//! `encode` serialises a value to compact UTF-8 JSON, stores its byte length
//! in the length slot and copies the bytes to the payload region. `decode`
//! reverses that. Size is checked before anything is written, so an oversized
//! message leaves the buffer untouched.
//!
//! Both sides work through the views of an exchange claim, so the phase that
//! allows the access is held for as long as the view lives.

use qa_transport::{ByteView, ByteViewMut, TransportError, LENGTH_SLOT};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Object key carrying the schema version when one is configured.
pub const SCHEMA_FIELD: &str = "schemaVersion";

pub type CodecResult<T> = Result<T, CodecError>;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("encoded message of {len} bytes exceeds the {capacity} byte payload region")]
    PayloadTooLarge { len: usize, capacity: usize },

    #[error("payload length {len} is empty or outside the payload region")]
    EmptyOrInvalidPayload { len: i32 },

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("failed to serialise message: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("schema version mismatch: expected {expected}, found {found:?}")]
    SchemaMismatch { expected: u32, found: Option<u64> },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Encodes and decodes messages in a shared buffer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MessageCodec {
    schema_version: Option<u32>,
}

impl MessageCodec {
    /// Codec producing the unversioned payload the compute unit expects.
    pub fn new() -> Self {
        Self::default()
    }

    /// Codec that stamps every object with [`SCHEMA_FIELD`] and rejects
    /// payloads carrying any other version.
    pub fn with_schema_version(version: u32) -> Self {
        Self {
            schema_version: Some(version),
        }
    }

    pub fn schema_version(&self) -> Option<u32> {
        self.schema_version
    }

    /// Writes `value` through `out`, returning the payload length.
    pub fn encode<T: Serialize>(&self, out: &mut ByteViewMut<'_>, value: &T) -> CodecResult<usize> {
        let bytes = self.to_bytes(value)?;
        write_bytes(out, &bytes)?;
        Ok(bytes.len())
    }

    /// Reads the current message out of `view`.
    pub fn decode<T: DeserializeOwned>(&self, view: ByteView<'_>) -> CodecResult<T> {
        let bytes = read_bytes(view)?;
        self.from_bytes(&bytes)
    }

    /// Serialises `value` to the wire text without touching any buffer.
    pub fn to_bytes<T: Serialize>(&self, value: &T) -> CodecResult<Vec<u8>> {
        match self.schema_version {
            None => serde_json::to_vec(value).map_err(CodecError::Serialize),
            Some(version) => {
                let mut tree = serde_json::to_value(value).map_err(CodecError::Serialize)?;
                if let Value::Object(map) = &mut tree {
                    map.insert(SCHEMA_FIELD.to_owned(), Value::from(version));
                }
                serde_json::to_vec(&tree).map_err(CodecError::Serialize)
            }
        }
    }

    /// Parses wire text produced by [`MessageCodec::to_bytes`].
    pub fn from_bytes<T: DeserializeOwned>(&self, bytes: &[u8]) -> CodecResult<T> {
        let text =
            std::str::from_utf8(bytes).map_err(|e| CodecError::MalformedPayload(e.to_string()))?;
        match self.schema_version {
            None => {
                serde_json::from_str(text).map_err(|e| CodecError::MalformedPayload(e.to_string()))
            }
            Some(expected) => {
                let mut tree: Value = serde_json::from_str(text)
                    .map_err(|e| CodecError::MalformedPayload(e.to_string()))?;
                let found = tree
                    .as_object_mut()
                    .and_then(|map| map.remove(SCHEMA_FIELD))
                    .and_then(|v| v.as_u64());
                if found != Some(u64::from(expected)) {
                    return Err(CodecError::SchemaMismatch { expected, found });
                }
                serde_json::from_value(tree)
                    .map_err(|e| CodecError::MalformedPayload(e.to_string()))
            }
        }
    }
}

/// Stores already-encoded bytes: length slot first, then the payload.
pub fn write_bytes(out: &mut ByteViewMut<'_>, bytes: &[u8]) -> CodecResult<()> {
    let capacity = out.len();
    if bytes.len() > capacity {
        return Err(CodecError::PayloadTooLarge {
            len: bytes.len(),
            capacity,
        });
    }
    out.int_view().store(LENGTH_SLOT, bytes.len() as i32)?;
    out.write_payload(bytes)?;
    tracing::trace!(len = bytes.len(), "encoded message");
    Ok(())
}

/// Copies the current payload out, validating the length slot.
pub fn read_bytes(view: ByteView<'_>) -> CodecResult<Vec<u8>> {
    let len = view.int_view().load(LENGTH_SLOT)?;
    if len <= 0 || len as usize > view.len() {
        return Err(CodecError::EmptyOrInvalidPayload { len });
    }
    let bytes = view.read_payload(len as usize)?;
    tracing::trace!(len, "decoded message");
    Ok(bytes)
}
