//! Text encoding of cached values and record envelopes.
//!
//! Records are double-encoded on the wire: the raw value is encoded once,
//! and the envelope carrying that string is encoded again. The reverse
//! applies on read. This keeps payloads byte-compatible with stores
//! populated by earlier deployments.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::CacheError;

/// Encode a value to its canonical text form.
///
/// Non-finite floats (NaN, ±Infinity) have no JSON representation and
/// encode to `null`.
pub fn encode<T: Serialize>(value: &T) -> Result<String, CacheError> {
    serde_json::to_string(value).map_err(|e| CacheError::Parse(e.to_string()))
}

/// Decode a value from its text form.
///
/// Failures surface as [`CacheError::Parse`] carrying the underlying
/// parser's message.
pub fn decode<T: DeserializeOwned>(text: &str) -> Result<T, CacheError> {
    serde_json::from_str(text).map_err(|e| CacheError::Parse(e.to_string()))
}
