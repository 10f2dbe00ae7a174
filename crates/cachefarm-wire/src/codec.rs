//! Payload codec.
//!
//! Payload batches are JSON arrays. A blank document is an omitted payload and
//! decodes to an empty batch.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::WireError;

/// Result of a lenient decode: the entries that parsed plus the ones that did not.
#[derive(Debug)]
pub struct Decoded<T> {
    pub payloads: Vec<T>,
    pub skipped: Vec<WireError>,
}

impl<T> Decoded<T> {
    fn empty() -> Self {
        Self {
            payloads: Vec::new(),
            skipped: Vec::new(),
        }
    }
}

pub fn encode<T: Serialize>(payloads: &[T]) -> Result<String, WireError> {
    Ok(serde_json::to_string(payloads)?)
}

/// Strict decode: any malformed entry fails the whole batch.
pub fn decode<T: DeserializeOwned>(json: &str) -> Result<Vec<T>, WireError> {
    if json.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(json)?)
}

/// Decodes each array element on its own so one bad entry does not sink the batch.
///
/// The outer document must still be a JSON array (or blank).
pub fn decode_lenient<T: DeserializeOwned>(json: &str) -> Result<Decoded<T>, WireError> {
    if json.trim().is_empty() {
        return Ok(Decoded::empty());
    }

    let entries = match serde_json::from_str::<Value>(json)? {
        Value::Array(entries) => entries,
        Value::Null => return Ok(Decoded::empty()),
        other => {
            return Err(WireError::NotAnArray {
                found: json_kind(&other),
            });
        }
    };

    let mut decoded = Decoded::empty();
    for (index, entry) in entries.into_iter().enumerate() {
        match serde_json::from_value(entry) {
            Ok(payload) => decoded.payloads.push(payload),
            Err(source) => decoded.skipped.push(WireError::malformed(index, source)),
        }
    }
    Ok(decoded)
}

pub fn encode_ids(ids: &[i32]) -> Result<String, WireError> {
    encode(ids)
}

pub fn decode_ids(json: &str) -> Result<Vec<i32>, WireError> {
    decode(json)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
