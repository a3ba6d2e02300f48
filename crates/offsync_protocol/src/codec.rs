//! JSON encoding of persisted collections.
//!
//! Every persisted collection (the queue, the conflict ledger, the
//! dead-letter list) is stored as one JSON array and always written whole.

use crate::error::ProtocolResult;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encodes a collection as a JSON array.
pub fn encode_list<T: Serialize>(items: &[T]) -> ProtocolResult<String> {
    Ok(serde_json::to_string(items)?)
}

/// Decodes a JSON array into a collection, preserving order.
pub fn decode_list<T: DeserializeOwned>(json: &str) -> ProtocolResult<Vec<T>> {
    Ok(serde_json::from_str(json)?)
}
