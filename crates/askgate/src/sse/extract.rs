//! Schema-tolerant extraction of text deltas from streaming event payloads
//!
//! Streaming event shapes vary across backends: the text fragment may sit
//! under "delta", "message", "content", or somewhere else entirely. Rather
//! than pin an exact path, scan the payload for the first reachable string
//! held by a key named "text".

use serde_json::Value;

/// Find the first non-empty string under a key case-insensitively equal to
/// "text", anywhere in the payload.
///
/// A "text" key on the current object wins over any nested hit; otherwise
/// nested objects and arrays are scanned in encounter order. Returns `None`
/// when no such string is reachable (the caller skips the event).
pub fn extract_text(payload: &Value) -> Option<&str> {
    match payload {
        Value::Object(map) => {
            for (key, value) in map {
                if key.eq_ignore_ascii_case("text") {
                    if let Some(text) = value.as_str() {
                        if !text.is_empty() {
                            return Some(text);
                        }
                    }
                }
            }
            map.values().find_map(extract_text)
        }
        Value::Array(items) => items.iter().find_map(extract_text),
        _ => None,
    }
}
