//! Persistence merge: step values folded into the stored document.
//!
//! The stored document spans every step of a case, so a save only overwrites
//! the keys the current step owns. Everything else is carried forward.

use serde_json::{Map, Value};

/// Parse a stored document. Absent, malformed or non-object input is empty.
pub fn parse_document(raw: Option<&str>) -> Map<String, Value> {
    let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
        return Map::new();
    };
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            tracing::warn!(kind = json_kind(&other), "stored document is not an object, ignoring");
            Map::new()
        }
        Err(e) => {
            tracing::warn!(error = %e, "stored document unreadable, starting empty");
            Map::new()
        }
    }
}

/// Shallow merge: current keys win, every other persisted key is preserved.
pub fn merge_document(persisted: &Map<String, Value>, current: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = persisted.clone();
    for (key, value) in current {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
