//! Key-sorted JSON rendering.
//!
//! Maps are rebuilt with keys inserted in sorted order, so the output is
//! sorted whether or not `serde_json` keeps insertion order.

use serde_json::{Map, Value};

/// A copy of `value` with every object's keys in sorted order.
pub fn sorted(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = Map::with_capacity(map.len());
            for key in keys {
                out.insert(key.clone(), sorted(&map[key.as_str()]));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        other => other.clone(),
    }
}

/// Compact key-sorted JSON.
pub fn to_canonical_string(value: &Value) -> String {
    sorted(value).to_string()
}

/// Indented key-sorted JSON.
pub fn to_canonical_pretty(value: &Value) -> String {
    format!("{:#}", sorted(value))
}
