//! Generic option trees and the merge used by `extends`.

use serde_json::{Map, Value};

/// Untyped option tree as read from the configuration.
pub type OptionTree = Value;

pub fn empty_tree() -> OptionTree {
    Value::Object(Map::new())
}

/// Overlay `overlay` on top of `base`.
///
/// - Objects: merged key by key, recursively
/// - Arrays: replaced as a whole
/// - Scalars: overlay wins
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => overlay_value,
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (_, overlay) => overlay,
    }
}

/// Short name of a value's JSON type, for error messages.
pub fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "table",
    }
}
