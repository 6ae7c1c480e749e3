//! Flattening of nested settings documents into dotted key/value pairs.
//!
//! The cluster accepts and returns settings both in nested form
//! (`{"cluster":{"routing":{...}}}`) and in flat form (`{"cluster.routing...": ...}`).
//! Both flatten to the same dotted keys, so readers never care which one they got.

use serde_json::Value;
use std::collections::BTreeMap;

/// Flattens `value` into `key -> text` pairs, ordered by key.
///
/// `null` and empty-string leaves are dropped: they mark a setting that was
/// cleared, not a real value. Arrays are kept as compact JSON text.
pub fn flatten(value: &Value) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    flatten_into(value, String::new(), &mut out);
    out
}

fn flatten_into(value: &Value, prefix: String, out: &mut BTreeMap<String, String>) {
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                let key = if prefix.is_empty() {
                    k.clone()
                } else {
                    format!("{}.{}", prefix, k)
                };
                flatten_into(v, key, out);
            }
        }
        Value::Null => {}
        leaf => {
            if prefix.is_empty() {
                return;
            }
            if let Some(text) = leaf_text(leaf) {
                out.insert(prefix, text);
            }
        }
    }
}

fn leaf_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) => value.to_string(),
        Value::Null | Value::Object(_) => return None,
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Resolves one dotted `key` inside `value`, whichever form it was written in.
pub fn lookup(value: &Value, key: &str) -> Option<String> {
    flatten(value).remove(key)
}
