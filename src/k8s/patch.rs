//! JSON merge patches computed from a snapshot and a modified copy.

use anyhow::Result;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::CapuError;

/// Build a merge patch (RFC 7386) turning `original` into `modified`.
///
/// The snapshot's `metadata.resourceVersion` is always carried in the patch,
/// so the API server rejects it with a conflict if the object changed since
/// the snapshot was read.
pub fn merge_patch<T: Serialize>(original: &T, modified: &T) -> Result<Value> {
    let to_value = |obj: &T| {
        serde_json::to_value(obj).map_err(|e| CapuError::Parse {
            what: "object for patch".to_string(),
            details: e.to_string(),
        })
    };
    let original = to_value(original)?;
    let modified = to_value(modified)?;

    let mut patch = diff(&original, &modified).unwrap_or_else(|| Value::Object(Map::new()));

    if let Some(rv) = original.pointer("/metadata/resourceVersion").cloned()
        && let Value::Object(root) = &mut patch
    {
        let metadata = root
            .entry("metadata")
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(metadata) = metadata {
            metadata.insert("resourceVersion".to_string(), rv);
        }
    }

    Ok(patch)
}

/// Merge patch between two JSON values, or `None` when they are equal.
pub fn diff(original: &Value, modified: &Value) -> Option<Value> {
    if original == modified {
        return None;
    }

    match (original, modified) {
        (Value::Object(from), Value::Object(to)) => {
            let mut patch = Map::new();
            for (key, value) in to {
                match from.get(key) {
                    Some(old) => {
                        if let Some(d) = diff(old, value) {
                            patch.insert(key.clone(), d);
                        }
                    }
                    None => {
                        patch.insert(key.clone(), value.clone());
                    }
                }
            }
            for key in from.keys() {
                if !to.contains_key(key) {
                    patch.insert(key.clone(), Value::Null);
                }
            }
            Some(Value::Object(patch))
        }
        _ => Some(modified.clone()),
    }
}
