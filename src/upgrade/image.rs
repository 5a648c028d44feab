//! Machine image override applied to every upgraded machine spec.

use anyhow::Result;
use serde_json::{Map, Value};

use crate::crd::MachineSpec;
use crate::error::CapuError;

/// Sets `field` (a dotted path inside the machine spec) to `id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageOverride {
    pub field: String,
    pub id: String,
}

impl ImageOverride {
    /// Build an override when both parts are present.
    pub fn from_parts(field: Option<&str>, id: Option<&str>) -> Option<Self> {
        match (field, id) {
            (Some(field), Some(id)) if !field.is_empty() && !id.is_empty() => Some(Self {
                field: field.to_string(),
                id: id.to_string(),
            }),
            _ => None,
        }
    }

    pub fn apply(&self, spec: &mut MachineSpec) -> Result<()> {
        let mut value = serde_json::to_value(&*spec).map_err(|e| CapuError::Parse {
            what: "machine spec".to_string(),
            details: e.to_string(),
        })?;
        set_path(&mut value, &self.field, Value::String(self.id.clone()))?;
        *spec = serde_json::from_value(value).map_err(|e| CapuError::Parse {
            what: "machine spec".to_string(),
            details: format!("after setting {}: {e}", self.field),
        })?;
        Ok(())
    }
}

/// Set a dotted path, creating intermediate maps.
pub fn set_path(root: &mut Value, path: &str, new: Value) -> Result<(), CapuError> {
    let segments: Vec<&str> = path.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(CapuError::InvalidConfig(format!(
            "invalid image field path {path:?}"
        )));
    }

    let (last, parents) = segments
        .split_last()
        .ok_or_else(|| CapuError::InvalidConfig("empty image field path".to_string()))?;

    let not_object = |depth: usize| {
        CapuError::InvalidConfig(format!(
            "image field {path:?}: {} is not an object",
            segments[..depth].join(".")
        ))
    };

    let mut current = root;
    for (depth, segment) in parents.iter().enumerate() {
        if current.is_null() {
            *current = Value::Object(Map::new());
        }
        current = match current {
            Value::Object(map) => map.entry(*segment).or_insert(Value::Null),
            _ => return Err(not_object(depth)),
        };
    }

    if current.is_null() {
        *current = Value::Object(Map::new());
    }
    match current {
        Value::Object(map) => {
            map.insert((*last).to_string(), new);
            Ok(())
        }
        _ => Err(not_object(parents.len())),
    }
}
