//! Object references between Cluster API resources.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::CapuError;

/// Reference to another Kubernetes object, as embedded in Cluster API specs
/// (`infrastructureRef`, `bootstrap.configRef`).
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ObjectReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_path: Option<String>,
}

impl ObjectReference {
    /// Split `apiVersion` into `(group, version)`. Core objects have an empty group.
    pub fn group_version(&self) -> Result<(String, String), CapuError> {
        let api_version = self
            .api_version
            .as_deref()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| CapuError::InvalidConfig(format!("{self} has no apiVersion")))?;

        Ok(match api_version.split_once('/') {
            Some((group, version)) => (group.to_string(), version.to_string()),
            None => (String::new(), api_version.to_string()),
        })
    }

    /// The referenced kind, required to resolve the object.
    pub fn kind(&self) -> Result<&str, CapuError> {
        self.kind
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| CapuError::InvalidConfig(format!("{self} has no kind")))
    }

    /// The referenced name, required to resolve the object.
    pub fn name(&self) -> Result<&str, CapuError> {
        self.name
            .as_deref()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| CapuError::InvalidConfig(format!("{self} has no name")))
    }

    /// Namespace of the referenced object; references without one live in `default`.
    pub fn namespace_or_default(&self) -> &str {
        self.namespace
            .as_deref()
            .filter(|ns| !ns.is_empty())
            .unwrap_or("default")
    }
}

impl std::fmt::Display for ObjectReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{} {}/{}",
            self.api_version.as_deref().unwrap_or("?"),
            self.kind.as_deref().unwrap_or("?"),
            self.namespace_or_default(),
            self.name.as_deref().unwrap_or("?")
        )
    }
}
