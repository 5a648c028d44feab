//! Cluster API `Machine` (`cluster.x-k8s.io/v1alpha2`).

use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::reference::ObjectReference;
use super::UPGRADE_ID_ANNOTATION;

/// Desired state of one control plane or worker instance.
///
/// Only the fields the upgrader reads or rewrites are typed; everything else
/// is carried through `extra` so a cloned machine keeps the source's settings.
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[kube(
    group = "cluster.x-k8s.io",
    version = "v1alpha2",
    kind = "Machine",
    namespaced,
    status = "MachineStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct MachineSpec {
    /// Bootstrap configuration for the instance.
    #[serde(default)]
    pub bootstrap: Bootstrap,

    /// Infrastructure provider object backing this machine.
    #[serde(default)]
    pub infrastructure_ref: ObjectReference,

    /// Desired Kubernetes version (e.g. `v1.14.3`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Compute identity assigned by the infrastructure provider.
    #[serde(
        default,
        rename = "providerID",
        skip_serializing_if = "Option::is_none"
    )]
    pub provider_id: Option<String>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Bootstrap section of a machine spec.
#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Bootstrap {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_ref: Option<ObjectReference>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Observed state of a machine.
#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MachineStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_ref: Option<ObjectReference>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Machine {
    /// Machine name, empty when unset.
    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }

    /// Machine namespace, `default` when unset.
    pub fn namespace(&self) -> &str {
        self.metadata.namespace.as_deref().unwrap_or("default")
    }

    /// Non-empty desired version, if any.
    pub fn version(&self) -> Option<&str> {
        self.spec.version.as_deref().filter(|v| !v.is_empty())
    }

    /// Non-empty provider ID, if the infrastructure layer has assigned one.
    pub fn provider_id(&self) -> Option<&str> {
        self.spec.provider_id.as_deref().filter(|p| !p.is_empty())
    }

    /// True if this machine was already produced by the given upgrade run.
    pub fn has_upgrade_id(&self, upgrade_id: &str) -> bool {
        self.metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get(UPGRADE_ID_ANNOTATION))
            .is_some_and(|v| v == upgrade_id)
    }
}
