//! Cluster API `MachineDeployment` (`cluster.x-k8s.io/v1alpha2`).

use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::UPGRADE_ID_ANNOTATION;
use super::machine::MachineSpec;

/// A worker fleet: a machine template rolled out by the Cluster API controller.
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[kube(
    group = "cluster.x-k8s.io",
    version = "v1alpha2",
    kind = "MachineDeployment",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct MachineDeploymentSpec {
    #[serde(default)]
    pub template: MachineTemplateSpec,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Template stamped onto every machine of the deployment.
#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MachineTemplateSpec {
    #[serde(default)]
    pub metadata: TemplateMeta,

    #[serde(default)]
    pub spec: MachineSpec,
}

/// Object metadata subset allowed in a machine template.
#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TemplateMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl MachineDeployment {
    /// Deployment name, empty when unset.
    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }

    /// Deployment namespace, `default` when unset.
    pub fn namespace(&self) -> &str {
        self.metadata.namespace.as_deref().unwrap_or("default")
    }

    /// True if the machine template already carries this upgrade identifier.
    pub fn has_upgrade_id(&self, upgrade_id: &str) -> bool {
        self.spec
            .template
            .metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get(UPGRADE_ID_ANNOTATION))
            .is_some_and(|v| v == upgrade_id)
    }
}
