//! Rewrite of the Kubernetes version recorded in the kubeadm cluster
//! configuration.

use anyhow::{Context, Result};
use k8s_openapi::api::core::v1::ConfigMap;
use semver::Version;
use serde_yaml::Value;
use tracing::info;

use super::kubelet::KUBE_SYSTEM;
use crate::error::CapuError;
use crate::k8s::api::TargetObjectApi;

pub const KUBEADM_CONFIG_MAP: &str = "kubeadm-config";
pub const CLUSTER_CONFIGURATION_KEY: &str = "ClusterConfiguration";
const KUBERNETES_VERSION_FIELD: &str = "kubernetesVersion";

/// Return a copy of the kubeadm config map with `kubernetesVersion` set.
///
/// The embedded document keeps its key order; only that field changes.
pub fn update_kubeadm_kubernetes_version(original: &ConfigMap, version: &str) -> Result<ConfigMap> {
    let mut cm = original.clone();
    let data = cm
        .data
        .as_mut()
        .and_then(|d| d.get_mut(CLUSTER_CONFIGURATION_KEY))
        .ok_or_else(|| {
            CapuError::NotFound(format!(
                "{CLUSTER_CONFIGURATION_KEY} in config map {KUBE_SYSTEM}/{KUBEADM_CONFIG_MAP}"
            ))
        })?;

    let mut config: Value = serde_yaml::from_str(data).map_err(|e| CapuError::Parse {
        what: format!("kubeadm {CLUSTER_CONFIGURATION_KEY}"),
        details: e.to_string(),
    })?;
    let Value::Mapping(mapping) = &mut config else {
        return Err(CapuError::Parse {
            what: format!("kubeadm {CLUSTER_CONFIGURATION_KEY}"),
            details: "expected a mapping".to_string(),
        }
        .into());
    };
    mapping.insert(
        Value::String(KUBERNETES_VERSION_FIELD.to_string()),
        Value::String(version.to_string()),
    );

    *data = serde_yaml::to_string(&config).map_err(|e| CapuError::Parse {
        what: format!("kubeadm {CLUSTER_CONFIGURATION_KEY}"),
        details: e.to_string(),
    })?;

    Ok(cm)
}

/// Record `v<version>` in `kube-system/kubeadm-config` of the workload cluster.
pub async fn upload_kubeadm_kubernetes_version(
    target: &dyn TargetObjectApi,
    version: &Version,
) -> Result<()> {
    let original = target
        .get_config_map(KUBE_SYSTEM, KUBEADM_CONFIG_MAP)
        .await
        .context("Error getting kubeadm config map from target cluster")?
        .ok_or_else(|| CapuError::NotFound(format!("{KUBE_SYSTEM}/{KUBEADM_CONFIG_MAP}")))?;

    let tag = format!("v{version}");
    let updated = update_kubeadm_kubernetes_version(&original, &tag)?;
    target
        .replace_config_map(KUBE_SYSTEM, &updated)
        .await
        .context("Error updating kubeadm config map")?;

    info!(version = %tag, "Updated kubeadm cluster configuration");
    Ok(())
}
