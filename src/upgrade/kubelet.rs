//! Forward migration of the versioned kubelet configuration on minor upgrades.
//!
//! kubeadm joins nodes using `kubelet-config-<major>.<minor>` from
//! `kube-system`, readable by nodes through a role of the same name. Before
//! the first machine of a new minor release joins, both must exist.

use anyhow::{Context, Result};
use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::api::rbac::v1::{PolicyRule, Role, RoleBinding, RoleRef, Subject};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use semver::Version;
use tracing::info;

use crate::error::CapuError;
use crate::k8s::api::TargetObjectApi;

pub const KUBE_SYSTEM: &str = "kube-system";

const RBAC_API_GROUP: &str = "rbac.authorization.k8s.io";
const NODE_GROUPS: [&str; 2] = [
    "system:nodes",
    "system:bootstrappers:kubeadm:default-node-token",
];

pub fn kubelet_config_map_name(major: u64, minor: u64) -> String {
    format!("kubelet-config-{major}.{minor}")
}

pub fn kubelet_role_name(version: &Version) -> String {
    format!(
        "kubeadm:{}",
        kubelet_config_map_name(version.major, version.minor)
    )
}

/// Copy the previous minor release's kubelet config map forward under the
/// target release's name, unless it already exists.
pub async fn ensure_kubelet_config_map(
    target: &dyn TargetObjectApi,
    version: &Version,
) -> Result<()> {
    let desired = kubelet_config_map_name(version.major, version.minor);
    if target.get_config_map(KUBE_SYSTEM, &desired).await?.is_some() {
        info!(config_map = %desired, "Kubelet config map already exists");
        return Ok(());
    }

    let previous_minor = version.minor.checked_sub(1).ok_or_else(|| {
        CapuError::InvalidVersion(format!("no previous minor release for v{version}"))
    })?;
    let previous = kubelet_config_map_name(version.major, previous_minor);
    let source = target
        .get_config_map(KUBE_SYSTEM, &previous)
        .await?
        .ok_or_else(|| {
            CapuError::NotFound(format!("current kubelet config map {KUBE_SYSTEM}/{previous}"))
        })?;

    let cm = ConfigMap {
        metadata: ObjectMeta {
            name: Some(desired.clone()),
            namespace: Some(KUBE_SYSTEM.to_string()),
            labels: source.metadata.labels.clone(),
            annotations: source.metadata.annotations.clone(),
            ..Default::default()
        },
        data: source.data.clone(),
        binary_data: source.binary_data.clone(),
        ..Default::default()
    };

    let created = target
        .create_config_map(KUBE_SYSTEM, &cm)
        .await
        .with_context(|| format!("Error creating config map {desired}"))?;
    info!(config_map = %desired, from = %previous, created, "Kubelet config map migrated");
    Ok(())
}

/// Ensure nodes and bootstrap tokens can read the target release's kubelet
/// config map.
pub async fn ensure_kubelet_rbac(target: &dyn TargetObjectApi, version: &Version) -> Result<()> {
    let (role, binding) = kubelet_rbac(version);
    let name = kubelet_role_name(version);

    let created = target
        .create_role(KUBE_SYSTEM, &role)
        .await
        .with_context(|| format!("Error creating role {name}"))?;
    info!(role = %name, created, "Kubelet config role ensured");

    let created = target
        .create_role_binding(KUBE_SYSTEM, &binding)
        .await
        .with_context(|| format!("Error creating role binding {name}"))?;
    info!(role_binding = %name, created, "Kubelet config role binding ensured");

    Ok(())
}

/// Role and role binding granting `get` on the versioned kubelet config map.
pub fn kubelet_rbac(version: &Version) -> (Role, RoleBinding) {
    let name = kubelet_role_name(version);
    let metadata = ObjectMeta {
        name: Some(name.clone()),
        namespace: Some(KUBE_SYSTEM.to_string()),
        ..Default::default()
    };

    let role = Role {
        metadata: metadata.clone(),
        rules: Some(vec![PolicyRule {
            verbs: vec!["get".to_string()],
            api_groups: Some(vec![String::new()]),
            resources: Some(vec!["configmaps".to_string()]),
            resource_names: Some(vec![kubelet_config_map_name(
                version.major,
                version.minor,
            )]),
            ..Default::default()
        }]),
    };

    let binding = RoleBinding {
        metadata,
        role_ref: RoleRef {
            api_group: RBAC_API_GROUP.to_string(),
            kind: "Role".to_string(),
            name,
        },
        subjects: Some(
            NODE_GROUPS
                .iter()
                .map(|group| Subject {
                    api_group: Some(RBAC_API_GROUP.to_string()),
                    kind: "Group".to_string(),
                    name: (*group).to_string(),
                    namespace: None,
                })
                .collect(),
        ),
    };

    (role, binding)
}
