//! Rolling replacement of control plane machines.

use std::sync::Arc;

use anyhow::{Context, Result};
use k8s_openapi::api::core::v1::Node;
use kube::api::DynamicObject;
use tracing::{info, warn};

use super::kubeadm::upload_kubeadm_kubernetes_version;
use super::kubelet::{ensure_kubelet_config_map, ensure_kubelet_rbac};
use super::MachineCreator;
use super::version::{is_minor_version_upgrade, version_range};
use super::{UpgradePlan, UpgradeReport};
use crate::crd::{
    CLUSTER_NAME_LABEL, CONTROL_PLANE_LABEL, Machine, ObjectReference, UPGRADE_ID_ANNOTATION,
    label_selector,
};
use crate::error::CapuError;
use crate::etcd::{EtcdAdmin, MemberSnapshot};
use crate::k8s::api::{ExternalObjectApi, MachineApi, NodeLister, PodGetter, TargetObjectApi};
use crate::k8s::node::{NodeIndex, ProviderId, hostname_for_node};
use crate::k8s::patch::merge_patch;

/// Management and workload cluster access needed by the control plane upgrade.
#[derive(Clone)]
pub struct ControlPlaneClients {
    pub machines: Arc<dyn MachineApi>,
    pub external: Arc<dyn ExternalObjectApi>,
    pub nodes: Arc<dyn NodeLister>,
    pub pods: Arc<dyn PodGetter>,
    pub target: Arc<dyn TargetObjectApi>,
    pub etcd: EtcdAdmin,
}

/// Replaces control plane machines one at a time, keeping etcd membership in
/// step with the fleet.
pub struct ControlPlaneUpgrader {
    plan: UpgradePlan,
    clients: ControlPlaneClients,
    now: fn() -> i64,
}

impl ControlPlaneUpgrader {
    pub fn new(plan: UpgradePlan, clients: ControlPlaneClients) -> Self {
        Self {
            plan,
            clients,
            now: || chrono::Utc::now().timestamp(),
        }
    }

    pub async fn upgrade(&self) -> Result<UpgradeReport> {
        let machines = self.list_machines().await?;
        if machines.is_empty() {
            return Err(CapuError::EmptyFleet("control plane machines".to_string()).into());
        }

        let range = version_range(&machines)
            .context("Error determining current control plane versions")?;
        let desired = match (&self.plan.desired_version, &range) {
            (Some(v), _) => v.clone(),
            (None, Some(r)) => r.max.clone(),
            (None, None) => {
                return Err(CapuError::InvalidVersion(
                    "no desired version given and no control plane machine has one".to_string(),
                )
                .into());
            }
        };
        if let Some(r) = &range {
            info!(min = %r.min, max = %r.max, desired = %desired, "Control plane versions");
        }

        if let Some(r) = &range
            && is_minor_version_upgrade(&r.min, &desired)
        {
            info!(from = %r.min, to = %desired, "Minor version upgrade, migrating kubelet config");
            ensure_kubelet_config_map(self.clients.target.as_ref(), &desired).await?;
            ensure_kubelet_rbac(self.clients.target.as_ref(), &desired).await?;
        }

        self.clients.etcd.health_check().await?;

        let mut nodes = NodeIndex::load(self.clients.nodes.as_ref()).await?;
        let members = self.clients.etcd.member_snapshot().await?;

        let creator = MachineCreator::new(
            self.clients.machines.clone(),
            self.clients.nodes.clone(),
            self.clients.pods.clone(),
            desired.clone(),
            self.plan.image.clone(),
            self.plan.timeouts,
        );

        let mut report = UpgradeReport::new(desired.clone());
        for machine in &machines {
            if machine.has_upgrade_id(&self.plan.upgrade_id) {
                info!(machine = machine.name(), "Machine already upgraded, skipping");
                report.add_skipped(machine.name(), "already carries this upgrade id");
                continue;
            }
            if machine.provider_id().is_none() {
                info!(
                    machine = machine.name(),
                    "Unable to upgrade machine as it has no spec.providerID"
                );
                report.add_skipped(machine.name(), "no provider ID");
                continue;
            }

            let new_name = self
                .replace_machine(machine, &creator, &mut nodes, &members)
                .await
                .with_context(|| format!("Error upgrading machine {}", machine.name()))?;
            report.add_upgraded(format!("{} -> {new_name}", machine.name()));
        }

        upload_kubeadm_kubernetes_version(self.clients.target.as_ref(), &desired).await?;

        Ok(report)
    }

    async fn list_machines(&self) -> Result<Vec<Machine>> {
        let selector = label_selector(&[
            (CLUSTER_NAME_LABEL, &self.plan.cluster_name),
            (CONTROL_PLANE_LABEL, "true"),
        ]);
        info!(selector = %selector, namespace = %self.plan.cluster_namespace, "Listing machines");
        self.clients
            .machines
            .list(&self.plan.cluster_namespace, &selector)
            .await
            .context("Error listing machines")
    }

    /// Replace one machine. Returns the replacement's name.
    async fn replace_machine(
        &self,
        machine: &Machine,
        creator: &MachineCreator,
        nodes: &mut NodeIndex,
        members: &MemberSnapshot,
    ) -> Result<String> {
        let namespace = self.plan.cluster_namespace.as_str();
        let new_name = replacement_name(machine.name(), (self.now)())?;

        let raw_provider_id = machine.provider_id().unwrap_or_default();
        let provider_id = ProviderId::parse(raw_provider_id)?;
        let old_node = nodes
            .get(&provider_id)
            .ok_or_else(|| CapuError::UnknownNode(provider_id.to_string()))?;
        let old_hostname = hostname_for_node(old_node)?;

        let mut source = machine.clone();
        source.spec.infrastructure_ref = self
            .clone_reference(&machine.spec.infrastructure_ref, &new_name)
            .await?;
        if let Some(config_ref) = &machine.spec.bootstrap.config_ref {
            source.spec.bootstrap.config_ref =
                Some(self.clone_reference(config_ref, &new_name).await?);
        }

        let (new_machine, new_node) = creator.new_machine(namespace, &new_name, &source).await?;

        *nodes = NodeIndex::load(self.clients.nodes.as_ref()).await?;

        let new_hostname = replacement_hostname(&new_name, new_node.as_ref())?;
        self.clients
            .etcd
            .remove_member(members, &new_hostname, &old_hostname)
            .await?;

        info!(machine = machine.name(), namespace, "Deleting existing machine");
        self.clients
            .machines
            .delete(namespace, machine.name())
            .await?;

        self.annotate(&new_machine).await?;
        Ok(new_name)
    }

    /// Copy the object behind `reference` under `new_name` and return a
    /// reference to the copy.
    async fn clone_reference(
        &self,
        reference: &ObjectReference,
        new_name: &str,
    ) -> Result<ObjectReference> {
        let namespace = reference
            .namespace
            .as_deref()
            .filter(|ns| !ns.is_empty())
            .unwrap_or(self.plan.cluster_namespace.as_str())
            .to_string();

        let object = self
            .clients
            .external
            .get(reference, &namespace)
            .await
            .with_context(|| format!("Error getting {reference}"))?;
        let copy = copy_external_object(object, new_name);

        info!(kind = ?reference.kind, name = new_name, namespace = %namespace, "Creating referenced object");
        self.clients
            .external
            .create(&namespace, &copy)
            .await
            .with_context(|| format!("Error creating copy of {reference}"))?;

        Ok(ObjectReference {
            name: Some(new_name.to_string()),
            namespace: Some(namespace),
            resource_version: None,
            uid: None,
            ..reference.clone()
        })
    }

    async fn annotate(&self, machine: &Machine) -> Result<()> {
        let namespace = machine.namespace();
        let original = self.clients.machines.get(namespace, machine.name()).await?;
        let mut updated = original.clone();
        updated
            .metadata
            .annotations
            .get_or_insert_with(Default::default)
            .insert(
                UPGRADE_ID_ANNOTATION.to_string(),
                self.plan.upgrade_id.clone(),
            );

        let patch = merge_patch(&original, &updated)?;
        self.clients
            .machines
            .patch(namespace, machine.name(), &patch)
            .await
            .with_context(|| format!("Error annotating machine {}", machine.name()))?;
        Ok(())
    }
}

/// `<prefix>-<index>-<timestamp>` from a `<prefix>-<index>[-...]` name.
pub fn replacement_name(name: &str, timestamp: i64) -> Result<String, CapuError> {
    let mut parts = name.split('-');
    match (parts.next(), parts.next()) {
        (Some(prefix), Some(index)) => Ok(format!("{prefix}-{index}-{timestamp}")),
        _ => Err(CapuError::MalformedMachineName(name.to_string())),
    }
}

/// Hostname of the replacement's node, required to pick the etcd pod that
/// removes the old member.
fn replacement_hostname(machine: &str, node: Option<&Node>) -> Result<String> {
    match node {
        Some(node) => Ok(hostname_for_node(node)?),
        None => {
            warn!(machine, "Replacement node unknown, cannot remove old etcd member");
            Err(CapuError::MissingHostname(format!("of machine {machine}")).into())
        }
    }
}

/// Prepare a copy of an infrastructure or bootstrap object for creation.
pub fn copy_external_object(mut object: DynamicObject, new_name: &str) -> DynamicObject {
    object.metadata.name = Some(new_name.to_string());
    object.metadata.resource_version = None;
    object.metadata.uid = None;
    object.metadata.creation_timestamp = None;
    object.metadata.managed_fields = None;
    object.metadata.owner_references = None;
    if let Some(spec) = object.data.get_mut("spec").and_then(|s| s.as_object_mut()) {
        spec.remove("providerID");
    }
    if let Some(data) = object.data.as_object_mut() {
        data.remove("status");
    }
    object
}
