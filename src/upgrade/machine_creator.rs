//! Replacement machine creation and the wait stages that follow it.
//!
//! A new machine moves through `Created -> AwaitingProviderID ->
//! AwaitingMatchingNode -> AwaitingNodeReady -> Done`. A stage whose timeout
//! is zero is skipped together with every later stage, and the machine is
//! returned with whatever was observed so far.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use k8s_openapi::api::core::v1::{Node, Pod};
use semver::Version;
use tracing::{debug, info, warn};

use super::{ImageOverride, WaitTimeouts};
use crate::crd::Machine;
use crate::k8s::api::{MachineApi, NodeLister, PodGetter};
use crate::k8s::node::{ProviderId, find_node_by_provider_id, hostname_for_node, node_name};
use crate::poll::poll_immediate;

/// Namespace of the control plane static pods.
pub const CONTROL_PLANE_NAMESPACE: &str = "kube-system";

/// Static pods checked on a new control plane node, in order.
pub const CONTROL_PLANE_COMPONENTS: [&str; 4] = [
    "etcd",
    "kube-apiserver",
    "kube-scheduler",
    "kube-controller-manager",
];

/// Pod conditions that must all be `True`.
pub const REQUIRED_POD_CONDITIONS: [&str; 4] =
    ["PodScheduled", "Initialized", "Ready", "ContainersReady"];

const PROVIDER_ID_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MATCHING_NODE_POLL_INTERVAL: Duration = Duration::from_secs(5);
const NODE_READY_POLL_INTERVAL: Duration = Duration::from_secs(15);

/// Creates one machine from a source machine and waits for it to converge.
#[derive(Clone)]
pub struct MachineCreator {
    machines: Arc<dyn MachineApi>,
    nodes: Arc<dyn NodeLister>,
    pods: Arc<dyn PodGetter>,
    desired_version: Version,
    image: Option<ImageOverride>,
    timeouts: WaitTimeouts,
}

impl MachineCreator {
    pub fn new(
        machines: Arc<dyn MachineApi>,
        nodes: Arc<dyn NodeLister>,
        pods: Arc<dyn PodGetter>,
        desired_version: Version,
        image: Option<ImageOverride>,
        timeouts: WaitTimeouts,
    ) -> Self {
        Self {
            machines,
            nodes,
            pods,
            desired_version,
            image,
            timeouts,
        }
    }

    /// Create `namespace/name` as a copy of `source` at the desired version.
    ///
    /// Returns the created machine and, when the matching node stage ran,
    /// its node.
    pub async fn new_machine(
        &self,
        namespace: &str,
        name: &str,
        source: &Machine,
    ) -> Result<(Machine, Option<Node>)> {
        let mut machine = source.clone();
        machine.metadata.name = Some(name.to_string());
        machine.metadata.namespace = Some(namespace.to_string());
        machine.metadata.resource_version = None;
        machine.metadata.uid = None;
        machine.metadata.creation_timestamp = None;
        machine.metadata.deletion_timestamp = None;
        machine.metadata.generation = None;
        machine.metadata.managed_fields = None;
        machine.spec.provider_id = None;
        machine.status = None;

        if let Some(image) = &self.image {
            image
                .apply(&mut machine.spec)
                .with_context(|| format!("Error setting image on machine {name}"))?;
        }
        machine.spec.version = Some(self.desired_version.to_string());

        info!(
            machine = name,
            namespace,
            source = source.name(),
            version = %self.desired_version,
            "Creating new machine"
        );
        let created = self
            .machines
            .create(&machine)
            .await
            .with_context(|| format!("Error creating machine {namespace}/{name}"))?;

        if self.timeouts.provider_id.is_zero() {
            return Ok((created, None));
        }
        let provider_id = self.wait_for_provider_id(namespace, name).await?;

        if self.timeouts.matching_node.is_zero() {
            return Ok((created, None));
        }
        let node = self.wait_for_matching_node(&provider_id).await?;

        if self.timeouts.node_ready.is_zero() {
            return Ok((created, Some(node)));
        }
        self.wait_for_node_ready(&node).await?;

        Ok((created, Some(node)))
    }

    async fn wait_for_provider_id(&self, namespace: &str, name: &str) -> Result<ProviderId> {
        info!(machine = name, namespace, "Waiting for machine provider ID");

        let raw = poll_immediate(
            "machine provider id",
            PROVIDER_ID_POLL_INTERVAL,
            self.timeouts.provider_id,
            move || async move {
                let machine = self.machines.get(namespace, name).await?;
                Ok::<_, anyhow::Error>(machine.provider_id().map(str::to_string))
            },
        )
        .await
        .with_context(|| format!("Timed out waiting for provider ID of machine {name}"))?;

        info!(machine = name, provider_id = %raw, "Got provider ID");
        Ok(ProviderId::parse(&raw)?)
    }

    async fn wait_for_matching_node(&self, provider_id: &ProviderId) -> Result<Node> {
        info!(provider_id = %provider_id, "Waiting for matching node");

        let node = poll_immediate(
            "matching node",
            MATCHING_NODE_POLL_INTERVAL,
            self.timeouts.matching_node,
            move || async move {
                let nodes = self.nodes.list_nodes().await?;
                Ok::<_, anyhow::Error>(find_node_by_provider_id(&nodes, provider_id).cloned())
            },
        )
        .await
        .with_context(|| format!("Timed out waiting for node with provider ID {provider_id}"))?;

        info!(node = node_name(&node), "Found matching node");
        Ok(node)
    }

    async fn wait_for_node_ready(&self, node: &Node) -> Result<()> {
        let hostname = hostname_for_node(node)?;
        let hostname = hostname.as_str();
        info!(
            node = node_name(node),
            hostname,
            "Waiting for control plane components"
        );

        poll_immediate(
            "control plane components",
            NODE_READY_POLL_INTERVAL,
            self.timeouts.node_ready,
            move || async move {
                Ok::<_, anyhow::Error>(self.components_ready(hostname).await.then_some(()))
            },
        )
        .await
        .with_context(|| format!("Components on node {} are not ready", node_name(node)))
    }

    /// True when every control plane static pod on `hostname` reports all
    /// required conditions. Lookup failures count as not ready.
    pub async fn components_ready(&self, hostname: &str) -> bool {
        for component in CONTROL_PLANE_COMPONENTS {
            let pod_name = format!("{component}-{hostname}");
            let pod = match self.pods.get_pod(CONTROL_PLANE_NAMESPACE, &pod_name).await {
                Ok(Some(pod)) => pod,
                Ok(None) => {
                    debug!(pod = %pod_name, "Pod not found yet");
                    return false;
                }
                Err(e) => {
                    warn!(pod = %pod_name, error = %e, "Error getting pod");
                    return false;
                }
            };

            let missing = missing_conditions(&pod);
            if !missing.is_empty() {
                debug!(
                    pod = %pod_name,
                    conditions = %missing.join(","),
                    "Pod is missing required conditions"
                );
                return false;
            }
        }
        true
    }
}

/// Required conditions not currently `True` on `pod`, sorted.
pub fn missing_conditions(pod: &Pod) -> Vec<&'static str> {
    let found: BTreeSet<&str> = pod
        .status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .map(|conditions| {
            conditions
                .iter()
                .filter(|c| c.status == "True")
                .map(|c| c.type_.as_str())
                .collect()
        })
        .unwrap_or_default();

    let mut missing: Vec<&'static str> = REQUIRED_POD_CONDITIONS
        .into_iter()
        .filter(|c| !found.contains(c))
        .collect();
    missing.sort_unstable();
    missing
}
