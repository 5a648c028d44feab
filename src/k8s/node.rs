//! Node helpers: provider ID normalisation, hostname lookup and the
//! provider ID to node index.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use anyhow::Result;
use k8s_openapi::api::core::v1::Node;
use tracing::debug;

use super::api::NodeLister;
use crate::error::CapuError;

/// Normalised compute identity in the form `<cloud-provider>://<anything>/<id>`.
///
/// Two provider IDs are equal when their cloud provider and trailing
/// instance ID match, so `aws:///us-east-1a/i-0123` equals `aws:////i-0123`.
#[derive(Debug, Clone)]
pub struct ProviderId {
    original: String,
    cloud_provider: String,
    id: String,
}

impl ProviderId {
    pub fn parse(raw: &str) -> Result<Self, CapuError> {
        let invalid = |reason: &str| CapuError::InvalidProviderId {
            id: raw.to_string(),
            reason: reason.to_string(),
        };

        if raw.is_empty() {
            return Err(invalid("provider ID is empty"));
        }
        let (cloud_provider, rest) = raw
            .split_once("://")
            .ok_or_else(|| invalid("expected <cloud-provider>://<id>"))?;
        if cloud_provider.is_empty() || cloud_provider.contains(':') {
            return Err(invalid("missing cloud provider"));
        }
        if rest.is_empty() || raw.ends_with('/') {
            return Err(invalid("missing instance id"));
        }
        let id = rest.rsplit('/').next().unwrap_or(rest);

        Ok(Self {
            original: raw.to_string(),
            cloud_provider: cloud_provider.to_string(),
            id: id.to_string(),
        })
    }

}

impl PartialEq for ProviderId {
    fn eq(&self, other: &Self) -> bool {
        self.cloud_provider == other.cloud_provider && self.id == other.id
    }
}

impl Eq for ProviderId {}

impl Hash for ProviderId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.cloud_provider.hash(state);
        self.id.hash(state);
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

pub fn node_name(node: &Node) -> &str {
    node.metadata.name.as_deref().unwrap_or_default()
}

/// Parsed provider ID of a node, if it has a valid one.
pub fn node_provider_id(node: &Node) -> Option<ProviderId> {
    let raw = node.spec.as_ref()?.provider_id.as_deref()?;
    match ProviderId::parse(raw) {
        Ok(id) => Some(id),
        Err(e) => {
            debug!(node = node_name(node), error = %e, "Ignoring node provider ID");
            None
        }
    }
}

/// First `Hostname` address of a node.
pub fn hostname_for_node(node: &Node) -> Result<String, CapuError> {
    node.status
        .as_ref()
        .and_then(|s| s.addresses.as_ref())
        .and_then(|addresses| {
            addresses
                .iter()
                .find(|a| a.type_ == "Hostname")
                .map(|a| a.address.clone())
        })
        .filter(|h| !h.is_empty())
        .ok_or_else(|| CapuError::MissingHostname(node_name(node).to_string()))
}

/// Linear scan for the node backing `target`. Ties resolve to list order.
pub fn find_node_by_provider_id<'a>(nodes: &'a [Node], target: &ProviderId) -> Option<&'a Node> {
    nodes
        .iter()
        .find(|node| node_provider_id(node).is_some_and(|id| id == *target))
}

/// Nodes of the workload cluster keyed by normalised provider ID.
#[derive(Debug, Default)]
pub struct NodeIndex {
    nodes: HashMap<ProviderId, Node>,
}

impl NodeIndex {
    pub fn from_nodes(nodes: Vec<Node>) -> Self {
        let nodes = nodes
            .into_iter()
            .filter_map(|node| node_provider_id(&node).map(|id| (id, node)))
            .collect();
        Self { nodes }
    }

    pub async fn load(lister: &dyn NodeLister) -> Result<Self> {
        let index = Self::from_nodes(lister.list_nodes().await?);
        debug!(nodes = index.nodes.len(), "Indexed nodes by provider ID");
        Ok(index)
    }

    pub fn get(&self, provider_id: &ProviderId) -> Option<&Node> {
        self.nodes.get(provider_id)
    }

}
