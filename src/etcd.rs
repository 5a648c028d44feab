//! Etcd membership administration through `etcdctl` inside the etcd static pods.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use k8s_openapi::api::core::v1::Pod;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::CapuError;
use crate::k8s::api::{ExecOutput, PodExec, PodLister};

pub const ETCD_NAMESPACE: &str = "kube-system";
pub const ETCD_POD_SELECTOR: &str = "component=etcd";

const ETCD_CA_CERT: &str = "/etc/kubernetes/pki/etcd/ca.crt";
const ETCD_CERT: &str = "/etc/kubernetes/pki/etcd/peer.crt";
const ETCD_KEY: &str = "/etc/kubernetes/pki/etcd/peer.key";
const ETCD_CLIENT_PORT: u16 = 2379;

/// Deadline for every etcdctl invocation.
pub const ETCDCTL_DEADLINE: Duration = Duration::from_secs(60);

/// One member from `etcdctl member list -w json`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EtcdMember {
    #[serde(rename = "ID")]
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "clientURLs")]
    pub client_urls: Vec<String>,
}

#[derive(Deserialize)]
struct MemberListResponse {
    #[serde(default)]
    members: Vec<EtcdMember>,
}

/// Parse the JSON output of `etcdctl member list -w json`.
pub fn parse_member_list(output: &str) -> Result<Vec<EtcdMember>, CapuError> {
    serde_json::from_str::<MemberListResponse>(output)
        .map(|r| r.members)
        .map_err(|e| CapuError::Parse {
            what: "etcdctl member list output".to_string(),
            details: e.to_string(),
        })
}

/// Shell command running etcdctl (API v3) against the etcd member at `pod_ip`.
pub fn etcdctl_command(pod_ip: &str, args: &[&str]) -> Vec<String> {
    let mut line = vec![
        "ETCDCTL_API=3".to_string(),
        "etcdctl".to_string(),
        "--cacert".to_string(),
        ETCD_CA_CERT.to_string(),
        "--cert".to_string(),
        ETCD_CERT.to_string(),
        "--key".to_string(),
        ETCD_KEY.to_string(),
        "--endpoints".to_string(),
        format!("https://{pod_ip}:{ETCD_CLIENT_PORT}"),
    ];
    line.extend(args.iter().map(|a| (*a).to_string()));

    vec!["sh".to_string(), "-c".to_string(), line.join(" ")]
}

/// Member name to hexadecimal member ID, captured before any machine is
/// replaced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberSnapshot {
    ids: HashMap<String, String>,
}

impl MemberSnapshot {
    pub fn from_members(members: &[EtcdMember]) -> Self {
        let ids = members
            .iter()
            .map(|m| (m.name.clone(), format!("{:x}", m.id)))
            .collect();
        Self { ids }
    }

    /// Hex member ID of the member named after `hostname`.
    pub fn member_id(&self, hostname: &str) -> Option<&str> {
        self.ids.get(hostname).map(String::as_str)
    }
}

/// Runs etcdctl inside the etcd pods of the workload cluster.
#[derive(Clone)]
pub struct EtcdAdmin {
    pods: Arc<dyn PodLister>,
    exec: Arc<dyn PodExec>,
    deadline: Duration,
}

impl EtcdAdmin {
    pub fn new(pods: Arc<dyn PodLister>, exec: Arc<dyn PodExec>) -> Self {
        Self {
            pods,
            exec,
            deadline: ETCDCTL_DEADLINE,
        }
    }

    async fn etcd_pods(&self) -> Result<Vec<Pod>> {
        let pods = self
            .pods
            .list_pods(ETCD_NAMESPACE, ETCD_POD_SELECTOR)
            .await
            .context("Failed to list etcd pods")?;
        if pods.is_empty() {
            return Err(CapuError::EmptyFleet("etcd pods".to_string()).into());
        }
        Ok(pods)
    }

    async fn etcdctl(&self, pod: &Pod, args: &[&str]) -> Result<ExecOutput> {
        let name = pod.metadata.name.as_deref().unwrap_or_default();
        let namespace = pod.metadata.namespace.as_deref().unwrap_or(ETCD_NAMESPACE);
        let pod_ip = pod
            .status
            .as_ref()
            .and_then(|s| s.pod_ip.as_deref())
            .filter(|ip| !ip.is_empty())
            .ok_or_else(|| CapuError::NotFound(format!("IP of etcd pod {namespace}/{name}")))?;

        let command = etcdctl_command(pod_ip, args);
        let output = self
            .exec
            .exec(namespace, name, &command, self.deadline)
            .await
            .with_context(|| format!("etcdctl {} failed in pod {name}", args.join(" ")))?;

        debug!(pod = name, stdout = %output.stdout, "etcdctl stdout");
        debug!(pod = name, stderr = %output.stderr, "etcdctl stderr");
        Ok(output)
    }

    async fn members_seen_by(&self, pod: &Pod) -> Result<Vec<EtcdMember>> {
        let output = self.etcdctl(pod, &["member", "list", "-w", "json"]).await?;
        Ok(parse_member_list(&output.stdout)?)
    }

    /// List members as seen by the first etcd pod.
    pub async fn list_members(&self) -> Result<Vec<EtcdMember>> {
        let pods = self.etcd_pods().await?;
        self.members_seen_by(&pods[0]).await
    }

    /// Check health of every member's client endpoints.
    pub async fn health_check(&self) -> Result<()> {
        let pods = self.etcd_pods().await?;
        let pod = &pods[0];
        let members = self.members_seen_by(pod).await?;
        let endpoints: Vec<&str> = members
            .iter()
            .flat_map(|m| m.client_urls.iter().map(String::as_str))
            .collect();
        if endpoints.is_empty() {
            return Err(CapuError::NotFound("etcd client endpoints".to_string()).into());
        }

        let joined = endpoints.join(",");
        self.etcdctl(pod, &["endpoint", "health", "--endpoints", &joined])
            .await
            .context("etcd cluster health check failed")?;

        info!(members = members.len(), "etcd cluster is healthy");
        Ok(())
    }

    /// Capture member name to ID before any mutation.
    pub async fn member_snapshot(&self) -> Result<MemberSnapshot> {
        let members = self.list_members().await?;
        let snapshot = MemberSnapshot::from_members(&members);
        debug!(members = snapshot.ids.len(), "Captured etcd member snapshot");
        Ok(snapshot)
    }

    /// Remove the member that ran on `old_hostname`, issuing the command from
    /// the etcd pod on the replacement node `new_hostname`.
    pub async fn remove_member(
        &self,
        snapshot: &MemberSnapshot,
        new_hostname: &str,
        old_hostname: &str,
    ) -> Result<()> {
        let member_id = snapshot.member_id(old_hostname).ok_or_else(|| {
            CapuError::NotFound(format!("etcd member for node {old_hostname}"))
        })?;

        let pods = self.etcd_pods().await?;
        let pod = pods
            .iter()
            .find(|p| {
                p.spec
                    .as_ref()
                    .and_then(|s| s.node_name.as_deref())
                    .is_some_and(|n| n == new_hostname)
            })
            .ok_or_else(|| CapuError::NotFound(format!("etcd pod on node {new_hostname}")))?;

        info!(
            member_id,
            old_node = old_hostname,
            new_node = new_hostname,
            "Removing etcd member"
        );
        self.etcdctl(pod, &["member", "remove", member_id])
            .await
            .with_context(|| format!("Unable to delete old etcd member {member_id}"))?;
        Ok(())
    }
}
