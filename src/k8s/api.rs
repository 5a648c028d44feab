//! Narrow capability traits over the Kubernetes API.
//!
//! Each trait carries exactly the calls the upgraders make so that the
//! machine replacement flow can run against an in-memory cluster in tests.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ConfigMap, Node, Pod};
use k8s_openapi::api::rbac::v1::{Role, RoleBinding};
use kube::api::DynamicObject;
use serde_json::Value;

use crate::crd::{Machine, MachineDeployment, ObjectReference};

/// Cluster API `Machine` operations on the management cluster.
#[async_trait]
pub trait MachineApi: Send + Sync {
    async fn get(&self, namespace: &str, name: &str) -> Result<Machine>;

    async fn list(&self, namespace: &str, selector: &str) -> Result<Vec<Machine>>;

    async fn create(&self, machine: &Machine) -> Result<Machine>;

    /// Delete with foreground cascading propagation.
    async fn delete(&self, namespace: &str, name: &str) -> Result<()>;

    /// Apply a JSON merge patch.
    async fn patch(&self, namespace: &str, name: &str, patch: &Value) -> Result<Machine>;
}

/// Infrastructure and bootstrap objects referenced from a machine.
#[async_trait]
pub trait ExternalObjectApi: Send + Sync {
    /// Fetch the object a reference points at. A reference without a
    /// namespace resolves in `namespace`.
    async fn get(&self, reference: &ObjectReference, namespace: &str) -> Result<DynamicObject>;

    /// Create an object; its type is taken from `obj.types`.
    async fn create(&self, namespace: &str, obj: &DynamicObject) -> Result<DynamicObject>;
}

/// Cluster API `MachineDeployment` operations on the management cluster.
#[async_trait]
pub trait MachineDeploymentApi: Send + Sync {
    async fn list(&self, namespace: &str, selector: &str) -> Result<Vec<MachineDeployment>>;

    async fn patch(
        &self,
        namespace: &str,
        name: &str,
        patch: &Value,
    ) -> Result<MachineDeployment>;
}

#[async_trait]
pub trait NodeLister: Send + Sync {
    async fn list_nodes(&self) -> Result<Vec<Node>>;
}

#[async_trait]
pub trait PodGetter: Send + Sync {
    /// Returns `Ok(None)` when the pod does not exist.
    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<Pod>>;
}

#[async_trait]
pub trait PodLister: Send + Sync {
    async fn list_pods(&self, namespace: &str, selector: &str) -> Result<Vec<Pod>>;
}

/// Captured output of a command run inside a pod.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Remote command execution inside a pod's first container.
#[async_trait]
pub trait PodExec: Send + Sync {
    /// Run `command` and wait at most `deadline` for it to finish.
    ///
    /// A non-success exit status is an error carrying stderr.
    async fn exec(
        &self,
        namespace: &str,
        pod: &str,
        command: &[String],
        deadline: Duration,
    ) -> Result<ExecOutput>;
}

/// Core objects on the workload cluster touched around an upgrade.
#[async_trait]
pub trait TargetObjectApi: Send + Sync {
    /// Returns `Ok(None)` when the config map does not exist.
    async fn get_config_map(&self, namespace: &str, name: &str) -> Result<Option<ConfigMap>>;

    /// Create a config map. Returns `false` if it already existed.
    async fn create_config_map(&self, namespace: &str, cm: &ConfigMap) -> Result<bool>;

    async fn replace_config_map(&self, namespace: &str, cm: &ConfigMap) -> Result<ConfigMap>;

    /// Create a role. Returns `false` if it already existed.
    async fn create_role(&self, namespace: &str, role: &Role) -> Result<bool>;

    /// Create a role binding. Returns `false` if it already existed.
    async fn create_role_binding(&self, namespace: &str, binding: &RoleBinding) -> Result<bool>;
}
