//! Capability traits backed by `kube::Api`.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ConfigMap, Node, Pod};
use k8s_openapi::api::rbac::v1::{Role, RoleBinding};
use kube::api::{
    ApiResource, AttachParams, DeleteParams, DynamicObject, ListParams, Patch, PatchParams,
    PostParams,
};
use kube::core::GroupVersionKind;
use kube::{Api, Client};
use serde_json::Value;
use tokio::io::AsyncReadExt;
use tracing::debug;

use super::api::{
    ExecOutput, ExternalObjectApi, MachineApi, MachineDeploymentApi, NodeLister, PodExec,
    PodGetter, PodLister, TargetObjectApi,
};
use crate::crd::{Machine, MachineDeployment, ObjectReference};
use crate::error::{CapuError, is_already_exists, is_not_found};

/// Field manager recorded on every patch this tool sends.
const FIELD_MANAGER: &str = "capu";

fn api_error(action: &str, err: &kube::Error) -> anyhow::Error {
    CapuError::KubernetesApi(format!("Failed to {action}: {err}")).into()
}

fn api_resource(group: &str, version: &str, kind: &str) -> ApiResource {
    ApiResource::from_gvk(&GroupVersionKind::gvk(group, version, kind))
}

/// Management cluster: Cluster API objects and their infrastructure and
/// bootstrap counterparts.
#[derive(Clone)]
pub struct ManagementCluster {
    client: Client,
}

impl ManagementCluster {
    pub const fn new(client: Client) -> Self {
        Self { client }
    }

    fn machines(&self, namespace: &str) -> Api<Machine> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn machine_deployments(&self, namespace: &str) -> Api<MachineDeployment> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl MachineApi for ManagementCluster {
    async fn get(&self, namespace: &str, name: &str) -> Result<Machine> {
        self.machines(namespace)
            .get(name)
            .await
            .map_err(|e| api_error(&format!("get machine {namespace}/{name}"), &e))
    }

    async fn list(&self, namespace: &str, selector: &str) -> Result<Vec<Machine>> {
        let list = self
            .machines(namespace)
            .list(&ListParams::default().labels(selector))
            .await
            .map_err(|e| api_error(&format!("list machines in {namespace}"), &e))?;
        debug!(namespace, selector, count = list.items.len(), "Listed machines");
        Ok(list.items)
    }

    async fn create(&self, machine: &Machine) -> Result<Machine> {
        let namespace = machine.namespace();
        self.machines(namespace)
            .create(&PostParams::default(), machine)
            .await
            .map_err(|e| api_error(&format!("create machine {namespace}/{}", machine.name()), &e))
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<()> {
        self.machines(namespace)
            .delete(name, &DeleteParams::foreground())
            .await
            .map(|_| ())
            .map_err(|e| api_error(&format!("delete machine {namespace}/{name}"), &e))
    }

    async fn patch(&self, namespace: &str, name: &str, patch: &Value) -> Result<Machine> {
        self.machines(namespace)
            .patch(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(patch))
            .await
            .map_err(|e| api_error(&format!("patch machine {namespace}/{name}"), &e))
    }
}

#[async_trait]
impl ExternalObjectApi for ManagementCluster {
    async fn get(&self, reference: &ObjectReference, namespace: &str) -> Result<DynamicObject> {
        let (group, version) = reference.group_version()?;
        let ar = api_resource(&group, &version, reference.kind()?);
        let namespace = reference
            .namespace
            .as_deref()
            .filter(|ns| !ns.is_empty())
            .unwrap_or(namespace);
        let name = reference.name()?;

        let api: Api<DynamicObject> = Api::namespaced_with(self.client.clone(), namespace, &ar);
        api.get(name)
            .await
            .map_err(|e| api_error(&format!("get {} {namespace}/{name}", ar.kind), &e))
    }

    async fn create(&self, namespace: &str, obj: &DynamicObject) -> Result<DynamicObject> {
        let types = obj.types.as_ref().ok_or_else(|| CapuError::Parse {
            what: "object type".to_string(),
            details: "apiVersion and kind are required to create an object".to_string(),
        })?;
        let (group, version) = types
            .api_version
            .rsplit_once('/')
            .unwrap_or(("", types.api_version.as_str()));
        let ar = api_resource(group, version, &types.kind);
        let name = obj.metadata.name.as_deref().unwrap_or_default();

        let api: Api<DynamicObject> = Api::namespaced_with(self.client.clone(), namespace, &ar);
        api.create(&PostParams::default(), obj)
            .await
            .map_err(|e| api_error(&format!("create {} {namespace}/{name}", ar.kind), &e))
    }
}

#[async_trait]
impl MachineDeploymentApi for ManagementCluster {
    async fn list(&self, namespace: &str, selector: &str) -> Result<Vec<MachineDeployment>> {
        let list = self
            .machine_deployments(namespace)
            .list(&ListParams::default().labels(selector))
            .await
            .map_err(|e| api_error(&format!("list machine deployments in {namespace}"), &e))?;
        Ok(list.items)
    }

    async fn patch(
        &self,
        namespace: &str,
        name: &str,
        patch: &Value,
    ) -> Result<MachineDeployment> {
        self.machine_deployments(namespace)
            .patch(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(patch))
            .await
            .map_err(|e| api_error(&format!("patch machine deployment {namespace}/{name}"), &e))
    }
}

/// Workload cluster: nodes, control plane pods and kube-system objects.
#[derive(Clone)]
pub struct WorkloadCluster {
    client: Client,
}

impl WorkloadCluster {
    pub const fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl NodeLister for WorkloadCluster {
    async fn list_nodes(&self) -> Result<Vec<Node>> {
        let nodes: Api<Node> = Api::all(self.client.clone());
        let list = nodes
            .list(&ListParams::default())
            .await
            .map_err(|e| api_error("list nodes", &e))?;
        Ok(list.items)
    }
}

#[async_trait]
impl PodGetter for WorkloadCluster {
    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<Pod>> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        match pods.get(name).await {
            Ok(pod) => Ok(Some(pod)),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(api_error(&format!("get pod {namespace}/{name}"), &e)),
        }
    }
}

#[async_trait]
impl PodLister for WorkloadCluster {
    async fn list_pods(&self, namespace: &str, selector: &str) -> Result<Vec<Pod>> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let list = pods
            .list(&ListParams::default().labels(selector))
            .await
            .map_err(|e| api_error(&format!("list pods in {namespace}"), &e))?;
        Ok(list.items)
    }
}

#[async_trait]
impl PodExec for WorkloadCluster {
    async fn exec(
        &self,
        namespace: &str,
        pod: &str,
        command: &[String],
        deadline: Duration,
    ) -> Result<ExecOutput> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let params = AttachParams::default().stdin(false).stdout(true).stderr(true);

        let run = async {
            let mut attached = pods
                .exec(pod, command.to_vec(), &params)
                .await
                .map_err(|e| api_error(&format!("exec in pod {namespace}/{pod}"), &e))?;

            let status = attached.take_status();
            let mut stdout = String::new();
            let mut stderr = String::new();
            let out = attached.stdout();
            let err = attached.stderr();

            let read_out = async {
                if let Some(mut reader) = out {
                    reader.read_to_string(&mut stdout).await?;
                }
                Ok::<_, std::io::Error>(())
            };
            let read_err = async {
                if let Some(mut reader) = err {
                    reader.read_to_string(&mut stderr).await?;
                }
                Ok::<_, std::io::Error>(())
            };
            futures::try_join!(read_out, read_err).map_err(|e| CapuError::RemoteExec {
                pod: pod.to_string(),
                details: format!("failed to read output: {e}"),
            })?;

            let status = match status {
                Some(fut) => fut.await,
                None => None,
            };
            Ok::<_, anyhow::Error>((stdout, stderr, status))
        };

        let (stdout, stderr, status) = tokio::time::timeout(deadline, run)
            .await
            .map_err(|_| CapuError::timeout(format!("command in pod {pod}"), deadline))??;

        if let Some(status) = status
            && status.status.as_deref() != Some("Success")
        {
            let reason = status.message.unwrap_or_default();
            return Err(CapuError::RemoteExec {
                pod: pod.to_string(),
                details: format!("{reason}: {}", stderr.trim()),
            }
            .into());
        }

        Ok(ExecOutput { stdout, stderr })
    }
}

#[async_trait]
impl TargetObjectApi for WorkloadCluster {
    async fn get_config_map(&self, namespace: &str, name: &str) -> Result<Option<ConfigMap>> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        match api.get(name).await {
            Ok(cm) => Ok(Some(cm)),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(api_error(&format!("get config map {namespace}/{name}"), &e)),
        }
    }

    async fn create_config_map(&self, namespace: &str, cm: &ConfigMap) -> Result<bool> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        match api.create(&PostParams::default(), cm).await {
            Ok(_) => Ok(true),
            Err(e) if is_already_exists(&e) => Ok(false),
            Err(e) => Err(api_error(&format!("create config map in {namespace}"), &e)),
        }
    }

    async fn replace_config_map(&self, namespace: &str, cm: &ConfigMap) -> Result<ConfigMap> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        let name = cm.metadata.name.as_deref().unwrap_or_default();
        api.replace(name, &PostParams::default(), cm)
            .await
            .map_err(|e| api_error(&format!("update config map {namespace}/{name}"), &e))
    }

    async fn create_role(&self, namespace: &str, role: &Role) -> Result<bool> {
        let api: Api<Role> = Api::namespaced(self.client.clone(), namespace);
        match api.create(&PostParams::default(), role).await {
            Ok(_) => Ok(true),
            Err(e) if is_already_exists(&e) => Ok(false),
            Err(e) => Err(api_error(&format!("create role in {namespace}"), &e)),
        }
    }

    async fn create_role_binding(&self, namespace: &str, binding: &RoleBinding) -> Result<bool> {
        let api: Api<RoleBinding> = Api::namespaced(self.client.clone(), namespace);
        match api.create(&PostParams::default(), binding).await {
            Ok(_) => Ok(true),
            Err(e) if is_already_exists(&e) => Ok(false),
            Err(e) => Err(api_error(&format!("create role binding in {namespace}"), &e)),
        }
    }
}
