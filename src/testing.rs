//! In-memory management and workload cluster for exercising the upgrade flow.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{Result, bail};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{
    ConfigMap, Node, NodeAddress, NodeSpec, NodeStatus, Pod, PodCondition, PodSpec, PodStatus,
};
use k8s_openapi::api::rbac::v1::{Role, RoleBinding};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::DynamicObject;
use serde_json::{Map, Value, json};

use crate::crd::{
    CLUSTER_NAME_LABEL, CONTROL_PLANE_LABEL, Machine, MachineDeployment, MachineSpec,
    ObjectReference, WORKER_SET_LABEL,
};
use crate::error::CapuError;
use crate::etcd::EtcdAdmin;
use crate::k8s::api::{
    ExecOutput, ExternalObjectApi, MachineApi, MachineDeploymentApi, NodeLister, PodExec,
    PodGetter, PodLister, TargetObjectApi,
};
use crate::upgrade::control_plane::ControlPlaneClients;
use crate::upgrade::machine_creator::{CONTROL_PLANE_COMPONENTS, CONTROL_PLANE_NAMESPACE};

pub const TEST_CLUSTER: &str = "test1";
pub const TEST_NAMESPACE: &str = "default";

#[derive(Debug, Clone)]
struct FakeMember {
    name: String,
    id: u64,
    client_url: String,
}

#[derive(Default)]
struct State {
    resource_version: u64,
    next_ip: u8,
    next_member_id: u64,

    machines: BTreeMap<String, Machine>,
    created_machines: usize,
    deleted_machines: usize,
    patched_machines: usize,

    deployments: BTreeMap<String, MachineDeployment>,
    deployment_patches: Vec<Value>,
    failing_deployments: BTreeSet<String>,

    external: BTreeMap<(String, String), DynamicObject>,

    nodes: BTreeMap<String, Node>,
    pods: BTreeMap<String, Pod>,
    pod_errors: bool,
    pod_lists: usize,

    members: Vec<FakeMember>,
    etcd_unhealthy: bool,
    exec_log: Vec<(String, String)>,

    config_maps: BTreeMap<String, ConfigMap>,
    roles: BTreeMap<String, Role>,
    role_bindings: BTreeMap<String, RoleBinding>,

    auto_provision: bool,
    provision_unready: bool,
    provision_without_hostname: bool,
    provision_without_node: bool,
}

impl State {
    fn next_resource_version(&mut self) -> String {
        self.resource_version += 1;
        self.resource_version.to_string()
    }

    fn next_ip(&mut self) -> String {
        self.next_ip += 1;
        format!("10.0.0.{}", self.next_ip)
    }

    fn add_member(&mut self, name: &str, pod_ip: &str) {
        self.next_member_id += 1;
        self.members.push(FakeMember {
            name: name.to_string(),
            id: 0x1000 + self.next_member_id,
            client_url: format!("https://{pod_ip}:2379"),
        });
    }

    fn add_control_plane_pods(&mut self, hostname: &str, ready: bool) -> String {
        let ip = self.next_ip();
        let status = if ready { "True" } else { "False" };
        for component in CONTROL_PLANE_COMPONENTS {
            let mut pod = pod_with_conditions(
                &format!("{component}-{hostname}"),
                &[
                    ("PodScheduled", "True"),
                    ("Initialized", "True"),
                    ("Ready", status),
                    ("ContainersReady", status),
                ],
            );
            place_pod(&mut pod, component, hostname, &ip);
            self.pods.insert(format!("{component}-{hostname}"), pod);
        }
        ip
    }

    /// What the infrastructure provider and kubeadm do for a new machine.
    fn provision(&mut self, machine: &mut Machine) {
        let name = machine.name().to_string();
        let provider_id = format!("aws:////i-{name}");
        machine.spec.provider_id = Some(provider_id.clone());
        if self.provision_without_node {
            return;
        }

        let hostname = (!self.provision_without_hostname).then_some(name.as_str());
        self.nodes
            .insert(name.clone(), node(&name, &provider_id, hostname));
        if let Some(hostname) = hostname {
            let ip = self.add_control_plane_pods(hostname, !self.provision_unready);
            self.add_member(hostname, &ip);
        }
    }
}

/// Fake API server state shared by every capability trait.
#[derive(Default)]
pub struct FakeCluster {
    state: Mutex<State>,
}

impl FakeCluster {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn control_plane_clients(self: &Arc<Self>) -> ControlPlaneClients {
        ControlPlaneClients {
            machines: self.clone(),
            external: self.clone(),
            nodes: self.clone(),
            pods: self.clone(),
            target: self.clone(),
            etcd: EtcdAdmin::new(self.clone(), self.clone()),
        }
    }

    /// A control plane machine with its node, static pods, etcd member and
    /// referenced infrastructure and bootstrap objects.
    pub fn add_running_control_plane(&self, name: &str, version: &str) {
        let provider_id = format!("aws:////i-{name}");
        self.put_machine(control_plane_machine(name, version, Some(&provider_id)));

        let mut state = self.state();
        for (api_version, kind) in [
            ("infrastructure.cluster.x-k8s.io/v1alpha2", "AWSMachine"),
            ("bootstrap.cluster.x-k8s.io/v1alpha2", "KubeadmConfig"),
        ] {
            let rv = state.next_resource_version();
            let object: DynamicObject = serde_json::from_value(json!({
                "apiVersion": api_version,
                "kind": kind,
                "metadata": {"name": name, "namespace": TEST_NAMESPACE, "resourceVersion": rv},
                "spec": {"providerID": provider_id}
            }))
            .unwrap();
            state
                .external
                .insert((kind.to_string(), name.to_string()), object);
        }

        state
            .nodes
            .insert(name.to_string(), node(name, &provider_id, Some(name)));
        let ip = state.add_control_plane_pods(name, true);
        state.add_member(name, &ip);
    }

    pub fn seed_kubeadm_config(&self, version: &str) {
        self.put_config_map(config_map(
            "kubeadm-config",
            "ClusterConfiguration",
            &format!(
                "apiVersion: kubeadm.k8s.io/v1beta1\nclusterName: {TEST_CLUSTER}\nkind: ClusterConfiguration\nkubernetesVersion: {version}\n"
            ),
        ));
    }

    pub fn seed_kubelet_config(&self, name: &str) {
        self.put_config_map(config_map(
            name,
            "kubelet",
            "apiVersion: kubelet.config.k8s.io/v1beta1\nkind: KubeletConfiguration\n",
        ));
    }

    pub fn set_auto_provision(&self, enabled: bool) {
        self.state().auto_provision = enabled;
    }

    pub fn set_provision_ready(&self, ready: bool) {
        self.state().provision_unready = !ready;
    }

    pub fn set_provision_hostname(&self, hostname: bool) {
        self.state().provision_without_hostname = !hostname;
    }

    /// Assign provider IDs without ever registering the backing node.
    pub fn set_provision_node(&self, node: bool) {
        self.state().provision_without_node = !node;
    }

    pub fn put_machine(&self, mut machine: Machine) {
        let mut state = self.state();
        machine.metadata.resource_version = Some(state.next_resource_version());
        state.machines.insert(machine.name().to_string(), machine);
    }

    pub fn machine(&self, name: &str) -> Option<Machine> {
        self.state().machines.get(name).cloned()
    }

    pub fn machine_names(&self) -> Vec<String> {
        self.state().machines.keys().cloned().collect()
    }

    pub fn created_machine_count(&self) -> usize {
        self.state().created_machines
    }

    pub fn deleted_machine_count(&self) -> usize {
        self.state().deleted_machines
    }

    pub fn patched_machine_count(&self) -> usize {
        self.state().patched_machines
    }

    pub fn put_machine_deployment(&self, mut deployment: MachineDeployment) {
        let mut state = self.state();
        deployment.metadata.resource_version = Some(state.next_resource_version());
        state
            .deployments
            .insert(deployment.name().to_string(), deployment);
    }

    pub fn machine_deployment(&self, name: &str) -> Option<MachineDeployment> {
        self.state().deployments.get(name).cloned()
    }

    pub fn deployment_patches(&self) -> Vec<Value> {
        self.state().deployment_patches.clone()
    }

    pub fn fail_deployment_patch(&self, name: &str) {
        self.state().failing_deployments.insert(name.to_string());
    }

    pub fn external_object(&self, kind: &str, name: &str) -> Option<DynamicObject> {
        self.state()
            .external
            .get(&(kind.to_string(), name.to_string()))
            .cloned()
    }

    pub fn remove_node(&self, name: &str) {
        self.state().nodes.remove(name);
    }

    pub fn add_etcd_pod(&self, name: &str, node_name: &str, ip: &str) {
        let mut pod = pod_with_conditions(name, &[("Ready", "True")]);
        place_pod(&mut pod, "etcd", node_name, ip);
        self.state().pods.insert(name.to_string(), pod);
    }

    pub fn set_etcd_members(&self, members: &[(&str, u64, &str)]) {
        self.state().members = members
            .iter()
            .map(|(name, id, url)| FakeMember {
                name: (*name).to_string(),
                id: *id,
                client_url: (*url).to_string(),
            })
            .collect();
    }

    pub fn etcd_member_names(&self) -> Vec<String> {
        self.state().members.iter().map(|m| m.name.clone()).collect()
    }

    pub fn set_etcd_healthy(&self, healthy: bool) {
        self.state().etcd_unhealthy = !healthy;
    }

    /// `(pod, shell line)` of every command run so far.
    pub fn exec_log(&self) -> Vec<(String, String)> {
        self.state().exec_log.clone()
    }

    /// Number of pod list calls served so far.
    pub fn pod_list_count(&self) -> usize {
        self.state().pod_lists
    }

    pub fn set_pod_errors(&self, errors: bool) {
        self.state().pod_errors = errors;
    }

    pub fn add_control_plane_pods(&self, hostname: &str, ready: bool) {
        self.state().add_control_plane_pods(hostname, ready);
    }

    pub fn remove_pod(&self, name: &str) {
        self.state().pods.remove(name);
    }

    pub fn put_config_map(&self, cm: ConfigMap) {
        let name = cm.metadata.name.clone().unwrap_or_default();
        self.state().config_maps.insert(name, cm);
    }

    pub fn config_map(&self, name: &str) -> Option<ConfigMap> {
        self.state().config_maps.get(name).cloned()
    }

    pub fn role_names(&self) -> Vec<String> {
        self.state().roles.keys().cloned().collect()
    }

    pub fn role_binding_names(&self) -> Vec<String> {
        self.state().role_bindings.keys().cloned().collect()
    }
}

fn not_found(what: impl Into<String>) -> anyhow::Error {
    CapuError::NotFound(what.into()).into()
}

fn matches_selector(labels: Option<&BTreeMap<String, String>>, selector: &str) -> bool {
    selector
        .split(',')
        .filter(|pair| !pair.is_empty())
        .all(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            labels.and_then(|l| l.get(key)).is_some_and(|v| v == value)
        })
}

/// RFC 7386 merge of `patch` into `target`.
fn apply_merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(patch) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(target) = target {
        for (key, value) in patch {
            if value.is_null() {
                target.remove(key);
            } else {
                apply_merge_patch(target.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
    }
}

/// Apply a merge patch the way the API server does, rejecting stale
/// resource versions.
fn patch_object<T>(object: &T, patch: &Value, next_rv: String) -> Result<T>
where
    T: serde::Serialize + serde::de::DeserializeOwned,
{
    let mut value = serde_json::to_value(object)?;
    if let Some(expected) = patch.pointer("/metadata/resourceVersion")
        && value.pointer("/metadata/resourceVersion") != Some(expected)
    {
        bail!(CapuError::KubernetesApi("conflict: object was modified".to_string()));
    }
    apply_merge_patch(&mut value, patch);
    value["metadata"]["resourceVersion"] = Value::String(next_rv);
    Ok(serde_json::from_value(value)?)
}

#[async_trait]
impl MachineApi for FakeCluster {
    async fn get(&self, namespace: &str, name: &str) -> Result<Machine> {
        self.state()
            .machines
            .get(name)
            .filter(|m| m.namespace() == namespace)
            .cloned()
            .ok_or_else(|| not_found(format!("machine {namespace}/{name}")))
    }

    async fn list(&self, namespace: &str, selector: &str) -> Result<Vec<Machine>> {
        Ok(self
            .state()
            .machines
            .values()
            .filter(|m| m.namespace() == namespace)
            .filter(|m| matches_selector(m.metadata.labels.as_ref(), selector))
            .cloned()
            .collect())
    }

    async fn create(&self, machine: &Machine) -> Result<Machine> {
        let mut state = self.state();
        if state.machines.contains_key(machine.name()) {
            bail!(CapuError::KubernetesApi(format!(
                "machine {} already exists",
                machine.name()
            )));
        }
        let mut created = machine.clone();
        created.metadata.resource_version = Some(state.next_resource_version());
        state.created_machines += 1;

        let mut stored = created.clone();
        if state.auto_provision {
            state.provision(&mut stored);
        }
        state.machines.insert(stored.name().to_string(), stored);
        Ok(created)
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<()> {
        let mut state = self.state();
        state
            .machines
            .remove(name)
            .ok_or_else(|| not_found(format!("machine {namespace}/{name}")))?;
        state.deleted_machines += 1;
        Ok(())
    }

    async fn patch(&self, namespace: &str, name: &str, patch: &Value) -> Result<Machine> {
        let mut state = self.state();
        let current = state
            .machines
            .get(name)
            .cloned()
            .ok_or_else(|| not_found(format!("machine {namespace}/{name}")))?;
        let rv = state.next_resource_version();
        let patched = patch_object(&current, patch, rv)?;
        state.machines.insert(name.to_string(), patched.clone());
        state.patched_machines += 1;
        Ok(patched)
    }
}

#[async_trait]
impl ExternalObjectApi for FakeCluster {
    async fn get(&self, reference: &ObjectReference, _namespace: &str) -> Result<DynamicObject> {
        let key = (reference.kind()?.to_string(), reference.name()?.to_string());
        self.state()
            .external
            .get(&key)
            .cloned()
            .ok_or_else(|| not_found(reference.to_string()))
    }

    async fn create(&self, namespace: &str, obj: &DynamicObject) -> Result<DynamicObject> {
        let kind = obj.types.as_ref().map(|t| t.kind.clone()).unwrap_or_default();
        let name = obj.metadata.name.clone().unwrap_or_default();
        let mut state = self.state();
        if state.external.contains_key(&(kind.clone(), name.clone())) {
            bail!(CapuError::KubernetesApi(format!("{kind} {name} already exists")));
        }
        let mut created = obj.clone();
        created.metadata.namespace = Some(namespace.to_string());
        created.metadata.resource_version = Some(state.next_resource_version());
        state.external.insert((kind, name), created.clone());
        Ok(created)
    }
}

#[async_trait]
impl MachineDeploymentApi for FakeCluster {
    async fn list(&self, namespace: &str, selector: &str) -> Result<Vec<MachineDeployment>> {
        Ok(self
            .state()
            .deployments
            .values()
            .filter(|d| d.namespace() == namespace)
            .filter(|d| matches_selector(d.metadata.labels.as_ref(), selector))
            .cloned()
            .collect())
    }

    async fn patch(
        &self,
        namespace: &str,
        name: &str,
        patch: &Value,
    ) -> Result<MachineDeployment> {
        let mut state = self.state();
        if state.failing_deployments.contains(name) {
            bail!(CapuError::KubernetesApi(format!(
                "admission webhook denied patch of {name}"
            )));
        }
        let current = state
            .deployments
            .get(name)
            .cloned()
            .ok_or_else(|| not_found(format!("machine deployment {namespace}/{name}")))?;
        let rv = state.next_resource_version();
        let patched = patch_object(&current, patch, rv)?;
        state.deployments.insert(name.to_string(), patched.clone());
        state.deployment_patches.push(patch.clone());
        Ok(patched)
    }
}

#[async_trait]
impl NodeLister for FakeCluster {
    async fn list_nodes(&self) -> Result<Vec<Node>> {
        Ok(self.state().nodes.values().cloned().collect())
    }
}

#[async_trait]
impl PodGetter for FakeCluster {
    async fn get_pod(&self, _namespace: &str, name: &str) -> Result<Option<Pod>> {
        let state = self.state();
        if state.pod_errors {
            bail!(CapuError::KubernetesApi("connection refused".to_string()));
        }
        Ok(state.pods.get(name).cloned())
    }
}

#[async_trait]
impl PodLister for FakeCluster {
    async fn list_pods(&self, _namespace: &str, selector: &str) -> Result<Vec<Pod>> {
        let mut state = self.state();
        state.pod_lists += 1;
        Ok(state
            .pods
            .values()
            .filter(|p| matches_selector(p.metadata.labels.as_ref(), selector))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PodExec for FakeCluster {
    async fn exec(
        &self,
        _namespace: &str,
        pod: &str,
        command: &[String],
        _deadline: Duration,
    ) -> Result<ExecOutput> {
        let mut state = self.state();
        if !state.pods.contains_key(pod) {
            return Err(not_found(format!("pod {pod}")));
        }
        let line = command.last().cloned().unwrap_or_default();
        state.exec_log.push((pod.to_string(), line.clone()));

        let remote_error = |details: &str| {
            anyhow::Error::from(CapuError::RemoteExec {
                pod: pod.to_string(),
                details: details.to_string(),
            })
        };

        if line.ends_with("member list -w json") {
            let members: Vec<Value> = state
                .members
                .iter()
                .map(|m| json!({"ID": m.id, "name": m.name, "clientURLs": [m.client_url]}))
                .collect();
            return Ok(ExecOutput {
                stdout: json!({"members": members}).to_string(),
                stderr: String::new(),
            });
        }
        if line.contains("endpoint health") {
            if state.etcd_unhealthy {
                return Err(remote_error("unhealthy cluster"));
            }
            return Ok(ExecOutput::default());
        }
        if let Some((_, hex)) = line.split_once("member remove ") {
            let id = u64::from_str_radix(hex.trim(), 16).map_err(|e| remote_error(&e.to_string()))?;
            let before = state.members.len();
            state.members.retain(|m| m.id != id);
            if state.members.len() == before {
                return Err(remote_error("member not found"));
            }
            return Ok(ExecOutput {
                stdout: format!("Member {hex} removed from cluster"),
                stderr: String::new(),
            });
        }
        Err(remote_error("unknown command"))
    }
}

#[async_trait]
impl TargetObjectApi for FakeCluster {
    async fn get_config_map(&self, _namespace: &str, name: &str) -> Result<Option<ConfigMap>> {
        Ok(self.state().config_maps.get(name).cloned())
    }

    async fn create_config_map(&self, _namespace: &str, cm: &ConfigMap) -> Result<bool> {
        let name = cm.metadata.name.clone().unwrap_or_default();
        let mut state = self.state();
        if state.config_maps.contains_key(&name) {
            return Ok(false);
        }
        state.config_maps.insert(name, cm.clone());
        Ok(true)
    }

    async fn replace_config_map(&self, namespace: &str, cm: &ConfigMap) -> Result<ConfigMap> {
        let name = cm.metadata.name.clone().unwrap_or_default();
        let mut state = self.state();
        if !state.config_maps.contains_key(&name) {
            return Err(not_found(format!("config map {namespace}/{name}")));
        }
        let mut stored = cm.clone();
        stored.metadata.resource_version = Some(state.next_resource_version());
        state.config_maps.insert(name, stored.clone());
        Ok(stored)
    }

    async fn create_role(&self, _namespace: &str, role: &Role) -> Result<bool> {
        let name = role.metadata.name.clone().unwrap_or_default();
        let mut state = self.state();
        if state.roles.contains_key(&name) {
            return Ok(false);
        }
        state.roles.insert(name, role.clone());
        Ok(true)
    }

    async fn create_role_binding(&self, _namespace: &str, binding: &RoleBinding) -> Result<bool> {
        let name = binding.metadata.name.clone().unwrap_or_default();
        let mut state = self.state();
        if state.role_bindings.contains_key(&name) {
            return Ok(false);
        }
        state.role_bindings.insert(name, binding.clone());
        Ok(true)
    }
}

fn config_map(name: &str, key: &str, data: &str) -> ConfigMap {
    ConfigMap {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(CONTROL_PLANE_NAMESPACE.to_string()),
            ..Default::default()
        },
        data: Some(BTreeMap::from([(key.to_string(), data.to_string())])),
        ..Default::default()
    }
}

fn node(name: &str, provider_id: &str, hostname: Option<&str>) -> Node {
    let mut addresses = vec![NodeAddress {
        address: "10.0.1.1".to_string(),
        type_: "InternalIP".to_string(),
    }];
    if let Some(hostname) = hostname {
        addresses.push(NodeAddress {
            address: hostname.to_string(),
            type_: "Hostname".to_string(),
        });
    }
    Node {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        spec: Some(NodeSpec {
            provider_id: Some(provider_id.to_string()),
            ..Default::default()
        }),
        status: Some(NodeStatus {
            addresses: Some(addresses),
            ..Default::default()
        }),
    }
}

fn place_pod(pod: &mut Pod, component: &str, node_name: &str, ip: &str) {
    pod.metadata.labels = Some(BTreeMap::from([(
        "component".to_string(),
        component.to_string(),
    )]));
    pod.spec = Some(PodSpec {
        node_name: Some(node_name.to_string()),
        ..Default::default()
    });
    if let Some(status) = pod.status.as_mut() {
        status.pod_ip = Some(ip.to_string());
    }
}

fn labels(pairs: &[(&str, &str)]) -> Option<BTreeMap<String, String>> {
    Some(
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect(),
    )
}

fn reference(api_version: &str, kind: &str, name: &str) -> ObjectReference {
    ObjectReference {
        api_version: Some(api_version.to_string()),
        kind: Some(kind.to_string()),
        name: Some(name.to_string()),
        namespace: Some(TEST_NAMESPACE.to_string()),
        ..Default::default()
    }
}

/// Control plane machine of the `test1` cluster in `default`.
pub fn control_plane_machine(name: &str, version: &str, provider_id: Option<&str>) -> Machine {
    let mut spec = MachineSpec {
        infrastructure_ref: reference(
            "infrastructure.cluster.x-k8s.io/v1alpha2",
            "AWSMachine",
            name,
        ),
        version: Some(version.to_string()),
        provider_id: provider_id.map(str::to_string),
        ..Default::default()
    };
    spec.bootstrap.config_ref = Some(reference(
        "bootstrap.cluster.x-k8s.io/v1alpha2",
        "KubeadmConfig",
        name,
    ));

    let mut machine = Machine::new(name, spec);
    machine.metadata.namespace = Some(TEST_NAMESPACE.to_string());
    machine.metadata.labels = labels(&[
        (CLUSTER_NAME_LABEL, TEST_CLUSTER),
        (CONTROL_PLANE_LABEL, "true"),
    ]);
    machine
}

/// Worker deployment of the `test1` cluster with three replicas.
pub fn worker_deployment(name: &str, version: &str) -> MachineDeployment {
    serde_json::from_value(json!({
        "apiVersion": "cluster.x-k8s.io/v1alpha2",
        "kind": "MachineDeployment",
        "metadata": {
            "name": name,
            "namespace": TEST_NAMESPACE,
            "labels": {(CLUSTER_NAME_LABEL): TEST_CLUSTER, (WORKER_SET_LABEL): "node"}
        },
        "spec": {
            "replicas": 3,
            "template": {
                "metadata": {"labels": {"set": "node"}},
                "spec": {
                    "version": version,
                    "bootstrap": {"configRef": {
                        "apiVersion": "bootstrap.cluster.x-k8s.io/v1alpha2",
                        "kind": "KubeadmConfigTemplate",
                        "name": name
                    }},
                    "infrastructureRef": {
                        "apiVersion": "infrastructure.cluster.x-k8s.io/v1alpha2",
                        "kind": "AWSMachineTemplate",
                        "name": name
                    }
                }
            }
        }
    }))
    .unwrap()
}

/// Pod in `kube-system` with the given `(type, status)` conditions.
pub fn pod_with_conditions(name: &str, conditions: &[(&str, &str)]) -> Pod {
    Pod {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(CONTROL_PLANE_NAMESPACE.to_string()),
            ..Default::default()
        },
        status: Some(PodStatus {
            conditions: Some(
                conditions
                    .iter()
                    .map(|(type_, status)| PodCondition {
                        type_: (*type_).to_string(),
                        status: (*status).to_string(),
                        ..Default::default()
                    })
                    .collect(),
            ),
            ..Default::default()
        }),
        ..Default::default()
    }
}
