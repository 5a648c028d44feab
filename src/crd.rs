//! Cluster API resource types consumed by the upgrader.

pub mod machine;
pub mod machine_deployment;
pub mod reference;

pub use machine::{Machine, MachineSpec};
pub use machine_deployment::MachineDeployment;
pub use reference::ObjectReference;

/// Label carrying the owning cluster name on every Cluster API object.
pub const CLUSTER_NAME_LABEL: &str = "cluster.x-k8s.io/cluster-name";

/// Label set to `"true"` on control plane machines.
pub const CONTROL_PLANE_LABEL: &str = "cluster.x-k8s.io/control-plane";

/// Label marking worker `MachineDeployment`s.
pub const WORKER_SET_LABEL: &str = "set";

/// Annotation recording the upgrade identifier on replaced machines and
/// upgraded machine templates.
pub const UPGRADE_ID_ANNOTATION: &str = "upgrade-id";

/// Build a `k=v,k=v` label selector from ordered pairs.
pub fn label_selector(labels: &[(&str, &str)]) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}
