//! Kubernetes access for the management and workload clusters.

pub mod api;
pub mod client;
pub mod kube_api;
pub mod node;
pub mod patch;
