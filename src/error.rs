//! Custom error types for capu.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur during a Cluster API upgrade run.
#[derive(Error, Debug)]
pub enum CapuError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid version format: {0}")]
    InvalidVersion(String),

    #[error("Found 0 {0}")]
    EmptyFleet(String),

    #[error(
        "Machine name {0:?} does not match expected format <name>-<index> or <name>-<index>-<timestamp>"
    )]
    MalformedMachineName(String),

    #[error("Invalid provider ID {id:?}: {reason}")]
    InvalidProviderId { id: String, reason: String },

    #[error("Unable to find hostname for node {0}")]
    MissingHostname(String),

    #[error("Unknown previous node for provider ID {0}")]
    UnknownNode(String),

    #[error("Timeout waiting for {operation} after {}s", .timeout.as_secs())]
    Timeout {
        operation: String,
        timeout: Duration,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Failed to parse {what}: {details}")]
    Parse { what: String, details: String },

    #[error("Remote command failed in pod {pod}: {details}")]
    RemoteExec { pod: String, details: String },

    #[error("Kubernetes API error: {0}")]
    KubernetesApi(String),
}

impl CapuError {
    /// Build a timeout error for the named wait stage.
    pub fn timeout(operation: impl Into<String>, timeout: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout,
        }
    }
}

/// Returns true if the Kubernetes API answered with 404.
pub fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(ae) if ae.code == 404)
}

/// Returns true if the Kubernetes API answered with 409 on create.
pub fn is_already_exists(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(ae) if ae.code == 409)
}
