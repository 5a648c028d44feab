//! Upgrade orchestration for control plane machines and worker deployments.

pub mod control_plane;
pub mod image;
pub mod kubeadm;
pub mod kubelet;
pub mod machine_creator;
pub mod machine_deployment;
pub mod version;

use std::fmt;
use std::time::Duration;

use semver::Version;

pub use control_plane::ControlPlaneUpgrader;
pub use image::ImageOverride;
pub use machine_creator::MachineCreator;
pub use machine_deployment::MachineDeploymentUpgrader;

/// Per-stage wait timeouts for a replacement machine. A zero timeout disables
/// that stage and every stage after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitTimeouts {
    pub provider_id: Duration,
    pub matching_node: Duration,
    pub node_ready: Duration,
}

impl Default for WaitTimeouts {
    fn default() -> Self {
        Self {
            provider_id: Duration::from_secs(15 * 60),
            matching_node: Duration::from_secs(10 * 60),
            node_ready: Duration::from_secs(15 * 60),
        }
    }
}

/// Everything an upgrade run needs to know, validated up front.
#[derive(Debug, Clone)]
pub struct UpgradePlan {
    pub cluster_name: String,
    pub cluster_namespace: String,
    /// Explicit target version. The control plane defaults to the highest
    /// version found in the fleet when unset.
    pub desired_version: Option<Version>,
    /// Marker stamped on every replaced machine and upgraded template.
    pub upgrade_id: String,
    pub image: Option<ImageOverride>,
    pub timeouts: WaitTimeouts,
}

/// An object left untouched by a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped {
    pub name: String,
    pub reason: String,
}

/// Outcome of one upgrade run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeReport {
    pub desired_version: Version,
    /// `old -> new` for replaced machines, the object name for patched ones.
    pub upgraded: Vec<String>,
    pub skipped: Vec<Skipped>,
}

impl UpgradeReport {
    pub const fn new(desired_version: Version) -> Self {
        Self {
            desired_version,
            upgraded: Vec::new(),
            skipped: Vec::new(),
        }
    }

    pub fn add_upgraded(&mut self, name: impl Into<String>) {
        self.upgraded.push(name.into());
    }

    pub fn add_skipped(&mut self, name: impl Into<String>, reason: impl Into<String>) {
        self.skipped.push(Skipped {
            name: name.into(),
            reason: reason.into(),
        });
    }

    pub fn upgraded_count(&self) -> usize {
        self.upgraded.len()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }
}

impl fmt::Display for UpgradeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "target v{}: {} upgraded, {} skipped",
            self.desired_version,
            self.upgraded_count(),
            self.skipped_count()
        )
    }
}
