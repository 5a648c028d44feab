//! CLI configuration and argument parsing.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use secrecy::SecretString;
use semver::Version;

use crate::error::CapuError;
use crate::upgrade::version::parse_version;
use crate::upgrade::{ImageOverride, UpgradePlan, WaitTimeouts};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const COMMIT: &str = env!("BUILD_COMMIT");
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Which fleet of the cluster to upgrade.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Replace control plane machines one at a time.
    ControlPlane,
    /// Patch the templates of worker machine deployments.
    MachineDeployment,
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ControlPlane => write!(f, "control-plane"),
            Self::MachineDeployment => write!(f, "machine-deployment"),
        }
    }
}

/// Rolling Kubernetes version upgrades for Cluster API managed clusters.
#[derive(Parser, Debug, Clone)]
#[command(name = "capu")]
#[command(about = "Rolling Kubernetes version upgrades for Cluster API managed clusters")]
#[command(version = const_format::formatcp!(
    "{} (commit: {}, build date: {})",
    VERSION, COMMIT, BUILD_DATE
))]
pub struct Args {
    /// Kubeconfig of the management cluster
    #[arg(long)]
    pub kubeconfig: Option<PathBuf>,

    /// Kubeconfig context of the management cluster
    #[arg(long)]
    pub kubeconfig_context: Option<String>,

    /// Name of the Cluster API cluster to upgrade
    #[arg(long)]
    pub cluster_name: String,

    /// Namespace of the Cluster API cluster
    #[arg(long, default_value = "default")]
    pub cluster_namespace: String,

    /// Target Kubernetes version (e.g., v1.14.3)
    #[arg(long)]
    pub kubernetes_version: Option<String>,

    /// Identifier stamped on upgraded objects (default: current Unix timestamp)
    #[arg(long)]
    pub upgrade_id: Option<String>,

    /// Fleet to upgrade
    #[arg(long, value_enum, default_value_t = Scope::ControlPlane)]
    pub scope: Scope,

    /// Dotted path inside the machine spec holding the image (e.g., image.id)
    #[arg(long, requires = "image_id")]
    pub image_field: Option<String>,

    /// Image to set at --image-field
    #[arg(long, requires = "image_field")]
    pub image_id: Option<String>,

    /// Minutes to wait for a new machine's provider ID (0 disables)
    #[arg(long, default_value = "15")]
    pub provider_id_timeout_minutes: u64,

    /// Minutes to wait for a new machine's node (0 disables)
    #[arg(long, default_value = "10")]
    pub matching_node_timeout_minutes: u64,

    /// Minutes to wait for control plane components on a new node (0 disables)
    #[arg(long, default_value = "15")]
    pub node_ready_timeout_minutes: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "CAPU_LOG_LEVEL")]
    pub log_level: String,

    /// Emit logs as JSON
    #[arg(long, default_value = "false")]
    pub log_json: bool,

    /// Slack Incoming Webhook for run notifications
    #[arg(long, env = "SLACK_WEBHOOK_URL", hide_env_values = true)]
    pub slack_webhook_url: Option<String>,
}

/// Validated application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub kubeconfig: Option<PathBuf>,
    pub kubeconfig_context: Option<String>,
    pub scope: Scope,
    pub plan: UpgradePlan,
    pub log_level: String,
    pub log_json: bool,
    pub slack_webhook_url: Option<SecretString>,
}

impl Config {
    /// Validate CLI arguments into a config.
    pub fn from_args(args: Args) -> Result<Self, CapuError> {
        let cluster_name = args.cluster_name.trim().to_string();
        if cluster_name.is_empty() {
            return Err(CapuError::InvalidConfig(
                "--cluster-name must not be empty".to_string(),
            ));
        }
        if args.cluster_namespace.trim().is_empty() {
            return Err(CapuError::InvalidConfig(
                "--cluster-namespace must not be empty".to_string(),
            ));
        }

        let desired_version: Option<Version> = args
            .kubernetes_version
            .as_deref()
            .map(parse_version)
            .transpose()?;
        if args.scope == Scope::MachineDeployment && desired_version.is_none() {
            return Err(CapuError::InvalidConfig(
                "--kubernetes-version is required for --scope machine-deployment".to_string(),
            ));
        }

        let upgrade_id = match args.upgrade_id {
            Some(id) if id.trim().is_empty() => {
                return Err(CapuError::InvalidConfig(
                    "--upgrade-id must not be empty".to_string(),
                ));
            }
            Some(id) => id,
            None => chrono::Utc::now().timestamp().to_string(),
        };

        let image_field = args.image_field.filter(|f| !f.is_empty());
        let image_id = args.image_id.filter(|i| !i.is_empty());
        if image_field.is_some() != image_id.is_some() {
            return Err(CapuError::InvalidConfig(
                "--image-field and --image-id must be set together".to_string(),
            ));
        }
        let image = ImageOverride::from_parts(image_field.as_deref(), image_id.as_deref());

        let minutes = |m: u64| Duration::from_secs(m * 60);
        let timeouts = WaitTimeouts {
            provider_id: minutes(args.provider_id_timeout_minutes),
            matching_node: minutes(args.matching_node_timeout_minutes),
            node_ready: minutes(args.node_ready_timeout_minutes),
        };

        Ok(Self {
            kubeconfig: args.kubeconfig,
            kubeconfig_context: args.kubeconfig_context,
            scope: args.scope,
            plan: UpgradePlan {
                cluster_name,
                cluster_namespace: args.cluster_namespace,
                desired_version,
                upgrade_id,
                image,
                timeouts,
            },
            log_level: args.log_level,
            log_json: args.log_json,
            slack_webhook_url: args
                .slack_webhook_url
                .filter(|url| !url.is_empty())
                .map(SecretString::from),
        })
    }
}
