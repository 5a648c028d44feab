//! Kubernetes client builders for the management and workload clusters.
//!
//! The management cluster client comes from a local kubeconfig (or the
//! in-cluster environment). The workload cluster client is built from the
//! `<cluster>-kubeconfig` secret Cluster API writes for every cluster.

use std::path::Path;

use anyhow::{Context, Result};
use k8s_openapi::api::core::v1::Secret;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Config};
use tracing::debug;

use crate::error::{CapuError, is_not_found};

/// Key holding the kubeconfig inside the Cluster API kubeconfig secret.
const KUBECONFIG_SECRET_KEY: &str = "value";

/// Name of the secret holding the admin kubeconfig of a workload cluster.
pub fn kubeconfig_secret_name(cluster_name: &str) -> String {
    format!("{cluster_name}-kubeconfig")
}

/// Build a client for the management cluster.
///
/// Without an explicit path or context the standard inference applies
/// (`KUBECONFIG`, `~/.kube/config`, then in-cluster).
pub async fn build_management_client(
    kubeconfig: Option<&Path>,
    context: Option<&str>,
) -> Result<Client> {
    let options = KubeConfigOptions {
        context: context.map(str::to_string),
        ..Default::default()
    };

    let config = match (kubeconfig, context) {
        (Some(path), _) => {
            let kubeconfig = Kubeconfig::read_from(path)
                .with_context(|| format!("Failed to read kubeconfig {}", path.display()))?;
            Config::from_custom_kubeconfig(kubeconfig, &options)
                .await
                .context("Failed to load management cluster kubeconfig")?
        }
        (None, Some(_)) => Config::from_kubeconfig(&options)
            .await
            .context("Failed to load management cluster kubeconfig context")?,
        (None, None) => Config::infer()
            .await
            .context("Failed to infer management cluster configuration")?,
    };

    debug!(cluster_url = %config.cluster_url, "Management cluster configuration loaded");

    Client::try_from(config).context("Failed to build management cluster client")
}

/// Build a client for the workload cluster named `cluster_name`.
pub async fn build_workload_client(
    management: &Client,
    namespace: &str,
    cluster_name: &str,
) -> Result<Client> {
    let name = kubeconfig_secret_name(cluster_name);
    let secrets: Api<Secret> = Api::namespaced(management.clone(), namespace);
    let secret = match secrets.get(&name).await {
        Ok(secret) => secret,
        Err(e) if is_not_found(&e) => {
            return Err(CapuError::NotFound(format!("secret {namespace}/{name}")).into());
        }
        Err(e) => {
            return Err(CapuError::KubernetesApi(format!(
                "Failed to get secret {namespace}/{name}: {e}"
            ))
            .into());
        }
    };

    let kubeconfig = kubeconfig_from_secret(&secret)
        .with_context(|| format!("Invalid kubeconfig secret {namespace}/{name}"))?;
    let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
        .context("Failed to load workload cluster kubeconfig")?;

    debug!(
        cluster = cluster_name,
        cluster_url = %config.cluster_url,
        "Workload cluster configuration loaded"
    );

    Client::try_from(config).context("Failed to build workload cluster client")
}

/// Parse the kubeconfig stored under the `value` key of a secret.
pub fn kubeconfig_from_secret(secret: &Secret) -> Result<Kubeconfig> {
    let data = secret
        .data
        .as_ref()
        .and_then(|d| d.get(KUBECONFIG_SECRET_KEY))
        .ok_or_else(|| CapuError::NotFound(format!("key {KUBECONFIG_SECRET_KEY:?}")))?;

    let yaml = std::str::from_utf8(&data.0).map_err(|e| CapuError::Parse {
        what: "kubeconfig".to_string(),
        details: e.to_string(),
    })?;

    Kubeconfig::from_yaml(yaml).map_err(|e| {
        CapuError::Parse {
            what: "kubeconfig".to_string(),
            details: e.to_string(),
        }
        .into()
    })
}
