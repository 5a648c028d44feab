//! capu - Rolling Kubernetes version upgrades for Cluster API managed clusters.
//!
//! Replaces control plane machines one at a time while keeping etcd
//! membership consistent, or rolls worker machine deployments to a new
//! version by patching their templates.

mod config;
mod crd;
mod error;
mod etcd;
mod k8s;
mod notify;
mod poll;
mod upgrade;

#[cfg(test)]
mod testing;

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use config::{Args, BUILD_DATE, COMMIT, Config, Scope, VERSION};
use etcd::EtcdAdmin;
use k8s::client::{build_management_client, build_workload_client};
use k8s::kube_api::{ManagementCluster, WorkloadCluster};
use notify::{RunInfo, SlackNotifier};
use upgrade::control_plane::ControlPlaneClients;
use upgrade::{ControlPlaneUpgrader, MachineDeploymentUpgrader, UpgradeReport};

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let config = match Config::from_args(args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(2);
        }
    };

    if let Err(e) = init_tracing(&config.log_level, config.log_json) {
        eprintln!("Failed to initialize logging: {e}");
        std::process::exit(1);
    }

    info!(
        "Starting capu v{} (commit: {}, build: {})",
        VERSION, COMMIT, BUILD_DATE
    );

    let run_info = RunInfo {
        cluster_name: config.plan.cluster_name.clone(),
        cluster_namespace: config.plan.cluster_namespace.clone(),
        scope: config.scope,
        target_version: config.plan.desired_version.as_ref().map(ToString::to_string),
        upgrade_id: config.plan.upgrade_id.clone(),
    };
    let slack = config.slack_webhook_url.clone().map(|url| {
        info!("Slack notifications enabled");
        SlackNotifier::new(url)
    });
    let cluster = format!("{}/{}", run_info.cluster_namespace, run_info.cluster_name);

    if let Some(slack) = &slack {
        slack
            .send(&cluster, &notify::build_started_message(&run_info))
            .await;
    }

    let started = Instant::now();
    match run(&config).await {
        Ok(report) => {
            for name in &report.upgraded {
                info!(object = %name, "Upgraded");
            }
            for skipped in &report.skipped {
                info!(object = %skipped.name, reason = %skipped.reason, "Skipped");
            }
            info!(
                scope = %config.scope,
                upgrade_id = %config.plan.upgrade_id,
                "Upgrade finished, {report}"
            );
            if let Some(slack) = &slack {
                let message =
                    notify::build_completed_message(&run_info, &report, started.elapsed());
                slack.send(&cluster, &message).await;
            }
        }
        Err(e) => {
            error!(scope = %config.scope, "Upgrade failed: {e:#}");
            if let Some(slack) = &slack {
                let message =
                    notify::build_failed_message(&run_info, &format!("{e:#}"), started.elapsed());
                slack.send(&cluster, &message).await;
            }
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber. `RUST_LOG` takes precedence over `log_level`.
fn init_tracing(log_level: &str, json: bool) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .map_err(|e| anyhow::anyhow!("Failed to initialize log filter: {e}"))?;

    let builder = fmt().with_env_filter(filter).with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }

    Ok(())
}

async fn run(config: &Config) -> Result<UpgradeReport> {
    let management = build_management_client(
        config.kubeconfig.as_deref(),
        config.kubeconfig_context.as_deref(),
    )
    .await?;
    info!("Connected to management cluster");

    let plan = config.plan.clone();
    match config.scope {
        Scope::ControlPlane => {
            let workload = build_workload_client(
                &management,
                &plan.cluster_namespace,
                &plan.cluster_name,
            )
            .await?;
            info!(cluster = %plan.cluster_name, "Connected to workload cluster");

            let management = Arc::new(ManagementCluster::new(management));
            let workload = Arc::new(WorkloadCluster::new(workload));
            let clients = ControlPlaneClients {
                machines: management.clone(),
                external: management,
                nodes: workload.clone(),
                pods: workload.clone(),
                target: workload.clone(),
                etcd: EtcdAdmin::new(workload.clone(), workload),
            };
            ControlPlaneUpgrader::new(plan, clients).upgrade().await
        }
        Scope::MachineDeployment => {
            let management = Arc::new(ManagementCluster::new(management));
            MachineDeploymentUpgrader::new(plan, management).upgrade().await
        }
    }
}
