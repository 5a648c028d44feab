//! Notification of upgrade run lifecycle events.

pub mod slack;

use std::time::Duration;

pub use slack::{SlackMessage, SlackNotifier};

use crate::config::Scope;
use crate::upgrade::UpgradeReport;

/// What a run is about, shared by every message of that run.
#[derive(Debug, Clone)]
pub struct RunInfo {
    pub cluster_name: String,
    pub cluster_namespace: String,
    pub scope: Scope,
    /// Explicit target, `None` when the control plane's highest version is used.
    pub target_version: Option<String>,
    pub upgrade_id: String,
}

impl RunInfo {
    fn cluster(&self) -> String {
        format!("{}/{}", self.cluster_namespace, self.cluster_name)
    }

    fn context(&self) -> String {
        format!("Sent by capu, upgrade id {}", self.upgrade_id)
    }
}

fn format_duration(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{}m {}s", secs / 60, secs % 60)
}

/// Build the "Started" notification message.
pub fn build_started_message(run: &RunInfo) -> SlackMessage {
    SlackMessage {
        header: "Cluster API Upgrade Started".to_string(),
        fields: vec![
            ("Cluster".to_string(), run.cluster()),
            ("Scope".to_string(), run.scope.to_string()),
            (
                "Target Version".to_string(),
                run.target_version
                    .clone()
                    .unwrap_or_else(|| "highest in fleet".to_string()),
            ),
        ],
        context: run.context(),
    }
}

/// Build the "Completed" notification message.
pub fn build_completed_message(
    run: &RunInfo,
    report: &UpgradeReport,
    elapsed: Duration,
) -> SlackMessage {
    SlackMessage {
        header: "Cluster API Upgrade Completed".to_string(),
        fields: vec![
            ("Cluster".to_string(), run.cluster()),
            ("Scope".to_string(), run.scope.to_string()),
            (
                "Target Version".to_string(),
                format!("v{}", report.desired_version),
            ),
            ("Upgraded".to_string(), report.upgraded_count().to_string()),
            ("Skipped".to_string(), report.skipped_count().to_string()),
            ("Duration".to_string(), format_duration(elapsed)),
        ],
        context: run.context(),
    }
}

/// Build the "Failed" notification message.
pub fn build_failed_message(run: &RunInfo, error: &str, elapsed: Duration) -> SlackMessage {
    SlackMessage {
        header: "Cluster API Upgrade Failed".to_string(),
        fields: vec![
            ("Cluster".to_string(), run.cluster()),
            ("Scope".to_string(), run.scope.to_string()),
            ("Duration".to_string(), format_duration(elapsed)),
            ("Error".to_string(), error.to_string()),
        ],
        context: run.context(),
    }
}
