//! In-place template update of worker `MachineDeployment`s.
//!
//! Workers are not replaced here: the template's version, image and upgrade
//! annotation are patched and the Cluster API controller rolls the machines.

use std::sync::Arc;

use anyhow::{Context, Result};
use semver::Version;
use tracing::{error, info};

use super::{UpgradePlan, UpgradeReport};
use crate::crd::{
    CLUSTER_NAME_LABEL, MachineDeployment, UPGRADE_ID_ANNOTATION, WORKER_SET_LABEL,
    label_selector,
};
use crate::error::CapuError;
use crate::k8s::api::MachineDeploymentApi;
use crate::k8s::patch::merge_patch;

/// Value of the `set` label on worker deployments.
pub const WORKER_SET: &str = "node";

pub struct MachineDeploymentUpgrader {
    plan: UpgradePlan,
    deployments: Arc<dyn MachineDeploymentApi>,
}

impl MachineDeploymentUpgrader {
    pub fn new(plan: UpgradePlan, deployments: Arc<dyn MachineDeploymentApi>) -> Self {
        Self { plan, deployments }
    }

    pub async fn upgrade(&self) -> Result<UpgradeReport> {
        let desired = self.plan.desired_version.clone().ok_or_else(|| {
            CapuError::InvalidConfig(
                "a Kubernetes version is required to upgrade machine deployments".to_string(),
            )
        })?;

        let selector = label_selector(&[
            (CLUSTER_NAME_LABEL, &self.plan.cluster_name),
            (WORKER_SET_LABEL, WORKER_SET),
        ]);
        info!(selector = %selector, namespace = %self.plan.cluster_namespace, "Listing machine deployments");
        let deployments = self
            .deployments
            .list(&self.plan.cluster_namespace, &selector)
            .await
            .context("Error listing machine deployments")?;
        if deployments.is_empty() {
            return Err(CapuError::EmptyFleet("machine deployments".to_string()).into());
        }

        let mut report = UpgradeReport::new(desired.clone());
        for deployment in &deployments {
            if deployment.has_upgrade_id(&self.plan.upgrade_id) {
                report.add_skipped(deployment.name(), "already carries this upgrade id");
                continue;
            }
            if let Err(e) = self.update(deployment, &desired).await {
                error!(
                    namespace = deployment.namespace(),
                    name = deployment.name(),
                    error = %e,
                    "Failed to update machine deployment"
                );
                return Err(e);
            }
            report.add_upgraded(deployment.name());
        }

        Ok(report)
    }

    async fn update(&self, deployment: &MachineDeployment, desired: &Version) -> Result<()> {
        info!(
            namespace = deployment.namespace(),
            name = deployment.name(),
            version = %desired,
            "Updating machine deployment"
        );

        let updated = self.updated_template(deployment, desired)?;
        let patch = merge_patch(deployment, &updated)?;
        self.deployments
            .patch(deployment.namespace(), deployment.name(), &patch)
            .await
            .with_context(|| format!("Error patching machine deployment {}", deployment.name()))?;
        Ok(())
    }

    fn updated_template(
        &self,
        deployment: &MachineDeployment,
        desired: &Version,
    ) -> Result<MachineDeployment> {
        let mut updated = deployment.clone();
        let template = &mut updated.spec.template;
        template.spec.version = Some(desired.to_string());
        template
            .metadata
            .annotations
            .get_or_insert_with(Default::default)
            .insert(
                UPGRADE_ID_ANNOTATION.to_string(),
                self.plan.upgrade_id.clone(),
            );
        if let Some(image) = &self.plan.image {
            image.apply(&mut template.spec)?;
        }
        Ok(updated)
    }
}
