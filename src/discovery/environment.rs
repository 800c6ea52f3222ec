// src/discovery/environment.rs
use std::sync::Arc;

use super::cloud::{CloudClusterDetector, CloudClusterInfo};
use super::local::{LocalClusterDetector, LocalClusterInfo};
use crate::config::DetectorConfig;
use crate::exec::CommandRunner;
use crate::types::EnvironmentInfo;
use crate::utils::logging::Logger;

/// Local beats cloud beats nothing.
pub struct EnvironmentDetector {
    local: LocalClusterDetector,
    cloud: CloudClusterDetector,
    logger: Arc<dyn Logger>,
}

impl EnvironmentDetector {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        config: Arc<DetectorConfig>,
        logger: Arc<dyn Logger>,
    ) -> Self {
        Self {
            local: LocalClusterDetector::new(runner.clone(), config.clone(), logger.clone()),
            cloud: CloudClusterDetector::new(runner, config, logger.clone()),
            logger,
        }
    }

    pub async fn detect(&self) -> EnvironmentInfo {
        let local = self.local.detect().await;
        if local.detected {
            return from_local(&local);
        }

        let cloud = self.cloud.detect().await;
        if cloud.detected {
            return from_cloud(&cloud);
        }

        self.logger
            .log("No Kubernetes cluster detected; setup is required");
        EnvironmentInfo::unmatched()
    }
}

pub fn from_local(local: &LocalClusterInfo) -> EnvironmentInfo {
    EnvironmentInfo {
        is_local_cluster: true,
        cluster_type: local.cluster_type,
        cloud_provider: None,
        kubeconfig_path: local.kubeconfig_path.clone(),
        context_name: local.context_name.clone(),
        cluster_name: local.cluster_name.clone(),
        region: None,
        project_id: None,
        resource_group: None,
        auth_required: false,
        requires_setup: false,
    }
}

pub fn from_cloud(cloud: &CloudClusterInfo) -> EnvironmentInfo {
    EnvironmentInfo {
        is_local_cluster: false,
        cluster_type: cloud.cluster_type,
        cloud_provider: cloud.provider,
        kubeconfig_path: cloud.kubeconfig_path.clone(),
        context_name: cloud.context_name.clone(),
        cluster_name: cloud.cluster_name.clone(),
        region: cloud.region.clone(),
        project_id: cloud.project_id.clone(),
        resource_group: cloud.resource_group.clone(),
        auth_required: cloud.auth_required,
        requires_setup: false,
    }
}
