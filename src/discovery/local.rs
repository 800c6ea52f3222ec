// src/discovery/local.rs
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use super::kubeconfig::KubeConfig;
use crate::config::DetectorConfig;
use crate::error::{NotDetected, ProbeOutcome};
use crate::exec::{CommandOutput, CommandRunner};
use crate::types::ClusterType;
use crate::utils::logging::Logger;

const DOCKER_DESKTOP_CONTEXT: &str = "docker-desktop";
const NO_KIND_CLUSTERS: &str = "No kind clusters found.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalClusterInfo {
    pub detected: bool,
    pub cluster_type: ClusterType,
    pub kubeconfig_path: Option<String>,
    pub context_name: Option<String>,
    pub cluster_name: Option<String>,
    pub status: String,
}

impl LocalClusterInfo {
    pub fn not_detected() -> Self {
        Self {
            detected: false,
            cluster_type: ClusterType::None,
            kubeconfig_path: None,
            context_name: None,
            cluster_name: None,
            status: "not_found".to_string(),
        }
    }

    /// `kubeconfig_path` is set only when the probe targeted one file; matches
    /// found through kubectl's merged view leave it empty.
    fn running(
        cluster_type: ClusterType,
        kubeconfig_path: Option<String>,
        context_name: impl Into<String>,
        cluster_name: impl Into<String>,
    ) -> Self {
        Self {
            detected: true,
            cluster_type,
            kubeconfig_path,
            context_name: Some(context_name.into()),
            cluster_name: Some(cluster_name.into()),
            status: "running".to_string(),
        }
    }
}

/// Local probes, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalProbe {
    Minikube,
    Kind,
    K3s,
    DockerDesktop,
    Kubeconfig,
}

impl LocalProbe {
    pub const ORDER: [LocalProbe; 5] = [
        LocalProbe::Minikube,
        LocalProbe::Kind,
        LocalProbe::K3s,
        LocalProbe::DockerDesktop,
        LocalProbe::Kubeconfig,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            LocalProbe::Minikube => "minikube",
            LocalProbe::Kind => "kind",
            LocalProbe::K3s => "k3s",
            LocalProbe::DockerDesktop => "docker-desktop",
            LocalProbe::Kubeconfig => "kubeconfig",
        }
    }
}

/// Finds a cluster running on this machine.
///
/// Probes run strictly in [`LocalProbe::ORDER`]; the first match wins and
/// no probe failure stops the next one from running.
pub struct LocalClusterDetector {
    runner: Arc<dyn CommandRunner>,
    config: Arc<DetectorConfig>,
    logger: Arc<dyn Logger>,
}

impl LocalClusterDetector {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        config: Arc<DetectorConfig>,
        logger: Arc<dyn Logger>,
    ) -> Self {
        Self {
            runner,
            config,
            logger,
        }
    }

    pub async fn detect(&self) -> LocalClusterInfo {
        if !self.runner.is_available(&self.config.kubectl) {
            self.logger
                .log("kubectl not found on PATH, skipping local cluster detection");
            return LocalClusterInfo::not_detected();
        }

        for probe in LocalProbe::ORDER {
            match self.run_probe(probe).await {
                Ok(info) => {
                    self.logger.log(&format!(
                        "Detected local {} cluster (context: {})",
                        info.cluster_type,
                        info.context_name.as_deref().unwrap_or("-")
                    ));
                    return info;
                }
                Err(reason) => {
                    self.logger
                        .debug_log(&format!("{} probe: {}", probe.name(), reason));
                }
            }
        }

        LocalClusterInfo::not_detected()
    }

    pub async fn run_probe(&self, probe: LocalProbe) -> ProbeOutcome<LocalClusterInfo> {
        match probe {
            LocalProbe::Minikube => self.probe_minikube().await,
            LocalProbe::Kind => self.probe_kind().await,
            LocalProbe::K3s => self.probe_k3s().await,
            LocalProbe::DockerDesktop => self.probe_docker_desktop().await,
            LocalProbe::Kubeconfig => self.probe_kubeconfig_files().await,
        }
    }

    async fn probe_minikube(&self) -> ProbeOutcome<LocalClusterInfo> {
        let output = self
            .run("minikube", &["status"], self.config.timeouts.cluster_info())
            .await?;
        if !minikube_running(&output.stdout) {
            return Err(NotDetected::Precondition("minikube is not running".into()));
        }
        Ok(LocalClusterInfo::running(
            ClusterType::Minikube,
            None,
            "minikube",
            "minikube",
        ))
    }

    async fn probe_kind(&self) -> ProbeOutcome<LocalClusterInfo> {
        let output = self
            .run("kind", &["get", "clusters"], self.config.timeouts.list())
            .await?;
        let name = parse_kind_clusters(&output.stdout)
            .into_iter()
            .next()
            .ok_or(NotDetected::Empty)?;
        Ok(LocalClusterInfo::running(
            ClusterType::Kind,
            None,
            format!("kind-{}", name),
            name,
        ))
    }

    async fn probe_k3s(&self) -> ProbeOutcome<LocalClusterInfo> {
        let path = self.config.k3s_kubeconfig_path();
        if !path.is_file() {
            return Err(NotDetected::Precondition(format!(
                "{} does not exist",
                path.display()
            )));
        }
        self.cluster_info_with_kubeconfig(&path).await?;

        let (context, cluster) = names_from_kubeconfig(&path)
            .unwrap_or_else(|| ("default".to_string(), "default".to_string()));
        Ok(LocalClusterInfo::running(
            ClusterType::K3s,
            Some(path.to_string_lossy().into_owned()),
            context,
            cluster,
        ))
    }

    async fn probe_docker_desktop(&self) -> ProbeOutcome<LocalClusterInfo> {
        let contexts = self
            .run(
                &self.config.kubectl,
                &["config", "get-contexts", "-o", "name"],
                self.config.timeouts.availability(),
            )
            .await?;
        if !contexts
            .stdout
            .lines()
            .any(|line| line.trim() == DOCKER_DESKTOP_CONTEXT)
        {
            return Err(NotDetected::Precondition(
                "no docker-desktop context configured".into(),
            ));
        }

        self.run(
            &self.config.kubectl,
            &["--context", DOCKER_DESKTOP_CONTEXT, "cluster-info"],
            self.config.timeouts.cluster_info(),
        )
        .await?;

        Ok(LocalClusterInfo::running(
            ClusterType::DockerDesktop,
            None,
            DOCKER_DESKTOP_CONTEXT,
            DOCKER_DESKTOP_CONTEXT,
        ))
    }

    async fn probe_kubeconfig_files(&self) -> ProbeOutcome<LocalClusterInfo> {
        let mut last_reason = NotDetected::Precondition("no kubeconfig file found".into());

        for path in self.config.kubeconfig_paths() {
            if !path.is_file() {
                continue;
            }
            match self.cluster_info_with_kubeconfig(&path).await {
                Ok(_) => {
                    let (context, cluster) = names_from_kubeconfig(&path)
                        .unwrap_or_else(|| ("default".to_string(), "default".to_string()));
                    return Ok(LocalClusterInfo::running(
                        ClusterType::LocalGeneric,
                        Some(path.to_string_lossy().into_owned()),
                        context,
                        cluster,
                    ));
                }
                Err(reason) => {
                    self.logger.debug_log(&format!(
                        "kubeconfig {} unreachable: {}",
                        path.display(),
                        reason
                    ));
                    last_reason = reason;
                }
            }
        }

        Err(last_reason)
    }

    async fn cluster_info_with_kubeconfig(&self, path: &Path) -> ProbeOutcome<CommandOutput> {
        let path = path.to_string_lossy();
        self.run(
            &self.config.kubectl,
            &["--kubeconfig", path.as_ref(), "cluster-info"],
            self.config.timeouts.cluster_info(),
        )
        .await
    }

    async fn run(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> ProbeOutcome<CommandOutput> {
        Ok(self.runner.run(program, args, timeout).await?)
    }
}

pub fn minikube_running(status: &str) -> bool {
    status.contains("Running")
}

/// Cluster names from `kind get clusters`, in output order.
pub fn parse_kind_clusters(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && *line != NO_KIND_CLUSTERS)
        .map(String::from)
        .collect()
}

/// (context, cluster) of the file's current context.
fn names_from_kubeconfig(path: &Path) -> Option<(String, String)> {
    let config = KubeConfig::load(path).ok()?;
    let current = config.current()?;
    let cluster = if current.context.cluster.is_empty() {
        current.name.clone()
    } else {
        current.context.cluster.clone()
    };
    Some((current.name.clone(), cluster))
}
