// src/app/manager.rs
use crate::auth::AuthDispatcher;
use crate::config::DetectorConfig;
use crate::discovery::{EnvironmentDetector, KubeConfig};
use crate::exec::{CommandRunner, SystemRunner};
use crate::rbac::RbacEnforcer;
use crate::types::{AuthResult, EnvironmentInfo};
use crate::utils::logging::{Logger, TracingLogger};

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
    NotConfigured,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClusterSummary {
    pub environment: EnvironmentInfo,
    pub control_plane: Option<String>,
    pub error: Option<String>,
    pub checked_at: String,
}

/// Read-only status for display collaborators.
#[derive(Debug, Clone, Serialize)]
pub struct ClusterInfo {
    pub connection_status: ConnectionStatus,
    pub cluster_info: ClusterSummary,
}

/// Entry point for callers: detect, authenticate, authorize.
///
/// Holds no state between calls beyond its collaborators; every operation
/// re-probes the machine.
pub struct EnvironmentManager {
    pub config: Arc<DetectorConfig>,
    detector: EnvironmentDetector,
    dispatcher: AuthDispatcher,
    rbac: RbacEnforcer,
    logger: Arc<dyn Logger>,
}

impl EnvironmentManager {
    pub fn new(
        config: DetectorConfig,
        runner: Arc<dyn CommandRunner>,
        logger: Arc<dyn Logger>,
    ) -> Self {
        let config = Arc::new(config);
        Self {
            detector: EnvironmentDetector::new(runner.clone(), config.clone(), logger.clone()),
            dispatcher: AuthDispatcher::new(runner.clone(), config.clone(), logger.clone()),
            rbac: RbacEnforcer::new(runner, config.clone(), logger.clone()),
            config,
            logger,
        }
    }

    /// Real processes, diagnostics through `tracing`.
    pub fn with_defaults(config: DetectorConfig) -> Self {
        Self::new(config, Arc::new(SystemRunner::new()), Arc::new(TracingLogger))
    }

    pub async fn detect_environment(&self) -> EnvironmentInfo {
        self.detector.detect().await
    }

    /// Authenticate against `env`, detecting it first when not given.
    pub async fn authenticate_user(&self, env: Option<&EnvironmentInfo>) -> AuthResult {
        match env {
            Some(env) => self.dispatcher.authenticate(env).await,
            None => {
                let env = self.detect_environment().await;
                self.dispatcher.authenticate(&env).await
            }
        }
    }

    pub async fn get_cluster_info(&self) -> ClusterInfo {
        let environment = self.detect_environment().await;
        let checked_at = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);

        if environment.requires_setup {
            return ClusterInfo {
                connection_status: ConnectionStatus::NotConfigured,
                cluster_info: ClusterSummary {
                    environment,
                    control_plane: None,
                    error: None,
                    checked_at,
                },
            };
        }

        let (connection_status, control_plane, error) =
            match self.dispatcher.cluster_info(&environment).await {
                Ok(output) => (
                    ConnectionStatus::Connected,
                    parse_control_plane(&output.stdout)
                        .or_else(|| self.control_plane_from_kubeconfig(&environment)),
                    None,
                ),
                Err(err) => {
                    self.logger
                        .log(&format!("Cluster is not reachable: {}", err));
                    (ConnectionStatus::Disconnected, None, Some(err.to_string()))
                }
            };

        ClusterInfo {
            connection_status,
            cluster_info: ClusterSummary {
                environment,
                control_plane,
                error,
                checked_at,
            },
        }
    }

    pub fn rbac(&self) -> &RbacEnforcer {
        &self.rbac
    }

    /// API server of the detected context, read from the kubeconfig file.
    fn control_plane_from_kubeconfig(&self, env: &EnvironmentInfo) -> Option<String> {
        let path = env
            .kubeconfig_path
            .as_ref()
            .map(std::path::PathBuf::from)
            .or_else(|| self.config.default_kubeconfig())?;
        let kubeconfig = KubeConfig::load(path).ok()?;
        let context = match env.context_name.as_deref() {
            Some(name) => kubeconfig.contexts.iter().find(|c| c.name == name)?,
            None => kubeconfig.current()?,
        };
        kubeconfig
            .server_for(&context.context.cluster)
            .map(String::from)
    }
}

/// Control-plane URL from the first line of `kubectl cluster-info`.
pub fn parse_control_plane(stdout: &str) -> Option<String> {
    let first = strip_ansi(stdout.lines().find(|l| !l.trim().is_empty())?);
    first
        .split_whitespace()
        .find(|word| word.starts_with("https://") || word.starts_with("http://"))
        .map(|url| url.trim_end_matches('.').to_string())
}

// kubectl colours cluster-info output when it thinks it has a terminal.
// Only CSI sequences (ESC '[' params, ending in a letter) such as SGR colour
// codes are expected; other escape forms are not handled.
fn strip_ansi(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        if c == '\u{1b}' {
            for c in chars.by_ref() {
                if c.is_ascii_alphabetic() {
                    break;
                }
            }
        } else {
            out.push(c);
        }
    }
    out
}
