// src/auth/dispatcher.rs
use std::sync::Arc;

use crate::config::DetectorConfig;
use crate::error::ExecError;
use crate::exec::{CommandOutput, CommandRunner};
use crate::types::{AuthMethod, AuthResult, CloudProvider, EnvironmentInfo};
use crate::utils::logging::Logger;

pub const REMOTE_AUTH_REQUIRED: &str =
    "No Kubernetes cluster detected; remote authentication required";

/// Exactly one strategy runs per authentication call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStrategy {
    Local,
    Cloud,
    Remote,
}

impl AuthStrategy {
    pub fn select(env: &EnvironmentInfo) -> Self {
        if env.is_local_cluster {
            AuthStrategy::Local
        } else if env.cloud_provider.is_some() {
            AuthStrategy::Cloud
        } else {
            AuthStrategy::Remote
        }
    }

    pub fn auth_method(&self) -> AuthMethod {
        match self {
            AuthStrategy::Local => AuthMethod::LocalK8s,
            AuthStrategy::Cloud => AuthMethod::CloudK8s,
            AuthStrategy::Remote => AuthMethod::UpidSaas,
        }
    }
}

pub struct AuthDispatcher {
    runner: Arc<dyn CommandRunner>,
    config: Arc<DetectorConfig>,
    logger: Arc<dyn Logger>,
}

impl AuthDispatcher {
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

    pub async fn authenticate(&self, env: &EnvironmentInfo) -> AuthResult {
        let strategy = AuthStrategy::select(env);
        self.logger
            .debug_log(&format!("Authenticating with {:?} strategy", strategy));

        let result = match strategy {
            AuthStrategy::Remote => {
                AuthResult::needs_action(env.clone(), strategy.auth_method(), REMOTE_AUTH_REQUIRED)
            }
            AuthStrategy::Local | AuthStrategy::Cloud => match self.cluster_info(env).await {
                Ok(_) => AuthResult::succeeded(env.clone(), strategy.auth_method()),
                Err(err) => AuthResult::needs_action(
                    env.clone(),
                    strategy.auth_method(),
                    connectivity_message(env, &err),
                ),
            },
        };

        match &result.error_message {
            Some(message) => self.logger.log(message),
            None => self.logger.log(&format!(
                "Authenticated against {} cluster {}",
                env.cluster_type,
                env.cluster_name.as_deref().unwrap_or("-")
            )),
        }
        result
    }

    /// One `kubectl cluster-info` against the detected kubeconfig and context.
    pub async fn cluster_info(&self, env: &EnvironmentInfo) -> Result<CommandOutput, ExecError> {
        let args = cluster_info_args(env);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.runner
            .run(&self.config.kubectl, &args, self.config.timeouts.cluster_info())
            .await
    }
}

pub fn cluster_info_args(env: &EnvironmentInfo) -> Vec<String> {
    let mut args = Vec::new();
    if let Some(path) = &env.kubeconfig_path {
        args.push("--kubeconfig".to_string());
        args.push(path.clone());
    }
    if let Some(context) = &env.context_name {
        args.push("--context".to_string());
        args.push(context.clone());
    }
    args.push("cluster-info".to_string());
    args
}

fn connectivity_message(env: &EnvironmentInfo, err: &ExecError) -> String {
    let cluster = env.cluster_name.as_deref().unwrap_or("unknown");
    match (err, env.cloud_provider) {
        (ExecError::NotFound { program }, _) => {
            format!("{} is not installed; install it and retry", program)
        }
        (_, Some(provider)) => format!(
            "Cannot reach {} cluster {}: {}. Fetch credentials with `{}` and retry",
            provider,
            cluster,
            err,
            credentials_hint(provider, env)
        ),
        (_, None) => format!(
            "Cannot reach local {} cluster {}: {}. Make sure it is running",
            env.cluster_type, cluster, err
        ),
    }
}

fn credentials_hint(provider: CloudProvider, env: &EnvironmentInfo) -> String {
    let name = env.cluster_name.as_deref().unwrap_or("<cluster>");
    match provider {
        CloudProvider::Aws => format!(
            "aws eks update-kubeconfig --name {} --region {}",
            name,
            env.region.as_deref().unwrap_or("<region>")
        ),
        CloudProvider::Gcp => format!(
            "gcloud container clusters get-credentials {} --project {}",
            name,
            env.project_id.as_deref().unwrap_or("<project>")
        ),
        CloudProvider::Azure => format!(
            "az aks get-credentials --name {} --resource-group {}",
            name,
            env.resource_group.as_deref().unwrap_or("<resource-group>")
        ),
        CloudProvider::DigitalOcean => format!("doctl kubernetes cluster kubeconfig save {}", name),
        CloudProvider::Linode => "linode-cli lke kubeconfig-view <cluster-id>".to_string(),
    }
}
