// src/app/run.rs
use clap::Subcommand;
use serde_json::Value;

use super::EnvironmentManager;
use crate::Result;

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Detect the cluster this machine is pointed at
    Detect,
    /// Detect, then verify the cluster can be reached
    Auth,
    /// Connection status and control-plane endpoint
    Info,
    /// Roles, permissions and capabilities of the current identity
    Rbac {
        #[arg(short, long, default_value = "default")]
        namespace: String,
    },
    /// Ask the API server whether an action is allowed
    CanI {
        action: String,
        resource: String,
        #[arg(short, long, default_value = "default")]
        namespace: String,
    },
    /// Sorted permission summary for a namespace
    Permissions {
        #[arg(short, long, default_value = "default")]
        namespace: String,
    },
}

pub async fn run_command(manager: &EnvironmentManager, command: Command) -> Result<Value> {
    let value = match command {
        Command::Detect => serde_json::to_value(manager.detect_environment().await)?,
        Command::Auth => serde_json::to_value(manager.authenticate_user(None).await)?,
        Command::Info => serde_json::to_value(manager.get_cluster_info().await)?,
        Command::Rbac { namespace } => {
            serde_json::to_value(manager.rbac().check_user_permissions(&namespace).await)?
        }
        Command::CanI {
            action,
            resource,
            namespace,
        } => serde_json::to_value(
            manager
                .rbac()
                .check_resource_permission(&resource, &action, &namespace)
                .await,
        )?,
        Command::Permissions { namespace } => {
            serde_json::to_value(manager.rbac().get_namespace_permissions(&namespace).await)?
        }
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DetectorConfig;
    use crate::exec::ScriptedRunner;
    use crate::utils::logging::MemoryLogger;
    use std::sync::Arc;

    fn manager(runner: ScriptedRunner, dir: &std::path::Path) -> EnvironmentManager {
        let config = DetectorConfig {
            kubeconfig_candidates: vec![dir.join("config").to_string_lossy().into_owned()],
            k3s_kubeconfig: dir.join("k3s.yaml").to_string_lossy().into_owned(),
            ..DetectorConfig::default()
        };
        EnvironmentManager::new(config, Arc::new(runner), Arc::new(MemoryLogger::new()))
    }

    #[tokio::test]
    async fn detect_prints_environment() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(ScriptedRunner::new(), dir.path());

        let value = run_command(&manager, Command::Detect).await.unwrap();

        assert_eq!(value["cluster_type"], "none");
        assert_eq!(value["requires_setup"], true);
        assert!(value["cloud_provider"].is_null());
    }

    #[tokio::test]
    async fn can_i_prints_check() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new()
            .with_tool("kubectl")
            .respond(
                "kubectl config view --minify -o jsonpath={.contexts[0].context.user}",
                "alice",
            )
            .respond("kubectl get rolebindings -n apps -o json", r#"{"items": []}"#)
            .respond("kubectl get clusterrolebindings -o json", r#"{"items": []}"#)
            .respond("kubectl auth can-i create deployments -n apps", "yes\n");
        let manager = manager(runner, dir.path());

        let value = run_command(
            &manager,
            Command::CanI {
                action: "create".into(),
                resource: "deployments".into(),
                namespace: "apps".into(),
            },
        )
        .await
        .unwrap();

        assert_eq!(value["allowed"], true);
        assert_eq!(value["required_permissions"][0], "create deployments");
    }
}
