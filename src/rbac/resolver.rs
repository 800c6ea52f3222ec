// src/rbac/resolver.rs
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

use super::capability::{permission, Capabilities};
use crate::config::DetectorConfig;
use crate::discovery::KubeConfig;
use crate::error::ExecError;
use crate::exec::{CommandOutput, CommandRunner};
use crate::types::{PermissionCheck, RbacInfo};
use crate::utils::logging::Logger;

const UNKNOWN_USER: &str = "unknown";
const CLUSTER_ROLE_PREFIX: &str = "cluster:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoleKind {
    Role,
    ClusterRole,
}

/// A role or cluster role referenced by a binding that matches the identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BoundRole {
    pub kind: RoleKind,
    pub name: String,
}

impl BoundRole {
    /// Bare name for namespace roles, `cluster:` prefix for cluster roles.
    pub fn display_name(&self) -> String {
        match self.kind {
            RoleKind::Role => self.name.clone(),
            RoleKind::ClusterRole => format!("{}{}", CLUSTER_ROLE_PREFIX, self.name),
        }
    }
}

#[derive(Debug, Deserialize)]
struct BindingList {
    #[serde(default)]
    items: Vec<Binding>,
}

#[derive(Debug, Deserialize)]
struct Binding {
    #[serde(rename = "roleRef")]
    role_ref: RoleRef,
    #[serde(default)]
    subjects: Vec<Subject>,
}

#[derive(Debug, Deserialize)]
struct RoleRef {
    kind: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct Subject {
    kind: String,
    name: String,
    #[serde(default)]
    namespace: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RoleDocument {
    #[serde(default)]
    rules: Vec<PolicyRule>,
}

#[derive(Debug, Deserialize)]
struct PolicyRule {
    #[serde(default)]
    verbs: Vec<String>,
    #[serde(default)]
    resources: Vec<String>,
}

/// Serializable summary for report and display collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamespacePermissions {
    pub namespace: String,
    pub user: String,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
    pub capabilities: Capabilities,
}

impl From<RbacInfo> for NamespacePermissions {
    fn from(info: RbacInfo) -> Self {
        let capabilities = info.capabilities();
        Self {
            namespace: info.namespace,
            user: info.user,
            roles: info.roles,
            permissions: info.permissions.into_iter().collect(),
            capabilities,
        }
    }
}

/// Resolves what the ambient kubectl identity may do.
///
/// Nothing is cached: bindings can change between calls, so every call
/// re-reads them. Each kubectl call is timed out and isolated; a role that
/// cannot be fetched contributes nothing instead of failing the whole
/// resolution.
pub struct RbacEnforcer {
    runner: Arc<dyn CommandRunner>,
    config: Arc<DetectorConfig>,
    logger: Arc<dyn Logger>,
}

impl RbacEnforcer {
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

    pub async fn check_user_permissions(&self, namespace: &str) -> RbacInfo {
        let Some(user) = self.current_user().await else {
            self.logger
                .log("Could not resolve the current kubectl user; no permissions assumed");
            return RbacInfo::empty(UNKNOWN_USER, namespace);
        };

        let roles = self.bound_roles(&user, namespace).await;
        let rule_sets = join_all(roles.iter().map(|role| self.role_permissions(role, namespace))).await;
        let permissions: BTreeSet<String> = rule_sets.into_iter().flatten().collect();

        self.logger.debug_log(&format!(
            "{} has {} role(s) and {} permission(s) in {}",
            user,
            roles.len(),
            permissions.len(),
            namespace
        ));

        RbacInfo::new(
            user,
            namespace,
            roles.iter().map(BoundRole::display_name).collect(),
            permissions,
        )
    }

    /// Ask the API server directly; the aggregated view only fills
    /// `user_permissions` for display.
    pub async fn check_resource_permission(
        &self,
        resource: &str,
        action: &str,
        namespace: &str,
    ) -> PermissionCheck {
        let can_i_args = ["auth", "can-i", action, resource, "-n", namespace];
        let can_i = self.kubectl(&can_i_args, self.config.timeouts.rbac());
        let (answer, aggregated) = tokio::join!(can_i, self.check_user_permissions(namespace));

        let (allowed, reason) = match answer {
            Ok(output) if is_yes(&output.stdout) => (
                true,
                format!("Allowed to {} {} in namespace {}", action, resource, namespace),
            ),
            Ok(output) => (
                false,
                format!(
                    "Unexpected answer from kubectl auth can-i: {}",
                    output.stdout.trim()
                ),
            ),
            Err(ExecError::Failed { stdout, .. }) if is_no(&stdout) => (
                false,
                format!(
                    "User {} is not allowed to {} {} in namespace {}",
                    aggregated.user, action, resource, namespace
                ),
            ),
            Err(err) => (false, format!("Permission check failed: {}", err)),
        };

        if !allowed {
            self.logger.log(&reason);
        }

        PermissionCheck {
            allowed,
            reason,
            required_permissions: vec![permission(action, resource)],
            user_permissions: aggregated.permissions.into_iter().collect(),
        }
    }

    pub async fn get_namespace_permissions(&self, namespace: &str) -> NamespacePermissions {
        self.check_user_permissions(namespace).await.into()
    }

    /// User of the active context, from kubectl or, failing that, the
    /// default kubeconfig file.
    pub async fn current_user(&self) -> Option<String> {
        let from_kubectl = self
            .kubectl(
                &[
                    "config",
                    "view",
                    "--minify",
                    "-o",
                    "jsonpath={.contexts[0].context.user}",
                ],
                self.config.timeouts.availability(),
            )
            .await;

        match from_kubectl {
            Ok(output) if !output.stdout.trim().is_empty() => {
                return Some(output.stdout.trim().to_string())
            }
            Ok(_) => {}
            Err(err) => self
                .logger
                .debug_log(&format!("kubectl config view failed: {}", err)),
        }

        let path = self.config.default_kubeconfig()?;
        let kubeconfig = KubeConfig::load(&path).ok()?;
        kubeconfig.current_user().map(String::from)
    }

    /// Roles bound to `user` in `namespace`, namespace bindings first,
    /// deduplicated in first-seen order.
    pub async fn bound_roles(&self, user: &str, namespace: &str) -> Vec<BoundRole> {
        let timeout = self.config.timeouts.rbac();
        let rb_args = ["get", "rolebindings", "-n", namespace, "-o", "json"];
        let crb_args = ["get", "clusterrolebindings", "-o", "json"];
        let (role_bindings, cluster_bindings) = tokio::join!(
            self.kubectl(&rb_args, timeout),
            self.kubectl(&crb_args, timeout),
        );

        let mut roles: Vec<BoundRole> = Vec::new();
        for (label, result) in [
            ("rolebindings", role_bindings),
            ("clusterrolebindings", cluster_bindings),
        ] {
            let bindings = match result
                .map_err(|e| e.to_string())
                .and_then(|out| parse_bindings(&out.stdout).map_err(|e| e.to_string()))
            {
                Ok(bindings) => bindings,
                Err(err) => {
                    self.logger
                        .log(&format!("Could not list {}: {}", label, err));
                    continue;
                }
            };

            for binding in bindings {
                if !binding
                    .subjects
                    .iter()
                    .any(|s| subject_matches(s, user, namespace))
                {
                    continue;
                }
                let kind = if binding.role_ref.kind == "ClusterRole" {
                    RoleKind::ClusterRole
                } else {
                    RoleKind::Role
                };
                let role = BoundRole {
                    kind,
                    name: binding.role_ref.name,
                };
                if !roles.contains(&role) {
                    roles.push(role);
                }
            }
        }

        roles
    }

    async fn role_permissions(&self, role: &BoundRole, namespace: &str) -> BTreeSet<String> {
        let timeout = self.config.timeouts.rbac();
        let result = match role.kind {
            RoleKind::Role => {
                self.kubectl(&["get", "role", &role.name, "-n", namespace, "-o", "json"], timeout)
                    .await
            }
            RoleKind::ClusterRole => {
                self.kubectl(&["get", "clusterrole", &role.name, "-o", "json"], timeout)
                    .await
            }
        };

        match result
            .map_err(|e| e.to_string())
            .and_then(|out| parse_role_permissions(&out.stdout).map_err(|e| e.to_string()))
        {
            Ok(permissions) => permissions,
            Err(err) => {
                self.logger.log(&format!(
                    "Could not resolve role {}: {}",
                    role.display_name(),
                    err
                ));
                BTreeSet::new()
            }
        }
    }

    async fn kubectl(
        &self,
        args: &[&str],
        timeout: std::time::Duration,
    ) -> Result<CommandOutput, ExecError> {
        self.runner.run(&self.config.kubectl, args, timeout).await
    }
}

fn parse_bindings(stdout: &str) -> serde_json::Result<Vec<Binding>> {
    let list: BindingList = serde_json::from_str(stdout)?;
    Ok(list.items)
}

/// Flatten a Role/ClusterRole document into "verb resource" pairs.
pub fn parse_role_permissions(stdout: &str) -> serde_json::Result<BTreeSet<String>> {
    let role: RoleDocument = serde_json::from_str(stdout)?;
    Ok(role
        .rules
        .iter()
        .flat_map(|rule| {
            rule.resources
                .iter()
                .flat_map(move |resource| rule.verbs.iter().map(move |verb| permission(verb, resource)))
        })
        .collect())
}

fn subject_matches(subject: &Subject, user: &str, namespace: &str) -> bool {
    match subject.kind.as_str() {
        "User" | "Group" => subject.name == user,
        "ServiceAccount" => {
            let sa_namespace = subject.namespace.as_deref().unwrap_or(namespace);
            subject.name == user
                || format!("system:serviceaccount:{}:{}", sa_namespace, subject.name) == user
        }
        _ => false,
    }
}

fn is_yes(stdout: &str) -> bool {
    stdout.trim().eq_ignore_ascii_case("yes")
}

fn is_no(stdout: &str) -> bool {
    stdout
        .trim()
        .split_whitespace()
        .next()
        .is_some_and(|word| word.eq_ignore_ascii_case("no"))
}
