// types.rs
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::rbac::capability::Capabilities;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClusterType {
    None,
    Minikube,
    Kind,
    K3s,
    DockerDesktop,
    LocalGeneric,
    Eks,
    Gke,
    Aks,
    Doks,
    Lke,
    Unknown,
}

impl ClusterType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClusterType::None => "none",
            ClusterType::Minikube => "minikube",
            ClusterType::Kind => "kind",
            ClusterType::K3s => "k3s",
            ClusterType::DockerDesktop => "docker-desktop",
            ClusterType::LocalGeneric => "local-generic",
            ClusterType::Eks => "eks",
            ClusterType::Gke => "gke",
            ClusterType::Aks => "aks",
            ClusterType::Doks => "doks",
            ClusterType::Lke => "lke",
            ClusterType::Unknown => "unknown",
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(
            self,
            ClusterType::Minikube
                | ClusterType::Kind
                | ClusterType::K3s
                | ClusterType::DockerDesktop
                | ClusterType::LocalGeneric
        )
    }

    pub fn is_cloud(&self) -> bool {
        matches!(
            self,
            ClusterType::Eks | ClusterType::Gke | ClusterType::Aks | ClusterType::Doks | ClusterType::Lke
        )
    }
}

impl fmt::Display for ClusterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloudProvider {
    Aws,
    Gcp,
    Azure,
    #[serde(rename = "digitalocean")]
    DigitalOcean,
    Linode,
}

impl CloudProvider {
    /// Probe order used when no configuration overrides it.
    pub const PRIORITY: [CloudProvider; 5] = [
        CloudProvider::Aws,
        CloudProvider::Gcp,
        CloudProvider::Azure,
        CloudProvider::DigitalOcean,
        CloudProvider::Linode,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CloudProvider::Aws => "aws",
            CloudProvider::Gcp => "gcp",
            CloudProvider::Azure => "azure",
            CloudProvider::DigitalOcean => "digitalocean",
            CloudProvider::Linode => "linode",
        }
    }

    /// The provider's own CLI executable.
    pub fn cli(&self) -> &'static str {
        match self {
            CloudProvider::Aws => "aws",
            CloudProvider::Gcp => "gcloud",
            CloudProvider::Azure => "az",
            CloudProvider::DigitalOcean => "doctl",
            CloudProvider::Linode => "linode-cli",
        }
    }

    pub fn cluster_type(&self) -> ClusterType {
        match self {
            CloudProvider::Aws => ClusterType::Eks,
            CloudProvider::Gcp => ClusterType::Gke,
            CloudProvider::Azure => ClusterType::Aks,
            CloudProvider::DigitalOcean => ClusterType::Doks,
            CloudProvider::Linode => ClusterType::Lke,
        }
    }
}

impl fmt::Display for CloudProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider-specific locality, normalized to exactly one concept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Locality {
    Region(String),
    ProjectId(String),
    ResourceGroup(String),
}

/// Terminal state of one detection pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DetectionState {
    LocalMatched,
    CloudMatched,
    Unmatched,
}

/// Snapshot of "where are we", rebuilt on every detection call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentInfo {
    pub is_local_cluster: bool,
    pub cluster_type: ClusterType,
    pub cloud_provider: Option<CloudProvider>,
    pub kubeconfig_path: Option<String>,
    pub context_name: Option<String>,
    pub cluster_name: Option<String>,
    pub region: Option<String>,
    pub project_id: Option<String>,
    pub resource_group: Option<String>,
    pub auth_required: bool,
    pub requires_setup: bool,
}

impl EnvironmentInfo {
    /// Nothing was detected; the operator has to set something up.
    pub fn unmatched() -> Self {
        Self {
            is_local_cluster: false,
            cluster_type: ClusterType::None,
            cloud_provider: None,
            kubeconfig_path: None,
            context_name: None,
            cluster_name: None,
            region: None,
            project_id: None,
            resource_group: None,
            auth_required: true,
            requires_setup: true,
        }
    }

    pub fn state(&self) -> DetectionState {
        if self.is_local_cluster {
            DetectionState::LocalMatched
        } else if self.cloud_provider.is_some() {
            DetectionState::CloudMatched
        } else {
            DetectionState::Unmatched
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    LocalK8s,
    CloudK8s,
    UpidSaas,
    Unknown,
}

/// Outcome of one authentication attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthResult {
    pub success: bool,
    pub environment_info: EnvironmentInfo,
    pub auth_method: AuthMethod,
    pub error_message: Option<String>,
    pub requires_action: bool,
}

impl AuthResult {
    pub fn succeeded(environment_info: EnvironmentInfo, auth_method: AuthMethod) -> Self {
        Self {
            success: true,
            environment_info,
            auth_method,
            error_message: None,
            requires_action: false,
        }
    }

    pub fn needs_action(
        environment_info: EnvironmentInfo,
        auth_method: AuthMethod,
        message: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            environment_info,
            auth_method,
            error_message: Some(message.into()),
            requires_action: true,
        }
    }
}

/// Effective permissions of one identity in one namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RbacInfo {
    pub user: String,
    pub namespace: String,
    pub roles: Vec<String>,
    pub permissions: BTreeSet<String>,
    pub can_read: bool,
    pub can_write: bool,
    pub can_delete: bool,
    pub can_exec: bool,
}

impl RbacInfo {
    pub fn new(
        user: impl Into<String>,
        namespace: impl Into<String>,
        roles: Vec<String>,
        permissions: BTreeSet<String>,
    ) -> Self {
        let caps = Capabilities::from_permissions(&permissions);
        Self {
            user: user.into(),
            namespace: namespace.into(),
            roles,
            permissions,
            can_read: caps.read,
            can_write: caps.write,
            can_delete: caps.delete,
            can_exec: caps.exec,
        }
    }

    /// Degraded result used when the identity or RBAC API cannot be resolved.
    pub fn empty(user: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self::new(user, namespace, Vec::new(), BTreeSet::new())
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            read: self.can_read,
            write: self.can_write,
            delete: self.can_delete,
            exec: self.can_exec,
        }
    }
}

/// Server-authoritative answer to "can I do X to Y".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionCheck {
    pub allowed: bool,
    pub reason: String,
    pub required_permissions: Vec<String>,
    pub user_permissions: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cluster_type_serializes_kebab_case() {
        let json = serde_json::to_string(&ClusterType::DockerDesktop).unwrap();
        assert_eq!(json, "\"docker-desktop\"");
        assert_eq!(ClusterType::LocalGeneric.to_string(), "local-generic");
    }

    #[test]
    fn local_and_cloud_types_are_disjoint() {
        for provider in CloudProvider::PRIORITY {
            let ty = provider.cluster_type();
            assert!(ty.is_cloud());
            assert!(!ty.is_local());
        }
        assert!(!ClusterType::None.is_local());
        assert!(!ClusterType::None.is_cloud());
    }

    #[test]
    fn provider_serializes_lowercase() {
        let json = serde_json::to_string(&CloudProvider::DigitalOcean).unwrap();
        assert_eq!(json, "\"digitalocean\"");
    }

    #[test]
    fn unmatched_environment_requires_setup() {
        let env = EnvironmentInfo::unmatched();
        assert_eq!(env.state(), DetectionState::Unmatched);
        assert!(env.requires_setup);
        assert!(env.auth_required);
        assert!(env.cloud_provider.is_none());
    }

    #[test]
    fn successful_auth_has_no_error() {
        let result = AuthResult::succeeded(EnvironmentInfo::unmatched(), AuthMethod::LocalK8s);
        assert!(result.success);
        assert!(result.error_message.is_none());
        assert!(!result.requires_action);
    }

    #[test]
    fn empty_rbac_has_no_capabilities() {
        let info = RbacInfo::empty("alice", "default");
        assert!(info.roles.is_empty());
        assert!(info.permissions.is_empty());
        assert!(!info.can_read && !info.can_write && !info.can_delete && !info.can_exec);
    }
}
