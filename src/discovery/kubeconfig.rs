// src/discovery/kubeconfig.rs
use serde::Deserialize;
use std::{fs, path::Path};

use crate::Result;

/// The subset of a kubeconfig file the detectors read.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KubeConfig {
    #[serde(default)]
    pub clusters: Vec<NamedCluster>,
    #[serde(default)]
    pub users: Vec<NamedUser>,
    #[serde(default)]
    pub contexts: Vec<NamedContext>,
    #[serde(rename = "current-context", default)]
    pub current_context: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NamedCluster {
    pub name: String,
    #[serde(default)]
    pub cluster: ClusterEntry,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClusterEntry {
    pub server: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NamedUser {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NamedContext {
    pub name: String,
    #[serde(default)]
    pub context: ContextEntry,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContextEntry {
    #[serde(default)]
    pub cluster: String,
    #[serde(default)]
    pub user: String,
    pub namespace: Option<String>,
}

impl KubeConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// The active context, if `current-context` names one that exists.
    pub fn current(&self) -> Option<&NamedContext> {
        let name = self.current_context.as_deref().filter(|n| !n.is_empty())?;
        self.contexts.iter().find(|c| c.name == name)
    }

    pub fn current_user(&self) -> Option<&str> {
        self.current()
            .map(|c| c.context.user.as_str())
            .filter(|u| !u.is_empty())
    }

    pub fn server_for(&self, cluster: &str) -> Option<&str> {
        self.clusters
            .iter()
            .find(|c| c.name == cluster)
            .and_then(|c| c.cluster.server.as_deref())
    }
}
