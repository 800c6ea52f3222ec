// config/types.rs
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, path::PathBuf, time::Duration};

use crate::types::CloudProvider;
use crate::{Error, Result};

pub const KUBECONFIG_ENV: &str = "KUBECONFIG";

/// Per-call-class timeouts, in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Cheap local queries: `config get-contexts`, `configure get region`, ...
    pub availability_secs: u64,
    pub cluster_info_secs: u64,
    pub list_secs: u64,
    pub describe_secs: u64,
    pub rbac_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            availability_secs: 5,
            cluster_info_secs: 10,
            list_secs: 15,
            describe_secs: 15,
            rbac_secs: 10,
        }
    }
}

impl TimeoutConfig {
    pub fn availability(&self) -> Duration {
        Duration::from_secs(self.availability_secs)
    }

    pub fn cluster_info(&self) -> Duration {
        Duration::from_secs(self.cluster_info_secs)
    }

    pub fn list(&self) -> Duration {
        Duration::from_secs(self.list_secs)
    }

    pub fn describe(&self) -> Duration {
        Duration::from_secs(self.describe_secs)
    }

    pub fn rbac(&self) -> Duration {
        Duration::from_secs(self.rbac_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub kubectl: String,
    pub timeouts: TimeoutConfig,
    /// Kubeconfig locations scanned by the generic probe. Tilde and glob
    /// patterns are expanded.
    pub kubeconfig_candidates: Vec<String>,
    pub k3s_kubeconfig: String,
    /// Cloud providers to probe, highest priority first.
    pub cloud_providers: Vec<CloudProvider>,
    /// Value of `KUBECONFIG` as seen by the caller. Not read from the
    /// process environment by the library; see [`DetectorConfig::with_kubeconfig_env`].
    #[serde(skip)]
    pub kubeconfig_env: Option<String>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            kubectl: "kubectl".to_string(),
            timeouts: TimeoutConfig::default(),
            kubeconfig_candidates: vec![
                "~/.kube/config".to_string(),
                "~/.minikube/profiles/*/kubeconfig".to_string(),
                "/etc/rancher/k3s/k3s.yaml".to_string(),
            ],
            k3s_kubeconfig: "/etc/rancher/k3s/k3s.yaml".to_string(),
            cloud_providers: CloudProvider::PRIORITY.to_vec(),
            kubeconfig_env: None,
        }
    }
}

impl DetectorConfig {
    /// `<config dir>/clusterprobe/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("clusterprobe").join("config.json"))
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let config_str = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&config_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if given, else from the default location if it
    /// exists, else fall back to defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_file(path),
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::load_from_file(path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn with_kubeconfig_env(mut self, value: Option<String>) -> Self {
        self.kubeconfig_env = value.filter(|v| !v.trim().is_empty());
        self
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let config_str = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, config_str)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.kubectl.trim().is_empty() {
            return Err(Error::config("kubectl binary name is empty"));
        }
        let t = &self.timeouts;
        if [
            t.availability_secs,
            t.cluster_info_secs,
            t.list_secs,
            t.describe_secs,
            t.rbac_secs,
        ]
        .contains(&0)
        {
            return Err(Error::config("timeouts must be at least one second"));
        }
        if self.kubeconfig_candidates.is_empty() {
            return Err(Error::config("at least one kubeconfig candidate is required"));
        }
        Ok(())
    }

    /// The kubeconfig kubectl uses by default: first `KUBECONFIG` entry, else
    /// the first configured candidate.
    pub fn default_kubeconfig(&self) -> Option<PathBuf> {
        self.default_kubeconfig_with(self.kubeconfig_env.as_deref())
    }

    pub fn default_kubeconfig_with(&self, kubeconfig_env: Option<&str>) -> Option<PathBuf> {
        kubeconfig_env
            .and_then(|value| std::env::split_paths(value).find(|p| !p.as_os_str().is_empty()))
            .or_else(|| self.kubeconfig_candidates.first().map(|c| expand_path(c)))
    }

    /// Ordered, deduplicated kubeconfig paths to scan.
    pub fn kubeconfig_paths(&self) -> Vec<PathBuf> {
        self.kubeconfig_paths_with(self.kubeconfig_env.as_deref())
    }

    pub fn kubeconfig_paths_with(&self, kubeconfig_env: Option<&str>) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = Vec::new();

        if let Some(value) = kubeconfig_env {
            paths.extend(std::env::split_paths(value).filter(|p| !p.as_os_str().is_empty()));
        }

        for candidate in &self.kubeconfig_candidates {
            let expanded = shellexpand::tilde(candidate).to_string();
            if expanded.contains(['*', '?', '[']) {
                if let Ok(entries) = glob::glob(&expanded) {
                    paths.extend(entries.filter_map(|entry| entry.ok()));
                }
            } else {
                paths.push(PathBuf::from(expanded));
            }
        }

        let mut seen = std::collections::HashSet::new();
        paths.retain(|p| seen.insert(p.clone()));
        paths
    }

    pub fn k3s_kubeconfig_path(&self) -> PathBuf {
        expand_path(&self.k3s_kubeconfig)
    }
}

pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).to_string())
}
