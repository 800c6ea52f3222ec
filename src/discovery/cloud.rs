// src/discovery/cloud.rs
use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::DetectorConfig;
use crate::error::{NotDetected, ProbeOutcome};
use crate::exec::{CommandOutput, CommandRunner};
use crate::types::{CloudProvider, ClusterType, Locality};
use crate::utils::logging::Logger;

/// A managed cluster reported by one provider, normalized at the probe
/// boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterMatch {
    pub provider: CloudProvider,
    pub name: String,
    pub locality: Option<Locality>,
    pub context_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CloudClusterInfo {
    pub detected: bool,
    pub cluster_type: ClusterType,
    pub provider: Option<CloudProvider>,
    pub kubeconfig_path: Option<String>,
    pub context_name: Option<String>,
    pub cluster_name: Option<String>,
    pub region: Option<String>,
    pub project_id: Option<String>,
    pub resource_group: Option<String>,
    pub auth_required: bool,
    pub status: String,
}

impl CloudClusterInfo {
    pub fn not_detected() -> Self {
        Self {
            detected: false,
            cluster_type: ClusterType::None,
            provider: None,
            kubeconfig_path: None,
            context_name: None,
            cluster_name: None,
            region: None,
            project_id: None,
            resource_group: None,
            auth_required: true,
            status: "not_found".to_string(),
        }
    }

    /// Cloud contexts live in kubectl's merged view, so no single kubeconfig
    /// file is recorded.
    pub fn from_match(found: ClusterMatch) -> Self {
        let (region, project_id, resource_group) = match found.locality {
            Some(Locality::Region(r)) => (Some(r), None, None),
            Some(Locality::ProjectId(p)) => (None, Some(p), None),
            Some(Locality::ResourceGroup(g)) => (None, None, Some(g)),
            None => (None, None, None),
        };
        Self {
            detected: true,
            cluster_type: found.provider.cluster_type(),
            provider: Some(found.provider),
            kubeconfig_path: None,
            context_name: found.context_name,
            cluster_name: Some(found.name),
            region,
            project_id,
            resource_group,
            auth_required: true,
            status: "available".to_string(),
        }
    }
}

/// Finds a cloud-managed cluster through the providers' own CLIs.
///
/// All enabled providers are probed concurrently. The winner is the
/// highest-priority provider that matched, decided as soon as every
/// higher-priority probe has come back negative; the remaining in-flight
/// probes are dropped at that point, which kills their child processes.
pub struct CloudClusterDetector {
    runner: Arc<dyn CommandRunner>,
    config: Arc<DetectorConfig>,
    logger: Arc<dyn Logger>,
}

impl CloudClusterDetector {
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

    pub async fn detect(&self) -> CloudClusterInfo {
        match self.first_match(&self.config.cloud_providers).await {
            Some(found) => {
                self.logger.log(&format!(
                    "Detected {} cluster '{}' via {}",
                    found.provider.cluster_type(),
                    found.name,
                    found.provider.cli()
                ));
                CloudClusterInfo::from_match(found)
            }
            None => CloudClusterInfo::not_detected(),
        }
    }

    async fn first_match(&self, providers: &[CloudProvider]) -> Option<ClusterMatch> {
        let mut slots: Vec<Option<ProbeOutcome<ClusterMatch>>> = vec![None; providers.len()];
        let mut pending: FuturesUnordered<_> = providers
            .iter()
            .enumerate()
            .map(|(index, provider)| {
                let provider = *provider;
                async move { (index, provider, self.probe(provider).await) }
            })
            .collect();

        while let Some((index, provider, outcome)) = pending.next().await {
            if let Err(reason) = &outcome {
                self.logger
                    .debug_log(&format!("{} probe: {}", provider, reason));
            }
            slots[index] = Some(outcome);

            if let Some(winner) = settled_winner(&slots) {
                if !pending.is_empty() {
                    self.logger.debug_log(&format!(
                        "cancelling {} lower-priority cloud probe(s)",
                        pending.len()
                    ));
                }
                return Some(winner);
            }
        }

        None
    }

    /// Probe one provider: precondition (CLIs installed), then list/describe.
    pub async fn probe(&self, provider: CloudProvider) -> ProbeOutcome<ClusterMatch> {
        if !self.runner.is_available(provider.cli()) {
            return Err(NotDetected::ToolMissing(provider.cli().to_string()));
        }
        if !self.runner.is_available(&self.config.kubectl) {
            return Err(NotDetected::Precondition(format!(
                "{} is installed but kubectl is not",
                provider.cli()
            )));
        }

        match provider {
            CloudProvider::Aws => self.probe_aws().await,
            CloudProvider::Gcp => self.probe_gcp().await,
            CloudProvider::Azure => self.probe_azure().await,
            CloudProvider::DigitalOcean => self.probe_digitalocean().await,
            CloudProvider::Linode => self.probe_linode().await,
        }
    }

    async fn probe_aws(&self) -> ProbeOutcome<ClusterMatch> {
        let timeouts = &self.config.timeouts;
        let listed = self
            .run("aws", &["eks", "list-clusters", "--output", "json"], timeouts.list())
            .await?;
        let name = first(parse_eks_clusters(&listed.stdout)?)?;

        let described = self
            .run(
                "aws",
                &["eks", "describe-cluster", "--name", &name, "--output", "json"],
                timeouts.describe(),
            )
            .await?;
        let arn = parse_eks_arn(&described.stdout)?;

        let region = match arn.as_deref().and_then(region_from_arn) {
            Some(region) => Some(region),
            None => self
                .run("aws", &["configure", "get", "region"], timeouts.availability())
                .await
                .ok()
                .map(|out| out.stdout.trim().to_string())
                .filter(|r| !r.is_empty()),
        };

        Ok(ClusterMatch {
            provider: CloudProvider::Aws,
            context_name: Some(arn.unwrap_or_else(|| name.clone())),
            name,
            locality: region.map(Locality::Region),
        })
    }

    async fn probe_gcp(&self) -> ProbeOutcome<ClusterMatch> {
        let timeouts = &self.config.timeouts;
        let listed = self
            .run(
                "gcloud",
                &["container", "clusters", "list", "--format=value(name,location)"],
                timeouts.list(),
            )
            .await?;
        let (name, location) = first(parse_gke_clusters(&listed.stdout))?;

        let project = self
            .run("gcloud", &["config", "get-value", "project"], timeouts.describe())
            .await?;
        let project = parse_gcloud_project(&project.stdout);

        let context_name = project
            .as_ref()
            .map(|p| format!("gke_{}_{}_{}", p, location, name));
        Ok(ClusterMatch {
            provider: CloudProvider::Gcp,
            name,
            locality: project.map(Locality::ProjectId),
            context_name,
        })
    }

    async fn probe_azure(&self) -> ProbeOutcome<ClusterMatch> {
        let timeouts = &self.config.timeouts;
        let listed = self
            .run("az", &["aks", "list", "--output", "json"], timeouts.list())
            .await?;
        let listed = first(parse_aks_clusters(&listed.stdout)?)?;

        let shown = self
            .run(
                "az",
                &[
                    "aks",
                    "show",
                    "--name",
                    &listed.name,
                    "--resource-group",
                    &listed.resource_group,
                    "--output",
                    "json",
                ],
                timeouts.describe(),
            )
            .await?;
        let shown: AksCluster = serde_json::from_str(&shown.stdout)?;
        let resource_group = Some(shown.resource_group)
            .filter(|g| !g.is_empty())
            .unwrap_or(listed.resource_group);

        Ok(ClusterMatch {
            provider: CloudProvider::Azure,
            context_name: Some(listed.name.clone()),
            name: listed.name,
            locality: Some(Locality::ResourceGroup(resource_group)),
        })
    }

    async fn probe_digitalocean(&self) -> ProbeOutcome<ClusterMatch> {
        let timeouts = &self.config.timeouts;
        let listed = self
            .run(
                "doctl",
                &[
                    "kubernetes",
                    "cluster",
                    "list",
                    "--format",
                    "Name,Region",
                    "--no-header",
                ],
                timeouts.list(),
            )
            .await?;
        let (name, listed_region) = first(parse_doks_clusters(&listed.stdout))?;

        let described = self
            .run(
                "doctl",
                &[
                    "kubernetes",
                    "cluster",
                    "get",
                    &name,
                    "--format",
                    "Region",
                    "--no-header",
                ],
                timeouts.describe(),
            )
            .await?;
        let region = Some(described.stdout.trim().to_string())
            .filter(|r| !r.is_empty())
            .or(listed_region);

        let context_name = region.as_ref().map(|r| format!("do-{}-{}", r, name));
        Ok(ClusterMatch {
            provider: CloudProvider::DigitalOcean,
            name,
            locality: region.map(Locality::Region),
            context_name,
        })
    }

    async fn probe_linode(&self) -> ProbeOutcome<ClusterMatch> {
        let timeouts = &self.config.timeouts;
        let listed = self
            .run("linode-cli", &["lke", "clusters-list", "--json"], timeouts.list())
            .await?;
        let cluster = first(parse_lke_clusters(&listed.stdout)?)?;

        let region = match cluster.id {
            Some(id) => {
                let id = id.to_string();
                let viewed = self
                    .run(
                        "linode-cli",
                        &["lke", "cluster-view", &id, "--json"],
                        timeouts.describe(),
                    )
                    .await?;
                parse_lke_clusters(&viewed.stdout)?
                    .into_iter()
                    .next()
                    .and_then(|c| c.region)
                    .or(cluster.region)
            }
            None => cluster.region,
        };

        Ok(ClusterMatch {
            provider: CloudProvider::Linode,
            name: cluster.label,
            locality: region.map(Locality::Region),
            context_name: cluster.id.map(|id| format!("lke{}-ctx", id)),
        })
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

/// The winning match once it can no longer be beaten by a pending
/// higher-priority probe.
fn settled_winner(slots: &[Option<ProbeOutcome<ClusterMatch>>]) -> Option<ClusterMatch> {
    for slot in slots {
        match slot {
            None => return None,
            Some(Ok(found)) => return Some(found.clone()),
            Some(Err(_)) => continue,
        }
    }
    None
}

fn first<T>(items: Vec<T>) -> ProbeOutcome<T> {
    items.into_iter().next().ok_or(NotDetected::Empty)
}

#[derive(Debug, Deserialize)]
struct EksClusterList {
    #[serde(default)]
    clusters: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EksDescribe {
    cluster: EksCluster,
}

#[derive(Debug, Deserialize)]
struct EksCluster {
    arn: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AksCluster {
    pub name: String,
    #[serde(rename = "resourceGroup", default)]
    pub resource_group: String,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LkeCluster {
    #[serde(default)]
    pub id: Option<u64>,
    pub label: String,
    #[serde(default)]
    pub region: Option<String>,
}

pub fn parse_eks_clusters(stdout: &str) -> ProbeOutcome<Vec<String>> {
    let list: EksClusterList = serde_json::from_str(stdout)?;
    Ok(list.clusters)
}

pub fn parse_eks_arn(stdout: &str) -> ProbeOutcome<Option<String>> {
    let described: EksDescribe = serde_json::from_str(stdout)?;
    Ok(described.cluster.arn)
}

/// `arn:aws:eks:<region>:<account>:cluster/<name>` -> region
pub fn region_from_arn(arn: &str) -> Option<String> {
    let mut parts = arn.split(':');
    if parts.next()? != "arn" {
        return None;
    }
    parts
        .nth(2)
        .filter(|region| !region.is_empty())
        .map(String::from)
}

/// `name<ws>location` lines from `gcloud ... --format=value(name,location)`.
pub fn parse_gke_clusters(stdout: &str) -> Vec<(String, String)> {
    stdout
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let name = fields.next()?;
            let location = fields.next().unwrap_or_default();
            Some((name.to_string(), location.to_string()))
        })
        .collect()
}

pub fn parse_gcloud_project(stdout: &str) -> Option<String> {
    let project = stdout.lines().next()?.trim();
    if project.is_empty() || project == "(unset)" {
        None
    } else {
        Some(project.to_string())
    }
}

pub fn parse_aks_clusters(stdout: &str) -> ProbeOutcome<Vec<AksCluster>> {
    Ok(serde_json::from_str(stdout)?)
}

/// `Name Region` rows from `doctl ... --no-header`.
pub fn parse_doks_clusters(stdout: &str) -> Vec<(String, Option<String>)> {
    stdout
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let name = fields.next()?;
            Some((name.to_string(), fields.next().map(String::from)))
        })
        .collect()
}

pub fn parse_lke_clusters(stdout: &str) -> ProbeOutcome<Vec<LkeCluster>> {
    Ok(serde_json::from_str(stdout)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::ScriptedRunner;
    use crate::utils::logging::MemoryLogger;

    const EKS_LIST: &str = r#"{"clusters": ["prod", "staging"]}"#;
    const EKS_DESCRIBE: &str = r#"{"cluster": {"name": "prod", "arn": "arn:aws:eks:eu-west-1:123456789012:cluster/prod", "status": "ACTIVE"}}"#;

    fn detector_with(runner: ScriptedRunner, providers: Vec<CloudProvider>) -> (CloudClusterDetector, Arc<ScriptedRunner>) {
        let runner = Arc::new(runner);
        let config = DetectorConfig {
            cloud_providers: providers,
            ..DetectorConfig::default()
        };
        let detector = CloudClusterDetector::new(
            runner.clone(),
            Arc::new(config),
            Arc::new(MemoryLogger::new()),
        );
        (detector, runner)
    }

    fn aws_runner() -> ScriptedRunner {
        ScriptedRunner::new()
            .with_tools(&["kubectl", "aws"])
            .respond("aws eks list-clusters --output json", EKS_LIST)
            .respond(
                "aws eks describe-cluster --name prod --output json",
                EKS_DESCRIBE,
            )
    }

    #[test]
    fn arn_region_extraction() {
        assert_eq!(
            region_from_arn("arn:aws:eks:us-east-2:123:cluster/demo").as_deref(),
            Some("us-east-2")
        );
        assert_eq!(region_from_arn("not-an-arn"), None);
        assert_eq!(region_from_arn("arn:aws:eks::123:cluster/demo"), None);
    }

    #[test]
    fn gke_and_doks_rows() {
        assert_eq!(
            parse_gke_clusters("web\tus-central1-a\nbatch\teurope-west4\n"),
            vec![
                ("web".to_string(), "us-central1-a".to_string()),
                ("batch".to_string(), "europe-west4".to_string())
            ]
        );
        assert!(parse_gke_clusters("\n").is_empty());
        assert_eq!(
            parse_doks_clusters("k8s-1   nyc1\n"),
            vec![("k8s-1".to_string(), Some("nyc1".to_string()))]
        );
        assert_eq!(parse_gcloud_project("(unset)\n"), None);
        assert_eq!(parse_gcloud_project("my-proj\n").as_deref(), Some("my-proj"));
    }

    #[test]
    fn malformed_json_is_unparsable() {
        assert!(matches!(
            parse_eks_clusters("<html>"),
            Err(NotDetected::Unparsable(_))
        ));
        assert!(parse_aks_clusters("{}").is_err());
    }

    #[test]
    fn locality_maps_to_exactly_one_field() {
        let info = CloudClusterInfo::from_match(
            ClusterMatch {
                provider: CloudProvider::Azure,
                name: "aks-1".into(),
                locality: Some(Locality::ResourceGroup("rg-prod".into())),
                context_name: Some("aks-1".into()),
            },
        );
        assert_eq!(info.cluster_type, ClusterType::Aks);
        assert_eq!(info.resource_group.as_deref(), Some("rg-prod"));
        assert!(info.region.is_none() && info.project_id.is_none());
    }

    #[tokio::test]
    async fn aws_picks_first_cluster() {
        let (detector, _) = detector_with(aws_runner(), CloudProvider::PRIORITY.to_vec());

        let info = detector.detect().await;

        assert!(info.detected);
        assert_eq!(info.provider, Some(CloudProvider::Aws));
        assert_eq!(info.cluster_type, ClusterType::Eks);
        assert_eq!(info.cluster_name.as_deref(), Some("prod"));
        assert_eq!(info.region.as_deref(), Some("eu-west-1"));
        assert_eq!(
            info.context_name.as_deref(),
            Some("arn:aws:eks:eu-west-1:123456789012:cluster/prod")
        );
        assert!(info.auth_required);
    }

    #[tokio::test]
    async fn aws_without_kubectl_is_skipped() {
        let runner = ScriptedRunner::new()
            .with_tools(&["aws", "az"])
            .respond("aws eks list-clusters --output json", EKS_LIST);
        let (detector, runner) = detector_with(runner, CloudProvider::PRIORITY.to_vec());

        let outcome = detector.probe(CloudProvider::Aws).await;
        assert!(matches!(outcome, Err(NotDetected::Precondition(_))));

        let info = detector.detect().await;
        assert!(!info.detected);
        assert!(!runner.was_called("aws"));
    }

    #[tokio::test]
    async fn failing_provider_falls_through_to_next() {
        let runner = ScriptedRunner::new()
            .with_tools(&["kubectl", "aws", "gcloud"])
            .fail("aws eks list-clusters --output json", 255, "Unable to locate credentials")
            .respond(
                "gcloud container clusters list --format=value(name,location)",
                "web\tus-central1-a\n",
            )
            .respond("gcloud config get-value project", "acme-prod\n");
        let (detector, _) = detector_with(runner, CloudProvider::PRIORITY.to_vec());

        let info = detector.detect().await;

        assert_eq!(info.provider, Some(CloudProvider::Gcp));
        assert_eq!(info.project_id.as_deref(), Some("acme-prod"));
        assert_eq!(
            info.context_name.as_deref(),
            Some("gke_acme-prod_us-central1-a_web")
        );
    }

    #[tokio::test]
    async fn higher_priority_wins_even_when_slower() {
        let runner = ScriptedRunner::new()
            .with_tools(&["kubectl", "aws", "doctl"])
            .delay(
                "aws eks list-clusters --output json",
                Duration::from_millis(150),
                EKS_LIST,
            )
            .respond(
                "aws eks describe-cluster --name prod --output json",
                EKS_DESCRIBE,
            )
            .respond(
                "doctl kubernetes cluster list --format Name,Region --no-header",
                "k8s-1 nyc1\n",
            )
            .respond(
                "doctl kubernetes cluster get k8s-1 --format Region --no-header",
                "nyc1\n",
            );
        let (detector, _) = detector_with(runner, CloudProvider::PRIORITY.to_vec());

        let info = detector.detect().await;

        assert_eq!(info.provider, Some(CloudProvider::Aws));
    }

    #[tokio::test]
    async fn settled_match_cancels_slower_probes() {
        let runner = aws_runner().with_tool("linode-cli").delay(
            "linode-cli lke clusters-list --json",
            Duration::from_secs(5),
            "[]",
        );
        let (detector, _) = detector_with(runner, CloudProvider::PRIORITY.to_vec());

        let started = std::time::Instant::now();
        let info = detector.detect().await;

        assert_eq!(info.provider, Some(CloudProvider::Aws));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn provider_order_comes_from_config() {
        let runner = aws_runner()
            .with_tool("az")
            .respond(
                "az aks list --output json",
                r#"[{"name": "aks-1", "resourceGroup": "rg-list", "location": "westeurope"}]"#,
            )
            .respond(
                "az aks show --name aks-1 --resource-group rg-list --output json",
                r#"{"name": "aks-1", "resourceGroup": "rg-show", "location": "westeurope"}"#,
            );
        let (detector, runner) =
            detector_with(runner, vec![CloudProvider::Azure, CloudProvider::Aws]);

        let info = detector.detect().await;

        assert_eq!(info.provider, Some(CloudProvider::Azure));
        assert_eq!(info.resource_group.as_deref(), Some("rg-show"));
        assert!(runner.was_called("az aks show"));
    }

    #[tokio::test]
    async fn linode_cluster_view_supplies_region() {
        let runner = ScriptedRunner::new()
            .with_tools(&["kubectl", "linode-cli"])
            .respond(
                "linode-cli lke clusters-list --json",
                r#"[{"id": 4242, "label": "lke-demo", "region": "us-east"}]"#,
            )
            .respond(
                "linode-cli lke cluster-view 4242 --json",
                r#"[{"id": 4242, "label": "lke-demo", "region": "eu-central"}]"#,
            );
        let (detector, _) = detector_with(runner, vec![CloudProvider::Linode]);

        let info = detector.detect().await;

        assert_eq!(info.cluster_type, ClusterType::Lke);
        assert_eq!(info.region.as_deref(), Some("eu-central"));
        assert_eq!(info.context_name.as_deref(), Some("lke4242-ctx"));
    }

    #[tokio::test]
    async fn empty_cluster_lists_are_not_detected() {
        let runner = ScriptedRunner::new()
            .with_tools(&["kubectl", "aws", "az"])
            .respond("aws eks list-clusters --output json", r#"{"clusters": []}"#)
            .respond("az aks list --output json", "[]");
        let (detector, _) = detector_with(runner, CloudProvider::PRIORITY.to_vec());

        assert!(matches!(
            detector.probe(CloudProvider::Aws).await,
            Err(NotDetected::Empty)
        ));
        assert_eq!(detector.detect().await, CloudClusterInfo::not_detected());
    }
}
