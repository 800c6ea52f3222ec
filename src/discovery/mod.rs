mod cloud;
mod environment;
pub mod kubeconfig;
mod local;

pub use cloud::{
    parse_aks_clusters, parse_doks_clusters, parse_eks_arn, parse_eks_clusters,
    parse_gcloud_project, parse_gke_clusters, parse_lke_clusters, region_from_arn,
    CloudClusterDetector, CloudClusterInfo, ClusterMatch,
};
pub use environment::{from_cloud, from_local, EnvironmentDetector};
pub use kubeconfig::KubeConfig;
pub use local::{
    minikube_running, parse_kind_clusters, LocalClusterDetector, LocalClusterInfo, LocalProbe,
};
