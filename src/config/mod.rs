mod types;

pub use types::{expand_path, DetectorConfig, TimeoutConfig, KUBECONFIG_ENV};
