mod manager;
mod run;

pub use manager::{
    parse_control_plane, ClusterInfo, ClusterSummary, ConnectionStatus, EnvironmentManager,
};
pub use run::{run_command, Command};
