// src/main.rs
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use clusterprobe::app::{run_command, Command, EnvironmentManager};
use clusterprobe::config::{DetectorConfig, KUBECONFIG_ENV};
use clusterprobe::exec::SystemRunner;
use clusterprobe::utils::{FileLogger, Logger, MultiLogger, TracingLogger};
use clusterprobe::Result;

/// Find the Kubernetes cluster this machine points at and what you may do there
#[derive(Parser)]
#[command(name = "clusterprobe", version, about)]
pub struct Args {
    /// Detector configuration file (JSON)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    #[arg(short, long)]
    pub debug: bool,
    /// Also append diagnostics to this file
    #[arg(short, long)]
    pub log_file: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config = DetectorConfig::load_or_default(args.config.as_deref())?
        .with_kubeconfig_env(std::env::var(KUBECONFIG_ENV).ok());

    let mut sinks: Vec<Arc<dyn Logger>> = vec![Arc::new(TracingLogger)];
    if let Some(path) = &args.log_file {
        sinks.push(Arc::new(FileLogger::new(path, args.debug)?));
    }
    let logger: Arc<dyn Logger> = Arc::new(MultiLogger::new(sinks));

    let manager = EnvironmentManager::new(config, Arc::new(SystemRunner::new()), logger);
    let output = run_command(&manager, args.command).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
