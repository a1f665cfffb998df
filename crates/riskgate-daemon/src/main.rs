//! riskgate daemon binary entry point.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use riskgate_daemon::config::RiskgateConfig;
use riskgate_daemon::Daemon;

/// riskgate - signup-risk classification service.
#[derive(Parser, Debug)]
#[command(name = "riskgate", version, about)]
struct Args {
    /// Path to the configuration file.
    #[arg(short, long, default_value = "riskgate.toml")]
    config: PathBuf,

    /// Override the listen address from the config file.
    #[arg(long)]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let env_filter =
        EnvFilter::try_from_env("RISKGATE_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let mut config = RiskgateConfig::load(&args.config).context("loading configuration")?;
    if let Some(listen) = args.listen {
        config.listen_addr = listen;
    }

    tracing::info!(
        config = %args.config.display(),
        listen = %config.listen_addr,
        "riskgate starting"
    );

    Daemon::new(config).run().await
}
