//! Control-plane server entry point.

use std::path::Path;

use anyhow::Result;
use clap::Parser;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use fleet_common::SystemConfig;

#[derive(Parser)]
#[command(name = "fleet-server")]
#[command(version)]
#[command(about = "Control plane for a fleet of containerized agents")]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, default_value = "fleet.toml")]
    config: String,

    /// Override the configured bind address, e.g. "0.0.0.0:8080".
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = if Path::new(&cli.config).exists() {
        SystemConfig::load(&cli.config)?
    } else {
        warn!("config file {} not found, using defaults", cli.config);
        SystemConfig::default()
    };

    fleet_api::serve(config, cli.bind).await
}
