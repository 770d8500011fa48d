//! ghost-crank - Entry Point

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Confidential trigger-order crank
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via GHOST_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    ghost_telemetry::init_logging()?;

    info!("Starting ghost-crank v{}", env!("CARGO_PKG_VERSION"));

    // CLI arg > GHOST_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("GHOST_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    info!(config_path = %config_path, "Loading configuration");

    let config = ghost_crank::AppConfig::from_file(&config_path)?;
    info!(
        poll_interval_ms = config.monitor.poll_interval_ms,
        api_enabled = config.api.enabled,
        api_port = config.api.port,
        "Configuration loaded"
    );

    let app = ghost_crank::Application::new(config)?;
    app.run().await?;

    Ok(())
}
