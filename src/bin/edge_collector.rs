//! Edge collector binary: loads `config.yaml`, spawns one capability
//! detector per configured camera, and forwards events to the cloud.
//!
//! Usage:
//!   retail-pulse-edge --config config.yaml
//!
//! Environment overrides: API_BASE, EDGE_API_KEY, ORG_ID, STORE_ID,
//! BATCH_SECONDS, MAX_BATCH, BACKOFF_BASE, BACKOFF_MAX, BUFFER_DIR,
//! EDGE_LOG_LEVEL.

use anyhow::Result;
use axum::{routing::get, Router};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use retail_pulse::config::EdgeConfig;
use retail_pulse::edge_runtime::EdgeSupervisor;

#[derive(Parser, Debug)]
#[command(name = "retail-pulse-edge")]
#[command(about = "Retail Pulse edge collector")]
struct Args {
    /// Path to the device's config.yaml
    #[arg(long, env = "RETAIL_PULSE_CONFIG", default_value = "config.yaml")]
    config: String,

    /// Health check HTTP port
    #[arg(long, env = "RETAIL_PULSE_HEALTH_PORT", default_value = "9090")]
    health_port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_env("EDGE_LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new("retail_pulse=info")))
        .init();

    let args = Args::parse();
    info!(config = %args.config, "loading edge config");

    let config = EdgeConfig::load(&args.config)?;
    let mut supervisor = EdgeSupervisor::bootstrap(config)?;
    supervisor.spawn_default_workers();

    let health_port = args.health_port;
    tokio::spawn(async move {
        start_health_server(health_port).await;
    });

    tokio::signal::ctrl_c().await.ok();
    info!("shutdown signal received, draining pipeline");
    supervisor.shutdown().await;
    info!("retail-pulse-edge stopped");
    Ok(())
}

async fn start_health_server(port: u16) {
    let app = Router::new().route("/health", get(|| async { "OK" }));
    match TcpListener::bind(format!("0.0.0.0:{port}")).await {
        Ok(listener) => {
            info!(port, "health server listening");
            let _ = axum::serve(listener, app).await;
        }
        Err(e) => tracing::warn!(error = %e, "failed to bind health port"),
    }
}
