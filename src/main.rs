//! Retail Pulse cloud server — ingestion + query HTTP service.

use std::env;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use retail_pulse::ingestion::{self, IngestionState};
use retail_pulse::query::{self, QueryState};
use retail_pulse::store::EventStore;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    info!("retail-pulse-server starting");

    let db_path = env::var("RETAIL_PULSE_DB_PATH").unwrap_or_else(|_| "retail_pulse.db".to_string());
    let store = Arc::new(EventStore::open(&db_path).with_context(|| format!("opening event store at {db_path}"))?);
    info!(db_path = %db_path, "event store ready");

    let app = Router::new()
        .merge(ingestion::router(IngestionState { store: store.clone() }))
        .merge(query::router(QueryState { store }))
        .layer(CorsLayer::permissive());

    let addr = env::var("RETAIL_PULSE_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let listener = TcpListener::bind(&addr).await.with_context(|| format!("binding {addr}"))?;
    info!(addr = %addr, "retail-pulse-server listening");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "retail_pulse=info,tower_http=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}
