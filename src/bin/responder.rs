use std::sync::Arc;

use anyhow::Result;
use loadlab::{
    api::{self, AppState},
    config::ResponderConfig,
    metrics::ResponderMetrics,
    telemetry,
};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init_tracing();

    let cfg = ResponderConfig::load()?;
    let metrics = Arc::new(ResponderMetrics::new()?);
    let registry = metrics.registry()?;

    let state = AppState {
        cfg: cfg.clone(),
        metrics,
        registry,
    };
    let app = api::responder_router(state);
    let addr = cfg.socket_addr();
    info!(%addr, delay_ms = cfg.response_delay_ms, "starting load responder");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(telemetry::shutdown_signal())
        .await?;

    warn!("shutdown complete");
    Ok(())
}
