use std::sync::Arc;

use anyhow::Result;
use loadlab::{api, config::DriverConfig, dispatch::Dispatcher, metrics::DriverMetrics, telemetry};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init_tracing();

    let cfg = DriverConfig::load()?;
    let metrics = Arc::new(DriverMetrics::new()?);
    let registry = metrics.registry()?;

    let dispatcher = Dispatcher::new(cfg.clone(), Arc::clone(&metrics))?;
    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move { dispatcher.run(cancel).await }
    });

    let app = api::admin_router(registry);
    let addr = cfg.socket_addr();
    info!(%addr, "starting load driver");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let shutdown = async move {
        telemetry::shutdown_signal().await;
        cancel.cancel();
    };
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    warn!("shutdown complete");
    Ok(())
}
