pub mod health;
pub mod load;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use prometheus::Registry;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::metrics;

pub use load::AppState;

/// Full responder surface: the load route plus probes and metrics.
/// Request tracing covers the load route only; probes and metrics stay
/// out of the request logs.
pub fn responder_router(state: AppState) -> Router {
    Router::new()
        .route("/api/load", get(load::handle_load))
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone())
        .merge(admin_router(state.registry))
}

/// Probes and metrics only. The driver serves nothing else over HTTP.
pub fn admin_router(registry: Registry) -> Router {
    Router::new()
        .route("/live", get(health::live))
        .route("/ready", get(health::ready))
        .route("/metrics", get(serve_metrics))
        .with_state(registry)
}

async fn serve_metrics(State(registry): State<Registry>) -> Response {
    match metrics::render(&registry) {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "metrics encoding failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
