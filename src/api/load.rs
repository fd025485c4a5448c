//! The load route: label extraction, counting, and latency injection.

use std::sync::Arc;

use axum::extract::{RawQuery, State};
use axum::http::{StatusCode, Uri};
use tracing::info;

use crate::config::ResponderConfig;
use crate::metrics::ResponderMetrics;

/// Shared state for the responder's routes.
#[derive(Clone)]
pub struct AppState {
    pub cfg: ResponderConfig,
    pub metrics: Arc<ResponderMetrics>,
    pub registry: prometheus::Registry,
}

const UNKNOWN: &str = "unknown";

/// GET /api/load - record who sent the request, sleep the configured
/// delay to simulate work, reply 200 with no body.
///
/// The query string is parsed by hand so that no shape of input is ever
/// rejected: duplicated keys take the first value, everything else is
/// ignored.
pub async fn handle_load(
    State(state): State<AppState>,
    uri: Uri,
    RawQuery(query): RawQuery,
) -> StatusCode {
    let source = normalize(first_param(query.as_deref(), "source"));
    let mode = normalize(first_param(query.as_deref(), "mode"));

    info!(url = %uri, %source, %mode, "handling load request");
    state.metrics.inc_request(&source, &mode);

    tokio::time::sleep(state.cfg.response_delay()).await;
    StatusCode::OK
}

/// First occurrence of `key` in the query string, percent-decoded.
fn first_param(query: Option<&str>, key: &str) -> Option<String> {
    url::form_urlencoded::parse(query?.as_bytes())
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

/// Missing and empty parameters are treated alike and never rejected.
fn normalize(value: Option<String>) -> String {
    match value {
        Some(v) if !v.is_empty() => v,
        _ => UNKNOWN.to_string(),
    }
}
