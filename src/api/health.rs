use axum::http::StatusCode;

/// GET /live - liveness probe, always 200.
pub async fn live() -> StatusCode {
    StatusCode::OK
}

/// GET /ready - readiness probe. There is nothing to warm up, so this
/// is 200 from the first moment the listener is bound.
pub async fn ready() -> StatusCode {
    StatusCode::OK
}
