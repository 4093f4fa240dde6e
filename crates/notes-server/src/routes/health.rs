//! Liveness, readiness and metrics endpoints.

use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
    routing::get,
};
use serde::Serialize;

use crate::state::AppState;

/// Liveness response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
}

/// Readiness response.
#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    pub ready: bool,
}

/// GET /healthz - the process is up.
async fn healthz() -> Json<HealthResponse> {
    Json(HealthResponse { ok: true })
}

/// GET /readyz - the backend answers within the store timeout.
async fn readyz(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    let timeout = state.sessions().config().store_timeout;
    let ready = match tokio::time::timeout(timeout, state.backend().ping()).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "Readiness check failed");
            false
        }
        Err(_) => {
            tracing::warn!("Readiness check timed out");
            false
        }
    };

    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(ReadyResponse { ready }))
}

/// GET /metrics - Prometheus text exposition.
async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics().render(),
    )
}

/// Build operational routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
}
