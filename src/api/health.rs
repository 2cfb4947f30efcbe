//! Health check endpoints

use std::sync::Arc;

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use super::ApiState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Readiness response with registry and queue counts
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub devices: usize,
    pub attached: usize,
    pub incoming: usize,
    pub pending: usize,
}

/// Liveness probe - is the service running?
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Readiness probe with admission backlog
async fn ready(State(state): State<Arc<ApiState>>) -> Json<ReadinessResponse> {
    let registry = state.handler.registry();
    let queues = registry.queues();
    Json(ReadinessResponse {
        status: "ok",
        devices: registry.len(),
        attached: state.resources.len(),
        incoming: queues.incoming_len(),
        pending: queues.pending_len(),
    })
}

/// Build health router (liveness only, no state needed)
pub fn router() -> Router {
    Router::new().route("/health", get(health))
}

/// Build readiness router
pub fn ready_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/ready", get(ready))
        .with_state(state)
}
