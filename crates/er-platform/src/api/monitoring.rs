//! Monitoring API
//!
//! Liveness and readiness probes.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use er_common::{ComponentHealth, HealthReport};

use crate::repository::EventRepository;

/// Monitoring service state
#[derive(Clone)]
pub struct MonitoringState {
    pub events: Arc<dyn EventRepository>,
    pub ping_timeout: Duration,
}

/// Liveness probe
#[utoipa::path(
    get,
    path = "/health",
    tag = "monitoring",
    responses(
        (status = 200, description = "Process is alive")
    )
)]
pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "UP",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Readiness probe; checks the datastore
#[utoipa::path(
    get,
    path = "/ready",
    tag = "monitoring",
    responses(
        (status = 200, description = "Ready to serve", body = HealthReport),
        (status = 503, description = "A dependency is unavailable", body = HealthReport)
    )
)]
pub async fn ready(State(state): State<MonitoringState>) -> impl IntoResponse {
    let datastore = match tokio::time::timeout(state.ping_timeout, state.events.ping()).await {
        Ok(Ok(())) => ComponentHealth::healthy("datastore"),
        Ok(Err(e)) => ComponentHealth::unhealthy("datastore", e.public_message()),
        Err(_) => ComponentHealth::unhealthy("datastore", "ping timed out"),
    };

    let report = HealthReport::from_components(env!("CARGO_PKG_VERSION"), vec![datastore]);
    let status = if report.is_up() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report))
}

/// Create the monitoring router
pub fn monitoring_router(state: MonitoringState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .with_state(state)
}
