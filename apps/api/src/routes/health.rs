//! Health check HTTP route handlers
//!
//! - `GET /health` - Simple liveness check (returns 200 OK)
//! - `GET /health/ready` - Readiness check (stations loaded, live counters)
//! - `GET /health/live` - Kubernetes-style liveness check

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;

use crate::services::{PairingRegistry, QueueService};

/// Shared application state for health check handlers
#[derive(Clone)]
pub struct HealthState {
    pub queue: QueueService,
    pub pairing: PairingRegistry,
}

impl HealthState {
    pub fn new(queue: QueueService, pairing: PairingRegistry) -> Self {
        Self { queue, pairing }
    }
}

/// Readiness report
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub version: &'static str,
    /// Configured stations
    pub stations: usize,
    /// Open display subscriptions across all stations
    pub displays: usize,
    /// Pairing sessions held in memory, expired ones included until purged
    pub pairing_sessions: usize,
}

/// Create health check router
pub fn health_router(state: HealthState) -> Router {
    Router::new()
        .route("/", get(simple_health))
        .route("/live", get(liveness_check))
        .route("/ready", get(readiness_check))
        .with_state(state)
}

/// Simple health check - always returns OK if the server is running
async fn simple_health() -> &'static str {
    "OK"
}

/// Liveness check for Kubernetes
///
/// Returns 200 if the server process is running and can handle requests.
async fn liveness_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "alive",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Readiness check
///
/// # Response
/// - 200 OK when at least one station is configured
/// - 503 Service Unavailable otherwise
async fn readiness_check(State(state): State<HealthState>) -> impl IntoResponse {
    let stations = state.queue.stations().len();
    let response = ReadinessResponse {
        status: if stations > 0 { "ready" } else { "not_ready" },
        version: env!("CARGO_PKG_VERSION"),
        stations,
        displays: state.queue.hub().total_subscriptions(),
        pairing_sessions: state.pairing.len(),
    };

    let status_code = if stations > 0 {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(response))
}
