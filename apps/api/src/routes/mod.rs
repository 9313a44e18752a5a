//! HTTP route handlers for the queue API
//!
//! - Display pairing endpoints (unauthenticated) and the display WebSocket
//! - Station counter endpoints (staff)
//! - Queue entry status updates (staff)
//! - Health check and status endpoints

pub mod display;
pub mod entries;
pub mod health;
pub mod stations;

use std::time::Duration;

use axum::{extract::Extension, routing::get, Router};
use serde::Serialize;

pub use display::display_router;
pub use entries::entries_router;
pub use health::{health_router, HealthState};
pub use stations::stations_router;

use crate::models::queue::QueueEntry;
use crate::services::{AuthService, PairingRegistry, QueueService};
use crate::websocket::display_ws_handler;

/// Shared state of the queue and pairing handlers
#[derive(Clone)]
pub struct QmsState {
    pub queue: QueueService,
    pub pairing: PairingRegistry,
    /// Per-frame write timeout on display sockets
    pub send_timeout: Duration,
}

impl QmsState {
    pub fn new(queue: QueueService, pairing: PairingRegistry, send_timeout: Duration) -> Self {
        Self {
            queue,
            pairing,
            send_timeout,
        }
    }
}

/// Queue entry as returned by the counter endpoints
#[derive(Debug, Clone, Serialize)]
pub struct EntryResponse {
    #[serde(flatten)]
    pub entry: QueueEntry,
    /// Human-facing call number, e.g. `A007`
    pub queue_number: String,
}

impl EntryResponse {
    pub fn new(state: &QmsState, entry: QueueEntry) -> Self {
        let queue_number = state
            .queue
            .station(&entry.station_id)
            .map(|station| station.queue_number(entry.daily_sequence))
            .unwrap_or_else(|| format!("{:03}", entry.daily_sequence));
        Self {
            entry,
            queue_number,
        }
    }
}

/// Build the full application router (without CORS and tracing layers)
///
/// Staff endpoints read the `AuthService` from request extensions.
pub fn app(state: QmsState, auth_service: AuthService) -> Router {
    let health_state = HealthState::new(state.queue.clone(), state.pairing.clone());

    let qms = Router::new()
        .merge(display_router())
        .route("/display/ws/:station_id", get(display_ws_handler))
        .merge(stations_router())
        .merge(entries_router())
        .with_state(state);

    Router::new()
        .nest("/qms", qms)
        .nest("/health", health_router(health_state))
        .layer(Extension(auth_service))
}
