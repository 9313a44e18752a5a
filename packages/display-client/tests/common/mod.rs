//! Shared helpers for display client integration tests
//!
//! Runs the real API router on an ephemeral port so the client talks to it
//! over actual HTTP and WebSocket connections.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::watch;

use qms_api::models::station::{Station, StationDirectory};
use qms_api::{
    app, AuthConfig, AuthService, BroadcastHub, PairingConfig, PairingRegistry, QmsState,
    QueueService,
};
use qms_display_client::{ConnectionState, DisplayView};
use qms_shared_config::DisplayTimingConfig;

pub const TEST_JWT_SECRET: &str = "integration-test-secret-at-least-32-chars";

/// API server listening on 127.0.0.1
pub struct TestServer {
    pub addr: SocketAddr,
    pub state: QmsState,
}

impl TestServer {
    pub async fn start() -> Self {
        let stations = StationDirectory::new(vec![
            Station::new("station-1", "A", "Counter 1"),
            Station::new("station-2", "B", "Counter 2"),
        ])
        .expect("valid test stations");
        let queue = QueueService::new(stations.clone(), BroadcastHub::default());
        let pairing = PairingRegistry::new(stations, PairingConfig::default());
        let state = QmsState::new(queue, pairing, Duration::from_secs(5));
        let auth = AuthService::new(AuthConfig::new(TEST_JWT_SECRET.to_string()));

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let router = app(state.clone(), auth);
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("server runs");
        });

        Self { addr, state }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Register a display and confirm it for `station_id`, returning its token
    pub fn paired_token(&self, station_id: &str) -> String {
        let ticket = self.state.pairing.register().expect("register");
        self.state
            .pairing
            .confirm(&ticket.code, station_id)
            .expect("confirm");
        ticket.client_token
    }
}

/// Short timings so reconnect tests finish quickly
pub fn fast_timing() -> DisplayTimingConfig {
    DisplayTimingConfig {
        keepalive_interval: Duration::from_millis(500),
        reconnect_base_delay: Duration::from_millis(20),
        reconnect_max_delay: Duration::from_millis(100),
    }
}

/// Wait until the view satisfies `pred`, failing after a few seconds
pub async fn wait_for(
    view: &mut watch::Receiver<DisplayView>,
    pred: impl Fn(&DisplayView) -> bool,
) -> DisplayView {
    let result = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            {
                let current = view.borrow_and_update();
                if pred(&current) {
                    return current.clone();
                }
            }
            view.changed().await.expect("session ended before condition held");
        }
    })
    .await;
    result.expect("timed out waiting for display view")
}

pub async fn wait_for_state(
    view: &mut watch::Receiver<DisplayView>,
    state: ConnectionState,
) -> DisplayView {
    wait_for(view, |v| v.state() == state).await
}
