//! Test fixtures: stations, services and staff tokens

#![allow(dead_code)]

use std::time::Duration;

use axum::Router;
use qms_api::models::station::{Station, StationDirectory};
use qms_api::services::StaffClaims;
use qms_api::{
    app, AuthConfig, AuthService, BroadcastHub, PairingConfig, PairingRegistry, QmsState,
    QueueService,
};

pub const TEST_JWT_SECRET: &str = "integration-test-secret-at-least-32-chars";

/// Two stations: `station-1` (code A) and `station-2` (code B)
pub fn test_stations() -> StationDirectory {
    StationDirectory::new(vec![
        Station::new("station-1", "A", "Counter 1"),
        Station::new("station-2", "B", "Counter 2"),
    ])
    .expect("valid test stations")
}

/// Router plus handles on the services behind it
pub struct TestApp {
    pub router: Router,
    pub state: QmsState,
    pub auth: AuthService,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_transport(BroadcastHub::default(), Duration::from_secs(5))
    }

    /// App with a custom hub and per-frame write timeout for display sockets
    pub fn with_transport(hub: BroadcastHub, send_timeout: Duration) -> Self {
        let stations = test_stations();
        let queue = QueueService::new(stations.clone(), hub);
        let pairing = PairingRegistry::new(stations, PairingConfig::default());
        let state = QmsState::new(queue, pairing, send_timeout);
        let auth = AuthService::new(AuthConfig::new(TEST_JWT_SECRET.to_string()));

        Self {
            router: app(state.clone(), auth.clone()),
            state,
            auth,
        }
    }

    /// Serve the router on an ephemeral loopback port
    pub async fn spawn_server(&self) -> std::net::SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind loopback");
        let addr = listener.local_addr().expect("local addr");
        let router = self.router.clone();
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("server runs");
        });
        addr
    }

    /// Client token of a display paired with `station_id`
    pub fn paired_token(&self, station_id: &str) -> String {
        let ticket = self.state.pairing.register().expect("register");
        self.state
            .pairing
            .confirm(&ticket.code, station_id)
            .expect("confirm");
        ticket.client_token
    }

    /// A valid staff Bearer token
    pub fn staff_token(&self) -> String {
        self.auth
            .issue_token(
                &StaffClaims::new("staff-1", chrono::Duration::hours(1)).with_name("Test Nurse"),
            )
            .expect("token signs")
    }
}
