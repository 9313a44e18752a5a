//! WebSocket message types for display synchronization
//!
//! Messages are JSON objects tagged by a `type` field. Displays only ever
//! send liveness pings; the server pushes full queue snapshots.

use serde::{Deserialize, Serialize};

use crate::board::QueueSnapshot;

/// Close code sent when the client token no longer resolves to a station
pub const CLOSE_UNPAIRED: u16 = 4401;

/// Close code sent when the token is bound to a different station
pub const CLOSE_STATION_MISMATCH: u16 = 4403;

// =============================================================================
// Client -> Server Messages
// =============================================================================

/// Messages sent from a display to the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Keepalive ping
    Ping,
}

// =============================================================================
// Server -> Client Messages
// =============================================================================

/// Messages sent from the server to a display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Full queue state of the subscribed station
    QueueUpdate { data: QueueSnapshot },

    /// Keepalive response
    Pong { server_time: i64 },

    /// Protocol-level error (malformed frame, rejected identity)
    Error { code: String, message: String },
}

impl ServerMessage {
    pub fn queue_update(snapshot: QueueSnapshot) -> Self {
        Self::QueueUpdate { data: snapshot }
    }

    pub fn pong() -> Self {
        Self::Pong {
            server_time: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn invalid_message(message: impl Into<String>) -> Self {
        Self::error("INVALID_MESSAGE", message)
    }

    pub fn unpaired() -> Self {
        Self::error("UNPAIRED", "display is not paired with any station")
    }

    pub fn station_mismatch(station_id: &str) -> Self {
        Self::error(
            "STATION_MISMATCH",
            format!("display is not paired with station {}", station_id),
        )
    }
}
