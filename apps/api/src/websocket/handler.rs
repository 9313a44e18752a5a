//! WebSocket upgrade handler for display boards
//!
//! Displays connect to `/qms/display/ws/{station_id}?client_token=...`. The
//! client token is resolved through the pairing registry; a display that is
//! not paired, or paired with another station, gets an error frame and a
//! 4401/4403 close so it restarts pairing instead of reconnecting forever.

use std::borrow::Cow;
use std::time::Duration;

use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use uuid::Uuid;

use qms_protocol::{ClientMessage, ServerMessage, CLOSE_STATION_MISMATCH, CLOSE_UNPAIRED};

use crate::error::ApiError;
use crate::models::station::validate_station_id;
use crate::routes::QmsState;
use crate::services::PairingError;

use super::hub::BroadcastHub;

/// Query parameters for the display WebSocket
#[derive(Debug, Deserialize)]
pub struct DisplayWsParams {
    /// Secret token handed out at registration
    #[serde(default)]
    client_token: Option<String>,
}

/// Why a display connection was refused after upgrade
#[derive(Debug, Clone, PartialEq, Eq)]
enum Rejection {
    Unpaired,
    StationMismatch,
}

impl Rejection {
    fn close_code(&self) -> u16 {
        match self {
            Rejection::Unpaired => CLOSE_UNPAIRED,
            Rejection::StationMismatch => CLOSE_STATION_MISMATCH,
        }
    }

    fn reason(&self) -> &'static str {
        match self {
            Rejection::Unpaired => "unpaired",
            Rejection::StationMismatch => "station_mismatch",
        }
    }

    fn message(&self, station_id: &str) -> ServerMessage {
        match self {
            Rejection::Unpaired => ServerMessage::unpaired(),
            Rejection::StationMismatch => ServerMessage::station_mismatch(station_id),
        }
    }
}

/// Decide whether a client token may subscribe to `station_id`
fn authorize(state: &QmsState, station_id: &str, client_token: Option<&str>) -> Result<(), Rejection> {
    let token = client_token
        .filter(|t| !t.is_empty())
        .ok_or(Rejection::Unpaired)?;

    match state.pairing.resolve_client(token) {
        Ok(bound) if bound == station_id => Ok(()),
        Ok(_) => Err(Rejection::StationMismatch),
        Err(PairingError::Unpaired) => Err(Rejection::Unpaired),
        Err(e) => {
            tracing::warn!(error = %e, "Unexpected pairing error on subscribe");
            Err(Rejection::Unpaired)
        }
    }
}

/// WebSocket upgrade handler
///
/// Resolves the display's pairing before upgrading, then streams queue
/// snapshots for the station until either side closes.
pub async fn display_ws_handler(
    ws: WebSocketUpgrade,
    Path(station_id): Path<String>,
    Query(params): Query<DisplayWsParams>,
    State(state): State<QmsState>,
) -> Response {
    if let Err(reason) = validate_station_id(&station_id) {
        tracing::warn!(station_id = %station_id, "Invalid station id: {}", reason);
        return ApiError::ValidationError(reason.to_string()).into_response();
    }

    if let Err(rejection) = authorize(&state, &station_id, params.client_token.as_deref()) {
        tracing::warn!(
            station_id = %station_id,
            reason = rejection.reason(),
            "Display subscription rejected"
        );
        return ws.on_upgrade(move |socket| reject_socket(socket, station_id, rejection));
    }

    tracing::info!(station_id = %station_id, "Display connection authorized");

    let send_timeout = state.send_timeout;
    ws.on_upgrade(move |socket| handle_socket(socket, state, station_id, send_timeout))
}

/// Send an error frame and a close frame explaining the rejection
async fn reject_socket(mut socket: WebSocket, station_id: String, rejection: Rejection) {
    if let Ok(json) = serde_json::to_string(&rejection.message(&station_id)) {
        let _ = socket.send(Message::Text(json)).await;
    }
    let _ = socket
        .send(Message::Close(Some(CloseFrame {
            code: rejection.close_code(),
            reason: Cow::Borrowed(rejection.reason()),
        })))
        .await;
}

/// Handle an established display connection
async fn handle_socket(socket: WebSocket, state: QmsState, station_id: String, send_timeout: Duration) {
    // Registers and queues the current snapshot as the first frame
    let subscription = match state.queue.subscribe(&station_id) {
        Ok(subscription) => subscription,
        Err(e) => {
            tracing::warn!(station_id = %station_id, error = %e, "Subscribe failed");
            reject_socket(socket, station_id, Rejection::StationMismatch).await;
            return;
        }
    };
    let subscription_id = subscription.id();
    let (mut rx, guard) = subscription.split();

    let (mut ws_sender, mut ws_receiver) = socket.split();

    tracing::info!(
        station_id = %station_id,
        subscription_id = %subscription_id,
        displays = state.queue.hub().subscription_count(&station_id),
        "Display subscribed"
    );

    // Forward hub frames to the socket, bounded by the write timeout
    let send_station = station_id.clone();
    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let write = ws_sender.send(Message::Text(frame.to_string()));
            match tokio::time::timeout(send_timeout, write).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::debug!(station_id = %send_station, error = %e, "WebSocket send failed");
                    break;
                }
                Err(_) => {
                    tracing::warn!(
                        station_id = %send_station,
                        subscription_id = %subscription_id,
                        "WebSocket send timed out, closing display session"
                    );
                    break;
                }
            }
        }
        let _ = ws_sender.close().await;
    });

    // Answer application pings
    let hub = state.queue.hub().clone();
    let recv_station = station_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = ws_receiver.next().await {
            match result {
                Ok(Message::Text(text)) => {
                    handle_text(&hub, &recv_station, subscription_id, &text);
                }
                Ok(Message::Binary(_)) => {
                    tracing::debug!(station_id = %recv_station, "Received unsupported binary message");
                }
                // Transport-level pings are answered by axum itself
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
                Ok(Message::Close(_)) => {
                    tracing::debug!(station_id = %recv_station, "WebSocket close received");
                    break;
                }
                Err(e) => {
                    tracing::debug!(station_id = %recv_station, error = %e, "WebSocket error");
                    break;
                }
            }
        }
    });

    // Wait for either task to complete, then abort the other
    tokio::select! {
        _ = &mut send_task => {
            tracing::debug!(station_id = %station_id, "Send task completed");
            recv_task.abort();
        }
        _ = &mut recv_task => {
            tracing::debug!(station_id = %station_id, "Receive task completed");
            send_task.abort();
        }
    }

    // Deregister now rather than whenever the aborted task is reaped
    drop(guard);

    tracing::info!(
        station_id = %station_id,
        subscription_id = %subscription_id,
        "Display connection closed"
    );
}

/// Handle one text frame from a display
fn handle_text(hub: &BroadcastHub, station_id: &str, subscription_id: Uuid, text: &str) {
    let reply = match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::Ping) => ServerMessage::pong(),
        Err(e) => {
            tracing::debug!(station_id = %station_id, error = %e, "Failed to parse client message");
            ServerMessage::invalid_message(e.to_string())
        }
    };

    if let Err(e) = hub.send_to(station_id, subscription_id, &reply) {
        tracing::debug!(station_id = %station_id, error = %e, "Reply not delivered");
    }
}
