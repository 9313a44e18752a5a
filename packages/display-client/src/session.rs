//! Reconnecting push session
//!
//! A `DisplaySession` owns one background task that keeps a WebSocket open to
//! the station's display endpoint. Each connection starts with a full
//! snapshot from the server, so reconnecting never needs a replay. While
//! connected the task sends a ping every keepalive interval; if nothing at
//! all arrived since the previous ping the connection is treated as lost.
//! Lost connections are retried with exponential backoff. Only an explicit
//! `close()` or a 4401/4403 close from the server ends the session.

use std::time::Duration;

use futures_util::{Sink, SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use url::Url;

use qms_protocol::{ClientMessage, ServerMessage};
use qms_shared_config::DisplayTimingConfig;

use crate::backoff::Backoff;
use crate::error::{ClientError, ClientResult};
use crate::pairing::parse_base_url;
use crate::state::{CloseReason, ConnectionState};
use crate::view::DisplayView;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Everything a display needs to subscribe to its station
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub server_url: Url,
    pub station_id: String,
    pub client_token: String,
    pub timing: DisplayTimingConfig,
}

impl SessionConfig {
    pub fn new(
        server_url: &str,
        station_id: impl Into<String>,
        client_token: impl Into<String>,
        timing: DisplayTimingConfig,
    ) -> ClientResult<Self> {
        Ok(Self {
            server_url: parse_base_url(server_url)?,
            station_id: station_id.into(),
            client_token: client_token.into(),
            timing,
        })
    }

    /// `ws(s)://host/qms/display/ws/{station_id}?client_token=...`
    pub fn ws_url(&self) -> ClientResult<Url> {
        display_ws_url(&self.server_url, &self.station_id, &self.client_token)
    }
}

/// Build the display WebSocket URL from the HTTP base URL
pub fn display_ws_url(base: &Url, station_id: &str, client_token: &str) -> ClientResult<Url> {
    let mut url = base.clone();
    let scheme = match url.scheme() {
        "http" => "ws",
        "https" => "wss",
        other => {
            return Err(ClientError::InvalidUrl(format!(
                "unsupported scheme: {}",
                other
            )))
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| ClientError::InvalidUrl(format!("cannot use {} scheme", scheme)))?;

    url.path_segments_mut()
        .map_err(|_| ClientError::InvalidUrl("base URL cannot have a path".to_string()))?
        .pop_if_empty()
        .extend(["qms", "display", "ws", station_id]);
    url.set_query(None);
    url.query_pairs_mut().append_pair("client_token", client_token);
    Ok(url)
}

/// Handle to a running display session
#[derive(Debug)]
pub struct DisplaySession {
    view: watch::Receiver<DisplayView>,
    cancel: CancellationToken,
    task: Option<JoinHandle<CloseReason>>,
}

impl DisplaySession {
    /// Start the session task; it connects immediately
    pub fn spawn(config: SessionConfig) -> ClientResult<Self> {
        let ws_url = config.ws_url()?;
        let (view_tx, view) = watch::channel(DisplayView::new());
        let cancel = CancellationToken::new();

        let task = tokio::spawn(run(ws_url, config, view_tx, cancel.clone()));

        Ok(Self {
            view,
            cancel,
            task: Some(task),
        })
    }

    /// Receiver that is notified on every snapshot or state change
    pub fn subscribe(&self) -> watch::Receiver<DisplayView> {
        self.view.clone()
    }

    /// Copy of what the display currently shows
    pub fn view(&self) -> DisplayView {
        self.view.borrow().clone()
    }

    pub fn state(&self) -> ConnectionState {
        self.view.borrow().state()
    }

    /// Stop the session; no reconnect follows
    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Wait for the session to end and return why it ended
    pub async fn closed(mut self) -> CloseReason {
        let Some(task) = self.task.take() else {
            return self.state_reason();
        };
        match task.await {
            Ok(reason) => reason,
            Err(e) => {
                tracing::error!(error = %e, "Display session task failed");
                CloseReason::Requested
            }
        }
    }
}

impl DisplaySession {
    fn state_reason(&self) -> CloseReason {
        match self.state() {
            ConnectionState::Closed(reason) => reason,
            _ => CloseReason::Requested,
        }
    }
}

impl Drop for DisplaySession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// How a single connection ended
#[derive(Debug)]
enum ConnectionEnd {
    /// Terminal, the session stops
    Closed(CloseReason),
    /// Transient, the session reconnects
    Lost(String),
}

fn set_state(view: &watch::Sender<DisplayView>, state: ConnectionState) {
    view.send_if_modified(|current| {
        if current.state() == state {
            return false;
        }
        current.set_state(state);
        true
    });
}

async fn run(
    ws_url: Url,
    config: SessionConfig,
    view: watch::Sender<DisplayView>,
    cancel: CancellationToken,
) -> CloseReason {
    let mut backoff = Backoff::from_timing(&config.timing);
    let station_id = config.station_id.as_str();

    let reason = loop {
        set_state(&view, ConnectionState::Connecting);

        let attempt = tokio::select! {
            _ = cancel.cancelled() => break CloseReason::Requested,
            result = tokio::time::timeout(
                config.timing.keepalive_interval,
                connect_async(ws_url.as_str()),
            ) => result,
        };

        match attempt {
            Ok(Ok((stream, _response))) => {
                backoff.connected(Instant::now());
                set_state(&view, ConnectionState::Connected);
                tracing::info!(station_id = %station_id, "Display connected");

                match run_connection(stream, config.timing.keepalive_interval, &view, &cancel).await {
                    ConnectionEnd::Closed(reason) => break reason,
                    ConnectionEnd::Lost(cause) => {
                        tracing::warn!(station_id = %station_id, cause = %cause, "Display connection lost");
                    }
                }
            }
            Ok(Err(e)) => {
                tracing::warn!(station_id = %station_id, error = %e, "Display connect failed");
            }
            Err(_) => {
                tracing::warn!(station_id = %station_id, "Display connect timed out");
            }
        }

        set_state(&view, ConnectionState::Disconnected);
        let delay = backoff.next_delay(Instant::now());
        tracing::debug!(
            station_id = %station_id,
            attempt = backoff.attempt(),
            delay_ms = delay.as_millis() as u64,
            "Reconnect scheduled"
        );

        tokio::select! {
            _ = cancel.cancelled() => break CloseReason::Requested,
            _ = tokio::time::sleep(delay) => {}
        }
    };

    set_state(&view, ConnectionState::Closed(reason));
    tracing::info!(station_id = %station_id, reason = %reason, "Display session closed");
    reason
}

async fn run_connection(
    stream: WsStream,
    keepalive_interval: Duration,
    view: &watch::Sender<DisplayView>,
    cancel: &CancellationToken,
) -> ConnectionEnd {
    let (mut sink, mut stream) = stream.split();
    let mut keepalive =
        tokio::time::interval_at(Instant::now() + keepalive_interval, keepalive_interval);
    keepalive.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut heard_since_ping = true;

    let ping = match serde_json::to_string(&ClientMessage::Ping) {
        Ok(ping) => ping,
        Err(e) => return ConnectionEnd::Lost(e.to_string()),
    };

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                if let Err(cause) = send_bounded(&mut sink, Message::Close(None), keepalive_interval).await {
                    tracing::debug!(cause = %cause, "Close frame not delivered");
                }
                return ConnectionEnd::Closed(CloseReason::Requested);
            }
            _ = keepalive.tick() => {
                if !heard_since_ping {
                    return ConnectionEnd::Lost("keepalive timed out".to_string());
                }
                heard_since_ping = false;
                if let Err(cause) = send_bounded(&mut sink, Message::Text(ping.clone()), keepalive_interval).await {
                    return ConnectionEnd::Lost(cause);
                }
            }
            incoming = stream.next() => {
                let message = match incoming {
                    Some(Ok(message)) => message,
                    Some(Err(e)) => return ConnectionEnd::Lost(e.to_string()),
                    None => return ConnectionEnd::Lost("stream ended".to_string()),
                };
                heard_since_ping = true;

                match message {
                    Message::Text(text) => handle_text(&text, view),
                    Message::Close(frame) => {
                        let code = frame.as_ref().map(|f| u16::from(f.code));
                        return match code.and_then(CloseReason::from_close_code) {
                            Some(reason) => ConnectionEnd::Closed(reason),
                            None => ConnectionEnd::Lost(format!("server closed ({:?})", code)),
                        };
                    }
                    _ => {}
                }
            }
        }
    }
}

/// Write one frame, giving up after `limit` so a stalled peer cannot hold the session
async fn send_bounded<S>(sink: &mut S, message: Message, limit: Duration) -> Result<(), String>
where
    S: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    match tokio::time::timeout(limit, sink.send(message)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err("write timed out".to_string()),
    }
}

fn handle_text(text: &str, view: &watch::Sender<DisplayView>) {
    match serde_json::from_str::<ServerMessage>(text) {
        Ok(ServerMessage::QueueUpdate { data }) => {
            tracing::debug!(
                serving = data.currently_serving.len(),
                waiting = data.total_waiting,
                "Queue update received"
            );
            view.send_modify(|current| current.apply_snapshot(data));
        }
        Ok(ServerMessage::Pong { .. }) => {}
        Ok(ServerMessage::Error { code, message }) => {
            tracing::warn!(code = %code, message = %message, "Server reported an error");
        }
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring malformed server frame");
        }
    }
}
