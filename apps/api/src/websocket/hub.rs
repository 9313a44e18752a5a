//! Broadcast hub for display subscriptions
//!
//! Tracks the live WebSocket sessions subscribed to each station and fans
//! queue snapshots out to them. Each subscription owns a small bounded
//! channel drained by its socket writer task; the hub only ever uses
//! `try_send`, so a slow or dead display can never stall the caller. A
//! subscription whose channel is full or closed is dropped on the spot.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use uuid::Uuid;

use qms_protocol::{QueueSnapshot, ServerMessage};

/// Default per-subscription buffer, in frames
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 16;

/// A serialized server message, shared by every recipient
pub type OutboundFrame = Arc<str>;

/// Handle for pushing frames to one subscribed display
///
/// Liveness is the transport's concern: a display that stops reading is
/// caught by the full buffer here or by the writer's send timeout.
#[derive(Debug)]
struct SubscriptionHandle {
    sender: mpsc::Sender<OutboundFrame>,
}

impl SubscriptionHandle {
    fn try_send(&self, frame: OutboundFrame) -> Result<(), SendError> {
        self.sender.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => SendError::BufferFull,
            TrySendError::Closed(_) => SendError::ConnectionClosed,
        })
    }
}

/// Receiving side of a subscription, owned by the socket task
///
/// Dropping it (or the guard obtained from `split`) deregisters the
/// subscription from the hub.
#[derive(Debug)]
pub struct Subscription {
    receiver: mpsc::Receiver<OutboundFrame>,
    guard: SubscriptionGuard,
}

impl Subscription {
    pub fn id(&self) -> Uuid {
        self.guard.id
    }

    pub fn station_id(&self) -> &str {
        &self.guard.station_id
    }

    /// Next frame to write, `None` once the hub dropped this subscription
    pub async fn recv(&mut self) -> Option<OutboundFrame> {
        self.receiver.recv().await
    }

    /// Split into the frame receiver and the deregistration guard
    pub fn split(self) -> (mpsc::Receiver<OutboundFrame>, SubscriptionGuard) {
        (self.receiver, self.guard)
    }
}

/// Deregisters a subscription when dropped
#[derive(Debug)]
pub struct SubscriptionGuard {
    pub id: Uuid,
    pub station_id: String,
    hub: BroadcastHub,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.hub.unsubscribe(&self.station_id, self.id);
    }
}

/// Per-station registry of display subscriptions
///
/// Uses DashMap for concurrent access without a global lock.
/// Wrapped in Arc for cheap cloning.
#[derive(Debug, Clone)]
pub struct BroadcastHub {
    /// station_id -> (subscription_id -> handle)
    stations: Arc<DashMap<String, DashMap<Uuid, SubscriptionHandle>>>,
    buffer: usize,
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_BUFFER)
    }
}

impl BroadcastHub {
    /// Create a hub whose subscriptions buffer at most `buffer` frames
    pub fn new(buffer: usize) -> Self {
        Self {
            stations: Arc::new(DashMap::new()),
            buffer: buffer.max(1),
        }
    }

    /// Register a subscription and queue `initial` as its first frame
    pub fn subscribe(&self, station_id: &str, initial: &ServerMessage) -> Subscription {
        let (tx, rx) = mpsc::channel(self.buffer);
        let id = Uuid::new_v4();
        let handle = SubscriptionHandle { sender: tx };

        if let Some(frame) = encode(initial) {
            // Fresh channel with capacity >= 1, cannot be full
            let _ = handle.try_send(frame);
        }

        self.stations
            .entry(station_id.to_string())
            .or_default()
            .insert(id, handle);

        tracing::debug!(
            station_id = %station_id,
            subscription_id = %id,
            subscriber_count = self.subscription_count(station_id),
            "Display subscribed"
        );

        Subscription {
            receiver: rx,
            guard: SubscriptionGuard {
                id,
                station_id: station_id.to_string(),
                hub: self.clone(),
            },
        }
    }

    /// Remove a subscription
    pub fn unsubscribe(&self, station_id: &str, id: Uuid) -> bool {
        let Some(subs) = self.stations.get(station_id) else {
            return false;
        };
        let removed = subs.remove(&id).is_some();
        let is_empty = subs.is_empty();
        drop(subs);

        if is_empty {
            self.stations
                .remove_if(station_id, |_, subs| subs.is_empty());
        }

        if removed {
            tracing::debug!(
                station_id = %station_id,
                subscription_id = %id,
                "Display unsubscribed"
            );
        }
        removed
    }

    /// Push one snapshot to every subscription of a station
    ///
    /// Returns the number of subscriptions that accepted the frame.
    pub fn publish(&self, station_id: &str, snapshot: &QueueSnapshot) -> usize {
        let Some(subs) = self.stations.get(station_id) else {
            return 0;
        };
        let Some(frame) = encode(&ServerMessage::queue_update(snapshot.clone())) else {
            return 0;
        };

        let mut sent = 0;
        let mut dropped = Vec::new();
        for entry in subs.iter() {
            match entry.value().try_send(frame.clone()) {
                Ok(()) => sent += 1,
                Err(e) => {
                    tracing::warn!(
                        station_id = %station_id,
                        subscription_id = %entry.key(),
                        reason = %e,
                        "Dropping display subscription"
                    );
                    dropped.push(*entry.key());
                }
            }
        }
        drop(subs);

        for id in dropped {
            self.unsubscribe(station_id, id);
        }

        tracing::trace!(station_id = %station_id, sent, "Snapshot published");
        sent
    }

    /// Push a message to a single subscription
    pub fn send_to(&self, station_id: &str, id: Uuid, msg: &ServerMessage) -> Result<(), SendError> {
        let subs = self
            .stations
            .get(station_id)
            .ok_or(SendError::StationNotFound)?;
        let handle = subs.get(&id).ok_or(SendError::SubscriptionNotFound)?;
        let frame = encode(msg).ok_or(SendError::Encoding)?;
        handle.try_send(frame)
    }

    /// Number of live subscriptions for a station
    pub fn subscription_count(&self, station_id: &str) -> usize {
        self.stations
            .get(station_id)
            .map(|subs| subs.len())
            .unwrap_or(0)
    }

    /// Total number of subscriptions across all stations
    pub fn total_subscriptions(&self) -> usize {
        self.stations.iter().map(|e| e.value().len()).sum()
    }

    /// Number of stations with at least one subscription
    pub fn station_count(&self) -> usize {
        self.stations.len()
    }
}

fn encode(msg: &ServerMessage) -> Option<OutboundFrame> {
    match serde_json::to_string(msg) {
        Ok(json) => Some(Arc::from(json)),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize message");
            None
        }
    }
}

/// Error type for send operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    StationNotFound,
    SubscriptionNotFound,
    BufferFull,
    ConnectionClosed,
    Encoding,
}

impl std::fmt::Display for SendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SendError::StationNotFound => write!(f, "station has no subscriptions"),
            SendError::SubscriptionNotFound => write!(f, "subscription not found"),
            SendError::BufferFull => write!(f, "send buffer full"),
            SendError::ConnectionClosed => write!(f, "connection closed"),
            SendError::Encoding => write!(f, "message could not be encoded"),
        }
    }
}

impl std::error::Error for SendError {}
