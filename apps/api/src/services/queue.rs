//! Queue service
//!
//! Owns one `StationQueue` per configured station, each behind its own
//! mutex: mutations on the same station are serialized, different stations
//! never contend. Every mutation publishes the resulting snapshot to the
//! broadcast hub before the station lock is released, so displays receive
//! snapshots in mutation order. Publishing is non-blocking.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use uuid::Uuid;

use qms_protocol::{EntryStatus, QueueSnapshot, ServerMessage};

use crate::models::queue::{CallOutcome, NewEntry, QueueEntry, QueueError, StationQueue};
use crate::models::station::{Station, StationDirectory};
use crate::websocket::hub::{BroadcastHub, Subscription};

/// Queue operations for all stations
#[derive(Clone)]
pub struct QueueService {
    inner: Arc<QueueServiceInner>,
}

struct QueueServiceInner {
    stations: StationDirectory,
    queues: HashMap<String, Mutex<StationQueue>>,
    /// entry_id -> station_id, for operations addressed by entry only
    entry_index: DashMap<Uuid, String>,
    hub: BroadcastHub,
}

impl QueueService {
    /// Create a service with an empty queue for every configured station
    pub fn new(stations: StationDirectory, hub: BroadcastHub) -> Self {
        let queues = stations
            .iter()
            .map(|station| {
                (
                    station.id.clone(),
                    Mutex::new(StationQueue::new(station.clone())),
                )
            })
            .collect();

        Self {
            inner: Arc::new(QueueServiceInner {
                stations,
                queues,
                entry_index: DashMap::new(),
                hub,
            }),
        }
    }

    pub fn stations(&self) -> &StationDirectory {
        &self.inner.stations
    }

    pub fn station(&self, station_id: &str) -> Option<&Station> {
        self.inner.stations.get(station_id)
    }

    pub fn hub(&self) -> &BroadcastHub {
        &self.inner.hub
    }

    /// Add a waiting entry to a station's line
    pub fn enqueue(&self, station_id: &str, new_entry: NewEntry) -> Result<QueueEntry, QueueError> {
        self.enqueue_at(station_id, new_entry, Utc::now())
    }

    pub fn enqueue_at(
        &self,
        station_id: &str,
        new_entry: NewEntry,
        now: DateTime<Utc>,
    ) -> Result<QueueEntry, QueueError> {
        let index = &self.inner.entry_index;
        let entry = self.mutate(station_id, |queue| {
            // Day roll forgets yesterday's no-shows; drop them from the index too
            for id in queue.roll_day(now) {
                index.remove(&id);
            }
            let entry = queue.enqueue(new_entry, now);
            index.insert(entry.id, entry.station_id.clone());
            Ok(entry)
        })?;

        tracing::info!(
            station_id = %station_id,
            entry_id = %entry.id,
            daily_sequence = entry.daily_sequence,
            source_type = %entry.source_type,
            priority = entry.priority,
            "Entry enqueued"
        );
        Ok(entry)
    }

    /// Call the next patient, or return the one already being served
    pub fn call_next(&self, station_id: &str) -> Result<QueueEntry, QueueError> {
        let queue = self.queue(station_id)?;
        let mut queue = queue.lock();

        let outcome = queue.call_next(Utc::now())?;
        match &outcome {
            CallOutcome::Called(entry) => {
                self.publish_locked(&queue);
                tracing::info!(
                    station_id = %station_id,
                    entry_id = %entry.id,
                    daily_sequence = entry.daily_sequence,
                    "Patient called"
                );
            }
            CallOutcome::AlreadyServing(entry) => {
                tracing::debug!(
                    station_id = %station_id,
                    entry_id = %entry.id,
                    "Call next ignored, entry already serving"
                );
            }
        }
        Ok(outcome.into_entry())
    }

    /// SERVING -> COMPLETED
    pub fn complete(&self, entry_id: Uuid) -> Result<QueueEntry, QueueError> {
        let station_id = self.station_of(entry_id)?;
        let entry = self.mutate(&station_id, |queue| queue.complete(entry_id, Utc::now()))?;
        self.inner.entry_index.remove(&entry_id);

        tracing::info!(station_id = %station_id, entry_id = %entry_id, "Entry completed");
        Ok(entry)
    }

    /// SERVING -> NO_SHOW
    pub fn mark_no_show(&self, entry_id: Uuid) -> Result<QueueEntry, QueueError> {
        let station_id = self.station_of(entry_id)?;
        let entry = self.mutate(&station_id, |queue| queue.mark_no_show(entry_id, Utc::now()))?;

        tracing::info!(station_id = %station_id, entry_id = %entry_id, "Entry marked no-show");
        Ok(entry)
    }

    /// NO_SHOW -> WAITING, on explicit request of the reception workflow
    pub fn requeue(&self, entry_id: Uuid) -> Result<QueueEntry, QueueError> {
        let station_id = self.station_of(entry_id)?;
        let entry = self.mutate(&station_id, |queue| queue.requeue(entry_id, Utc::now()))?;

        tracing::info!(station_id = %station_id, entry_id = %entry_id, "Entry requeued");
        Ok(entry)
    }

    /// Apply a status change requested through the entry endpoint
    pub fn update_status(&self, entry_id: Uuid, status: EntryStatus) -> Result<QueueEntry, QueueError> {
        match status {
            EntryStatus::Completed => self.complete(entry_id),
            EntryStatus::NoShow => self.mark_no_show(entry_id),
            EntryStatus::Waiting => self.requeue(entry_id),
            EntryStatus::Serving => Err(QueueError::InvalidInput(
                "entries enter SERVING through call-next only".to_string(),
            )),
        }
    }

    /// Current board state of a station
    pub fn snapshot(&self, station_id: &str) -> Result<QueueSnapshot, QueueError> {
        Ok(self.queue(station_id)?.lock().snapshot())
    }

    /// Subscribe a display, queueing the current snapshot as its first frame
    ///
    /// Registration happens under the station lock, so no mutation can slip
    /// between the initial snapshot and the first broadcast.
    pub fn subscribe(&self, station_id: &str) -> Result<Subscription, QueueError> {
        let queue = self.queue(station_id)?;
        let queue = queue.lock();
        let initial = ServerMessage::queue_update(queue.snapshot());
        Ok(self.inner.hub.subscribe(station_id, &initial))
    }

    /// Number of entries addressable by id
    pub fn indexed_entries(&self) -> usize {
        self.inner.entry_index.len()
    }

    /// Serving entry count of a station
    pub fn serving_count(&self, station_id: &str) -> Result<usize, QueueError> {
        Ok(self.queue(station_id)?.lock().serving_count())
    }

    fn queue(&self, station_id: &str) -> Result<&Mutex<StationQueue>, QueueError> {
        self.inner
            .queues
            .get(station_id)
            .ok_or_else(|| QueueError::StationNotFound(station_id.to_string()))
    }

    fn station_of(&self, entry_id: Uuid) -> Result<String, QueueError> {
        self.inner
            .entry_index
            .get(&entry_id)
            .map(|station| station.value().clone())
            .ok_or(QueueError::EntryNotFound(entry_id))
    }

    /// Run a mutation under the station lock and broadcast on success
    fn mutate<T>(
        &self,
        station_id: &str,
        op: impl FnOnce(&mut StationQueue) -> Result<T, QueueError>,
    ) -> Result<T, QueueError> {
        let queue = self.queue(station_id)?;
        let mut queue = queue.lock();
        let result = op(&mut queue)?;
        self.publish_locked(&queue);
        Ok(result)
    }

    fn publish_locked(&self, queue: &StationQueue) {
        let station_id = &queue.station().id;
        let sent = self.inner.hub.publish(station_id, &queue.snapshot());
        tracing::debug!(station_id = %station_id, displays = sent, "Queue update broadcast");
    }
}
