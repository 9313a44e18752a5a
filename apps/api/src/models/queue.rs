//! Per-station waiting queue
//!
//! `StationQueue` is the pure queue model of one station: entries, their
//! lifecycle transitions, daily sequence assignment, and the ordering rule
//! that produces board positions. It performs no I/O and no locking; callers
//! serialize access per station (see `services::queue`).
//!
//! Waiting order:
//! 1. source type precedence (EMERGENCY, ONLINE_BOOKING, WALK_IN)
//! 2. priority, highest first
//! 3. creation time, earliest first
//! 4. daily sequence, lowest first (only matters on identical timestamps)

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use qms_protocol::{
    CalledPatient, EntryStatus, NoShowEntry, QueueBoardEntry, QueueSnapshot, QueueSourceType,
};

use super::station::Station;

/// Maximum length of a patient display name
pub const MAX_PATIENT_NAME_LEN: usize = 128;

/// Errors raised by queue operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("station not found: {0}")]
    StationNotFound(String),

    #[error("queue entry not found: {0}")]
    EntryNotFound(Uuid),

    #[error("no waiting entries for station {0}")]
    QueueEmpty(String),

    #[error("entry {id} is {actual}, expected {expected}")]
    InvalidState {
        id: Uuid,
        actual: EntryStatus,
        expected: EntryStatus,
    },
}

/// One patient's ticket in a station's line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: Uuid,
    pub station_id: String,
    pub source_type: QueueSourceType,
    /// 0 = none, higher = more urgent
    pub priority: u32,
    /// Human-facing call number, restarts at 1 every calendar day
    pub daily_sequence: u32,
    pub patient_name: Option<String>,
    pub status: EntryStatus,
    pub created_at: DateTime<Utc>,
    pub called_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

/// Validated parameters for a new queue entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntry {
    pub source_type: QueueSourceType,
    pub priority: u32,
    pub patient_name: Option<String>,
}

impl NewEntry {
    pub fn new(source_type: QueueSourceType, priority: u32) -> Self {
        Self {
            source_type,
            priority,
            patient_name: None,
        }
    }

    pub fn with_patient_name(mut self, name: impl Into<String>) -> Self {
        self.patient_name = Some(name.into());
        self
    }

    /// Validate loosely typed enqueue parameters
    ///
    /// Blank patient names are treated as withheld.
    pub fn parse(
        source_type: &str,
        priority: i64,
        patient_name: Option<String>,
    ) -> Result<Self, QueueError> {
        let source_type = source_type
            .parse::<QueueSourceType>()
            .map_err(|e| QueueError::InvalidInput(e.to_string()))?;

        if priority < 0 {
            return Err(QueueError::InvalidInput(format!(
                "priority must be non-negative (got {})",
                priority
            )));
        }
        let priority = u32::try_from(priority).map_err(|_| {
            QueueError::InvalidInput(format!("priority is too large (got {})", priority))
        })?;

        let patient_name = patient_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());
        if let Some(name) = &patient_name {
            if name.chars().count() > MAX_PATIENT_NAME_LEN {
                return Err(QueueError::InvalidInput(format!(
                    "patient name must be at most {} characters",
                    MAX_PATIENT_NAME_LEN
                )));
            }
        }

        Ok(Self {
            source_type,
            priority,
            patient_name,
        })
    }
}

/// Result of a call-next request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    /// A waiting entry was promoted to SERVING
    Called(QueueEntry),
    /// An entry was already being served; nothing changed
    AlreadyServing(QueueEntry),
}

impl CallOutcome {
    pub fn entry(&self) -> &QueueEntry {
        match self {
            Self::Called(entry) | Self::AlreadyServing(entry) => entry,
        }
    }

    pub fn into_entry(self) -> QueueEntry {
        match self {
            Self::Called(entry) | Self::AlreadyServing(entry) => entry,
        }
    }

    /// Whether the queue state changed
    pub fn is_mutation(&self) -> bool {
        matches!(self, Self::Called(_))
    }
}

/// Total order of the waiting set
pub fn waiting_order(a: &QueueEntry, b: &QueueEntry) -> Ordering {
    a.source_type
        .precedence()
        .cmp(&b.source_type.precedence())
        .then_with(|| b.priority.cmp(&a.priority))
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.daily_sequence.cmp(&b.daily_sequence))
}

/// Queue state of a single station
#[derive(Debug, Clone)]
pub struct StationQueue {
    station: Station,
    entries: Vec<QueueEntry>,
    sequence_day: Option<NaiveDate>,
    last_sequence: u32,
}

impl StationQueue {
    pub fn new(station: Station) -> Self {
        Self {
            station,
            entries: Vec::new(),
            sequence_day: None,
            last_sequence: 0,
        }
    }

    pub fn station(&self) -> &Station {
        &self.station
    }

    pub fn get(&self, id: Uuid) -> Option<&QueueEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    /// The entry currently being served, if any
    pub fn serving(&self) -> Option<&QueueEntry> {
        self.entries
            .iter()
            .find(|entry| entry.status == EntryStatus::Serving)
    }

    pub fn serving_count(&self) -> usize {
        self.count(EntryStatus::Serving)
    }

    pub fn waiting_count(&self) -> usize {
        self.count(EntryStatus::Waiting)
    }

    fn count(&self, status: EntryStatus) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.status == status)
            .count()
    }

    /// Waiting entries in board order
    pub fn ordered_waiting(&self) -> Vec<&QueueEntry> {
        let mut waiting: Vec<&QueueEntry> = self
            .entries
            .iter()
            .filter(|entry| entry.status == EntryStatus::Waiting)
            .collect();
        waiting.sort_by(|a, b| waiting_order(a, b));
        waiting
    }

    /// Add a WAITING entry with the next daily sequence number
    pub fn enqueue(&mut self, new_entry: NewEntry, now: DateTime<Utc>) -> QueueEntry {
        self.roll_day(now);
        self.last_sequence += 1;

        let entry = QueueEntry {
            id: Uuid::new_v4(),
            station_id: self.station.id.clone(),
            source_type: new_entry.source_type,
            priority: new_entry.priority,
            daily_sequence: self.last_sequence,
            patient_name: new_entry.patient_name,
            status: EntryStatus::Waiting,
            created_at: now,
            called_at: None,
            ended_at: None,
        };
        self.entries.push(entry.clone());
        entry
    }

    /// Promote the highest-ordered waiting entry, unless one is already serving
    pub fn call_next(&mut self, now: DateTime<Utc>) -> Result<CallOutcome, QueueError> {
        if let Some(serving) = self.serving() {
            return Ok(CallOutcome::AlreadyServing(serving.clone()));
        }

        let next_id = self
            .ordered_waiting()
            .first()
            .map(|entry| entry.id)
            .ok_or_else(|| QueueError::QueueEmpty(self.station.id.clone()))?;

        let entry = self.entry_mut(next_id)?;
        entry.status = EntryStatus::Serving;
        entry.called_at = Some(now);
        Ok(CallOutcome::Called(entry.clone()))
    }

    /// SERVING -> COMPLETED
    ///
    /// Completed entries leave the board, so they are dropped from memory.
    pub fn complete(&mut self, id: Uuid, now: DateTime<Utc>) -> Result<QueueEntry, QueueError> {
        let entry = self.finish(id, EntryStatus::Completed, now)?;
        self.entries.retain(|e| e.id != id);
        Ok(entry)
    }

    /// SERVING -> NO_SHOW
    pub fn mark_no_show(&mut self, id: Uuid, now: DateTime<Utc>) -> Result<QueueEntry, QueueError> {
        self.finish(id, EntryStatus::NoShow, now)
    }

    /// NO_SHOW -> WAITING, back of its lane
    pub fn requeue(&mut self, id: Uuid, now: DateTime<Utc>) -> Result<QueueEntry, QueueError> {
        let entry = self.entry_mut(id)?;
        expect_status(entry, EntryStatus::NoShow)?;
        entry.status = EntryStatus::Waiting;
        entry.created_at = now;
        entry.called_at = None;
        entry.ended_at = None;
        Ok(entry.clone())
    }

    fn finish(
        &mut self,
        id: Uuid,
        status: EntryStatus,
        now: DateTime<Utc>,
    ) -> Result<QueueEntry, QueueError> {
        let entry = self.entry_mut(id)?;
        expect_status(entry, EntryStatus::Serving)?;
        entry.status = status;
        entry.ended_at = Some(now);
        Ok(entry.clone())
    }

    fn entry_mut(&mut self, id: Uuid) -> Result<&mut QueueEntry, QueueError> {
        self.entries
            .iter_mut()
            .find(|entry| entry.id == id)
            .ok_or(QueueError::EntryNotFound(id))
    }

    /// Restart the sequence on a new calendar day and forget old no-shows
    ///
    /// Returns the ids of the no-shows that were dropped.
    pub fn roll_day(&mut self, now: DateTime<Utc>) -> Vec<Uuid> {
        let today = now.date_naive();
        if self.sequence_day == Some(today) {
            return Vec::new();
        }
        if self.sequence_day.is_some() {
            tracing::info!(
                station_id = %self.station.id,
                day = %today,
                "Daily sequence reset"
            );
        }
        self.sequence_day = Some(today);
        self.last_sequence = 0;

        let mut pruned = Vec::new();
        self.entries.retain(|entry| {
            let stale = entry.status == EntryStatus::NoShow
                && entry.ended_at.map_or(false, |t| t.date_naive() < today);
            if stale {
                pruned.push(entry.id);
            }
            !stale
        });
        pruned
    }

    /// Full board state, with positions derived from the waiting order
    pub fn snapshot(&self) -> QueueSnapshot {
        let station = &self.station;

        let currently_serving: Vec<CalledPatient> = self
            .entries
            .iter()
            .filter(|entry| entry.status == EntryStatus::Serving)
            .map(|entry| CalledPatient {
                id: entry.id,
                daily_sequence: entry.daily_sequence,
                queue_number: station.queue_number(entry.daily_sequence),
                source_type: entry.source_type,
                priority: entry.priority,
                patient_name: entry.patient_name.clone(),
                station_name: station.name.clone(),
                called_at: entry.called_at,
            })
            .collect();

        let waiting_list: Vec<QueueBoardEntry> = self
            .ordered_waiting()
            .into_iter()
            .enumerate()
            .map(|(index, entry)| QueueBoardEntry {
                id: entry.id,
                position: index + 1,
                daily_sequence: entry.daily_sequence,
                queue_number: station.queue_number(entry.daily_sequence),
                source_type: entry.source_type,
                priority: entry.priority,
                patient_name: entry.patient_name.clone(),
                station_name: station.name.clone(),
            })
            .collect();

        let mut no_shows: Vec<&QueueEntry> = self
            .entries
            .iter()
            .filter(|entry| entry.status == EntryStatus::NoShow)
            .collect();
        no_shows.sort_by_key(|entry| (entry.ended_at, entry.daily_sequence));
        let no_show_list = no_shows
            .into_iter()
            .map(|entry| NoShowEntry {
                id: entry.id,
                daily_sequence: entry.daily_sequence,
                queue_number: station.queue_number(entry.daily_sequence),
                patient_name: entry.patient_name.clone(),
                ended_at: entry.ended_at,
            })
            .collect();

        QueueSnapshot {
            total_waiting: waiting_list.len(),
            currently_serving,
            waiting_list,
            no_show_list,
        }
    }
}

fn expect_status(entry: &QueueEntry, expected: EntryStatus) -> Result<(), QueueError> {
    if entry.status == expected {
        Ok(())
    } else {
        Err(QueueError::InvalidState {
            id: entry.id,
            actual: entry.status,
            expected,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;
    use rstest::rstest;

    fn station() -> Station {
        Station::new("station-1", "A", "Counter 1")
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap()
    }

    fn walk_in() -> NewEntry {
        NewEntry::new(QueueSourceType::WalkIn, 0)
    }

    #[test]
    fn test_enqueue_assigns_daily_sequence() {
        let mut queue = StationQueue::new(station());
        let first = queue.enqueue(walk_in(), t0());
        let second = queue.enqueue(walk_in(), t0() + Duration::seconds(1));

        assert_eq!(first.daily_sequence, 1);
        assert_eq!(second.daily_sequence, 2);
        assert_eq!(first.status, EntryStatus::Waiting);
        assert_eq!(first.station_id, "station-1");
    }

    #[test]
    fn test_sequence_resets_on_new_day() {
        let mut queue = StationQueue::new(station());
        queue.enqueue(walk_in(), t0());
        queue.enqueue(walk_in(), t0());

        let next_day = queue.enqueue(walk_in(), t0() + Duration::days(1));
        assert_eq!(next_day.daily_sequence, 1);
    }

    #[test]
    fn test_new_day_prunes_old_no_shows() {
        let mut queue = StationQueue::new(station());
        let entry = queue.enqueue(walk_in(), t0());
        queue.call_next(t0()).unwrap();
        queue.mark_no_show(entry.id, t0()).unwrap();
        assert_eq!(queue.snapshot().no_show_list.len(), 1);

        assert!(queue.roll_day(t0() + Duration::hours(1)).is_empty());
        assert_eq!(queue.roll_day(t0() + Duration::days(1)), vec![entry.id]);
        queue.enqueue(walk_in(), t0() + Duration::days(1));
        assert!(queue.snapshot().no_show_list.is_empty());
        assert!(queue.get(entry.id).is_none());
    }

    #[test]
    fn test_mixed_sources_order() {
        let mut queue = StationQueue::new(station());
        queue.enqueue(NewEntry::new(QueueSourceType::WalkIn, 0), t0());
        queue.enqueue(
            NewEntry::new(QueueSourceType::Emergency, 0),
            t0() + Duration::seconds(1),
        );
        queue.enqueue(
            NewEntry::new(QueueSourceType::OnlineBooking, 0),
            t0() + Duration::seconds(2),
        );

        let sources: Vec<QueueSourceType> = queue
            .snapshot()
            .waiting_list
            .iter()
            .map(|entry| entry.source_type)
            .collect();
        assert_eq!(
            sources,
            vec![
                QueueSourceType::Emergency,
                QueueSourceType::OnlineBooking,
                QueueSourceType::WalkIn
            ]
        );
    }

    #[test]
    fn test_priority_then_fifo_within_source() {
        let mut queue = StationQueue::new(station());
        let early = queue.enqueue(walk_in(), t0());
        let urgent = queue.enqueue(
            NewEntry::new(QueueSourceType::WalkIn, 3),
            t0() + Duration::seconds(5),
        );
        let late = queue.enqueue(walk_in(), t0() + Duration::seconds(9));

        let snapshot = queue.snapshot();
        let ids: Vec<Uuid> = snapshot.waiting_list.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![urgent.id, early.id, late.id]);
        let positions: Vec<usize> = snapshot.waiting_list.iter().map(|e| e.position).collect();
        assert_eq!(positions, vec![1, 2, 3]);
        assert_eq!(snapshot.total_waiting, 3);
    }

    #[test]
    fn test_call_next_is_idempotent() {
        let mut queue = StationQueue::new(station());
        queue.enqueue(walk_in(), t0());
        queue.enqueue(walk_in(), t0() + Duration::seconds(1));

        let first = queue.call_next(t0()).unwrap();
        let second = queue.call_next(t0() + Duration::seconds(30)).unwrap();

        assert!(first.is_mutation());
        assert!(!second.is_mutation());
        assert_eq!(first.entry(), second.entry());
        assert_eq!(second.entry().called_at, Some(t0()));
        assert_eq!(queue.serving_count(), 1);
        assert_eq!(queue.waiting_count(), 1);
    }

    #[test]
    fn test_call_next_empty() {
        let mut queue = StationQueue::new(station());
        assert_matches!(queue.call_next(t0()), Err(QueueError::QueueEmpty(id)) if id == "station-1");
    }

    #[test]
    fn test_complete_removes_entry() {
        let mut queue = StationQueue::new(station());
        let entry = queue.enqueue(walk_in(), t0());
        queue.call_next(t0()).unwrap();

        let done = queue.complete(entry.id, t0() + Duration::minutes(3)).unwrap();
        assert_eq!(done.status, EntryStatus::Completed);
        assert_eq!(done.ended_at, Some(t0() + Duration::minutes(3)));
        assert!(queue.get(entry.id).is_none());
        assert!(queue.snapshot().is_empty());
    }

    #[test]
    fn test_complete_rejects_non_serving() {
        let mut queue = StationQueue::new(station());
        let entry = queue.enqueue(walk_in(), t0());

        assert_matches!(
            queue.complete(entry.id, t0()),
            Err(QueueError::InvalidState {
                actual: EntryStatus::Waiting,
                expected: EntryStatus::Serving,
                ..
            })
        );
        assert_matches!(
            queue.mark_no_show(Uuid::new_v4(), t0()),
            Err(QueueError::EntryNotFound(_))
        );
    }

    #[test]
    fn test_no_show_then_requeue() {
        let mut queue = StationQueue::new(station());
        let missed = queue.enqueue(walk_in(), t0());
        let other = queue.enqueue(walk_in(), t0() + Duration::seconds(1));
        queue.call_next(t0()).unwrap();
        queue.mark_no_show(missed.id, t0() + Duration::minutes(1)).unwrap();

        let snapshot = queue.snapshot();
        assert!(snapshot.currently_serving.is_empty());
        assert_eq!(snapshot.no_show_list.len(), 1);
        assert_eq!(snapshot.no_show_list[0].queue_number, "A001");
        assert_eq!(snapshot.waiting_list.len(), 1);

        // A second no-show mark on the same entry is an invalid transition
        assert_matches!(
            queue.mark_no_show(missed.id, t0()),
            Err(QueueError::InvalidState { .. })
        );

        let back = queue.requeue(missed.id, t0() + Duration::minutes(2)).unwrap();
        assert_eq!(back.status, EntryStatus::Waiting);
        assert_eq!(back.daily_sequence, 1);
        let ids: Vec<Uuid> = queue.snapshot().waiting_list.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![other.id, missed.id]);
    }

    #[test]
    fn test_requeue_requires_no_show() {
        let mut queue = StationQueue::new(station());
        let entry = queue.enqueue(walk_in(), t0());
        assert_matches!(
            queue.requeue(entry.id, t0()),
            Err(QueueError::InvalidState {
                expected: EntryStatus::NoShow,
                ..
            })
        );
    }

    #[test]
    fn test_snapshot_serving_fields() {
        let mut queue = StationQueue::new(station());
        queue.enqueue(
            NewEntry::new(QueueSourceType::Emergency, 2).with_patient_name("Jane"),
            t0(),
        );
        queue.call_next(t0() + Duration::seconds(10)).unwrap();

        let serving = &queue.snapshot().currently_serving[0];
        assert_eq!(serving.queue_number, "A001");
        assert_eq!(serving.station_name, "Counter 1");
        assert_eq!(serving.patient_name.as_deref(), Some("Jane"));
        assert_eq!(serving.called_at, Some(t0() + Duration::seconds(10)));
    }

    #[rstest]
    #[case("WALK_IN", 0, None, true)]
    #[case("emergency", 5, Some("  Ana  "), true)]
    #[case("VIP", 0, None, false)]
    #[case("WALK_IN", -1, None, false)]
    #[case("ONLINE_BOOKING", i64::from(u32::MAX) + 1, None, false)]
    fn test_new_entry_parse(
        #[case] source: &str,
        #[case] priority: i64,
        #[case] name: Option<&str>,
        #[case] ok: bool,
    ) {
        let result = NewEntry::parse(source, priority, name.map(String::from));
        assert_eq!(result.is_ok(), ok, "{:?}", result);
        if let Err(err) = result {
            assert_matches!(err, QueueError::InvalidInput(_));
        }
    }

    #[test]
    fn test_new_entry_parse_trims_name() {
        let entry = NewEntry::parse("WALK_IN", 0, Some("  Ana  ".into())).unwrap();
        assert_eq!(entry.patient_name.as_deref(), Some("Ana"));

        let blank = NewEntry::parse("WALK_IN", 0, Some("   ".into())).unwrap();
        assert!(blank.patient_name.is_none());

        assert!(NewEntry::parse("WALK_IN", 0, Some("x".repeat(129))).is_err());
    }

    #[derive(Debug, Clone)]
    enum Op {
        Enqueue(QueueSourceType, u32),
        CallNext,
        Complete,
        NoShow,
        Requeue,
    }

    fn arb_op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (
                prop_oneof![
                    Just(QueueSourceType::Emergency),
                    Just(QueueSourceType::OnlineBooking),
                    Just(QueueSourceType::WalkIn),
                ],
                0u32..4
            )
                .prop_map(|(source, priority)| Op::Enqueue(source, priority)),
            Just(Op::CallNext),
            Just(Op::Complete),
            Just(Op::NoShow),
            Just(Op::Requeue),
        ]
    }

    proptest! {
        #[test]
        fn prop_at_most_one_serving(ops in prop::collection::vec(arb_op(), 0..64)) {
            let mut queue = StationQueue::new(station());
            let mut now = t0();

            for op in ops {
                now += Duration::seconds(1);
                match op {
                    Op::Enqueue(source, priority) => {
                        queue.enqueue(NewEntry::new(source, priority), now);
                    }
                    Op::CallNext => {
                        let _ = queue.call_next(now);
                    }
                    Op::Complete => {
                        if let Some(id) = queue.serving().map(|e| e.id) {
                            queue.complete(id, now).unwrap();
                        }
                    }
                    Op::NoShow => {
                        if let Some(id) = queue.serving().map(|e| e.id) {
                            queue.mark_no_show(id, now).unwrap();
                        }
                    }
                    Op::Requeue => {
                        let missed = queue.snapshot().no_show_list.first().map(|e| e.id);
                        if let Some(id) = missed {
                            queue.requeue(id, now).unwrap();
                        }
                    }
                }

                prop_assert!(queue.serving_count() <= 1);

                let snapshot = queue.snapshot();
                prop_assert_eq!(snapshot.total_waiting, snapshot.waiting_list.len());
                prop_assert!(snapshot.currently_serving.len() <= 1);
                for pair in queue.ordered_waiting().windows(2) {
                    prop_assert_eq!(waiting_order(pair[0], pair[1]), Ordering::Less);
                }
            }
        }
    }
}
