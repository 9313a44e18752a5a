//! Board view model
//!
//! Holds the last applied snapshot together with the connection state, so a
//! renderer can tell a live board from a stale one. Snapshots replace the
//! view wholesale; applying the same snapshot twice is a no-op.

use chrono::{DateTime, Utc};
use qms_protocol::QueueSnapshot;

use crate::state::ConnectionState;

/// Banner shown while the board may be out of date
pub const RECONNECTING_BANNER: &str = "Reconnecting…";

/// What a display currently shows
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DisplayView {
    snapshot: Option<QueueSnapshot>,
    state: ConnectionState,
    updated_at: Option<DateTime<Utc>>,
}

impl DisplayView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the board with a fresh snapshot
    pub fn apply_snapshot(&mut self, snapshot: QueueSnapshot) {
        self.snapshot = Some(snapshot);
        self.updated_at = Some(Utc::now());
    }

    pub fn set_state(&mut self, state: ConnectionState) {
        self.state = state;
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn snapshot(&self) -> Option<&QueueSnapshot> {
        self.snapshot.as_ref()
    }

    /// When the last snapshot was applied
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    /// The board cannot be trusted as current unless connected
    pub fn is_stale(&self) -> bool {
        !self.state.is_connected()
    }

    /// Status line to overlay on the board, `None` when live
    pub fn status_banner(&self) -> Option<&'static str> {
        match self.state {
            ConnectionState::Connected => None,
            ConnectionState::Disconnected | ConnectionState::Connecting => {
                if self.snapshot.is_some() {
                    Some(RECONNECTING_BANNER)
                } else {
                    Some("Connecting…")
                }
            }
            ConnectionState::Closed(reason) if reason.requires_pairing() => {
                Some("Display not paired")
            }
            ConnectionState::Closed(_) => Some("Offline"),
        }
    }

    /// Plain-text rendering of the board, one line per row
    pub fn render_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        match (self.status_banner(), self.updated_at) {
            (Some(banner), Some(updated_at)) => lines.push(format!(
                "[{}] last update {}",
                banner,
                updated_at.format("%H:%M:%S UTC")
            )),
            (Some(banner), None) => lines.push(format!("[{}]", banner)),
            (None, _) => {}
        }

        let Some(snapshot) = &self.snapshot else {
            return lines;
        };

        for serving in &snapshot.currently_serving {
            lines.push(format!(
                "NOW SERVING {} at {}{}",
                serving.queue_number,
                serving.station_name,
                name_suffix(serving.patient_name.as_deref())
            ));
        }
        for entry in &snapshot.waiting_list {
            lines.push(format!(
                "{:>3}. {} {}{}",
                entry.position,
                entry.queue_number,
                entry.source_type,
                name_suffix(entry.patient_name.as_deref())
            ));
        }
        if !snapshot.no_show_list.is_empty() {
            let missed: Vec<&str> = snapshot
                .no_show_list
                .iter()
                .map(|entry| entry.queue_number.as_str())
                .collect();
            lines.push(format!("Missed: {}", missed.join(", ")));
        }
        lines.push(format!("Waiting: {}", snapshot.total_waiting));
        lines
    }
}

fn name_suffix(name: Option<&str>) -> String {
    name.map(|n| format!(" ({})", n)).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::CloseReason;
    use qms_protocol::{CalledPatient, QueueBoardEntry, QueueSourceType, ServerMessage};
    use uuid::Uuid;

    fn waiting(position: usize, seq: u32, source_type: QueueSourceType) -> QueueBoardEntry {
        QueueBoardEntry {
            id: Uuid::new_v4(),
            position,
            daily_sequence: seq,
            queue_number: format!("A{:03}", seq),
            source_type,
            priority: 0,
            patient_name: None,
            station_name: "Counter 1".to_string(),
        }
    }

    fn snapshot() -> QueueSnapshot {
        QueueSnapshot {
            currently_serving: vec![CalledPatient {
                id: Uuid::new_v4(),
                daily_sequence: 4,
                queue_number: "A004".to_string(),
                source_type: QueueSourceType::WalkIn,
                priority: 0,
                patient_name: Some("J. Doe".to_string()),
                station_name: "Counter 1".to_string(),
                called_at: Some(Utc::now()),
            }],
            waiting_list: vec![
                waiting(1, 2, QueueSourceType::Emergency),
                waiting(2, 3, QueueSourceType::OnlineBooking),
                waiting(3, 1, QueueSourceType::WalkIn),
            ],
            no_show_list: vec![],
            total_waiting: 3,
        }
    }

    #[test]
    fn test_applied_wire_snapshot_keeps_order() {
        let sent = snapshot();
        let frame = serde_json::to_string(&ServerMessage::queue_update(sent.clone())).unwrap();

        let mut view = DisplayView::new();
        match serde_json::from_str(&frame).unwrap() {
            ServerMessage::QueueUpdate { data } => view.apply_snapshot(data),
            other => panic!("unexpected message: {:?}", other),
        }

        let shown = view.snapshot().unwrap();
        assert_eq!(shown.waiting_numbers(), sent.waiting_numbers());
        assert_eq!(shown.total_waiting, sent.total_waiting);
        assert_eq!(shown, &sent);
    }

    #[test]
    fn test_apply_is_idempotent() {
        let mut view = DisplayView::new();
        view.apply_snapshot(snapshot());
        let once = view.snapshot().cloned();
        view.apply_snapshot(once.clone().unwrap());
        assert_eq!(view.snapshot().cloned(), once);
    }

    #[test]
    fn test_stale_unless_connected() {
        let mut view = DisplayView::new();
        assert!(view.is_stale());

        view.set_state(ConnectionState::Connected);
        view.apply_snapshot(snapshot());
        assert!(!view.is_stale());
        assert_eq!(view.status_banner(), None);

        view.set_state(ConnectionState::Disconnected);
        assert!(view.is_stale());
        assert_eq!(view.status_banner(), Some(RECONNECTING_BANNER));

        view.set_state(ConnectionState::Connecting);
        assert_eq!(view.status_banner(), Some(RECONNECTING_BANNER));
    }

    #[test]
    fn test_banner_before_first_snapshot() {
        let view = DisplayView::new();
        assert_eq!(view.status_banner(), Some("Connecting…"));
    }

    #[test]
    fn test_banner_when_closed() {
        let mut view = DisplayView::new();
        view.set_state(ConnectionState::Closed(CloseReason::Unpaired));
        assert_eq!(view.status_banner(), Some("Display not paired"));
        view.set_state(ConnectionState::Closed(CloseReason::Requested));
        assert_eq!(view.status_banner(), Some("Offline"));
    }

    #[test]
    fn test_render_lines() {
        let mut view = DisplayView::new();
        view.set_state(ConnectionState::Connected);
        view.apply_snapshot(snapshot());

        let lines = view.render_lines();
        assert_eq!(lines[0], "NOW SERVING A004 at Counter 1 (J. Doe)");
        assert_eq!(lines[1], "  1. A002 EMERGENCY");
        assert_eq!(lines.last().unwrap(), "Waiting: 3");

        view.set_state(ConnectionState::Disconnected);
        let banner = &view.render_lines()[0];
        let updated = view.updated_at().unwrap().format("%H:%M:%S UTC").to_string();
        assert_eq!(banner, &format!("[Reconnecting…] last update {}", updated));

        assert_eq!(DisplayView::new().render_lines(), vec!["[Connecting…]"]);
    }
}
