//! Queue vocabulary and the board snapshot pushed to displays

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// =============================================================================
// Queue Vocabulary
// =============================================================================

/// Intake channel that produced a queue entry
///
/// Declaration order is precedence order: an emergency always outranks an
/// online booking, which always outranks a walk-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueueSourceType {
    Emergency,
    OnlineBooking,
    WalkIn,
}

impl QueueSourceType {
    /// All source types in precedence order
    pub const ALL: [QueueSourceType; 3] = [Self::Emergency, Self::OnlineBooking, Self::WalkIn];

    /// Precedence rank, lower is served first
    pub fn precedence(self) -> u8 {
        match self {
            Self::Emergency => 0,
            Self::OnlineBooking => 1,
            Self::WalkIn => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Emergency => "EMERGENCY",
            Self::OnlineBooking => "ONLINE_BOOKING",
            Self::WalkIn => "WALK_IN",
        }
    }
}

impl std::fmt::Display for QueueSourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a source type string is not one of the three known channels
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown queue source type: {0}")]
pub struct ParseSourceTypeError(pub String);

impl std::str::FromStr for QueueSourceType {
    type Err = ParseSourceTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "EMERGENCY" => Ok(Self::Emergency),
            "ONLINE_BOOKING" => Ok(Self::OnlineBooking),
            "WALK_IN" => Ok(Self::WalkIn),
            _ => Err(ParseSourceTypeError(s.to_string())),
        }
    }
}

/// Lifecycle state of a queue entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryStatus {
    Waiting,
    Serving,
    Completed,
    NoShow,
}

impl std::fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Waiting => write!(f, "WAITING"),
            Self::Serving => write!(f, "SERVING"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::NoShow => write!(f, "NO_SHOW"),
        }
    }
}

// =============================================================================
// Board Payloads
// =============================================================================

/// Patient currently being served at the station
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalledPatient {
    pub id: Uuid,
    pub daily_sequence: u32,
    /// Station code followed by the zero-padded sequence, e.g. `A007`
    pub queue_number: String,
    pub source_type: QueueSourceType,
    pub priority: u32,
    pub patient_name: Option<String>,
    pub station_name: String,
    pub called_at: Option<DateTime<Utc>>,
}

/// Waiting entry with its 1-based board position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueBoardEntry {
    pub id: Uuid,
    pub position: usize,
    pub daily_sequence: u32,
    pub queue_number: String,
    pub source_type: QueueSourceType,
    pub priority: u32,
    pub patient_name: Option<String>,
    pub station_name: String,
}

/// Entry that was called but did not show up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoShowEntry {
    pub id: Uuid,
    pub daily_sequence: u32,
    pub queue_number: String,
    pub patient_name: Option<String>,
    pub ended_at: Option<DateTime<Utc>>,
}

/// Full queue state of one station
///
/// Displays replace their local view with this wholesale on every update.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub currently_serving: Vec<CalledPatient>,
    pub waiting_list: Vec<QueueBoardEntry>,
    pub no_show_list: Vec<NoShowEntry>,
    pub total_waiting: usize,
}

impl QueueSnapshot {
    /// Queue numbers of the waiting list in board order
    pub fn waiting_numbers(&self) -> Vec<&str> {
        self.waiting_list
            .iter()
            .map(|entry| entry.queue_number.as_str())
            .collect()
    }

    /// Whether the snapshot shows nobody waiting, serving, or missed
    pub fn is_empty(&self) -> bool {
        self.currently_serving.is_empty()
            && self.waiting_list.is_empty()
            && self.no_show_list.is_empty()
    }
}
