//! Connection state of a display session

use std::fmt;

use qms_protocol::{CLOSE_STATION_MISMATCH, CLOSE_UNPAIRED};

/// Why a session reached the terminal `Closed` state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The owner asked the session to stop
    Requested,
    /// The server no longer knows this display's client token
    Unpaired,
    /// The client token is bound to a different station
    StationMismatch,
}

impl CloseReason {
    /// Map a server close code to a terminal reason, if it is one
    pub fn from_close_code(code: u16) -> Option<Self> {
        match code {
            CLOSE_UNPAIRED => Some(CloseReason::Unpaired),
            CLOSE_STATION_MISMATCH => Some(CloseReason::StationMismatch),
            _ => None,
        }
    }

    /// Whether the display has to go through pairing again
    pub fn requires_pairing(&self) -> bool {
        matches!(self, CloseReason::Unpaired | CloseReason::StationMismatch)
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::Requested => write!(f, "closed on request"),
            CloseReason::Unpaired => write!(f, "display is not paired"),
            CloseReason::StationMismatch => write!(f, "display is paired with another station"),
        }
    }
}

/// Connection state machine
///
/// `Disconnected -> Connecting -> Connected -> (on loss) Disconnected`, plus
/// the terminal `Closed`, reachable only by explicit intent or a server
/// rejection of the display's identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Closed(CloseReason),
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, ConnectionState::Closed(_))
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "DISCONNECTED"),
            ConnectionState::Connecting => write!(f, "CONNECTING"),
            ConnectionState::Connected => write!(f, "CONNECTED"),
            ConnectionState::Closed(_) => write!(f, "CLOSED"),
        }
    }
}
