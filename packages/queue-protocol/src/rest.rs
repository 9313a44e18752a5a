//! Request and response bodies for the pairing and counter endpoints

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::board::EntryStatus;

/// Response to `POST /qms/display/register`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterResponse {
    /// Code shown on the display for staff to type in
    pub code: String,
    /// Secret the display keeps to identify itself when subscribing
    pub client_token: String,
    /// After this instant an unconfirmed code is gone
    pub expires_at: DateTime<Utc>,
}

/// Response to `GET /qms/display/{code}/status`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PairingStatus {
    pub paired: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub station_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub station_name: Option<String>,
}

impl PairingStatus {
    pub fn unpaired() -> Self {
        Self::default()
    }

    pub fn paired(station_id: impl Into<String>, station_name: impl Into<String>) -> Self {
        Self {
            paired: true,
            station_id: Some(station_id.into()),
            station_name: Some(station_name.into()),
        }
    }
}

/// Body of `POST /qms/stations/{station_id}/pair`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairRequest {
    pub code: String,
}

/// Body of `DELETE /qms/display/pairing`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnpairRequest {
    pub client_token: String,
}

/// Body of `POST /qms/stations/{station_id}/entries`
///
/// Fields are loosely typed on purpose so the server can answer malformed
/// values with its own validation error instead of a deserialization failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnqueueRequest {
    pub source_type: String,
    #[serde(default)]
    pub priority: i64,
    #[serde(default)]
    pub patient_name: Option<String>,
}

/// Body of `PATCH /qms/queue-entries/{id}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateEntryRequest {
    pub status: EntryStatus,
}
