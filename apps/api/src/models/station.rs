//! Service stations
//!
//! Stations are configured by administrators outside this service and are
//! read-only here. They are loaded once at startup into a `StationDirectory`.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum length of a station identifier
pub const MAX_STATION_ID_LEN: usize = 64;

/// A physical service point that calls patients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Station {
    /// Immutable identifier, used in URLs
    pub id: String,
    /// Short human code, prefixed to queue numbers
    pub code: String,
    /// Display name shown on boards
    pub name: String,
}

impl Station {
    pub fn new(id: impl Into<String>, code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            code: code.into(),
            name: name.into(),
        }
    }

    /// Human-facing call number for a daily sequence, e.g. `A007`
    pub fn queue_number(&self, daily_sequence: u32) -> String {
        format!("{}{:03}", self.code, daily_sequence)
    }
}

/// Errors raised while loading the station directory
#[derive(Debug, Error)]
pub enum StationConfigError {
    #[error("station list is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid station id '{id}': {reason}")]
    InvalidId { id: String, reason: &'static str },

    #[error("station {0} has an empty code")]
    EmptyCode(String),

    #[error("duplicate station id: {0}")]
    Duplicate(String),
}

/// Validate station identifier format
pub fn validate_station_id(id: &str) -> Result<(), &'static str> {
    if id.is_empty() {
        return Err("station id cannot be empty");
    }
    if id.len() > MAX_STATION_ID_LEN {
        return Err("station id must be at most 64 characters");
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err("station id contains invalid characters");
    }
    Ok(())
}

/// Read-only set of configured stations
#[derive(Debug, Clone, Default)]
pub struct StationDirectory {
    stations: Arc<BTreeMap<String, Station>>,
}

impl StationDirectory {
    /// Build a directory, rejecting malformed or duplicate stations
    pub fn new(stations: Vec<Station>) -> Result<Self, StationConfigError> {
        let mut map = BTreeMap::new();
        for station in stations {
            validate_station_id(&station.id).map_err(|reason| StationConfigError::InvalidId {
                id: station.id.clone(),
                reason,
            })?;
            if station.code.trim().is_empty() {
                return Err(StationConfigError::EmptyCode(station.id));
            }
            if map.contains_key(&station.id) {
                return Err(StationConfigError::Duplicate(station.id));
            }
            map.insert(station.id.clone(), station);
        }
        Ok(Self {
            stations: Arc::new(map),
        })
    }

    /// Parse a JSON array of `{"id","code","name"}` objects
    pub fn from_json(json: &str) -> Result<Self, StationConfigError> {
        let stations: Vec<Station> = serde_json::from_str(json)?;
        Self::new(stations)
    }

    pub fn get(&self, id: &str) -> Option<&Station> {
        self.stations.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.stations.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Station> {
        self.stations.values()
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }
}
