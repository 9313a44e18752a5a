//! Display pairing registry
//!
//! Unauthenticated displays register to obtain a short code, show it on
//! screen, and wait for a staff member to confirm it against a station.
//! The display keeps a secret client token from registration and presents
//! it when subscribing, so reconnects never need the code again.
//!
//! Lifecycle: ISSUED -> CONFIRMED -> bound (first successful subscribe).
//! Unconfirmed codes expire after `code_ttl`. Confirmed sessions live in a
//! sliding `binding_ttl` window renewed by every successful resolution.
//! Expiry is checked lazily on access; `purge_expired` keeps memory bounded.

use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rand::Rng;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use qms_protocol::{PairingStatus, RegisterResponse};

use crate::models::station::StationDirectory;

/// Characters used in pairing codes (no 0/O, 1/I/L)
pub const PAIRING_CODE_ALPHABET: &[u8] = b"23456789ABCDEFGHJKMNPQRSTUVWXYZ";

/// Length of a pairing code
pub const PAIRING_CODE_LEN: usize = 6;

const MAX_CODE_ATTEMPTS: usize = 32;

/// Errors raised by pairing operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PairingError {
    #[error("pairing code not found: {0}")]
    NotFound(String),

    #[error("pairing code expired: {0}")]
    Expired(String),

    #[error("pairing code {0} is already paired with another station")]
    Conflict(String),

    #[error("station not found: {0}")]
    StationNotFound(String),

    #[error("display is not paired")]
    Unpaired,
}

/// Timing of pairing sessions
#[derive(Debug, Clone, Copy)]
pub struct PairingConfig {
    /// How long an unconfirmed code stays valid
    pub code_ttl: Duration,
    /// Sliding validity of a confirmed pairing
    pub binding_ttl: Duration,
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            code_ttl: Duration::minutes(10),
            binding_ttl: Duration::hours(24),
        }
    }
}

/// Lifecycle state of a pairing session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingState {
    Issued,
    Confirmed,
    Bound,
}

/// Ephemeral link between a display's client token and a station
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingSession {
    pub code: String,
    pub client_token: String,
    pub station_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub bound_at: Option<DateTime<Utc>>,
}

impl PairingSession {
    pub fn state(&self) -> PairingState {
        match (&self.station_id, self.bound_at) {
            (None, _) => PairingState::Issued,
            (Some(_), None) => PairingState::Confirmed,
            (Some(_), Some(_)) => PairingState::Bound,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Normalize user-typed codes; `None` if it cannot be a valid code
pub fn normalize_code(code: &str) -> Option<String> {
    let code = code.trim().to_ascii_uppercase();
    let valid = code.len() == PAIRING_CODE_LEN
        && code.bytes().all(|b| PAIRING_CODE_ALPHABET.contains(&b));
    valid.then_some(code)
}

fn generate_code<R: Rng>(rng: &mut R) -> String {
    (0..PAIRING_CODE_LEN)
        .map(|_| PAIRING_CODE_ALPHABET[rng.gen_range(0..PAIRING_CODE_ALPHABET.len())] as char)
        .collect()
}

/// Registry of pairing sessions
///
/// Wrapped in Arc for cheap cloning.
#[derive(Debug, Clone)]
pub struct PairingRegistry {
    inner: Arc<PairingRegistryInner>,
}

#[derive(Debug)]
struct PairingRegistryInner {
    stations: StationDirectory,
    config: PairingConfig,
    /// code -> session
    sessions: DashMap<String, PairingSession>,
    /// client_token -> code
    tokens: DashMap<String, String>,
}

impl PairingRegistry {
    pub fn new(stations: StationDirectory, config: PairingConfig) -> Self {
        Self {
            inner: Arc::new(PairingRegistryInner {
                stations,
                config,
                sessions: DashMap::new(),
                tokens: DashMap::new(),
            }),
        }
    }

    pub fn config(&self) -> &PairingConfig {
        &self.inner.config
    }

    /// Issue a fresh code and client token
    pub fn register(&self) -> Result<RegisterResponse, PairingError> {
        self.register_at(Utc::now())
    }

    pub fn register_at(&self, now: DateTime<Utc>) -> Result<RegisterResponse, PairingError> {
        let client_token = Uuid::new_v4().simple().to_string();
        let expires_at = now + self.inner.config.code_ttl;
        let mut rng = rand::thread_rng();

        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = generate_code(&mut rng);
            // Occupied codes, live or expired, are never reissued until purged
            let Entry::Vacant(slot) = self.inner.sessions.entry(code.clone()) else {
                continue;
            };
            slot.insert(PairingSession {
                code: code.clone(),
                client_token: client_token.clone(),
                station_id: None,
                created_at: now,
                expires_at,
                confirmed_at: None,
                bound_at: None,
            });
            self.inner.tokens.insert(client_token.clone(), code.clone());

            tracing::info!(code = %code, expires_at = %expires_at, "Pairing code issued");
            return Ok(RegisterResponse {
                code,
                client_token,
                expires_at,
            });
        }

        tracing::error!("Could not find a free pairing code");
        Err(PairingError::Conflict("code space exhausted".to_string()))
    }

    /// Bind a code to a station on behalf of a staff member
    pub fn confirm(&self, code: &str, station_id: &str) -> Result<PairingSession, PairingError> {
        self.confirm_at(code, station_id, Utc::now())
    }

    pub fn confirm_at(
        &self,
        code: &str,
        station_id: &str,
        now: DateTime<Utc>,
    ) -> Result<PairingSession, PairingError> {
        if !self.inner.stations.contains(station_id) {
            return Err(PairingError::StationNotFound(station_id.to_string()));
        }
        let normalized =
            normalize_code(code).ok_or_else(|| PairingError::NotFound(code.to_string()))?;

        let mut session = self
            .inner
            .sessions
            .get_mut(&normalized)
            .ok_or_else(|| PairingError::NotFound(normalized.clone()))?;

        if session.is_expired(now) {
            drop(session);
            self.remove_code(&normalized);
            tracing::debug!(code = %normalized, "Confirm rejected, code expired");
            return Err(PairingError::Expired(normalized));
        }

        match session.station_id.as_deref() {
            Some(existing) if existing == station_id => Ok(session.clone()),
            Some(existing) => {
                tracing::warn!(
                    code = %normalized,
                    station_id = %station_id,
                    paired_station_id = %existing,
                    "Confirm rejected, code paired with another station"
                );
                Err(PairingError::Conflict(normalized))
            }
            None => {
                session.station_id = Some(station_id.to_string());
                session.confirmed_at = Some(now);
                session.expires_at = now + self.inner.config.binding_ttl;
                tracing::info!(code = %normalized, station_id = %station_id, "Display paired");
                Ok(session.clone())
            }
        }
    }

    /// Pairing status of a code, as seen by the display showing it
    ///
    /// Unknown, malformed and expired codes all read as unpaired.
    pub fn poll(&self, code: &str) -> PairingStatus {
        self.poll_at(code, Utc::now())
    }

    pub fn poll_at(&self, code: &str, now: DateTime<Utc>) -> PairingStatus {
        let Some(normalized) = normalize_code(code) else {
            return PairingStatus::unpaired();
        };
        let Some(session) = self.inner.sessions.get(&normalized) else {
            return PairingStatus::unpaired();
        };
        if session.is_expired(now) {
            return PairingStatus::unpaired();
        }

        session
            .station_id
            .as_deref()
            .and_then(|id| self.inner.stations.get(id))
            .map(|station| PairingStatus::paired(station.id.clone(), station.name.clone()))
            .unwrap_or_else(PairingStatus::unpaired)
    }

    /// Station a client token is bound to, renewing the binding window
    pub fn resolve_client(&self, client_token: &str) -> Result<String, PairingError> {
        self.resolve_client_at(client_token, Utc::now())
    }

    pub fn resolve_client_at(
        &self,
        client_token: &str,
        now: DateTime<Utc>,
    ) -> Result<String, PairingError> {
        let code = self
            .inner
            .tokens
            .get(client_token)
            .map(|code| code.value().clone())
            .ok_or(PairingError::Unpaired)?;

        let mut session = self
            .inner
            .sessions
            .get_mut(&code)
            .ok_or(PairingError::Unpaired)?;

        if session.is_expired(now) {
            drop(session);
            self.remove_code(&code);
            return Err(PairingError::Unpaired);
        }

        let station_id = session.station_id.clone().ok_or(PairingError::Unpaired)?;
        if session.bound_at.is_none() {
            session.bound_at = Some(now);
            tracing::debug!(code = %code, station_id = %station_id, "Pairing consumed");
        }
        session.expires_at = now + self.inner.config.binding_ttl;
        Ok(station_id)
    }

    /// Forget a display's pairing
    pub fn unpair(&self, client_token: &str) -> bool {
        let Some((_, code)) = self.inner.tokens.remove(client_token) else {
            return false;
        };
        let removed = self.inner.sessions.remove(&code).is_some();
        if removed {
            tracing::info!(code = %code, "Display unpaired");
        }
        removed
    }

    /// Drop every expired session, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Utc::now())
    }

    pub fn purge_expired_at(&self, now: DateTime<Utc>) -> usize {
        let expired: Vec<String> = self
            .inner
            .sessions
            .iter()
            .filter(|entry| entry.value().is_expired(now))
            .map(|entry| entry.key().clone())
            .collect();

        let mut removed = 0;
        for code in expired {
            // Re-check under the entry lock, the session may have been renewed
            if let Some((_, session)) = self
                .inner
                .sessions
                .remove_if(&code, |_, session| session.is_expired(now))
            {
                self.inner.tokens.remove(&session.client_token);
                removed += 1;
            }
        }

        if removed > 0 {
            tracing::debug!(removed, "Purged expired pairing sessions");
        }
        removed
    }

    /// Session for a code, regardless of expiry
    pub fn session(&self, code: &str) -> Option<PairingSession> {
        let normalized = normalize_code(code)?;
        self.inner
            .sessions
            .get(&normalized)
            .map(|session| session.clone())
    }

    /// Number of sessions currently held
    pub fn len(&self) -> usize {
        self.inner.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.sessions.is_empty()
    }

    fn remove_code(&self, code: &str) {
        if let Some((_, session)) = self.inner.sessions.remove(code) {
            self.inner.tokens.remove(&session.client_token);
        }
    }
}
