//! Reconnect delay schedule
//!
//! Delays start at the base delay and double per consecutive failure, capped
//! at the maximum: with the defaults 1, 2, 4, 8, 16, 30, 30, ... seconds.
//! The sequence starts over only after a connection stayed up for at least
//! `stable_after`; a connection that drops sooner keeps doubling.

use std::time::Duration;

use qms_shared_config::DisplayTimingConfig;
use tokio::time::Instant;

/// Exponential reconnect backoff with a stability reset
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    stable_after: Duration,
    /// Consecutive failures since the last reset
    attempt: u32,
    connected_at: Option<Instant>,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration, stable_after: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
            stable_after,
            attempt: 0,
            connected_at: None,
        }
    }

    /// Schedule from display timing: a connection counts as stable once it
    /// survived one keepalive interval
    pub fn from_timing(timing: &DisplayTimingConfig) -> Self {
        Self::new(
            timing.reconnect_base_delay,
            timing.reconnect_max_delay,
            timing.keepalive_interval,
        )
    }

    /// Record that a connection was established at `now`
    pub fn connected(&mut self, now: Instant) {
        self.connected_at = Some(now);
    }

    /// Delay before the next attempt, after a loss or failed attempt at `now`
    pub fn next_delay(&mut self, now: Instant) -> Duration {
        if let Some(connected_at) = self.connected_at.take() {
            if now.saturating_duration_since(connected_at) >= self.stable_after {
                self.attempt = 0;
            }
        }

        let factor = 1u32.checked_shl(self.attempt).unwrap_or(u32::MAX);
        let delay = self.base.saturating_mul(factor).min(self.max);
        self.attempt = self.attempt.saturating_add(1);
        delay
    }

    /// Consecutive failures counted so far
    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::from_timing(&DisplayTimingConfig::default())
    }
}
