//! Display connection timing shared by the server and the display client

use std::time::Duration;

use crate::{parse_env, ConfigError, ConfigResult};

/// Keepalive and reconnect timing for display push connections
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayTimingConfig {
    /// Interval between client liveness pings
    pub keepalive_interval: Duration,

    /// First reconnect delay after a transport loss
    pub reconnect_base_delay: Duration,

    /// Upper bound for the reconnect delay
    pub reconnect_max_delay: Duration,
}

impl DisplayTimingConfig {
    /// Load display timing from environment variables
    ///
    /// - `DISPLAY_KEEPALIVE_SECS` (default 30)
    /// - `DISPLAY_RECONNECT_BASE_SECS` (default 1)
    /// - `DISPLAY_RECONNECT_MAX_SECS` (default 30)
    pub fn from_env() -> ConfigResult<Self> {
        let config = Self {
            keepalive_interval: Duration::from_secs(parse_env("DISPLAY_KEEPALIVE_SECS", 30)?),
            reconnect_base_delay: Duration::from_secs(parse_env(
                "DISPLAY_RECONNECT_BASE_SECS",
                1,
            )?),
            reconnect_max_delay: Duration::from_secs(parse_env("DISPLAY_RECONNECT_MAX_SECS", 30)?),
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject timing combinations the reconnect schedule cannot honour
    pub fn validate(&self) -> ConfigResult<()> {
        if self.keepalive_interval.is_zero() {
            return Err(ConfigError::ValidationError(
                "keepalive interval must be greater than zero".to_string(),
            ));
        }
        if self.reconnect_base_delay.is_zero() {
            return Err(ConfigError::ValidationError(
                "reconnect base delay must be greater than zero".to_string(),
            ));
        }
        if self.reconnect_max_delay < self.reconnect_base_delay {
            return Err(ConfigError::ValidationError(format!(
                "reconnect max delay ({}s) is below the base delay ({}s)",
                self.reconnect_max_delay.as_secs(),
                self.reconnect_base_delay.as_secs()
            )));
        }
        Ok(())
    }
}

impl Default for DisplayTimingConfig {
    fn default() -> Self {
        Self {
            keepalive_interval: Duration::from_secs(30),
            reconnect_base_delay: Duration::from_secs(1),
            reconnect_max_delay: Duration::from_secs(30),
        }
    }
}
