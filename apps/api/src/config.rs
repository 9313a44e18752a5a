//! API server configuration

use std::env;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use qms_shared_config::{parse_env, CommonConfig, Environment};

use crate::models::station::{Station, StationDirectory};
use crate::services::pairing::PairingConfig;

/// Minimum required length for JWT_SECRET to be considered secure
const MIN_JWT_SECRET_LENGTH: usize = 32;

/// Upper bound for either pairing TTL (30 days)
const MAX_PAIRING_TTL_SECS: u64 = 30 * 86_400;

const DEV_JWT_SECRET: &str = "development-secret-change-in-production";

/// API server configuration loaded from environment variables
#[derive(Clone)]
pub struct Config {
    /// Common configuration shared with other services
    pub common: CommonConfig,

    /// Server port (default: 8080)
    pub port: u16,

    /// Secret staff tokens are signed with
    pub jwt_secret: String,

    /// Configured service stations (`QMS_STATIONS`)
    pub stations: StationDirectory,

    /// Lifetime of an unconfirmed pairing code (default: 600s)
    pub pairing_code_ttl_secs: u64,

    /// Sliding lifetime of a confirmed pairing (default: 86400s)
    pub pairing_binding_ttl_secs: u64,

    /// Interval of the expired-pairing purge task (default: 60s)
    pub pairing_purge_interval_secs: u64,

    /// Per-frame write timeout on display sockets (default: 5s)
    pub broadcast_send_timeout_secs: u64,

    /// Outbound frames buffered per display before it is dropped (default: 16)
    pub broadcast_buffer: usize,

    /// CORS allowed origins (optional)
    pub cors_allowed_origins: Option<Vec<String>>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("common", &self.common)
            .field("port", &self.port)
            .field("jwt_secret", &"[REDACTED]")
            .field("stations", &self.stations.len())
            .field("pairing_code_ttl_secs", &self.pairing_code_ttl_secs)
            .field("pairing_binding_ttl_secs", &self.pairing_binding_ttl_secs)
            .field("pairing_purge_interval_secs", &self.pairing_purge_interval_secs)
            .field("broadcast_send_timeout_secs", &self.broadcast_send_timeout_secs)
            .field("broadcast_buffer", &self.broadcast_buffer)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// In production mode, this function requires:
    /// - `JWT_SECRET`: Must be set and at least 32 characters long
    /// - `QMS_STATIONS`: Must be set (no demo station)
    ///
    /// In development/staging mode, sensible defaults are used for convenience.
    pub fn from_env() -> Result<Self> {
        let environment = Environment::from_env();
        let is_production = environment.is_production();

        let jwt_secret = Self::load_jwt_secret(is_production)?;
        let stations = Self::load_stations(is_production)?;

        let common = CommonConfig::from_env()
            .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

        let config = Self {
            common,
            port: parse_env("PORT", 8080).context("Invalid PORT value")?,
            jwt_secret,
            stations,
            pairing_code_ttl_secs: parse_env("PAIRING_CODE_TTL_SECS", 600)?,
            pairing_binding_ttl_secs: parse_env("PAIRING_BINDING_TTL_SECS", 86_400)?,
            pairing_purge_interval_secs: parse_env("PAIRING_PURGE_INTERVAL_SECS", 60)?,
            broadcast_send_timeout_secs: parse_env("BROADCAST_SEND_TIMEOUT_SECS", 5)?,
            broadcast_buffer: parse_env("BROADCAST_BUFFER", 16)?,
            cors_allowed_origins: env::var("CORS_ORIGINS").ok().map(|s| {
                s.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            }),
        };
        config.validate()?;
        Ok(config)
    }

    /// Load and validate JWT_SECRET
    ///
    /// In production:
    /// - JWT_SECRET must be explicitly set
    /// - Must be at least MIN_JWT_SECRET_LENGTH characters
    ///
    /// In development: uses a default value with a warning
    fn load_jwt_secret(is_production: bool) -> Result<String> {
        match env::var("JWT_SECRET") {
            Ok(secret) if !secret.is_empty() => {
                if is_production && secret.len() < MIN_JWT_SECRET_LENGTH {
                    bail!(
                        "JWT_SECRET must be at least {} characters in production (got {})",
                        MIN_JWT_SECRET_LENGTH,
                        secret.len()
                    );
                }
                Ok(secret)
            }
            _ if is_production => {
                bail!(
                    "JWT_SECRET environment variable is required in production. \
                     Please set a secure secret of at least {} characters.",
                    MIN_JWT_SECRET_LENGTH
                );
            }
            _ => {
                tracing::warn!(
                    "JWT_SECRET not set, using insecure default. \
                     This is only acceptable in development mode."
                );
                Ok(DEV_JWT_SECRET.to_string())
            }
        }
    }

    /// Load the station list from QMS_STATIONS
    ///
    /// In production the variable is required. In development a single demo
    /// station `station-1` is used when it is unset.
    fn load_stations(is_production: bool) -> Result<StationDirectory> {
        match env::var("QMS_STATIONS") {
            Ok(json) if !json.trim().is_empty() => {
                let stations =
                    StationDirectory::from_json(&json).context("Invalid QMS_STATIONS value")?;
                if stations.is_empty() {
                    bail!("QMS_STATIONS must list at least one station");
                }
                Ok(stations)
            }
            _ if is_production => {
                bail!(
                    "QMS_STATIONS environment variable is required in production. \
                     Please set a JSON array of {{\"id\",\"code\",\"name\"}} objects."
                );
            }
            _ => {
                tracing::warn!("QMS_STATIONS not set, using a single demo station");
                Ok(StationDirectory::new(vec![Station::new(
                    "station-1",
                    "A",
                    "Counter 1",
                )])?)
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.pairing_code_ttl_secs == 0 || self.pairing_binding_ttl_secs == 0 {
            bail!("Pairing TTLs must be greater than zero");
        }
        if self.pairing_code_ttl_secs > MAX_PAIRING_TTL_SECS
            || self.pairing_binding_ttl_secs > MAX_PAIRING_TTL_SECS
        {
            bail!(
                "Pairing TTLs must not exceed {} seconds",
                MAX_PAIRING_TTL_SECS
            );
        }
        if self.pairing_purge_interval_secs == 0 {
            bail!("PAIRING_PURGE_INTERVAL_SECS must be greater than zero");
        }
        if self.broadcast_send_timeout_secs == 0 {
            bail!("BROADCAST_SEND_TIMEOUT_SECS must be greater than zero");
        }
        if self.broadcast_buffer == 0 {
            bail!("BROADCAST_BUFFER must be greater than zero");
        }
        Ok(())
    }

    /// Pairing registry timing
    pub fn pairing(&self) -> PairingConfig {
        PairingConfig {
            code_ttl: ttl(self.pairing_code_ttl_secs),
            binding_ttl: ttl(self.pairing_binding_ttl_secs),
        }
    }

    pub fn purge_interval(&self) -> Duration {
        Duration::from_secs(self.pairing_purge_interval_secs)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.broadcast_send_timeout_secs)
    }

    /// Get environment mode
    pub fn environment(&self) -> Environment {
        self.common.environment
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.common.environment.is_production()
    }
}

fn ttl(secs: u64) -> chrono::Duration {
    chrono::Duration::seconds(secs.min(MAX_PAIRING_TTL_SECS) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATIONS: &str = r#"[{"id":"station-1","code":"A","name":"Counter 1"}]"#;

    #[test]
    fn test_jwt_secret_required_in_production() {
        temp_env::with_var_unset("JWT_SECRET", || {
            let err = Config::load_jwt_secret(true).unwrap_err().to_string();
            assert!(err.contains("JWT_SECRET"));
            assert!(err.contains("required in production"));
        });
    }

    #[test]
    fn test_jwt_secret_minimum_length_in_production() {
        temp_env::with_var("JWT_SECRET", Some("short"), || {
            let err = Config::load_jwt_secret(true).unwrap_err().to_string();
            assert!(err.contains("at least 32 characters"));
        });
    }

    #[test]
    fn test_jwt_secret_valid_in_production() {
        let secret = "a".repeat(MIN_JWT_SECRET_LENGTH);
        temp_env::with_var("JWT_SECRET", Some(&secret), || {
            assert_eq!(Config::load_jwt_secret(true).unwrap(), secret);
        });
    }

    #[test]
    fn test_jwt_secret_uses_default_in_development() {
        temp_env::with_var_unset("JWT_SECRET", || {
            assert_eq!(Config::load_jwt_secret(false).unwrap(), DEV_JWT_SECRET);
        });
    }

    #[test]
    fn test_stations_required_in_production() {
        temp_env::with_var_unset("QMS_STATIONS", || {
            let err = Config::load_stations(true).unwrap_err().to_string();
            assert!(err.contains("QMS_STATIONS"));
        });
    }

    #[test]
    fn test_demo_station_in_development() {
        temp_env::with_var_unset("QMS_STATIONS", || {
            let stations = Config::load_stations(false).unwrap();
            assert!(stations.contains("station-1"));
        });
    }

    #[test]
    fn test_invalid_stations_rejected() {
        temp_env::with_var("QMS_STATIONS", Some("not json"), || {
            assert!(Config::load_stations(false).is_err());
        });
        temp_env::with_var("QMS_STATIONS", Some("[]"), || {
            assert!(Config::load_stations(false).is_err());
        });
    }

    #[test]
    fn test_from_env_defaults() {
        temp_env::with_vars(
            [
                ("ENVIRONMENT", Some("development")),
                ("QMS_STATIONS", Some(STATIONS)),
                ("PORT", None),
                ("PAIRING_CODE_TTL_SECS", None),
                ("PAIRING_BINDING_TTL_SECS", None),
                ("BROADCAST_BUFFER", None),
                ("CORS_ORIGINS", None),
            ],
            || {
                let config = Config::from_env().unwrap();
                assert_eq!(config.port, 8080);
                assert_eq!(config.pairing().code_ttl, chrono::Duration::minutes(10));
                assert_eq!(config.pairing().binding_ttl, chrono::Duration::hours(24));
                assert_eq!(config.send_timeout(), Duration::from_secs(5));
                assert_eq!(config.broadcast_buffer, 16);
                assert!(config.cors_allowed_origins.is_none());
                assert!(!config.is_production());
            },
        );
    }

    #[test]
    fn test_from_env_overrides() {
        temp_env::with_vars(
            [
                ("ENVIRONMENT", Some("development")),
                ("QMS_STATIONS", Some(STATIONS)),
                ("PORT", Some("9000")),
                ("PAIRING_CODE_TTL_SECS", Some("120")),
                ("CORS_ORIGINS", Some("http://a.test, http://b.test,")),
            ],
            || {
                let config = Config::from_env().unwrap();
                assert_eq!(config.port, 9000);
                assert_eq!(config.pairing().code_ttl, chrono::Duration::minutes(2));
                assert_eq!(
                    config.cors_allowed_origins,
                    Some(vec!["http://a.test".to_string(), "http://b.test".to_string()])
                );
            },
        );
    }

    #[test]
    fn test_zero_buffer_rejected() {
        temp_env::with_vars(
            [
                ("QMS_STATIONS", Some(STATIONS)),
                ("BROADCAST_BUFFER", Some("0")),
            ],
            || {
                assert!(Config::from_env().is_err());
            },
        );
    }

    #[test]
    fn test_oversized_pairing_ttl_rejected() {
        temp_env::with_vars(
            [
                ("QMS_STATIONS", Some(STATIONS)),
                ("PAIRING_BINDING_TTL_SECS", Some("18446744073709551615")),
            ],
            || {
                let err = Config::from_env().unwrap_err();
                assert!(err.to_string().contains("must not exceed"));
            },
        );
    }

    #[test]
    fn test_ttl_conversion_saturates() {
        assert_eq!(ttl(u64::MAX), chrono::Duration::days(30));
        assert_eq!(ttl(90), chrono::Duration::seconds(90));
    }

    #[test]
    fn test_debug_redacts_secret() {
        temp_env::with_vars(
            [
                ("QMS_STATIONS", Some(STATIONS)),
                ("JWT_SECRET", Some("super-secret-value-that-is-long-enough")),
            ],
            || {
                let config = Config::from_env().unwrap();
                let debug = format!("{:?}", config);
                assert!(!debug.contains("super-secret-value"));
            },
        );
    }
}
