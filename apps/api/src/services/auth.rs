//! Staff token verification
//!
//! Staff credentials are issued by the hospital's identity system as HS256
//! JWTs signed with the shared `JWT_SECRET`. This service only verifies
//! them; it never stores users or sessions.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};

/// Staff authentication configuration
#[derive(Clone)]
pub struct AuthConfig {
    /// JWT signing secret
    pub jwt_secret: String,
    /// Allowed clock skew in seconds when checking `exp`
    pub leeway_secs: u64,
}

impl AuthConfig {
    pub fn new(jwt_secret: String) -> Self {
        Self {
            jwt_secret,
            leeway_secs: 30,
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"[REDACTED]")
            .field("leeway_secs", &self.leeway_secs)
            .finish()
    }
}

/// Claims carried by a staff access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffClaims {
    /// Staff member identifier
    pub sub: String,
    /// Expiration timestamp (Unix epoch)
    pub exp: i64,
    /// Display name of the staff member
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl StaffClaims {
    pub fn new(sub: impl Into<String>, ttl: Duration) -> Self {
        Self {
            sub: sub.into(),
            exp: (Utc::now() + ttl).timestamp(),
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Verifies staff bearer tokens
#[derive(Clone)]
pub struct AuthService {
    config: AuthConfig,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl AuthService {
    pub fn new(config: AuthConfig) -> Self {
        let mut validation = Validation::default();
        validation.leeway = config.leeway_secs;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
            config,
        }
    }

    /// Verify a staff access token and return its claims
    ///
    /// # Errors
    /// - `ApiError::InvalidToken` if the token is malformed, badly signed or expired
    pub fn verify_token(&self, token: &str) -> ApiResult<StaffClaims> {
        let token_data =
            decode::<StaffClaims>(token, &self.decoding_key, &self.validation).map_err(|e| {
                tracing::debug!(error = %e, "Staff token verification failed");
                ApiError::InvalidToken(e.to_string())
            })?;

        Ok(token_data.claims)
    }

    /// Sign a staff token with the configured secret
    ///
    /// Used by local tooling and tests; production tokens come from the
    /// identity provider.
    pub fn issue_token(&self, claims: &StaffClaims) -> ApiResult<String> {
        let token = encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )?;
        Ok(token)
    }
}
