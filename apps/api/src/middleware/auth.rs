//! Staff authentication extractor for Axum handlers
//!
//! # Usage
//!
//! ```rust,ignore
//! use crate::middleware::StaffUser;
//!
//! async fn call_next(staff: StaffUser, Path(station_id): Path<String>) -> impl IntoResponse {
//!     tracing::info!(staff = %staff.claims.sub, "Calling next patient");
//! }
//! ```

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
    response::{IntoResponse, Response},
};

use crate::error::ApiError;
use crate::services::auth::{AuthService, StaffClaims};

/// Authenticated staff member, extracted from a Bearer token
///
/// Requires an `AuthService` in the request extensions. Returns 401 if the
/// token is missing or invalid.
#[derive(Debug, Clone)]
pub struct StaffUser {
    /// Verified claims from the access token
    pub claims: StaffClaims,
}

impl StaffUser {
    pub fn id(&self) -> &str {
        &self.claims.sub
    }
}

/// Authentication rejection types
#[derive(Debug)]
pub enum AuthRejection {
    /// Missing or malformed Authorization header
    MissingToken,
    /// Token is malformed, badly signed or expired
    InvalidToken(String),
    /// `AuthService` was not installed on the router
    MissingServices,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let error = match self {
            AuthRejection::MissingToken => {
                tracing::debug!("Authentication rejected: missing token");
                ApiError::Unauthorized
            }
            AuthRejection::InvalidToken(reason) => {
                tracing::debug!(reason = %reason, "Authentication rejected: invalid token");
                ApiError::InvalidToken(reason)
            }
            AuthRejection::MissingServices => {
                tracing::error!("Authentication rejected: missing services in app state");
                ApiError::Internal("Authentication services not configured".to_string())
            }
        };

        error.into_response()
    }
}

/// Extract the bearer token from the Authorization header (scheme is case-insensitive)
pub fn extract_bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;

    let mut pieces = value.split_whitespace();
    let scheme = pieces.next()?;
    let token = pieces.next()?;

    // Reject "Bearer <token> <extra>"
    if pieces.next().is_some() {
        return None;
    }

    scheme.eq_ignore_ascii_case("bearer").then_some(token)
}

#[async_trait]
impl<S> FromRequestParts<S> for StaffUser
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(parts).ok_or(AuthRejection::MissingToken)?;

        let auth_service = parts
            .extensions
            .get::<AuthService>()
            .ok_or(AuthRejection::MissingServices)?;

        let claims = auth_service
            .verify_token(token)
            .map_err(|e| AuthRejection::InvalidToken(e.to_string()))?;

        Ok(StaffUser { claims })
    }
}
