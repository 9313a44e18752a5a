//! Error handling for the queue display API
//!
//! This module provides a unified error type using thiserror, with automatic
//! HTTP status code mapping via Axum's IntoResponse trait. Component errors
//! (`QueueError`, `PairingError`) convert into it at the route boundary.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::models::queue::QueueError;
use crate::services::pairing::PairingError;

/// API error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for client-side handling
    pub code: &'static str,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Main API error type
#[derive(Error, Debug)]
pub enum ApiError {
    // ========== Authentication ==========
    /// Missing authentication credentials
    #[error("authentication required")]
    Unauthorized,

    /// Invalid token (expired, malformed, wrong signature)
    #[error("invalid authentication token: {0}")]
    InvalidToken(String),

    // ========== Resource Errors ==========
    /// Requested resource not found
    #[error("{resource_type} not found: {id}")]
    NotFound {
        resource_type: &'static str,
        id: String,
    },

    /// Resource is already bound elsewhere
    #[error("{resource_type} conflict: {id}")]
    Conflict {
        resource_type: &'static str,
        id: String,
    },

    /// Resource outlived its validity window
    #[error("{resource_type} expired: {id}")]
    Expired {
        resource_type: &'static str,
        id: String,
    },

    /// Transition not allowed from the resource's current state
    #[error("invalid state: {0}")]
    InvalidState(String),

    // ========== Validation Errors ==========
    /// Request validation failed
    #[error("validation error: {0}")]
    ValidationError(String),

    /// Invalid request body format
    #[error("invalid request body: {0}")]
    InvalidBody(String),

    // ========== Internal Errors ==========
    /// Internal server error (catch-all for unexpected errors)
    #[error("internal server error: {0}")]
    Internal(String),

    /// JWT decoding error
    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

impl ApiError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 401 Unauthorized
            Self::Unauthorized | Self::InvalidToken(_) | Self::Jwt(_) => StatusCode::UNAUTHORIZED,

            // 404 Not Found
            Self::NotFound { .. } => StatusCode::NOT_FOUND,

            // 409 Conflict
            Self::Conflict { .. } | Self::InvalidState(_) => StatusCode::CONFLICT,

            // 410 Gone
            Self::Expired { .. } => StatusCode::GONE,

            // 400 Bad Request
            Self::ValidationError(_) | Self::InvalidBody(_) => StatusCode::BAD_REQUEST,

            // 500 Internal Server Error
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code string for client-side handling
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Unauthorized => "UNAUTHORIZED",
            Self::InvalidToken(_) => "INVALID_TOKEN",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Conflict { .. } => "CONFLICT",
            Self::Expired { .. } => "EXPIRED",
            Self::InvalidState(_) => "INVALID_STATE",
            Self::ValidationError(_) => "INVALID_INPUT",
            Self::InvalidBody(_) => "INVALID_BODY",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Jwt(_) => "JWT_ERROR",
        }
    }

    /// Create a not found error for a specific resource
    pub fn not_found(resource_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource_type,
            id: id.into(),
        }
    }

    /// Create a conflict error for a specific resource
    pub fn conflict(resource_type: &'static str, id: impl Into<String>) -> Self {
        Self::Conflict {
            resource_type,
            id: id.into(),
        }
    }

    /// Log the error with appropriate severity based on status code
    pub fn log(&self) {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(
                error = %self,
                code = self.error_code(),
                status = status.as_u16(),
                "Server error occurred"
            );
        } else if status == StatusCode::UNAUTHORIZED {
            tracing::warn!(
                error = %self,
                code = self.error_code(),
                status = status.as_u16(),
                "Authorization error"
            );
        } else {
            tracing::debug!(
                error = %self,
                code = self.error_code(),
                status = status.as_u16(),
                "Client error"
            );
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.log();

        let status = self.status_code();
        let error_response = ErrorResponse {
            code: self.error_code(),
            message: self.to_string(),
            details: None,
        };

        (status, Json(error_response)).into_response()
    }
}

/// Result type alias for API operations
pub type ApiResult<T> = Result<T, ApiError>;

// ========== Conversion Implementations ==========

impl From<QueueError> for ApiError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::InvalidInput(reason) => Self::ValidationError(reason),
            QueueError::StationNotFound(id) => Self::not_found("station", id),
            QueueError::EntryNotFound(id) => Self::not_found("queue entry", id.to_string()),
            QueueError::QueueEmpty(id) => Self::not_found("waiting entry for station", id),
            err @ QueueError::InvalidState { .. } => Self::InvalidState(err.to_string()),
        }
    }
}

impl From<PairingError> for ApiError {
    fn from(err: PairingError) -> Self {
        match err {
            PairingError::NotFound(code) => Self::not_found("pairing code", code),
            PairingError::Expired(code) => Self::Expired {
                resource_type: "pairing code",
                id: code,
            },
            PairingError::Conflict(code) => Self::conflict("pairing code", code),
            PairingError::StationNotFound(id) => Self::not_found("station", id),
            PairingError::Unpaired => Self::not_found("pairing", "client token"),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidBody(rejection.body_text())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<ApiError>() {
            Ok(api_err) => api_err,
            Err(err) => Self::Internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::Unauthorized.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::not_found("station", "s-1").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::InvalidState("done".to_string()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::ValidationError("test".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_error_display() {
        let err = ApiError::not_found("station", "station-7");
        assert_eq!(err.to_string(), "station not found: station-7");
    }

    #[test]
    fn test_queue_error_mapping() {
        let err: ApiError = QueueError::InvalidInput("priority must be >= 0".into()).into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.error_code(), "INVALID_INPUT");

        let err: ApiError = QueueError::EntryNotFound(Uuid::nil()).into();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_pairing_error_mapping() {
        let err: ApiError = PairingError::Expired("ABC234".into()).into();
        assert_eq!(err.status_code(), StatusCode::GONE);
        assert_eq!(err.error_code(), "EXPIRED");

        let err: ApiError = PairingError::Conflict("ABC234".into()).into();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }
}
