//! Queue call-and-display API library
//!
//! This module exposes the core API components for use in integration tests
//! and as a library.

pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod websocket;

// Re-export commonly used types
pub use error::{ApiError, ApiResult, ErrorResponse};
pub use routes::{app, QmsState};
pub use services::{AuthConfig, AuthService, PairingConfig, PairingRegistry, QueueService};
pub use websocket::BroadcastHub;
