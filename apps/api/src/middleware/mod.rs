//! Middleware components for the queue API
//!
//! - `StaffUser`: requires a valid staff Bearer token, returns 401 if missing/invalid

pub mod auth;

pub use auth::{AuthRejection, StaffUser};
