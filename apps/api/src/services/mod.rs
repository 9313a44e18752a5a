//! Business logic services
//!
//! - Queue operations per station, with broadcast on every mutation
//! - Display pairing
//! - Staff token verification

pub mod auth;
pub mod pairing;
pub mod queue;

pub use auth::{AuthConfig, AuthService, StaffClaims};
pub use pairing::{PairingConfig, PairingError, PairingRegistry};
pub use queue::QueueService;
