//! WebSocket push transport for display boards
//!
//! - `hub`: per-station subscription registry and snapshot fan-out
//! - `handler`: upgrade, pairing check and per-connection read/write tasks

pub mod handler;
pub mod hub;

pub use handler::display_ws_handler;
pub use hub::{BroadcastHub, Subscription, SubscriptionGuard, DEFAULT_SUBSCRIBER_BUFFER};
