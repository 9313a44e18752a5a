//! Domain models for the queue display service
//!
//! - `station`: configured service points and the read-only directory
//! - `queue`: per-station queue entries, lifecycle and ordering

pub mod queue;
pub mod station;

pub use queue::{CallOutcome, NewEntry, QueueEntry, QueueError, StationQueue};
pub use station::{Station, StationConfigError, StationDirectory};
