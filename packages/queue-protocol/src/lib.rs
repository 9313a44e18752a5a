//! Wire protocol for the queue call-and-display service
//!
//! Shared between the API server and display clients:
//! - `board`: queue vocabulary and the snapshot payload pushed to displays
//! - `messages`: WebSocket frames in both directions
//! - `rest`: request/response bodies of the pairing and counter endpoints

pub mod board;
pub mod messages;
pub mod rest;

pub use board::{
    CalledPatient, EntryStatus, NoShowEntry, ParseSourceTypeError, QueueBoardEntry,
    QueueSnapshot, QueueSourceType,
};
pub use messages::{ClientMessage, ServerMessage, CLOSE_STATION_MISMATCH, CLOSE_UNPAIRED};
pub use rest::{
    EnqueueRequest, PairRequest, PairingStatus, RegisterResponse, UnpairRequest,
    UpdateEntryRequest,
};
