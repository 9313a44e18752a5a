//! Display board client for the queue service
//!
//! A display first pairs with a station (`pairing`), then keeps a push
//! session open (`session`) that mirrors the station's queue into a
//! `DisplayView`. The session reconnects on its own with exponential
//! backoff and only stops on request or when the server no longer accepts
//! the display's identity.

pub mod backoff;
pub mod error;
pub mod pairing;
pub mod session;
pub mod state;
pub mod view;

pub use backoff::Backoff;
pub use error::{ClientError, ClientResult};
pub use pairing::{PairedDisplay, PairingClient, DEFAULT_POLL_INTERVAL};
pub use session::{display_ws_url, DisplaySession, SessionConfig};
pub use state::{CloseReason, ConnectionState};
pub use view::{DisplayView, RECONNECTING_BANNER};
