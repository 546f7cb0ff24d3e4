//! Client synchronization layer for the booth room server.
//!
//! Keeps a local mirror of a room, estimates the server clock, and keeps a
//! [`MediaPlayer`](player::MediaPlayer) aligned with the shared music stream.
//! [`SyncSession`](session::SyncSession) holds the logic; the
//! [`connection`] module runs it over a WebSocket.

pub mod clock;
pub mod connection;
pub mod drift;
pub mod player;
pub mod session;

pub use clock::{ClockConfig, ClockSync, PingSchedule};
pub use connection::Command;
pub use drift::{DriftAction, DriftConfig};
pub use player::{HeadlessPlayer, MediaPlayer};
pub use session::{SessionConfig, SyncEvent, SyncSession};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("join rejected: {0}")]
    Rejected(String),
    #[error("room not found")]
    RoomNotFound,
    #[error("http {status}: {reason}")]
    Http { status: u16, reason: String },
    #[error("invalid base URL: {0}")]
    InvalidUrl(String),
    #[error("websocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),
}

impl ClientError {
    /// Grepable code, matching the server's error code style.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Rejected(_) => "E_JOIN_REJECTED",
            Self::RoomNotFound => "E_ROOM_NOT_FOUND",
            Self::Http { .. } => "E_HTTP",
            Self::InvalidUrl(_) => "E_URL",
            Self::WebSocket(_) => "E_WEBSOCKET",
        }
    }
}
