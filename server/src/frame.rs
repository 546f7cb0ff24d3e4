//! Frame: the universal message type for the room server.
//!
//! ARCHITECTURE
//! ============
//! Every communication with a room is a Frame. Clients send request frames
//! over WebSocket, the room actor dispatches by syscall, and responses flow
//! back as done/error frames. Server-initiated events (patches, stream
//! start/stop, heartbeats) are request-status frames with no parent.
//!
//! DESIGN
//! ======
//! - Flat data: payload is always `Map<String, Value>` at the top level.
//! - Responses correlate to requests via `parent_id`.
//! - This is the server's typed view (`Uuid` ids, map payload); the
//!   `frames` crate owns the wire form and the protobuf codec.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use frames::Status;

// =============================================================================
// FIELD CONSTANTS
// =============================================================================

/// Frame data key for error messages.
pub const FRAME_MESSAGE: &str = "message";

/// Frame data key for grepable error codes.
pub const FRAME_CODE: &str = "code";

/// Frame data key for the retryable flag on error frames.
pub const FRAME_RETRYABLE: &str = "retryable";

// =============================================================================
// TYPES
// =============================================================================

/// Flat key-value payload. Alias to reduce noise in signatures.
pub type Data = HashMap<String, serde_json::Value>;

/// The universal message type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    pub id: Uuid,
    pub parent_id: Option<Uuid>,
    /// Milliseconds since Unix epoch. Set automatically at construction.
    pub ts: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    pub from: Option<String>,
    pub syscall: String,
    pub status: Status,
    #[serde(default)]
    pub data: Data,
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid frame id: {0}")]
    InvalidId(String),
    #[error("frame data must be an object")]
    DataNotObject,
}

impl ErrorCode for FrameError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidId(_) => "E_FRAME_ID",
            Self::DataNotObject => "E_FRAME_DATA",
        }
    }
}

// =============================================================================
// ERROR CODES
// =============================================================================

/// Grepable error code and retryable flag for structured error frames.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

// =============================================================================
// CONSTRUCTORS
// =============================================================================

pub use frames::now_ms;

impl Frame {
    /// Create a request frame. Also used for server-initiated events.
    pub fn request(syscall: impl Into<String>, data: Data) -> Self {
        Self {
            id: Uuid::new_v4(),
            parent_id: None,
            ts: now_ms(),
            room_id: None,
            from: None,
            syscall: syscall.into(),
            status: Status::Request,
            data,
        }
    }

    /// Create a done response. Terminal, carries no data.
    #[must_use]
    pub fn done(&self) -> Self {
        self.reply(Status::Done, Data::new())
    }

    /// Create a done response carrying a payload. Terminal.
    #[must_use]
    pub fn done_with(&self, data: Data) -> Self {
        self.reply(Status::Done, data)
    }

    /// Create a structured error response from a typed error. Terminal.
    #[must_use]
    pub fn error_from(&self, err: &(impl ErrorCode + ?Sized)) -> Self {
        let mut data = Data::new();
        data.insert(FRAME_CODE.into(), serde_json::Value::String(err.error_code().to_string()));
        data.insert(FRAME_MESSAGE.into(), serde_json::Value::String(err.to_string()));
        data.insert(FRAME_RETRYABLE.into(), serde_json::Value::Bool(err.retryable()));
        self.reply(Status::Error, data)
    }

    /// Build a reply frame. Inherits `parent_id`, `room_id`, and `syscall`.
    fn reply(&self, status: Status, data: Data) -> Self {
        Self {
            id: Uuid::new_v4(),
            parent_id: Some(self.id),
            ts: now_ms(),
            room_id: self.room_id.clone(),
            from: None,
            syscall: self.syscall.clone(),
            status,
            data,
        }
    }
}

// =============================================================================
// BUILDERS
// =============================================================================

impl Frame {
    #[must_use]
    pub fn with_room_id(mut self, room_id: impl Into<String>) -> Self {
        self.room_id = Some(room_id.into());
        self
    }

    #[must_use]
    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    #[must_use]
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }
}

// =============================================================================
// ROUTING + FIELD ACCESS
// =============================================================================

impl Frame {
    /// Extract the syscall prefix (everything before the first ':').
    #[must_use]
    pub fn prefix(&self) -> &str {
        let Some((prefix, _)) = self.syscall.split_once(':') else {
            return &self.syscall;
        };
        prefix
    }

    /// Finite number field. NaN and infinities never reach handlers.
    #[must_use]
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.data
            .get(key)
            .and_then(serde_json::Value::as_f64)
            .filter(|v| v.is_finite())
    }

    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(serde_json::Value::as_str)
    }

    #[must_use]
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.data.get(key).and_then(serde_json::Value::as_bool)
    }

    /// Non-negative integral index field. `2.0` is accepted, `2.5` is not.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn get_index(&self, key: &str) -> Option<usize> {
        let value = self.data.get(key)?;
        if let Some(index) = value.as_u64() {
            return usize::try_from(index).ok();
        }
        let float = value.as_f64().filter(|v| v.is_finite() && *v >= 0.0 && v.fract() == 0.0)?;
        usize::try_from(float as u64).ok()
    }
}

// =============================================================================
// WIRE CONVERSION
// =============================================================================

impl From<&Frame> for frames::Frame {
    fn from(frame: &Frame) -> Self {
        frames::Frame {
            id: frame.id.to_string(),
            parent_id: frame.parent_id.map(|id| id.to_string()),
            ts: frame.ts,
            room_id: frame.room_id.clone(),
            from: frame.from.clone(),
            syscall: frame.syscall.clone(),
            status: frame.status,
            data: serde_json::Value::Object(frame.data.clone().into_iter().collect()),
        }
    }
}

impl TryFrom<frames::Frame> for Frame {
    type Error = FrameError;

    fn try_from(wire: frames::Frame) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&wire.id).map_err(|_| FrameError::InvalidId(wire.id.clone()))?;
        let parent_id = wire
            .parent_id
            .as_deref()
            .map(|raw| Uuid::parse_str(raw).map_err(|_| FrameError::InvalidId(raw.to_owned())))
            .transpose()?;
        let data = match wire.data {
            serde_json::Value::Object(map) => map.into_iter().collect(),
            serde_json::Value::Null => Data::new(),
            _ => return Err(FrameError::DataNotObject),
        };
        Ok(Self {
            id,
            parent_id,
            ts: wire.ts,
            room_id: wire.room_id,
            from: wire.from,
            syscall: wire.syscall,
            status: wire.status,
            data,
        })
    }
}

#[cfg(test)]
#[path = "frame_test.rs"]
mod tests;
