//! Replicated room state.
//!
//! DESIGN
//! ======
//! `RoomState` is a plain versioned struct. The server's room actor is its
//! only writer; clients hold a mirror built from one snapshot plus a stream
//! of [`crate::Patch`]es. Field names serialize in camelCase because these
//! records travel verbatim inside frame payloads.

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::queue::DjQueue;

/// Session identifier of a connected participant.
pub type SessionId = String;

// =============================================================================
// PLAYER
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: SessionId,
    pub name: String,
    pub x: f64,
    pub y: f64,
    /// Animation key, `<texture>_<action>_<direction>`.
    pub anim: String,
    pub ready_to_connect: bool,
    pub video_connected: bool,
    /// Avatar scale in percent, 1..=255.
    #[serde(default = "default_scale")]
    pub scale: u8,
    /// Two-item look-ahead (current + next) used by the DJ rotation.
    #[serde(default)]
    pub lookahead: Vec<PlaylistItem>,
}

impl Player {
    #[must_use]
    pub fn new(id: impl Into<SessionId>, name: impl Into<String>, x: f64, y: f64, anim: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            x,
            y,
            anim: anim.into(),
            ready_to_connect: false,
            video_connected: false,
            scale: DEFAULT_SCALE,
            lookahead: Vec::new(),
        }
    }
}

/// Avatar scale a player starts with, in percent.
pub const DEFAULT_SCALE: u8 = 100;

fn default_scale() -> u8 {
    DEFAULT_SCALE
}

// =============================================================================
// BOOTHS
// =============================================================================

/// A DJ booth: fixed seats, each holding at most one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MusicBooth {
    pub seats: Vec<Option<SessionId>>,
}

impl MusicBooth {
    #[must_use]
    pub fn new(max_users: usize) -> Self {
        Self { seats: vec![None; max_users] }
    }

    #[must_use]
    pub fn max_users(&self) -> usize {
        self.seats.len()
    }

    #[must_use]
    pub fn occupied(&self) -> usize {
        self.seats.iter().filter(|seat| seat.is_some()).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.occupied() == 0
    }

    #[must_use]
    pub fn seat_of(&self, id: &str) -> Option<usize> {
        self.seats.iter().position(|seat| seat.as_deref() == Some(id))
    }

    #[must_use]
    pub fn first_free(&self) -> Option<usize> {
        self.seats.iter().position(Option::is_none)
    }

    #[must_use]
    pub fn occupant(&self, seat: usize) -> Option<&str> {
        self.seats.get(seat).and_then(Option::as_deref)
    }
}

// =============================================================================
// PLAYLISTS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistItem {
    pub id: String,
    pub title: String,
    pub link: String,
    /// Seconds.
    pub duration: f64,
    pub dj_id: SessionId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomPlaylistItem {
    pub id: String,
    pub title: String,
    pub link: String,
    pub duration: f64,
    pub added_at_ms: i64,
    /// Only this session may remove the item.
    pub added_by: SessionId,
}

// =============================================================================
// MUSIC STREAM
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamStatus {
    #[default]
    Waiting,
    Seeking,
    Playing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DjInfo {
    pub name: String,
    pub session_id: SessionId,
}

/// The single shared "now playing" record of a room.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MusicStream {
    pub status: StreamStatus,
    pub current_link: Option<String>,
    pub current_title: Option<String>,
    /// `None` while waiting and for the anonymous ambient stream.
    pub current_dj: Option<DjInfo>,
    pub current_booth: Option<usize>,
    /// Server epoch milliseconds the current track started at.
    pub start_time: i64,
    pub duration: f64,
    pub stream_id: u64,
    pub is_room_playlist: bool,
    pub room_playlist_index: usize,
    pub is_ambient: bool,
    pub video_background_enabled: bool,
}

impl MusicStream {
    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.status == StreamStatus::Playing && self.current_link.is_some()
    }

    /// Nothing real is playing: waiting, or only the ambient fallback.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        !self.is_playing() || self.is_ambient
    }

    #[must_use]
    pub fn current_dj_id(&self) -> Option<&str> {
        self.current_dj.as_ref().map(|dj| dj.session_id.as_str())
    }

    /// Playback position in seconds for a given server time.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn offset_secs(&self, server_now_ms: i64) -> f64 {
        (server_now_ms - self.start_time).max(0) as f64 / 1000.0
    }
}

// =============================================================================
// CHAT
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Monotonic per-room sequence number.
    pub seq: u64,
    pub author: SessionId,
    pub content: String,
    pub created_at_ms: i64,
}

// =============================================================================
// ROOM
// =============================================================================

/// One-shot room metadata sent to a joining client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomData {
    pub id: String,
    pub name: String,
    pub description: String,
    pub background_seed: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomState {
    /// Incremented once per applied patch.
    pub version: u64,
    pub players: BTreeMap<SessionId, Player>,
    pub booths: Vec<MusicBooth>,
    pub dj_queue: DjQueue,
    pub room_playlist: Vec<RoomPlaylistItem>,
    pub music_stream: MusicStream,
    pub chat: VecDeque<ChatMessage>,
}

impl RoomState {
    #[must_use]
    pub fn new(booth_count: usize, seats_per_booth: usize) -> Self {
        Self { booths: (0..booth_count).map(|_| MusicBooth::new(seats_per_booth)).collect(), ..Self::default() }
    }

    /// Booth and seat a session occupies, if any.
    #[must_use]
    pub fn seat_of(&self, id: &str) -> Option<(usize, usize)> {
        self.booths
            .iter()
            .enumerate()
            .find_map(|(booth, b)| b.seat_of(id).map(|seat| (booth, seat)))
    }

    /// Session in the primary DJ seat (booth 0, seat 0).
    #[must_use]
    pub fn primary_dj(&self) -> Option<&str> {
        self.booths.first().and_then(|booth| booth.occupant(0))
    }

    #[must_use]
    pub fn has_booth_dj(&self) -> bool {
        self.booths.first().is_some_and(|booth| !booth.is_empty())
    }
}

#[cfg(test)]
#[path = "model_test.rs"]
mod tests;
