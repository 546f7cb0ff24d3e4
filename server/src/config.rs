//! Server and room configuration parsed from environment variables.
//!
//! Every knob has a default, so an empty environment yields a working
//! server. Invalid values fall back to the default rather than failing
//! startup.

use std::time::Duration;

use crate::services::auth::{MAX_COST, MIN_COST};

pub const DEFAULT_PORT: u16 = 3000;

pub const DEFAULT_BOOTH_COUNT: usize = 1;
pub const DEFAULT_BOOTH_SEATS: usize = 4;
pub const DEFAULT_HEARTBEAT_MS: u64 = 5_000;
pub const DEFAULT_PUNCH_DELAY_MS: u64 = 350;
pub const DEFAULT_KNOCKBACK_DELAY_MS: u64 = 150;
pub const DEFAULT_KNOCKBACK_PX: f64 = 6.0;
pub const DEFAULT_PUNCH_RANGE_PX: f64 = 65.0;
pub const DEFAULT_ACTION_MIN_INTERVAL_MS: i64 = 50;
pub const DEFAULT_MAX_SPEED_PX_PER_SEC: f64 = 240.0;
pub const DEFAULT_SPEED_BUFFER_PX: f64 = 40.0;
pub const DEFAULT_CHAT_HISTORY: usize = 100;
pub const DEFAULT_TRACK_MIN_SECS: u64 = 5;
pub const DEFAULT_TRACK_BUFFER_SECS: u64 = 10;
pub const DEFAULT_MAILBOX_CAPACITY: usize = 256;
pub const DEFAULT_AMBIENT_LINK: &str = "5-gDL5G-VQQ";
pub const DEFAULT_PUBLIC_ROOM_NAME: &str = "Public Lobby";
pub const DEFAULT_PASSWORD_COST: u32 = bcrypt::DEFAULT_COST;

/// Longest track duration accepted from clients, in seconds.
pub const MAX_TRACK_SECS: f64 = 6.0 * 60.0 * 60.0;

/// Texture prefix whose animations can be punched.
pub const HITTABLE_TEXTURE: &str = "mutant";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
}

impl ServerConfig {
    /// - `PORT`: listen port, default 3000
    #[must_use]
    pub fn from_env() -> Self {
        Self { port: env_parse("PORT", DEFAULT_PORT) }
    }
}

/// Per-room tuning shared by every room the registry spawns.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomConfig {
    pub booth_count: usize,
    pub booth_seats: usize,
    pub heartbeat: Duration,
    pub punch_delay: Duration,
    pub knockback_delay: Duration,
    pub knockback_px: f64,
    pub punch_range_px: f64,
    pub action_min_interval_ms: i64,
    pub max_speed_px_per_sec: f64,
    pub speed_buffer_px: f64,
    pub chat_history: usize,
    pub track_min: Duration,
    pub track_buffer: Duration,
    pub mailbox_capacity: usize,
    pub ambient_link: String,
    pub public_room_name: String,
    /// bcrypt cost for room passwords.
    pub password_cost: u32,
    pub spawn: (f64, f64),
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            booth_count: DEFAULT_BOOTH_COUNT,
            booth_seats: DEFAULT_BOOTH_SEATS,
            heartbeat: Duration::from_millis(DEFAULT_HEARTBEAT_MS),
            punch_delay: Duration::from_millis(DEFAULT_PUNCH_DELAY_MS),
            knockback_delay: Duration::from_millis(DEFAULT_KNOCKBACK_DELAY_MS),
            knockback_px: DEFAULT_KNOCKBACK_PX,
            punch_range_px: DEFAULT_PUNCH_RANGE_PX,
            action_min_interval_ms: DEFAULT_ACTION_MIN_INTERVAL_MS,
            max_speed_px_per_sec: DEFAULT_MAX_SPEED_PX_PER_SEC,
            speed_buffer_px: DEFAULT_SPEED_BUFFER_PX,
            chat_history: DEFAULT_CHAT_HISTORY,
            track_min: Duration::from_secs(DEFAULT_TRACK_MIN_SECS),
            track_buffer: Duration::from_secs(DEFAULT_TRACK_BUFFER_SECS),
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
            ambient_link: DEFAULT_AMBIENT_LINK.to_owned(),
            public_room_name: DEFAULT_PUBLIC_ROOM_NAME.to_owned(),
            password_cost: DEFAULT_PASSWORD_COST,
            spawn: (705.0, 500.0),
        }
    }
}

impl RoomConfig {
    /// Build room config from `ROOM_*` environment variables.
    ///
    /// Optional (defaults in parentheses):
    /// - `ROOM_BOOTH_COUNT` (1), `ROOM_BOOTH_SEATS` (4)
    /// - `ROOM_HEARTBEAT_MS` (5000)
    /// - `ROOM_PUNCH_DELAY_MS` (350), `ROOM_KNOCKBACK_DELAY_MS` (150)
    /// - `ROOM_KNOCKBACK_PX` (6), `ROOM_PUNCH_RANGE_PX` (65)
    /// - `ROOM_ACTION_MIN_INTERVAL_MS` (50)
    /// - `ROOM_MAX_SPEED_PX_PER_SEC` (240), `ROOM_SPEED_BUFFER_PX` (40)
    /// - `ROOM_CHAT_HISTORY` (100)
    /// - `ROOM_TRACK_MIN_SECS` (5), `ROOM_TRACK_BUFFER_SECS` (10)
    /// - `ROOM_MAILBOX_CAPACITY` (256)
    /// - `ROOM_PASSWORD_COST` (bcrypt default, clamped to 4..=31)
    /// - `ROOM_AMBIENT_LINK`, `ROOM_PUBLIC_NAME`
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            booth_count: env_parse("ROOM_BOOTH_COUNT", DEFAULT_BOOTH_COUNT).max(1),
            booth_seats: env_parse("ROOM_BOOTH_SEATS", DEFAULT_BOOTH_SEATS).max(1),
            heartbeat: Duration::from_millis(env_parse("ROOM_HEARTBEAT_MS", DEFAULT_HEARTBEAT_MS).max(100)),
            punch_delay: Duration::from_millis(env_parse("ROOM_PUNCH_DELAY_MS", DEFAULT_PUNCH_DELAY_MS)),
            knockback_delay: Duration::from_millis(env_parse("ROOM_KNOCKBACK_DELAY_MS", DEFAULT_KNOCKBACK_DELAY_MS)),
            knockback_px: env_parse("ROOM_KNOCKBACK_PX", DEFAULT_KNOCKBACK_PX),
            punch_range_px: env_parse("ROOM_PUNCH_RANGE_PX", DEFAULT_PUNCH_RANGE_PX),
            action_min_interval_ms: env_parse("ROOM_ACTION_MIN_INTERVAL_MS", DEFAULT_ACTION_MIN_INTERVAL_MS),
            max_speed_px_per_sec: env_parse("ROOM_MAX_SPEED_PX_PER_SEC", DEFAULT_MAX_SPEED_PX_PER_SEC),
            speed_buffer_px: env_parse("ROOM_SPEED_BUFFER_PX", DEFAULT_SPEED_BUFFER_PX),
            chat_history: env_parse("ROOM_CHAT_HISTORY", DEFAULT_CHAT_HISTORY).max(1),
            track_min: Duration::from_secs(env_parse("ROOM_TRACK_MIN_SECS", DEFAULT_TRACK_MIN_SECS)),
            track_buffer: Duration::from_secs(env_parse("ROOM_TRACK_BUFFER_SECS", DEFAULT_TRACK_BUFFER_SECS)),
            mailbox_capacity: env_parse("ROOM_MAILBOX_CAPACITY", DEFAULT_MAILBOX_CAPACITY).max(1),
            ambient_link: std::env::var("ROOM_AMBIENT_LINK").unwrap_or(defaults.ambient_link),
            public_room_name: std::env::var("ROOM_PUBLIC_NAME").unwrap_or(defaults.public_room_name),
            password_cost: env_parse("ROOM_PASSWORD_COST", DEFAULT_PASSWORD_COST).clamp(MIN_COST, MAX_COST),
            spawn: defaults.spawn,
        }
    }

    /// Watchdog delay for a track of `duration_secs`:
    /// `max(duration, track_min) + track_buffer`.
    #[must_use]
    pub fn track_watchdog(&self, duration_secs: f64) -> Duration {
        let duration = if duration_secs.is_finite() && duration_secs > 0.0 {
            Duration::from_secs_f64(duration_secs.min(MAX_TRACK_SECS))
        } else {
            Duration::ZERO
        };
        duration.max(self.track_min) + self.track_buffer
    }
}

fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
