//! Sync session: the client-side mirror of one room.
//!
//! ARCHITECTURE
//! ============
//! `SyncSession` is a plain context object with no I/O of its own. The
//! connection runner feeds it inbound frames and a periodic `poll`, and
//! drains the frames it wants sent. Everything it decides comes back as
//! [`SyncEvent`]s or as calls on the [`MediaPlayer`].
//!
//! STATE
//! =====
//! The room state is rebuilt from `room:snapshot` and advanced by
//! `room:patch`. A patch that does not start at the local version means a
//! frame was lost; the session drops patches and asks for a fresh snapshot.
//!
//! PLAYBACK
//! ========
//! Playback is driven by `music:start` / `music:stop`, and by the stream a
//! snapshot carries. A `music:tick` for a stream this session never started
//! means a start was lost, so it asks for a snapshot. The position is always
//! derived from the estimated server clock, never from the offset the server
//! computed when it sent the frame.

use std::time::Duration;

use frames::{MusicStream, Patch, PatchError, RoomData, RoomState, Status};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::clock::{ClockConfig, ClockSync, PingSchedule};
use crate::drift::{DriftAction, DriftConfig, DriftCorrector};
use crate::player::MediaPlayer;

#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub clock: ClockConfig,
    pub drift: DriftConfig,
    /// Seeks after a resume, spaced out so a fresh clock sample can land.
    pub realign_delays: Vec<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            clock: ClockConfig::default(),
            drift: DriftConfig::default(),
            realign_delays: vec![Duration::from_millis(150), Duration::from_millis(900)],
        }
    }
}

/// Something the session observed or did, for the embedding application.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    Connected { client_id: String },
    RoomData(RoomData),
    Snapshot { version: u64 },
    Patched { version: u64, changes: usize },
    /// A patch did not fit; a snapshot was requested.
    Resync { expected: u64, got: u64 },
    TrackStarted { stream_id: u64, link: String, title: Option<String>, position_secs: f64, ambient: bool },
    TrackStopped,
    /// A `music:start` older than the current stream was dropped.
    StaleTrack { stream_id: u64 },
    /// A tick named a stream that never started here; a snapshot was requested.
    MissedTrack { stream_id: u64 },
    Tick { stream_id: u64 },
    ClockSynced { offset_ms: f64, rtt_ms: f64 },
    Punched { anim: String, x: f64, y: f64 },
    Drift(DriftAction),
    Reply { syscall: String, data: Value },
    ServerError { syscall: String, code: Option<String>, message: String },
}

pub struct SyncSession<P: MediaPlayer> {
    config: SessionConfig,
    player: P,
    clock: ClockSync,
    pings: PingSchedule,
    drift: DriftCorrector,
    client_id: Option<String>,
    room: Option<RoomData>,
    state: Option<RoomState>,
    stream: Option<MusicStream>,
    last_stream_id: Option<u64>,
    awaiting_snapshot: bool,
    realign_at: Vec<i64>,
    tick_resync_armed: bool,
    outbox: Vec<frames::Frame>,
}

impl<P: MediaPlayer> SyncSession<P> {
    pub fn new(player: P, config: SessionConfig) -> Self {
        Self {
            pings: PingSchedule::new(config.clock),
            drift: DriftCorrector::new(config.drift),
            config,
            player,
            clock: ClockSync::new(),
            client_id: None,
            room: None,
            state: None,
            stream: None,
            last_stream_id: None,
            awaiting_snapshot: false,
            realign_at: Vec::new(),
            tick_resync_armed: false,
            outbox: Vec::new(),
        }
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Frames to send right after the socket opens.
    pub fn connect(&mut self, now_ms: i64) -> Vec<frames::Frame> {
        self.pings.start_burst(now_ms);
        self.poll(now_ms);
        self.take_outbox()
    }

    /// The app regained focus or visibility: re-measure the clock and
    /// realign playback once the new samples are in.
    pub fn resume(&mut self, now_ms: i64) {
        self.resync_clock(now_ms);
        self.tick_resync_armed = true;
    }

    /// Stop playback and forget everything learned from the server.
    pub fn teardown(&mut self) {
        self.player.stop();
        self.drift.stop();
        self.pings.stop();
        self.clock.reset();
        self.client_id = None;
        self.room = None;
        self.state = None;
        self.stream = None;
        self.last_stream_id = None;
        self.awaiting_snapshot = false;
        self.realign_at.clear();
        self.tick_resync_armed = false;
        self.outbox.clear();
    }

    /// Queue a command for the server and return its frame id.
    pub fn send(&mut self, syscall: &str, data: Value) -> String {
        let frame = frames::Frame::request(Uuid::new_v4().to_string(), syscall, data);
        let id = frame.id.clone();
        self.outbox.push(frame);
        id
    }

    pub fn take_outbox(&mut self) -> Vec<frames::Frame> {
        std::mem::take(&mut self.outbox)
    }

    // =========================================================================
    // TIMERS
    // =========================================================================

    /// Run due clock pings, resume realignment, and drift sampling.
    pub fn poll(&mut self, now_ms: i64) -> Vec<SyncEvent> {
        let mut events = Vec::new();

        if self.pings.take_due(now_ms) {
            self.send("clock:sync", ClockSync::request_payload(now_ms));
        }

        let before = self.realign_at.len();
        self.realign_at.retain(|at| *at > now_ms);
        if self.realign_at.len() < before {
            if let Some(expected) = self.expected_position_secs(now_ms) {
                debug!(expected, "sync: realigning playback");
                self.player.seek(expected);
            }
        }

        if let Some(expected) = self.expected_position_secs(now_ms) {
            let action = self.drift.poll(now_ms, expected, &mut self.player);
            if action != DriftAction::None {
                events.push(SyncEvent::Drift(action));
            }
        }
        events
    }

    // =========================================================================
    // INBOUND
    // =========================================================================

    pub fn handle_frame(&mut self, frame: &frames::Frame, now_ms: i64) -> Vec<SyncEvent> {
        if frame.status == Status::Error {
            return vec![server_error(frame)];
        }

        match frame.syscall.as_str() {
            "session:connected" => self.on_connected(frame),
            "room:data" => parse::<RoomData>(&frame.data).map_or_else(Vec::new, |data| {
                self.room = Some(data.clone());
                vec![SyncEvent::RoomData(data)]
            }),
            "room:snapshot" => self.on_snapshot(frame, now_ms),
            "room:patch" => self.on_patch(frame),
            "music:start" => self.on_music_start(frame, now_ms),
            "music:stop" => self.on_music_stop(),
            "music:tick" => self.on_tick(frame, now_ms),
            "clock:sync" => self.on_clock_reply(frame, now_ms),
            "player:punched" => on_punched(frame),
            _ if frame.status == Status::Done => {
                vec![SyncEvent::Reply { syscall: frame.syscall.clone(), data: frame.data.clone() }]
            }
            _ => {
                debug!(syscall = %frame.syscall, "sync: unhandled frame");
                Vec::new()
            }
        }
    }

    fn on_connected(&mut self, frame: &frames::Frame) -> Vec<SyncEvent> {
        let Some(client_id) = frame.data.get("clientId").and_then(Value::as_str) else {
            return Vec::new();
        };
        self.client_id = Some(client_id.to_owned());
        vec![SyncEvent::Connected { client_id: client_id.to_owned() }]
    }

    fn on_snapshot(&mut self, frame: &frames::Frame, now_ms: i64) -> Vec<SyncEvent> {
        let Some(state) = parse::<RoomState>(frame.data.get("state").unwrap_or(&Value::Null)) else {
            warn!("sync: snapshot without state");
            return Vec::new();
        };
        let version = state.version;
        let on_air = state.music_stream.clone();
        self.state = Some(state);
        self.awaiting_snapshot = false;

        let mut events = vec![SyncEvent::Snapshot { version }];
        if on_air.is_playing() {
            if self.last_stream_id.is_none_or(|last| on_air.stream_id > last) {
                events.extend(self.start_stream(on_air, now_ms));
            }
        } else if self.stream.is_some() {
            events.extend(self.on_music_stop());
        }
        events
    }

    fn on_patch(&mut self, frame: &frames::Frame) -> Vec<SyncEvent> {
        if self.awaiting_snapshot {
            return Vec::new();
        }
        let Some(state) = self.state.as_mut() else {
            return Vec::new();
        };
        let Some(patch) = parse::<Patch>(frame.data.get("patch").unwrap_or(&Value::Null)) else {
            return Vec::new();
        };

        match state.apply(&patch) {
            Ok(()) => vec![SyncEvent::Patched { version: patch.to_version, changes: patch.changes.len() }],
            Err(err) => {
                let (expected, got) = match err {
                    PatchError::VersionGap { expected, got } => (expected, got),
                    _ => (state.version, patch.from_version),
                };
                warn!(error = %err, "sync: patch rejected, requesting snapshot");
                self.awaiting_snapshot = true;
                self.send("room:snapshot", json!({}));
                vec![SyncEvent::Resync { expected, got }]
            }
        }
    }

    fn on_music_start(&mut self, frame: &frames::Frame, now_ms: i64) -> Vec<SyncEvent> {
        let Some(stream) = parse::<MusicStream>(frame.data.get("musicStream").unwrap_or(&Value::Null)) else {
            return Vec::new();
        };
        if self.last_stream_id.is_some_and(|last| stream.stream_id < last) {
            debug!(stream_id = stream.stream_id, "sync: stale music:start dropped");
            return vec![SyncEvent::StaleTrack { stream_id: stream.stream_id }];
        }
        if self.stream.as_ref().is_some_and(|s| s.stream_id == stream.stream_id && s.start_time == stream.start_time) {
            debug!(stream_id = stream.stream_id, "sync: music:start already applied");
            return Vec::new();
        }
        self.start_stream(stream, now_ms)
    }

    fn start_stream(&mut self, stream: MusicStream, now_ms: i64) -> Vec<SyncEvent> {
        let Some(link) = stream.current_link.clone() else {
            return Vec::new();
        };

        self.last_stream_id = Some(stream.stream_id);
        let position_secs = stream.offset_secs(self.clock.server_now_ms(now_ms));
        self.player.load(&link, position_secs, stream.is_ambient);
        // Ambient streams loop, so their position is never corrected.
        if stream.is_ambient {
            self.drift.stop();
        } else {
            self.drift.start(now_ms);
        }
        info!(stream_id = stream.stream_id, %link, position_secs, ambient = stream.is_ambient, "sync: track started");

        let event = SyncEvent::TrackStarted {
            stream_id: stream.stream_id,
            link,
            title: stream.current_title.clone(),
            position_secs,
            ambient: stream.is_ambient,
        };
        self.stream = Some(stream);
        vec![event]
    }

    fn on_music_stop(&mut self) -> Vec<SyncEvent> {
        self.player.stop();
        self.drift.stop();
        self.stream = None;
        vec![SyncEvent::TrackStopped]
    }

    fn on_tick(&mut self, frame: &frames::Frame, now_ms: i64) -> Vec<SyncEvent> {
        let Some(stream_id) = frame.data.get("streamId").and_then(Value::as_u64) else {
            return Vec::new();
        };
        let start_time = frame.data.get("startTime").and_then(Value::as_i64);

        let mut events = vec![SyncEvent::Tick { stream_id }];
        let unseen = self.last_stream_id.is_none_or(|last| stream_id > last);
        if unseen && self.state.is_some() && !self.awaiting_snapshot {
            warn!(stream_id, "sync: tick for a stream that never started, requesting snapshot");
            self.awaiting_snapshot = true;
            self.send("room:snapshot", json!({}));
            events.push(SyncEvent::MissedTrack { stream_id });
        }

        let current = self.stream.as_ref().is_some_and(|s| s.stream_id == stream_id && Some(s.start_time) == start_time);
        if self.tick_resync_armed && current {
            self.tick_resync_armed = false;
            self.resync_clock(now_ms);
        } else if self.clock.is_stale(now_ms, self.config.clock.stale_after) {
            self.pings.start_burst(now_ms);
        }
        events
    }

    fn on_clock_reply(&mut self, frame: &frames::Frame, now_ms: i64) -> Vec<SyncEvent> {
        if frame.status != Status::Done || !self.clock.handle_reply(&frame.data, now_ms) {
            return Vec::new();
        }
        let (Some(offset_ms), Some(rtt_ms)) = (self.clock.offset_ms(), self.clock.best_rtt_ms()) else {
            return Vec::new();
        };
        debug!(offset_ms, rtt_ms, "sync: clock sample accepted");
        vec![SyncEvent::ClockSynced { offset_ms, rtt_ms }]
    }

    #[allow(clippy::cast_possible_truncation)]
    fn resync_clock(&mut self, now_ms: i64) {
        self.pings.start_burst(now_ms);
        self.realign_at = self
            .config
            .realign_delays
            .iter()
            .map(|delay| now_ms + delay.as_millis() as i64)
            .collect();
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    #[must_use]
    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    #[must_use]
    pub fn room(&self) -> Option<&RoomData> {
        self.room.as_ref()
    }

    #[must_use]
    pub fn state(&self) -> Option<&RoomState> {
        self.state.as_ref()
    }

    #[must_use]
    pub fn stream(&self) -> Option<&MusicStream> {
        self.stream.as_ref()
    }

    #[must_use]
    pub fn clock(&self) -> &ClockSync {
        &self.clock
    }

    #[must_use]
    pub fn player(&self) -> &P {
        &self.player
    }

    pub fn player_mut(&mut self) -> &mut P {
        &mut self.player
    }

    #[must_use]
    pub fn server_now_ms(&self, local_now_ms: i64) -> i64 {
        self.clock.server_now_ms(local_now_ms)
    }

    /// Where playback should be right now, if anything is playing.
    #[must_use]
    pub fn expected_position_secs(&self, local_now_ms: i64) -> Option<f64> {
        let stream = self.stream.as_ref()?;
        Some(stream.offset_secs(self.clock.server_now_ms(local_now_ms)))
    }
}

fn parse<T: DeserializeOwned>(value: &Value) -> Option<T> {
    serde_json::from_value(value.clone()).ok()
}

fn on_punched(frame: &frames::Frame) -> Vec<SyncEvent> {
    let anim = frame.data.get("anim").and_then(Value::as_str);
    let x = frame.data.get("x").and_then(Value::as_f64);
    let y = frame.data.get("y").and_then(Value::as_f64);
    match (anim, x, y) {
        (Some(anim), Some(x), Some(y)) => vec![SyncEvent::Punched { anim: anim.to_owned(), x, y }],
        _ => Vec::new(),
    }
}

fn server_error(frame: &frames::Frame) -> SyncEvent {
    let text = |key: &str| frame.data.get(key).and_then(Value::as_str).map(str::to_owned);
    SyncEvent::ServerError {
        syscall: frame.syscall.clone(),
        code: text("code"),
        message: text("message").unwrap_or_default(),
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
