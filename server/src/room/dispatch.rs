//! Command dispatch table.
//!
//! DESIGN
//! ======
//! Handlers are plain functions `(ctx, sender, frame) -> Outcome` registered
//! in a table keyed by syscall. They validate, mutate `ctx.state` in place,
//! and record side effects (events, timers) on `ctx.effects`; they never
//! touch sockets. The room actor owns the loop that turns a mutated state
//! into a patch and effects into frames, so every handler runs as one
//! atomic step relative to every other command in the room.
//!
//! ERROR HANDLING
//! ==============
//! Malformed or unauthorized commands return `Outcome::Ignored` with a short
//! reason. Nothing is mutated, nothing is sent back; the reason is only
//! logged at debug level.

use std::collections::HashMap;
use std::time::Duration;

use frames::{RoomState, SessionId};

use super::RoomInfo;
use super::handlers::{booth, chat, dj, player, playlist, session};
use crate::config::RoomConfig;
use crate::frame::{Data, Frame};

// =============================================================================
// OUTCOME + EFFECTS
// =============================================================================

/// What the dispatch layer should send back to the command's sender.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Dropped. No mutation happened; the reason is for logs only.
    Ignored(&'static str),
    /// Applied; no direct reply (movement, for instance).
    Applied,
    /// Applied; send an empty done to the sender.
    Done,
    /// Applied; send done+data to the sender.
    Reply(Data),
}

impl Outcome {
    #[must_use]
    pub fn is_ignored(&self) -> bool {
        matches!(self, Self::Ignored(_))
    }
}

/// One-shot timers. They fire back into the room mailbox.
#[derive(Debug, Clone, PartialEq)]
pub enum Timer {
    /// Hit animation lands on the target.
    PunchImpact { target: SessionId, anim: String, from: (f64, f64) },
    /// Target is pushed away from where the attacker stood.
    Knockback { target: SessionId, from: (f64, f64) },
    /// The track tagged `stream_id` should have ended by now.
    TrackEnded { stream_id: u64 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Broadcast { syscall: &'static str, data: Data },
    /// Broadcast to every session but one.
    BroadcastExcept { except: SessionId, syscall: &'static str, data: Data },
    Send { to: SessionId, syscall: &'static str, data: Data },
    Schedule { after: Duration, timer: Timer },
    /// Replaces any armed watchdog.
    ArmWatchdog { stream_id: u64, after: Duration },
    CancelWatchdog,
}

// =============================================================================
// CONTEXT
// =============================================================================

/// Server-only per-room bookkeeping that is never replicated.
#[derive(Debug, Default)]
pub struct Runtime {
    /// Last accepted `player:action` per session, epoch ms.
    pub last_action_ms: HashMap<SessionId, i64>,
    pub chat_seq: u64,
}

pub struct Ctx<'a> {
    pub state: &'a mut RoomState,
    pub info: &'a RoomInfo,
    pub config: &'a RoomConfig,
    pub runtime: &'a mut Runtime,
    pub now_ms: i64,
    pub effects: Vec<Effect>,
}

impl<'a> Ctx<'a> {
    pub fn new(
        state: &'a mut RoomState,
        info: &'a RoomInfo,
        config: &'a RoomConfig,
        runtime: &'a mut Runtime,
        now_ms: i64,
    ) -> Self {
        Self { state, info, config, runtime, now_ms, effects: Vec::new() }
    }

    pub fn broadcast(&mut self, syscall: &'static str, data: Data) {
        self.effects.push(Effect::Broadcast { syscall, data });
    }

    pub fn broadcast_except(&mut self, except: impl Into<SessionId>, syscall: &'static str, data: Data) {
        self.effects.push(Effect::BroadcastExcept { except: except.into(), syscall, data });
    }

    pub fn send(&mut self, to: impl Into<SessionId>, syscall: &'static str, data: Data) {
        self.effects.push(Effect::Send { to: to.into(), syscall, data });
    }

    pub fn schedule(&mut self, after: Duration, timer: Timer) {
        self.effects.push(Effect::Schedule { after, timer });
    }
}

// =============================================================================
// TABLE
// =============================================================================

pub type Handler = fn(&mut Ctx<'_>, &str, &Frame) -> Outcome;

/// Syscall prefixes routed into a room mailbox.
pub const ROOM_PREFIXES: [&str; 8] = ["player", "booth", "dj", "music", "queue", "playlist", "chat", "room"];

pub struct Dispatcher {
    table: HashMap<&'static str, Handler>,
}

impl Dispatcher {
    #[must_use]
    pub fn new() -> Self {
        let entries: [(&'static str, Handler); 22] = [
            ("player:action", player::action),
            ("player:punch", player::punch),
            ("player:jump", player::jump),
            ("player:name", player::rename),
            ("player:ready", player::ready),
            ("player:scale", player::scale),
            ("booth:connect", booth::connect),
            ("booth:disconnect", booth::disconnect),
            ("dj:lookahead", dj::set_lookahead),
            ("music:sync", dj::sync_music_stream),
            ("music:stop", dj::stop_music_stream),
            ("queue:join", dj::queue_join),
            ("queue:leave", dj::queue_leave),
            ("queue:skip", dj::queue_skip),
            ("playlist:add", playlist::add),
            ("playlist:remove", playlist::remove),
            ("playlist:reorder", playlist::reorder),
            ("playlist:skip", playlist::skip),
            ("playlist:prev", playlist::prev),
            ("playlist:play", playlist::play),
            ("chat:message", chat::message),
            ("room:snapshot", session::snapshot),
        ];
        Self { table: entries.into_iter().collect() }
    }

    #[cfg(test)]
    pub fn handles(&self, syscall: &str) -> bool {
        self.table.contains_key(syscall)
    }

    /// Route one command. Commands from sessions without a live player are
    /// dropped before any handler runs.
    pub fn dispatch(&self, ctx: &mut Ctx<'_>, sender: &str, req: &Frame) -> Outcome {
        let Some(handler) = self.table.get(req.syscall.as_str()) else {
            return Outcome::Ignored("unknown syscall");
        };
        if !ctx.state.players.contains_key(sender) {
            return Outcome::Ignored("sender has no player");
        }
        handler(ctx, sender, req)
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "dispatch_test.rs"]
mod tests;
