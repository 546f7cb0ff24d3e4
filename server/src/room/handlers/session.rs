//! Session lifecycle inside a room: join, leave, resync.

use serde_json::Value;
use tracing::info;

use frames::Player;

use super::super::dispatch::{Ctx, Outcome};
use super::super::scheduler;
use crate::frame::{Data, Frame};

const DEFAULT_NAME: &str = "Anonymous";
const MAX_NAME_CHARS: usize = 32;

/// Every avatar spawns idle, facing down.
pub const SPAWN_ANIM: &str = "mutant_idle_down";

fn sanitize_name(name: &str) -> String {
    let name: String = name.trim().chars().take(MAX_NAME_CHARS).collect();
    if name.is_empty() { DEFAULT_NAME.to_owned() } else { name }
}

/// Create the player at the spawn point.
pub fn join(ctx: &mut Ctx<'_>, session_id: &str, name: &str) {
    let (x, y) = ctx.config.spawn;
    let player = Player::new(session_id, sanitize_name(name), x, y, SPAWN_ANIM);
    info!(room_id = %ctx.info.id, player_id = %session_id, name = %player.name, "room: player joined");
    ctx.state.players.insert(session_id.to_owned(), player);
    ctx.runtime.last_action_ms.insert(session_id.to_owned(), ctx.now_ms);
}

/// Tear down everything the session held: queue slot, seats, player.
/// The stream moves on if they were feeding it.
pub fn leave(ctx: &mut Ctx<'_>, session_id: &str) {
    let stream = &ctx.state.music_stream;
    let was_current = stream.is_playing() && !stream.is_ambient && stream.current_dj_id() == Some(session_id);

    ctx.state.dj_queue.remove(session_id);
    for booth in &mut ctx.state.booths {
        for seat in &mut booth.seats {
            if seat.as_deref() == Some(session_id) {
                *seat = None;
            }
        }
    }
    ctx.state.players.remove(session_id);
    ctx.runtime.last_action_ms.remove(session_id);
    info!(room_id = %ctx.info.id, player_id = %session_id, "room: player left");

    if was_current {
        scheduler::advance(ctx);
    }
    scheduler::ensure_ambient(ctx);
}

/// Reply with the full state so a client can rebuild its mirror.
pub fn snapshot(ctx: &mut Ctx<'_>, _sender: &str, _req: &Frame) -> Outcome {
    Outcome::Reply(snapshot_payload(ctx.state))
}

#[must_use]
pub fn snapshot_payload(state: &frames::RoomState) -> Data {
    let mut data = Data::new();
    data.insert("state".into(), serde_json::to_value(state).unwrap_or(Value::Null));
    data
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
