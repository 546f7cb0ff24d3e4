//! DJ rotation commands: look-ahead, stream hand-off, queue membership.

use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use frames::PlaylistItem;

use super::super::dispatch::{Ctx, Outcome};
use super::super::scheduler;
use crate::config::MAX_TRACK_SECS;
use crate::frame::Frame;

/// Current plus next.
pub const MAX_LOOKAHEAD: usize = 2;

const MAX_LINK_CHARS: usize = 256;
const MAX_TITLE_CHARS: usize = 200;

/// Validate a client-supplied track. Missing ids get a fresh one.
pub(crate) fn parse_item(value: &Value, dj_id: &str) -> Option<PlaylistItem> {
    let link = value.get("link")?.as_str()?.trim();
    if link.is_empty() || link.chars().count() > MAX_LINK_CHARS {
        return None;
    }
    let duration = value.get("duration")?.as_f64()?;
    if !duration.is_finite() || duration < 0.0 || duration > MAX_TRACK_SECS {
        return None;
    }
    let title: String = value
        .get("title")
        .and_then(Value::as_str)
        .unwrap_or(link)
        .chars()
        .take(MAX_TITLE_CHARS)
        .collect();
    let id = value
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map_or_else(|| Uuid::new_v4().to_string(), str::to_owned);
    Some(PlaylistItem { id, title, link: link.to_owned(), duration, dj_id: dj_id.to_owned() })
}

fn is_current_dj(ctx: &Ctx<'_>, sender: &str) -> bool {
    let stream = &ctx.state.music_stream;
    stream.is_playing() && !stream.is_ambient && !stream.is_room_playlist && stream.current_dj_id() == Some(sender)
}

/// Replace the sender's look-ahead. A queued DJ with something to play gets
/// the stream if nothing real is on air.
pub fn set_lookahead(ctx: &mut Ctx<'_>, sender: &str, req: &Frame) -> Outcome {
    let Some(items) = req.data.get("items").and_then(Value::as_array) else {
        return Outcome::Ignored("items must be an array");
    };
    if items.len() > MAX_LOOKAHEAD {
        return Outcome::Ignored("too many look-ahead items");
    }
    let Some(items) = items.iter().map(|item| parse_item(item, sender)).collect::<Option<Vec<_>>>() else {
        return Outcome::Ignored("invalid look-ahead item");
    };
    let Some(player) = ctx.state.players.get_mut(sender) else {
        return Outcome::Ignored("sender has no player");
    };
    player.lookahead = items;

    if ctx.state.dj_queue.contains(sender) && ctx.state.music_stream.is_idle() {
        scheduler::advance(ctx);
    }
    Outcome::Done
}

/// The DJ's client reports its track finished (or hands over the next one).
pub fn sync_music_stream(ctx: &mut Ctx<'_>, sender: &str, req: &Frame) -> Outcome {
    if let Some(stream_id) = req.data.get("streamId").and_then(Value::as_u64)
        && stream_id != ctx.state.music_stream.stream_id
    {
        debug!(stream_id, current = ctx.state.music_stream.stream_id, "room: stale music sync");
        return Outcome::Ignored("stale streamId");
    }
    let idle_and_queued = ctx.state.music_stream.is_idle() && ctx.state.dj_queue.contains(sender);
    if !is_current_dj(ctx, sender) && !idle_and_queued {
        return Outcome::Ignored("sender is not the current dj");
    }

    if let Some(value) = req.data.get("item").filter(|v| !v.is_null()) {
        let Some(item) = parse_item(value, sender) else {
            return Outcome::Ignored("invalid item");
        };
        let Some(player) = ctx.state.players.get_mut(sender) else {
            return Outcome::Ignored("sender has no player");
        };
        match player.lookahead.first_mut() {
            Some(head) if head.id != item.id => *head = item,
            Some(_) => {}
            None => player.lookahead.push(item),
        }
    }

    scheduler::advance(ctx);
    Outcome::Done
}

/// The current DJ takes their track off air but keeps their queue slot.
pub fn stop_music_stream(ctx: &mut Ctx<'_>, sender: &str, _req: &Frame) -> Outcome {
    if !is_current_dj(ctx, sender) {
        return Outcome::Ignored("sender is not the current dj");
    }
    scheduler::stop(ctx);
    Outcome::Done
}

pub fn queue_join(ctx: &mut Ctx<'_>, sender: &str, _req: &Frame) -> Outcome {
    if !ctx.state.dj_queue.push(sender) {
        return Outcome::Ignored("already queued");
    }
    if ctx.state.music_stream.is_idle() {
        scheduler::advance(ctx);
    }
    Outcome::Done
}

pub fn queue_leave(ctx: &mut Ctx<'_>, sender: &str, _req: &Frame) -> Outcome {
    let was_current = is_current_dj(ctx, sender);
    if !ctx.state.dj_queue.remove(sender) {
        return Outcome::Ignored("not queued");
    }
    if was_current {
        scheduler::advance(ctx);
    }
    Outcome::Done
}

pub fn queue_skip(ctx: &mut Ctx<'_>, sender: &str, _req: &Frame) -> Outcome {
    if !is_current_dj(ctx, sender) {
        return Outcome::Ignored("sender is not the current dj");
    }
    scheduler::advance(ctx);
    Outcome::Done
}

#[cfg(test)]
#[path = "dj_test.rs"]
mod tests;
