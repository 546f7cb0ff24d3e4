//! Shared room playlist.
//!
//! Anyone present may add. Only the adder may remove, and never the item on
//! air. Reordering and transport controls belong to the primary DJ (booth 0,
//! seat 0). The stream's `roomPlaylistIndex` follows the item it points at
//! through removals and moves.

use serde_json::Value;
use uuid::Uuid;

use frames::RoomPlaylistItem;

use super::super::dispatch::{Ctx, Outcome};
use super::super::scheduler;
use crate::config::MAX_TRACK_SECS;
use crate::frame::{Data, Frame};

const MAX_LINK_CHARS: usize = 256;
const MAX_TITLE_CHARS: usize = 200;

fn is_primary_dj(ctx: &Ctx<'_>, sender: &str) -> bool {
    ctx.state.primary_dj() == Some(sender)
}

fn playing_from_playlist(ctx: &Ctx<'_>) -> bool {
    let stream = &ctx.state.music_stream;
    stream.is_room_playlist && stream.is_playing()
}

pub fn add(ctx: &mut Ctx<'_>, sender: &str, req: &Frame) -> Outcome {
    let Some(link) = req.get_str("link").map(str::trim).filter(|l| !l.is_empty()) else {
        return Outcome::Ignored("missing link");
    };
    if link.chars().count() > MAX_LINK_CHARS {
        return Outcome::Ignored("link too long");
    }
    let Some(duration) = req.get_f64("duration").filter(|d| (0.0..=MAX_TRACK_SECS).contains(d)) else {
        return Outcome::Ignored("invalid duration");
    };
    let title: String = req
        .get_str("title")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(link)
        .chars()
        .take(MAX_TITLE_CHARS)
        .collect();

    let id = Uuid::new_v4().to_string();
    ctx.state.room_playlist.push(RoomPlaylistItem {
        id: id.clone(),
        title,
        link: link.to_owned(),
        duration,
        added_at_ms: ctx.now_ms,
        added_by: sender.to_owned(),
    });

    let mut data = Data::new();
    data.insert("id".into(), Value::String(id));
    Outcome::Reply(data)
}

pub fn remove(ctx: &mut Ctx<'_>, sender: &str, req: &Frame) -> Outcome {
    let Some(id) = req.get_str("id") else {
        return Outcome::Ignored("missing id");
    };
    let Some(position) = ctx.state.room_playlist.iter().position(|item| item.id == id) else {
        return Outcome::Ignored("unknown item");
    };
    if ctx.state.room_playlist[position].added_by != sender {
        return Outcome::Ignored("only the adder may remove an item");
    }
    let cursor = ctx.state.music_stream.room_playlist_index;
    if position == cursor && playing_from_playlist(ctx) {
        return Outcome::Ignored("item is playing");
    }

    ctx.state.room_playlist.remove(position);
    let cursor = if position < cursor { cursor - 1 } else { cursor };
    ctx.state.music_stream.room_playlist_index = cursor.min(ctx.state.room_playlist.len().saturating_sub(1));
    Outcome::Done
}

pub fn reorder(ctx: &mut Ctx<'_>, sender: &str, req: &Frame) -> Outcome {
    if !is_primary_dj(ctx, sender) {
        return Outcome::Ignored("sender is not the primary dj");
    }
    let len = ctx.state.room_playlist.len();
    let (Some(from), Some(to)) = (req.get_index("fromIndex"), req.get_index("toIndex")) else {
        return Outcome::Ignored("missing indices");
    };
    if from >= len || to >= len {
        return Outcome::Ignored("index out of range");
    }
    if from == to {
        return Outcome::Done;
    }

    let cursor_id = ctx
        .state
        .room_playlist
        .get(ctx.state.music_stream.room_playlist_index)
        .map(|item| item.id.clone());
    let item = ctx.state.room_playlist.remove(from);
    ctx.state.room_playlist.insert(to, item);
    if let Some(cursor) =
        cursor_id.and_then(|id| ctx.state.room_playlist.iter().position(|item| item.id == id))
    {
        ctx.state.music_stream.room_playlist_index = cursor;
    }
    Outcome::Done
}

pub fn play(ctx: &mut Ctx<'_>, sender: &str, _req: &Frame) -> Outcome {
    if !is_primary_dj(ctx, sender) {
        return Outcome::Ignored("sender is not the primary dj");
    }
    scheduler::playlist_play(ctx);
    Outcome::Done
}

pub fn skip(ctx: &mut Ctx<'_>, sender: &str, _req: &Frame) -> Outcome {
    if !is_primary_dj(ctx, sender) {
        return Outcome::Ignored("sender is not the primary dj");
    }
    scheduler::playlist_skip(ctx);
    Outcome::Done
}

pub fn prev(ctx: &mut Ctx<'_>, sender: &str, _req: &Frame) -> Outcome {
    if !is_primary_dj(ctx, sender) {
        return Outcome::Ignored("sender is not the primary dj");
    }
    scheduler::playlist_prev(ctx);
    Outcome::Done
}

#[cfg(test)]
#[path = "playlist_test.rs"]
mod tests;
