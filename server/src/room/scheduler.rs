//! Music stream scheduler.
//!
//! DESIGN
//! ======
//! The stream moves `waiting -> seeking -> playing | waiting`. `seeking` only
//! exists inside a single call to [`advance`]; every path out of it ends in
//! `playing` (via [`start_track`]) or `waiting` (via [`stop`]).
//!
//! Two sources feed the stream:
//! - per-DJ rotation: the `DjQueue` front plays the head of its look-ahead
//! - the room playlist: a cursor over `RoomState::room_playlist`, driven by
//!   the primary DJ
//!
//! The public room falls back to a looping ambient track whenever booth 0
//! is empty and people are around.
//!
//! Every transition to playing bumps `streamId` before `music:start` goes
//! out, and arms a watchdog tagged with that id for non-ambient tracks with a
//! known duration.

use frames::{DjInfo, MusicStream, StreamStatus};
use serde_json::{Value, json};
use tracing::{debug, info};

use super::dispatch::{Ctx, Effect};
use crate::frame::Data;

/// What to put on air.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub link: String,
    pub title: String,
    pub duration: f64,
    pub dj: Option<DjInfo>,
    pub booth: Option<usize>,
    /// Cursor position when the track comes from the room playlist.
    pub playlist_index: Option<usize>,
    pub ambient: bool,
}

// =============================================================================
// EVENT PAYLOADS
// =============================================================================

/// `music:start` payload for a stream, with the offset a listener joining at
/// `now_ms` should seek to.
#[must_use]
pub fn start_payload(stream: &MusicStream, now_ms: i64) -> Data {
    let mut data = Data::new();
    data.insert("musicStream".into(), serde_json::to_value(stream).unwrap_or(Value::Null));
    data.insert("offset".into(), json!(stream.offset_secs(now_ms)));
    data
}

/// `music:tick` payload, or `None` when nothing is on air.
#[must_use]
pub fn heartbeat(stream: &MusicStream, now_ms: i64) -> Option<Data> {
    if !stream.is_playing() {
        return None;
    }
    let mut data = Data::new();
    data.insert("streamId".into(), json!(stream.stream_id));
    data.insert("startTime".into(), json!(stream.start_time));
    data.insert("serverNowMs".into(), json!(now_ms));
    Some(data)
}

// =============================================================================
// TRANSITIONS
// =============================================================================

pub fn start_track(ctx: &mut Ctx<'_>, track: Track) {
    let now = ctx.now_ms;
    let stream = &mut ctx.state.music_stream;
    stream.status = StreamStatus::Playing;
    stream.stream_id += 1;
    stream.current_link = Some(track.link);
    stream.current_title = Some(track.title);
    stream.current_dj = track.dj;
    stream.current_booth = track.booth;
    stream.start_time = now;
    stream.duration = track.duration;
    stream.is_ambient = track.ambient;
    stream.is_room_playlist = track.playlist_index.is_some();
    if let Some(index) = track.playlist_index {
        stream.room_playlist_index = index;
    }

    let stream_id = stream.stream_id;
    let duration = stream.duration;
    info!(
        room_id = %ctx.info.id,
        stream_id,
        link = stream.current_link.as_deref().unwrap_or_default(),
        ambient = stream.is_ambient,
        playlist = stream.is_room_playlist,
        "scheduler: track started"
    );

    let data = start_payload(&ctx.state.music_stream, now);
    ctx.broadcast("music:start", data);
    // Ambient loops and tracks of unknown length (duration 0) run until
    // someone moves the stream on.
    if track.ambient || !duration.is_finite() || duration <= 0.0 {
        ctx.effects.push(Effect::CancelWatchdog);
    } else {
        let after = ctx.config.track_watchdog(duration);
        ctx.effects.push(Effect::ArmWatchdog { stream_id, after });
    }
}

/// Go to `waiting`. A stream that had nothing on air stays silent.
pub fn stop(ctx: &mut Ctx<'_>) {
    let stream = &mut ctx.state.music_stream;
    if stream.current_link.is_none() && stream.status == StreamStatus::Waiting {
        return;
    }

    stream.status = StreamStatus::Waiting;
    stream.current_link = None;
    stream.current_title = None;
    stream.current_dj = None;
    stream.current_booth = None;
    stream.start_time = ctx.now_ms;
    stream.duration = 0.0;
    stream.is_ambient = false;

    info!(room_id = %ctx.info.id, stream_id = stream.stream_id, "scheduler: stream stopped");
    ctx.effects.push(Effect::CancelWatchdog);
    ctx.broadcast("music:stop", Data::new());
}

/// Per-DJ rotation.
///
/// The DJ who just finished rotates to the back if they are still at the
/// front. The ring is then walked once: the first DJ with a non-empty
/// look-ahead plays its head and stays at the front. With no candidate the
/// stream goes to `waiting`, except that an ambient track already on air is
/// left alone.
pub fn advance(ctx: &mut Ctx<'_>) {
    let stream = &ctx.state.music_stream;
    let finished = (stream.is_playing() && !stream.is_ambient && !stream.is_room_playlist)
        .then(|| stream.current_dj_id().map(str::to_owned))
        .flatten();
    if stream.is_playing() && !stream.is_ambient {
        ctx.state.music_stream.status = StreamStatus::Seeking;
    }

    if let Some(finished) = finished.as_deref()
        && ctx.state.dj_queue.peek().map(String::as_str) == Some(finished)
    {
        ctx.state.dj_queue.rotate();
    }

    if let Some(track) = next_dj_track(ctx) {
        start_track(ctx, track);
        return;
    }

    let stream = &ctx.state.music_stream;
    if stream.is_ambient && stream.is_playing() {
        debug!(room_id = %ctx.info.id, "scheduler: no dj track, ambient keeps playing");
        return;
    }
    stop(ctx);
    ensure_ambient(ctx);
}

/// Walk the ring at most once, rotating past DJs with nothing to play.
/// Pops the chosen look-ahead head.
fn next_dj_track(ctx: &mut Ctx<'_>) -> Option<Track> {
    for _ in 0..ctx.state.dj_queue.len() {
        let front = ctx.state.dj_queue.peek()?.clone();
        let booth = ctx.state.seat_of(&front).map(|(booth, _)| booth);
        if let Some(player) = ctx.state.players.get_mut(&front)
            && !player.lookahead.is_empty()
        {
            let item = player.lookahead.remove(0);
            return Some(Track {
                link: item.link,
                title: item.title,
                duration: item.duration,
                dj: Some(DjInfo { name: player.name.clone(), session_id: front }),
                booth,
                playlist_index: None,
                ambient: false,
            });
        }
        ctx.state.dj_queue.rotate();
    }
    None
}

/// Start the ambient loop if the room qualifies and nothing real is on air.
pub fn ensure_ambient(ctx: &mut Ctx<'_>) {
    if !ctx.info.is_public || ctx.state.has_booth_dj() || ctx.state.players.is_empty() {
        return;
    }
    if ctx.state.music_stream.is_playing() {
        return;
    }
    let link = ctx.config.ambient_link.clone();
    start_track(
        ctx,
        Track {
            link,
            title: "Ambient".to_owned(),
            duration: 0.0,
            dj: None,
            booth: None,
            playlist_index: None,
            ambient: true,
        },
    );
}

/// A DJ sat down in booth 0: take the ambient loop off air.
pub fn preempt_ambient(ctx: &mut Ctx<'_>) {
    let stream = &ctx.state.music_stream;
    if stream.is_ambient && stream.is_playing() {
        debug!(room_id = %ctx.info.id, "scheduler: ambient pre-empted");
        stop(ctx);
    }
}

/// Watchdog fired. Stale ids (the stream moved on) are ignored.
pub fn track_ended(ctx: &mut Ctx<'_>, stream_id: u64) {
    let stream = &ctx.state.music_stream;
    if stream.stream_id != stream_id || !stream.is_playing() || stream.is_ambient {
        debug!(room_id = %ctx.info.id, stream_id, "scheduler: stale watchdog");
        return;
    }
    info!(room_id = %ctx.info.id, stream_id, "scheduler: track ended");
    if stream.is_room_playlist {
        playlist_skip(ctx);
    } else {
        advance(ctx);
    }
}

// =============================================================================
// ROOM PLAYLIST
// =============================================================================

/// Play the item under the clamped cursor.
pub fn playlist_play(ctx: &mut Ctx<'_>) {
    let Some(last) = ctx.state.room_playlist.len().checked_sub(1) else {
        stop(ctx);
        ensure_ambient(ctx);
        return;
    };
    let index = ctx.state.music_stream.room_playlist_index.min(last);
    play_playlist_item(ctx, index);
}

/// Cursor + 1. Past the end goes to `waiting` without wrapping.
pub fn playlist_skip(ctx: &mut Ctx<'_>) {
    let Some(last) = ctx.state.room_playlist.len().checked_sub(1) else {
        stop(ctx);
        ensure_ambient(ctx);
        return;
    };
    let next = ctx.state.music_stream.room_playlist_index.saturating_add(1);
    if next > last {
        ctx.state.music_stream.room_playlist_index = last;
        stop(ctx);
        ensure_ambient(ctx);
        return;
    }
    play_playlist_item(ctx, next);
}

/// Cursor - 1, clamped at the first item.
pub fn playlist_prev(ctx: &mut Ctx<'_>) {
    let Some(last) = ctx.state.room_playlist.len().checked_sub(1) else {
        stop(ctx);
        ensure_ambient(ctx);
        return;
    };
    let index = ctx.state.music_stream.room_playlist_index.saturating_sub(1).min(last);
    play_playlist_item(ctx, index);
}

fn play_playlist_item(ctx: &mut Ctx<'_>, index: usize) {
    let Some(item) = ctx.state.room_playlist.get(index).cloned() else {
        return;
    };
    let dj = ctx.state.primary_dj().and_then(|id| {
        ctx.state
            .players
            .get(id)
            .map(|player| DjInfo { name: player.name.clone(), session_id: player.id.clone() })
    });
    let booth = dj.as_ref().map(|_| 0);
    start_track(
        ctx,
        Track {
            link: item.link,
            title: item.title,
            duration: item.duration,
            dj,
            booth,
            playlist_index: Some(index),
            ambient: false,
        },
    );
}

#[cfg(test)]
#[path = "scheduler_test.rs"]
mod tests;
