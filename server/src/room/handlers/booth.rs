//! DJ booth seats.

use tracing::info;

use super::super::dispatch::{Ctx, Outcome};
use super::super::scheduler;
use crate::frame::Frame;

/// Take a seat. The sender must not already sit anywhere; the seat is the
/// requested one or the first free one. Seated DJs join the rotation.
pub fn connect(ctx: &mut Ctx<'_>, sender: &str, req: &Frame) -> Outcome {
    let Some(booth_index) = req.get_index("musicBoothIndex") else {
        return Outcome::Ignored("missing musicBoothIndex");
    };
    if ctx.state.seat_of(sender).is_some() {
        return Outcome::Ignored("already seated");
    }
    let Some(booth) = ctx.state.booths.get(booth_index) else {
        return Outcome::Ignored("booth out of range");
    };
    let seat = if req.data.contains_key("seatIndex") {
        match req.get_index("seatIndex") {
            Some(seat) if seat < booth.max_users() && booth.occupant(seat).is_none() => seat,
            _ => return Outcome::Ignored("seat unavailable"),
        }
    } else {
        match booth.first_free() {
            Some(seat) => seat,
            None => return Outcome::Ignored("booth full"),
        }
    };

    let Some(slot) = ctx.state.booths.get_mut(booth_index).and_then(|b| b.seats.get_mut(seat)) else {
        return Outcome::Ignored("seat unavailable");
    };
    *slot = Some(sender.to_owned());
    if let Some(player) = ctx.state.players.get_mut(sender) {
        player.ready_to_connect = false;
    }
    ctx.state.dj_queue.push(sender);
    info!(room_id = %ctx.info.id, player_id = %sender, booth_index, seat, "room: dj seated");

    if booth_index == 0 {
        scheduler::preempt_ambient(ctx);
    }
    if ctx.state.music_stream.is_idle() {
        scheduler::advance(ctx);
    }
    Outcome::Done
}

/// Leave a seat. Repeating it is a no-op. Only the seat feeding the stream
/// moves the rotation along.
pub fn disconnect(ctx: &mut Ctx<'_>, sender: &str, req: &Frame) -> Outcome {
    let Some(booth_index) = req.get_index("musicBoothIndex") else {
        return Outcome::Ignored("missing musicBoothIndex");
    };
    let Some(booth) = ctx.state.booths.get_mut(booth_index) else {
        return Outcome::Ignored("booth out of range");
    };
    let Some(seat) = booth.seat_of(sender) else {
        return Outcome::Ignored("not seated in booth");
    };
    booth.seats[seat] = None;
    info!(room_id = %ctx.info.id, player_id = %sender, booth_index, seat, "room: dj left booth");

    let stream = &ctx.state.music_stream;
    let feeding = stream.is_playing()
        && !stream.is_ambient
        && stream.current_booth == Some(booth_index)
        && stream.current_dj_id() == Some(sender);
    if feeding {
        scheduler::advance(ctx);
    }
    scheduler::ensure_ambient(ctx);
    Outcome::Done
}

#[cfg(test)]
#[path = "booth_test.rs"]
mod tests;
