//! Player handlers: movement, punches, jumps, names, scale, and ready flags.
//!
//! Movement is authoritative on the server only as far as plausibility goes:
//! updates arriving faster than the configured interval, or covering more
//! ground than the speed limit allows, are dropped.

use frames::DEFAULT_SCALE;
use rand::Rng;
use tracing::debug;

use super::super::dispatch::{Ctx, Outcome, Timer};
use crate::config::HITTABLE_TEXTURE;
use crate::frame::{Data, Frame};

const MAX_NAME_CHARS: usize = 32;
const MAX_ANIM_CHARS: usize = 64;

/// Elapsed time credited to a single move is capped, so a long idle does not
/// license a teleport.
const MAX_CREDITED_MS: i64 = 1_000;

// =============================================================================
// MOVEMENT
// =============================================================================

pub fn action(ctx: &mut Ctx<'_>, sender: &str, req: &Frame) -> Outcome {
    let (Some(x), Some(y)) = (req.get_f64("x"), req.get_f64("y")) else {
        return Outcome::Ignored("x/y must be finite numbers");
    };
    let anim = match req.get_str("anim") {
        Some(anim) if anim.is_empty() || anim.chars().count() > MAX_ANIM_CHARS => {
            return Outcome::Ignored("invalid anim");
        }
        other => other,
    };

    let now = ctx.now_ms;
    let last = ctx.runtime.last_action_ms.get(sender).copied();
    let Some(player) = ctx.state.players.get_mut(sender) else {
        return Outcome::Ignored("sender has no player");
    };

    if let Some(last) = last {
        let elapsed = now - last;
        if elapsed < ctx.config.action_min_interval_ms {
            return Outcome::Ignored("action throttled");
        }
        #[allow(clippy::cast_precision_loss)]
        let credited = elapsed.min(MAX_CREDITED_MS) as f64 / 1000.0;
        let allowed = ctx.config.max_speed_px_per_sec * credited + ctx.config.speed_buffer_px;
        let travelled = (x - player.x).hypot(y - player.y);
        if travelled > allowed {
            debug!(player_id = %sender, travelled, allowed, "room: movement rejected");
            return Outcome::Ignored("moved too fast");
        }
    }

    player.x = x;
    player.y = y;
    if let Some(anim) = anim {
        anim.clone_into(&mut player.anim);
    }
    ctx.runtime.last_action_ms.insert(sender.to_owned(), now);
    Outcome::Applied
}

// =============================================================================
// PUNCH
// =============================================================================

pub fn punch(ctx: &mut Ctx<'_>, sender: &str, req: &Frame) -> Outcome {
    let Some(target_id) = req.get_str("targetId").filter(|id| !id.is_empty()) else {
        return Outcome::Ignored("missing targetId");
    };
    if target_id == sender {
        return Outcome::Ignored("cannot punch yourself");
    }
    let (Some(attacker), Some(target)) = (ctx.state.players.get(sender), ctx.state.players.get(target_id)) else {
        return Outcome::Ignored("unknown player");
    };

    let dx = attacker.x - target.x;
    let dy = attacker.y - target.y;
    if dx.hypot(dy) > ctx.config.punch_range_px {
        return Outcome::Ignored("target out of range");
    }
    if !is_hittable(&target.anim) {
        return Outcome::Ignored("target not hittable");
    }

    let hit = if rand::rng().random_bool(0.5) { "hit1" } else { "hit2" };
    let anim = format!("{HITTABLE_TEXTURE}_{hit}_{}", punch_direction(dx, dy));
    let from = (attacker.x, attacker.y);
    let target = target.id.clone();
    ctx.schedule(ctx.config.punch_delay, Timer::PunchImpact { target, anim, from });
    Outcome::Done
}

/// Delayed half of a punch: force the hit animation and tell the target.
pub fn punch_impact(ctx: &mut Ctx<'_>, target: &str, anim: &str, from: (f64, f64)) {
    let Some(player) = ctx.state.players.get_mut(target) else {
        return;
    };
    anim.clone_into(&mut player.anim);

    let mut data = Data::new();
    data.insert("anim".into(), anim.into());
    data.insert("x".into(), player.x.into());
    data.insert("y".into(), player.y.into());
    ctx.send(target, "player:punched", data);
    ctx.schedule(ctx.config.knockback_delay, Timer::Knockback { target: target.to_owned(), from });
}

/// Push the target a few pixels straight away from `from`.
pub fn knockback(ctx: &mut Ctx<'_>, target: &str, from: (f64, f64)) {
    let distance = ctx.config.knockback_px;
    let Some(player) = ctx.state.players.get_mut(target) else {
        return;
    };
    let dx = player.x - from.0;
    let dy = player.y - from.1;
    let len = dx.hypot(dy);
    if len <= f64::EPSILON {
        return;
    }
    player.x += dx / len * distance;
    player.y += dy / len * distance;
}

/// Cosmetic trampoline jump, shown to everyone else. Nothing is stored.
pub fn jump(ctx: &mut Ctx<'_>, sender: &str, _req: &Frame) -> Outcome {
    let mut data = Data::new();
    data.insert("sessionId".into(), sender.into());
    ctx.broadcast_except(sender, "player:jump", data);
    Outcome::Done
}

fn is_hittable(anim: &str) -> bool {
    anim.strip_prefix(HITTABLE_TEXTURE).is_some_and(|rest| rest.starts_with('_'))
}

/// Direction suffix for the hit animation, from attacker minus target.
/// Diagonals win when both axes are within a factor of two of each other.
fn punch_direction(dx: f64, dy: f64) -> &'static str {
    let (ax, ay) = (dx.abs(), dy.abs());
    let diagonal = ax > 0.0 && ay > 0.0 && ax / ay > 0.5 && ay / ax > 0.5;
    match (diagonal, dx >= 0.0, dy > 0.0) {
        (true, true, true) => "down_right",
        (true, false, true) => "down_left",
        (true, true, false) => "up_right",
        (true, false, false) => "up_left",
        (false, right, _) if ax >= ay => {
            if right {
                "right"
            } else {
                "left"
            }
        }
        (false, _, true) => "down",
        // No plain "up" hit frame exists.
        (false, _, false) => "up_right",
    }
}

// =============================================================================
// PROFILE
// =============================================================================

pub fn rename(ctx: &mut Ctx<'_>, sender: &str, req: &Frame) -> Outcome {
    let Some(name) = req.get_str("name").map(str::trim) else {
        return Outcome::Ignored("missing name");
    };
    if name.is_empty() || name.chars().count() > MAX_NAME_CHARS {
        return Outcome::Ignored("invalid name");
    }
    let Some(player) = ctx.state.players.get_mut(sender) else {
        return Outcome::Ignored("sender has no player");
    };
    name.clone_into(&mut player.name);
    Outcome::Done
}

/// Avatar scale in percent. Non-numbers reset to the default; numbers are
/// rounded and clamped to 1..=255.
pub fn scale(ctx: &mut Ctx<'_>, sender: &str, req: &Frame) -> Outcome {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let scale = req.get_f64("scale").map_or(DEFAULT_SCALE, |s| s.round().clamp(1.0, 255.0) as u8);
    let Some(player) = ctx.state.players.get_mut(sender) else {
        return Outcome::Ignored("sender has no player");
    };
    player.scale = scale;
    Outcome::Done
}

pub fn ready(ctx: &mut Ctx<'_>, sender: &str, req: &Frame) -> Outcome {
    let ready_to_connect = req.get_bool("readyToConnect");
    let video_connected = req.get_bool("videoConnected");
    if ready_to_connect.is_none() && video_connected.is_none() {
        return Outcome::Ignored("no ready flags");
    }
    let Some(player) = ctx.state.players.get_mut(sender) else {
        return Outcome::Ignored("sender has no player");
    };
    if let Some(flag) = ready_to_connect {
        player.ready_to_connect = flag;
    }
    if let Some(flag) = video_connected {
        player.video_connected = flag;
    }
    Outcome::Done
}

#[cfg(test)]
#[path = "player_test.rs"]
mod tests;
