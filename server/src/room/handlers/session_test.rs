use serde_json::json;

use super::*;
use crate::room::test_helpers::{Fixture, T0};

#[test]
fn join_spawns_idle_player() {
    let mut fx = Fixture::private();
    let effects = fx.join("a");
    assert!(effects.is_empty());

    let player = &fx.state.players["a"];
    assert_eq!(player.anim, SPAWN_ANIM);
    assert_eq!((player.x, player.y), fx.config.spawn);
    assert_eq!(fx.runtime.last_action_ms.get("a"), Some(&T0));
}

#[test]
fn join_sanitizes_name() {
    let mut fx = Fixture::private();
    fx.run(|ctx| join(ctx, "a", "   "));
    fx.run(|ctx| join(ctx, "b", &"n".repeat(40)));
    assert_eq!(fx.state.players["a"].name, DEFAULT_NAME);
    assert_eq!(fx.state.players["b"].name.chars().count(), MAX_NAME_CHARS);
}

#[test]
fn leave_clears_seat_queue_and_player() {
    let mut fx = Fixture::private();
    fx.join("a");
    fx.join("b");
    fx.dispatch("a", "booth:connect", json!({ "musicBoothIndex": 0 }));

    fx.leave("a");
    assert!(!fx.state.players.contains_key("a"));
    assert!(fx.state.booths[0].is_empty());
    assert!(!fx.state.dj_queue.contains("a"));
    assert!(!fx.runtime.last_action_ms.contains_key("a"));
}

#[test]
fn current_dj_leaving_advances_to_next() {
    let mut fx = Fixture::private();
    fx.join("a");
    fx.join("b");
    fx.set_lookahead("a", &[("a1", 60.0)]);
    fx.set_lookahead("b", &[("b1", 60.0)]);
    fx.dispatch("a", "booth:connect", json!({ "musicBoothIndex": 0 }));
    fx.dispatch("b", "booth:connect", json!({ "musicBoothIndex": 0 }));
    assert_eq!(fx.link(), Some("a1"));

    fx.leave("a");
    assert_eq!(fx.link(), Some("b1"));
    assert_eq!(fx.queue(), vec!["b"]);
}

#[test]
fn last_player_leaving_public_room_emits_nothing() {
    let mut fx = Fixture::public();
    fx.join("a");
    fx.run(crate::room::scheduler::ensure_ambient);
    let id = fx.state.music_stream.stream_id;

    let effects = fx.leave("a");
    assert!(effects.is_empty(), "ambient is not restarted for an empty room");
    assert_eq!(fx.state.music_stream.stream_id, id);
}

#[test]
fn snapshot_reply_carries_full_state() {
    let mut fx = Fixture::private();
    fx.join("a");
    let (outcome, _) = fx.dispatch("a", "room:snapshot", json!({}));
    let Outcome::Reply(data) = outcome else {
        panic!("expected reply");
    };
    let state: frames::RoomState = serde_json::from_value(data["state"].clone()).expect("state");
    assert_eq!(state, fx.state);
}
