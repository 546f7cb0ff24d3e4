use serde_json::json;

use super::*;
use crate::room::test_helpers::{Fixture, broadcasts};

fn connect_to(fx: &mut Fixture, id: &str, data: serde_json::Value) -> Outcome {
    fx.dispatch(id, "booth:connect", data).0
}

#[test]
fn connect_takes_first_free_seat_and_queues() {
    let mut fx = Fixture::private();
    fx.join("a");
    fx.join("b");

    assert_eq!(connect_to(&mut fx, "a", json!({ "musicBoothIndex": 0 })), Outcome::Done);
    assert_eq!(connect_to(&mut fx, "b", json!({ "musicBoothIndex": 0 })), Outcome::Done);

    assert_eq!(fx.state.booths[0].seats, vec![Some("a".into()), Some("b".into()), None, None]);
    assert_eq!(fx.queue(), vec!["a", "b"]);
}

#[test]
fn seat_is_exclusive() {
    let mut fx = Fixture::private();
    for id in ["a", "b", "c"] {
        fx.join(id);
    }

    let outcomes: Vec<Outcome> = ["a", "b", "c"]
        .into_iter()
        .map(|id| connect_to(&mut fx, id, json!({ "musicBoothIndex": 0, "seatIndex": 2 })))
        .collect();

    assert_eq!(outcomes.iter().filter(|o| !o.is_ignored()).count(), 1);
    assert_eq!(fx.state.booths[0].occupant(2), Some("a"));
    assert_eq!(fx.state.booths[0].occupied(), 1);
}

#[test]
fn connect_rejects_bad_input() {
    let mut fx = Fixture::private();
    fx.join("a");

    for data in [
        json!({}),
        json!({ "musicBoothIndex": 5 }),
        json!({ "musicBoothIndex": -1 }),
        json!({ "musicBoothIndex": 0, "seatIndex": 4 }),
        json!({ "musicBoothIndex": 0, "seatIndex": 1.5 }),
    ] {
        assert!(connect_to(&mut fx, "a", data.clone()).is_ignored(), "{data}");
    }
    assert!(fx.state.booths[0].is_empty());
    assert!(fx.state.dj_queue.is_empty());
}

#[test]
fn connect_when_seated_is_rejected() {
    let mut fx = Fixture::private();
    fx.join("a");
    connect_to(&mut fx, "a", json!({ "musicBoothIndex": 0 }));
    assert_eq!(
        connect_to(&mut fx, "a", json!({ "musicBoothIndex": 0, "seatIndex": 3 })),
        Outcome::Ignored("already seated")
    );
    assert_eq!(fx.state.booths[0].occupied(), 1);
}

#[test]
fn connect_clears_ready_flag() {
    let mut fx = Fixture::private();
    fx.join("a");
    fx.state.players.get_mut("a").expect("a").ready_to_connect = true;
    connect_to(&mut fx, "a", json!({ "musicBoothIndex": 0 }));
    assert!(!fx.state.players["a"].ready_to_connect);
}

#[test]
fn full_booth_rejects() {
    let mut fx = Fixture::private();
    for id in ["a", "b", "c", "d", "e"] {
        fx.join(id);
    }
    for id in ["a", "b", "c", "d"] {
        assert_eq!(connect_to(&mut fx, id, json!({ "musicBoothIndex": 0 })), Outcome::Done);
    }
    assert_eq!(connect_to(&mut fx, "e", json!({ "musicBoothIndex": 0 })), Outcome::Ignored("booth full"));
}

#[test]
fn connecting_to_booth_zero_preempts_ambient() {
    let mut fx = Fixture::public();
    fx.join("a");
    fx.run(crate::room::scheduler::ensure_ambient);
    assert!(fx.state.music_stream.is_ambient);
    let ambient_id = fx.state.music_stream.stream_id;

    let (_, effects) = fx.dispatch("a", "booth:connect", json!({ "musicBoothIndex": 0 }));
    let stream = &fx.state.music_stream;
    assert!(!stream.is_ambient);
    assert!(stream.current_link.is_none());
    assert_eq!(broadcasts(&effects), vec!["music:stop"]);
    assert_eq!(stream.stream_id, ambient_id);
}

#[test]
fn connecting_dj_with_tracks_starts_playing() {
    let mut fx = Fixture::public();
    fx.join("a");
    fx.run(crate::room::scheduler::ensure_ambient);
    fx.set_lookahead("a", &[("song", 200.0)]);

    let (_, effects) = fx.dispatch("a", "booth:connect", json!({ "musicBoothIndex": 0 }));
    assert_eq!(broadcasts(&effects), vec!["music:stop", "music:start"]);
    let stream = &fx.state.music_stream;
    assert_eq!(stream.current_link.as_deref(), Some("song"));
    assert_eq!(stream.current_dj_id(), Some("a"));
    assert_eq!(stream.current_booth, Some(0));
    assert_eq!(stream.stream_id, 2);
}

#[test]
fn disconnect_is_idempotent() {
    let mut fx = Fixture::private();
    fx.join("a");
    connect_to(&mut fx, "a", json!({ "musicBoothIndex": 0 }));

    let (first, _) = fx.dispatch("a", "booth:disconnect", json!({ "musicBoothIndex": 0 }));
    assert_eq!(first, Outcome::Done);
    let after_first = fx.state.clone();

    let (second, effects) = fx.dispatch("a", "booth:disconnect", json!({ "musicBoothIndex": 0 }));
    assert!(second.is_ignored());
    assert!(effects.is_empty());
    assert_eq!(fx.state, after_first);
    assert!(fx.state.booths[0].is_empty());
    assert_eq!(fx.queue(), vec!["a"], "leaving the booth keeps the queue slot");
}

#[test]
fn disconnect_of_feeding_dj_advances() {
    let mut fx = Fixture::private();
    fx.join("a");
    fx.join("b");
    fx.set_lookahead("a", &[("a1", 60.0)]);
    fx.set_lookahead("b", &[("b1", 60.0)]);
    connect_to(&mut fx, "a", json!({ "musicBoothIndex": 0 }));
    connect_to(&mut fx, "b", json!({ "musicBoothIndex": 0 }));
    assert_eq!(fx.link(), Some("a1"));

    fx.dispatch("b", "booth:disconnect", json!({ "musicBoothIndex": 0 }));
    assert_eq!(fx.link(), Some("a1"), "a non-feeding seat leaving changes nothing");

    fx.dispatch("a", "booth:disconnect", json!({ "musicBoothIndex": 0 }));
    assert_eq!(fx.link(), Some("b1"));
}

#[test]
fn last_dj_leaving_public_booth_brings_ambient_back() {
    let mut fx = Fixture::public();
    fx.join("a");
    connect_to(&mut fx, "a", json!({ "musicBoothIndex": 0 }));
    assert!(!fx.state.music_stream.is_playing());

    fx.dispatch("a", "booth:disconnect", json!({ "musicBoothIndex": 0 }));
    assert!(fx.state.music_stream.is_ambient);
    assert!(fx.state.music_stream.is_playing());
}
