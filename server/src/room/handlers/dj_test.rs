use frames::StreamStatus;
use serde_json::json;

use super::*;
use crate::room::dispatch::Effect;
use crate::room::test_helpers::{Fixture, broadcasts};

fn item(link: &str) -> serde_json::Value {
    json!({ "id": format!("id-{link}"), "title": link, "link": link, "duration": 90 })
}

#[test]
fn parse_item_validates_fields() {
    let ok = parse_item(&item("abc"), "dj").expect("valid");
    assert_eq!(ok.link, "abc");
    assert_eq!(ok.dj_id, "dj");

    let generated = parse_item(&json!({ "link": "x", "duration": 1 }), "dj").expect("valid");
    assert!(!generated.id.is_empty());
    assert_eq!(generated.title, "x");

    assert!(parse_item(&json!({ "link": "", "duration": 1 }), "dj").is_none());
    assert!(parse_item(&json!({ "link": "x", "duration": -1 }), "dj").is_none());
    assert!(parse_item(&json!({ "link": "x" }), "dj").is_none());
    assert!(parse_item(&json!({ "link": "x", "duration": 1e12 }), "dj").is_none());
}

#[test]
fn lookahead_caps_at_two_items() {
    let mut fx = Fixture::private();
    fx.join("a");

    let (outcome, _) = fx.dispatch("a", "dj:lookahead", json!({ "items": [item("1"), item("2"), item("3")] }));
    assert!(outcome.is_ignored());

    let (outcome, _) = fx.dispatch("a", "dj:lookahead", json!({ "items": [item("1"), { "link": "" }] }));
    assert!(outcome.is_ignored(), "one bad item rejects the whole update");
    assert!(fx.state.players["a"].lookahead.is_empty());

    let (outcome, _) = fx.dispatch("a", "dj:lookahead", json!({ "items": [item("1"), item("2")] }));
    assert_eq!(outcome, Outcome::Done);
    assert_eq!(fx.state.players["a"].lookahead.len(), 2);
}

#[test]
fn lookahead_from_queued_dj_starts_idle_stream() {
    let mut fx = Fixture::private();
    fx.join("a");
    fx.dispatch("a", "queue:join", json!({}));
    assert!(!fx.state.music_stream.is_playing());

    fx.dispatch("a", "dj:lookahead", json!({ "items": [item("first")] }));
    assert_eq!(fx.link(), Some("first"));
    assert!(fx.state.players["a"].lookahead.is_empty());
}

#[test]
fn sync_from_current_dj_advances() {
    let mut fx = Fixture::private();
    fx.join("a");
    fx.join("b");
    fx.set_lookahead("a", &[("a1", 60.0)]);
    fx.set_lookahead("b", &[("b1", 60.0)]);
    fx.dispatch("a", "queue:join", json!({}));
    fx.dispatch("b", "queue:join", json!({}));
    assert_eq!(fx.link(), Some("a1"));

    let (outcome, _) = fx.dispatch("b", "music:sync", json!({}));
    assert!(outcome.is_ignored(), "only the current dj hands off");

    let id = fx.state.music_stream.stream_id;
    let (outcome, _) = fx.dispatch("a", "music:sync", json!({ "streamId": id, "item": item("a2") }));
    assert_eq!(outcome, Outcome::Done);
    assert_eq!(fx.link(), Some("b1"));
    assert_eq!(fx.state.players["a"].lookahead.first().map(|i| i.link.as_str()), Some("a2"));
}

#[test]
fn sync_with_stale_stream_id_is_ignored() {
    let mut fx = Fixture::private();
    fx.join("a");
    fx.set_lookahead("a", &[("a1", 60.0), ("a2", 60.0)]);
    fx.dispatch("a", "queue:join", json!({}));
    let id = fx.state.music_stream.stream_id;

    let (outcome, _) = fx.dispatch("a", "music:sync", json!({ "streamId": id + 7 }));
    assert_eq!(outcome, Outcome::Ignored("stale streamId"));
    assert_eq!(fx.link(), Some("a1"));
}

#[test]
fn queue_membership_has_no_duplicates() {
    let mut fx = Fixture::private();
    fx.join("a");
    assert_eq!(fx.dispatch("a", "queue:join", json!({})).0, Outcome::Done);
    assert!(fx.dispatch("a", "queue:join", json!({})).0.is_ignored());
    assert_eq!(fx.queue(), vec!["a"]);
    assert!(fx.state.dj_queue.check().is_ok());

    assert_eq!(fx.dispatch("a", "queue:leave", json!({})).0, Outcome::Done);
    assert!(fx.dispatch("a", "queue:leave", json!({})).0.is_ignored());
    assert!(fx.state.dj_queue.is_empty());
}

#[test]
fn current_dj_leaving_queue_hands_over() {
    let mut fx = Fixture::private();
    fx.join("a");
    fx.join("b");
    fx.set_lookahead("a", &[("a1", 60.0)]);
    fx.set_lookahead("b", &[("b1", 60.0)]);
    fx.dispatch("a", "queue:join", json!({}));
    fx.dispatch("b", "queue:join", json!({}));

    fx.dispatch("a", "queue:leave", json!({}));
    assert_eq!(fx.link(), Some("b1"));
    assert_eq!(fx.queue(), vec!["b"]);
}

#[test]
fn skip_only_for_current_dj() {
    let mut fx = Fixture::private();
    fx.join("a");
    fx.join("b");
    fx.set_lookahead("a", &[("a1", 60.0), ("a2", 60.0)]);
    fx.dispatch("a", "queue:join", json!({}));

    assert!(fx.dispatch("b", "queue:skip", json!({})).0.is_ignored());
    assert_eq!(fx.dispatch("a", "queue:skip", json!({})).0, Outcome::Done);
    assert_eq!(fx.link(), Some("a2"));
}

#[test]
fn stop_takes_track_off_air_but_keeps_queue_slot() {
    let mut fx = Fixture::private();
    fx.join("a");
    fx.join("b");
    fx.set_lookahead("a", &[("a1", 60.0)]);
    fx.dispatch("a", "queue:join", json!({}));
    assert_eq!(fx.link(), Some("a1"));

    assert!(fx.dispatch("b", "music:stop", json!({})).0.is_ignored());
    assert_eq!(fx.link(), Some("a1"));

    let (outcome, effects) = fx.dispatch("a", "music:stop", json!({}));
    assert_eq!(outcome, Outcome::Done);
    assert_eq!(fx.state.music_stream.status, StreamStatus::Waiting);
    assert_eq!(fx.link(), None);
    assert_eq!(fx.queue(), vec!["a"]);
    assert!(effects.iter().any(|e| matches!(e, Effect::CancelWatchdog)));
    assert!(broadcasts(&effects).contains(&"music:stop"));
}

#[test]
fn stop_with_nothing_playing_is_ignored() {
    let mut fx = Fixture::private();
    fx.join("a");
    assert!(fx.dispatch("a", "music:stop", json!({})).0.is_ignored());
}
