use super::*;
use crate::model::{StreamStatus, PlaylistItem};

fn room_with(players: &[&str]) -> RoomState {
    let mut state = RoomState::new(1, 4);
    for id in players {
        state
            .players
            .insert((*id).to_owned(), Player::new(*id, *id, 10.0, 20.0, "mutant_idle_down"));
    }
    state
}

fn chat(seq: u64, content: &str) -> ChatMessage {
    ChatMessage { seq, author: "a".to_owned(), content: content.to_owned(), created_at_ms: 0 }
}

#[test]
fn identical_states_produce_no_patch() {
    let state = room_with(&["a", "b"]);
    assert!(diff(&state, &state.clone()).is_none());
}

#[test]
fn position_only_change_is_reported_as_move() {
    let old = room_with(&["a"]);
    let mut new = old.clone();
    let player = new.players.get_mut("a").expect("player");
    player.x = 50.0;
    player.anim = "mutant_run_left".to_owned();

    let patch = diff(&old, &new).expect("patch");
    assert_eq!(patch.from_version, 0);
    assert_eq!(patch.to_version, 1);
    assert_eq!(
        patch.changes,
        vec![Change::PlayerMoved { id: "a".to_owned(), x: 50.0, y: 20.0, anim: "mutant_run_left".to_owned() }]
    );
}

#[test]
fn non_positional_change_ships_whole_player() {
    let old = room_with(&["a"]);
    let mut new = old.clone();
    let player = new.players.get_mut("a").expect("player");
    player.lookahead.push(PlaylistItem {
        id: "t1".to_owned(),
        title: "Track".to_owned(),
        link: "abc".to_owned(),
        duration: 120.0,
        dj_id: "a".to_owned(),
    });

    let patch = diff(&old, &new).expect("patch");
    assert!(matches!(&patch.changes[..], [Change::PlayerUpserted { player }] if player.lookahead.len() == 1));
}

#[test]
fn join_and_leave_are_reported() {
    let old = room_with(&["a", "b"]);
    let new = room_with(&["b", "c"]);
    let patch = diff(&old, &new).expect("patch");

    assert!(patch.changes.iter().any(|c| matches!(c, Change::PlayerUpserted { player } if player.id == "c")));
    assert!(patch.changes.iter().any(|c| matches!(c, Change::PlayerLeft { id } if id == "a")));
    assert_eq!(patch.changes.len(), 2);
}

#[test]
fn patch_applies_onto_old_state_to_reach_new_state() {
    let mut old = room_with(&["a", "b"]);
    old.version = 4;
    let mut new = old.clone();
    new.players.remove("b");
    new.booths[0].seats[0] = Some("a".to_owned());
    new.dj_queue.push("a");
    new.music_stream.status = StreamStatus::Playing;
    new.music_stream.current_link = Some("abc".to_owned());
    new.music_stream.stream_id = 1;
    new.chat.push_back(chat(1, "hi"));

    let patch = diff(&old, &new).expect("patch");
    let mut mirror = old.clone();
    mirror.apply(&patch).expect("apply");

    new.version = 5;
    assert_eq!(mirror, new);
}

#[test]
fn version_gap_is_rejected_without_mutation() {
    let old = room_with(&["a"]);
    let mut new = old.clone();
    new.players.get_mut("a").expect("player").x = 99.0;
    let mut patch = diff(&old, &new).expect("patch");
    patch.from_version = 3;
    patch.to_version = 4;

    let mut mirror = old.clone();
    let err = mirror.apply(&patch).expect_err("gap");
    assert_eq!(err, PatchError::VersionGap { expected: 0, got: 3 });
    assert_eq!(mirror, old);
}

#[test]
fn move_for_unknown_player_fails_atomically() {
    let mut mirror = room_with(&["a"]);
    let patch = Patch {
        from_version: 0,
        to_version: 1,
        changes: vec![
            Change::PlayerLeft { id: "a".to_owned() },
            Change::PlayerMoved { id: "ghost".to_owned(), x: 0.0, y: 0.0, anim: String::new() },
        ],
    };
    let err = mirror.apply(&patch).expect_err("unknown player");
    assert_eq!(err, PatchError::UnknownPlayer("ghost".to_owned()));
    assert!(mirror.players.contains_key("a"));
    assert_eq!(mirror.version, 0);
}

#[test]
fn chat_append_trims_to_retained_length() {
    let mut old = room_with(&[]);
    old.chat.push_back(chat(1, "one"));
    old.chat.push_back(chat(2, "two"));
    let mut new = old.clone();
    new.chat.pop_front();
    new.chat.push_back(chat(3, "three"));

    let patch = diff(&old, &new).expect("patch");
    assert_eq!(patch.changes.len(), 1);

    let mut mirror = old.clone();
    mirror.apply(&patch).expect("apply");
    let contents: Vec<&str> = mirror.chat.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["two", "three"]);
}

#[test]
fn for_recipient_drops_only_own_moves() {
    let patch = Patch {
        from_version: 1,
        to_version: 2,
        changes: vec![
            Change::PlayerMoved { id: "me".to_owned(), x: 1.0, y: 1.0, anim: "a".to_owned() },
            Change::PlayerMoved { id: "other".to_owned(), x: 2.0, y: 2.0, anim: "b".to_owned() },
        ],
    };
    let mine = patch.for_recipient("me");
    assert_eq!(mine.to_version, 2);
    assert_eq!(mine.changes.len(), 1);
    assert!(matches!(&mine.changes[0], Change::PlayerMoved { id, .. } if id == "other"));
}

#[test]
fn change_serializes_with_op_tag() {
    let change = Change::PlayerLeft { id: "a".to_owned() };
    let json = serde_json::to_value(&change).expect("serialize");
    assert_eq!(json, serde_json::json!({"op": "playerLeft", "id": "a"}));
}
