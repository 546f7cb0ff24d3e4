use super::*;

#[test]
fn new_room_has_empty_booths() {
    let state = RoomState::new(2, 4);
    assert_eq!(state.booths.len(), 2);
    assert!(state.booths.iter().all(|b| b.max_users() == 4 && b.is_empty()));
    assert_eq!(state.music_stream.status, StreamStatus::Waiting);
    assert_eq!(state.version, 0);
}

#[test]
fn seat_lookup_spans_booths() {
    let mut state = RoomState::new(2, 2);
    state.booths[1].seats[1] = Some("dj".to_owned());
    assert_eq!(state.seat_of("dj"), Some((1, 1)));
    assert_eq!(state.seat_of("nobody"), None);
    assert!(!state.has_booth_dj());
    assert_eq!(state.primary_dj(), None);

    state.booths[0].seats[0] = Some("main".to_owned());
    assert_eq!(state.primary_dj(), Some("main"));
    assert!(state.has_booth_dj());
}

#[test]
fn booth_first_free_skips_occupied_seats() {
    let mut booth = MusicBooth::new(3);
    booth.seats[0] = Some("a".to_owned());
    assert_eq!(booth.first_free(), Some(1));
    assert_eq!(booth.occupied(), 1);
    booth.seats[1] = Some("b".to_owned());
    booth.seats[2] = Some("c".to_owned());
    assert_eq!(booth.first_free(), None);
}

#[test]
fn stream_idle_covers_waiting_and_ambient() {
    let mut stream = MusicStream::default();
    assert!(stream.is_idle());

    stream.status = StreamStatus::Playing;
    stream.current_link = Some("abc".to_owned());
    assert!(!stream.is_idle());

    stream.is_ambient = true;
    assert!(stream.is_idle());
}

#[test]
fn offset_is_derived_from_server_time() {
    let stream = MusicStream { start_time: 10_000, ..MusicStream::default() };
    assert!((stream.offset_secs(12_500) - 2.5).abs() < f64::EPSILON);
    assert!(stream.offset_secs(9_000).abs() < f64::EPSILON);
}

#[test]
fn stream_serializes_with_camel_case_fields() {
    let stream = MusicStream { stream_id: 3, is_room_playlist: true, ..MusicStream::default() };
    let json = serde_json::to_value(&stream).expect("serialize");
    assert_eq!(json["streamId"], 3);
    assert_eq!(json["isRoomPlaylist"], true);
    assert_eq!(json["status"], "waiting");
    assert!(json["currentLink"].is_null());
}
