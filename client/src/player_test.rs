use super::*;

#[test]
fn headless_player_is_silent_until_loaded() {
    let mut player = HeadlessPlayer::new();
    assert_eq!(player.current_time(), None);
    player.seek(10.0);
    assert_eq!(player.current_time(), None);
}

#[test]
fn headless_player_tracks_load_and_seek() {
    let mut player = HeadlessPlayer::new();
    player.load("abc", 12.0, false);
    assert_eq!(player.link(), Some("abc"));
    let pos = player.current_time().expect("position");
    assert!((12.0..12.5).contains(&pos), "pos {pos}");

    player.seek(40.0);
    let pos = player.current_time().expect("position");
    assert!((40.0..40.5).contains(&pos), "pos {pos}");

    player.set_rate(1.05);
    assert!((player.rate() - 1.05).abs() < f64::EPSILON);

    player.stop();
    assert_eq!(player.current_time(), None);
    assert!((player.rate() - 1.0).abs() < f64::EPSILON);
}
