use super::*;
use crate::state::test_helpers::test_app_state;

#[test]
fn room_error_to_status_maps_errors() {
    assert_eq!(room_error_to_status(&RoomError::InvalidName), StatusCode::BAD_REQUEST);
    assert_eq!(room_error_to_status(&RoomError::PasswordIncorrect), StatusCode::FORBIDDEN);
    assert_eq!(room_error_to_status(&RoomError::NotFound("x".into())), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn create_room_returns_created_summary() {
    let state = test_app_state();
    let body = CreateRoom { name: "Den".into(), description: None, password: Some("pw".into()) };

    let (status, Json(summary)) = create_room(State(state.clone()), Json(body)).await.expect("created");
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(summary.name, "Den");
    assert!(summary.has_password);
    assert!(!summary.is_public);

    let Json(rooms) = list_rooms(State(state)).await;
    assert_eq!(rooms.len(), 1);
    assert_eq!(rooms[0].id, summary.id);
}

#[tokio::test]
async fn create_room_rejects_blank_name() {
    let state = test_app_state();
    let body = CreateRoom { name: "  ".into(), ..CreateRoom::default() };
    let Err((status, message)) = create_room(State(state), Json(body)).await else {
        panic!("blank name accepted");
    };
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(message, "invalid room name");
}
