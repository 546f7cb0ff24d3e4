//! Room listing and creation routes.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;

use crate::room::RoomError;
use crate::services::registry::{CreateRoom, RoomSummary};
use crate::state::AppState;

/// `GET /api/rooms`: every live room, public lobby first.
pub async fn list_rooms(State(state): State<AppState>) -> Json<Vec<RoomSummary>> {
    Json(state.registry.list().await)
}

/// `POST /api/rooms`: create a private room.
pub async fn create_room(
    State(state): State<AppState>,
    Json(body): Json<CreateRoom>,
) -> Result<(StatusCode, Json<RoomSummary>), (StatusCode, String)> {
    let handle = state
        .registry
        .create(body)
        .await
        .map_err(|e| (room_error_to_status(&e), e.to_string()))?;
    Ok((StatusCode::CREATED, Json(RoomSummary::of(&handle))))
}

pub(crate) fn room_error_to_status(err: &RoomError) -> StatusCode {
    match err {
        RoomError::InvalidName => StatusCode::BAD_REQUEST,
        RoomError::PasswordRequired | RoomError::PasswordIncorrect => StatusCode::FORBIDDEN,
        RoomError::NotFound(_) => StatusCode::NOT_FOUND,
        RoomError::Closed => StatusCode::SERVICE_UNAVAILABLE,
        RoomError::PasswordHash(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
#[path = "rooms_test.rs"]
mod tests;
