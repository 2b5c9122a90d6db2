use crate::{models::{ErrorResponse, RoomListResponse}, state::AppState, ws::room_table::RoomStatus};
use axum::{extract::{Path, State}, http::StatusCode, Json};
use tracing::debug;

/// List every open room
pub async fn list_rooms(State(state): State<AppState>) -> Json<RoomListResponse> {
    Json(RoomListResponse {
        rooms: state.rooms.snapshot(),
    })
}

/// Status of a single room
pub async fn get_room(
    State(state): State<AppState>,
    Path(room_name): Path<String>,
) -> Result<Json<RoomStatus>, (StatusCode, Json<ErrorResponse>)> {
    match state.rooms.get(&room_name) {
        Some(room) => Ok(Json(room)),
        None => {
            debug!("Room '{}' not found", room_name);
            Err(ErrorResponse::with_status(
                StatusCode::NOT_FOUND,
                format!("Room '{}' not found", room_name),
            ))
        }
    }
}
