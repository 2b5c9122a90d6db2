use crate::{handlers::{api_not_found, diagnostics, get_room, health_check, list_rooms, ready_check}, state::AppState};
use axum::{routing::get, Router};

/// Create API routes
pub fn create_api_routes() -> Router<AppState> {
    Router::<AppState>::new()
        .route("/health", get(health_check))
        .route("/ready", get(ready_check))
        .route("/v1/diagnostics", get(diagnostics))
        .route("/v1/rooms", get(list_rooms))
        .route("/v1/rooms/*room_name", get(get_room))
        // Unknown API paths must not fall through to the room entry
        .fallback(api_not_found)
}
