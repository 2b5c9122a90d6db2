use utoipa::OpenApi;
use crate::models::*;
use crate::ws::room_table::RoomStatus;
use crate::ws::stats::StatsSnapshot;

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
#[allow(dead_code)]
pub async fn health_check_doc() {}

/// Readiness check endpoint
#[utoipa::path(
    get,
    path = "/api/ready",
    responses(
        (status = 200, description = "Service accepts connections", body = ReadyResponse),
        (status = 503, description = "Service is shutting down", body = ReadyResponse)
    )
)]
#[allow(dead_code)]
pub async fn ready_check_doc() {}

/// Connection stats, room states and process resources
#[utoipa::path(
    get,
    path = "/api/v1/diagnostics",
    responses(
        (status = 200, description = "Current diagnostics", body = DiagnosticsResponse)
    )
)]
#[allow(dead_code)]
pub async fn diagnostics_doc() {}

/// List open rooms
#[utoipa::path(
    get,
    path = "/api/v1/rooms",
    responses(
        (status = 200, description = "Rooms with at least one connection", body = RoomListResponse)
    )
)]
#[allow(dead_code)]
pub async fn list_rooms_doc() {}

/// Status of one room
#[utoipa::path(
    get,
    path = "/api/v1/rooms/{room_name}",
    params(
        ("room_name" = String, Path, description = "Room name as joined by clients")
    ),
    responses(
        (status = 200, description = "Room status", body = RoomStatus),
        (status = 404, description = "Room not open", body = ErrorResponse)
    )
)]
#[allow(dead_code)]
pub async fn get_room_doc() {}

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check_doc,
        ready_check_doc,
        diagnostics_doc,
        list_rooms_doc,
        get_room_doc,
    ),
    components(
        schemas(
            HealthResponse,
            ReadyResponse,
            DiagnosticsResponse,
            RoomListResponse,
            RoomStatus,
            StatsSnapshot,
            ErrorResponse
        )
    ),
    tags(
        (name = "api", description = "API endpoints")
    )
)]
pub struct ApiDoc;
