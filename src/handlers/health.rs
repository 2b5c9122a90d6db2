use axum::{extract::State, http::StatusCode, Json};
use crate::models::{HealthResponse, ReadyResponse};
use crate::shutdown::ShutdownStage;
use crate::state::AppState;
use tracing::debug;

/// Body of the plain-text liveness probe on `/`
pub const LIVENESS_BODY: &str = "Colabri room server is running";

/// Liveness probe
pub async fn liveness() -> &'static str {
    debug!("Liveness probe requested");
    LIVENESS_BODY
}

/// Health check endpoint
pub async fn health_check() -> Json<HealthResponse> {
    debug!("Health check requested");
    Json(HealthResponse {
        status: "ok".to_string(),
        message: "Server is running".to_string(),
    })
}

/// Readiness check endpoint, unready once shutdown has started
pub async fn ready_check(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    debug!("Readiness check requested");
    let stage = state.shutdown.stage();
    if stage == ShutdownStage::Running {
        (
            StatusCode::OK,
            Json(ReadyResponse {
                status: "ok".to_string(),
                message: "Service is ready".to_string(),
                stage: format!("{:?}", stage),
            }),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadyResponse {
                status: "unavailable".to_string(),
                message: "Service is shutting down".to_string(),
                stage: format!("{:?}", stage),
            }),
        )
    }
}
