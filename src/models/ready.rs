use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// API response for readiness check
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ReadyResponse {
    pub status: String,
    pub message: String,
    /// Current shutdown stage, `Running` while accepting connections
    pub stage: String,
}
