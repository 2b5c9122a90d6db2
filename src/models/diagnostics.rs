use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::ws::room_table::RoomStatus;
use crate::ws::stats::StatsSnapshot;

/// Response for diagnostics information
#[derive(Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsResponse {
    pub stats: StatsSnapshot,
    pub n_rooms: u32,
    pub rooms: Vec<RoomStatus>,
    pub cpu_usage: f32,
    pub memory_alloc: u64,
    pub memory_total: u64,
    pub memory_free: u64,
}
