use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::ws::room_table::RoomStatus;

/// Response listing the rooms currently open
#[derive(Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoomListResponse {
    pub rooms: Vec<RoomStatus>,
}
