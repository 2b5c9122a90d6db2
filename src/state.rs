use std::sync::Arc;

use crate::config::Config;
use crate::shutdown::Shutdown;
use crate::ws::engine::{LoroRelay, SyncEngine};
use crate::ws::lifecycle::ConnectionLifecycle;
use crate::ws::room_table::RoomTable;
use crate::ws::stats::ConnectionStats;

/// Shared services handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub rooms: Arc<RoomTable>,
    pub stats: Arc<ConnectionStats>,
    pub lifecycle: Arc<ConnectionLifecycle>,
    pub engine: Arc<dyn SyncEngine>,
    pub shutdown: Shutdown,
}

impl AppState {
    pub fn new(config: &Config, shutdown: Shutdown) -> Self {
        let rooms = Arc::new(RoomTable::new(config.broadcast_capacity));
        let stats = Arc::new(ConnectionStats::new());
        let lifecycle = Arc::new(ConnectionLifecycle::new(rooms.clone(), stats.clone()));
        Self {
            rooms,
            stats,
            lifecycle,
            engine: Arc::new(LoroRelay),
            shutdown,
        }
    }
}
