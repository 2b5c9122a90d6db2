use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tracing::warn;
use utoipa::ToSchema;

/// Process-wide connection counters.
#[derive(Debug, Default)]
pub struct ConnectionStats {
    total_connections: AtomicU64,
    active_connections: AtomicU64,
    rooms_created: AtomicU64,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub total_connections: u64,
    pub active_connections: u64,
    pub rooms_created: u64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_connection_accepted(&self) {
        self.total_connections.fetch_add(1, Ordering::SeqCst);
    }

    /// A connection was attached to a room.
    pub fn record_connection_joined(&self) {
        self.active_connections.fetch_add(1, Ordering::SeqCst);
    }

    /// A joined connection was detached from its room.
    /// Returns the number of connections still active.
    pub fn record_connection_closed(&self) -> u64 {
        let previous = self
            .active_connections
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |active| {
                Some(active.saturating_sub(1))
            })
            .unwrap_or(0);
        if previous == 0 {
            warn!("Connection closed while no connections were active");
        }
        previous.saturating_sub(1)
    }

    pub fn record_room_created(&self) {
        self.rooms_created.fetch_add(1, Ordering::SeqCst);
    }

    pub fn current(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_connections: self.total_connections.load(Ordering::SeqCst),
            active_connections: self.active_connections.load(Ordering::SeqCst),
            rooms_created: self.rooms_created.load(Ordering::SeqCst),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn starts_at_zero() {
        assert_eq!(ConnectionStats::new().current(), StatsSnapshot::default());
    }

    #[test]
    fn close_only_touches_active() {
        let stats = ConnectionStats::new();
        stats.record_connection_accepted();
        stats.record_connection_joined();
        stats.record_connection_accepted();
        stats.record_connection_joined();
        stats.record_room_created();
        assert_eq!(stats.record_connection_closed(), 1);

        let current = stats.current();
        assert_eq!(current.total_connections, 2);
        assert_eq!(current.active_connections, 1);
        assert_eq!(current.rooms_created, 1);
    }

    #[test]
    fn accepted_but_not_joined_is_not_active() {
        let stats = ConnectionStats::new();
        stats.record_connection_accepted();
        let current = stats.current();
        assert_eq!(current.total_connections, 1);
        assert_eq!(current.active_connections, 0);
    }

    #[test]
    fn active_is_clamped_at_zero() {
        let stats = ConnectionStats::new();
        assert_eq!(stats.record_connection_closed(), 0);
        assert_eq!(stats.current().active_connections, 0);
        assert_eq!(stats.current().total_connections, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_updates_are_not_lost() {
        let stats = Arc::new(ConnectionStats::new());
        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let stats = stats.clone();
                tokio::spawn(async move {
                    for _ in 0..500 {
                        stats.record_connection_accepted();
                        stats.record_connection_joined();
                        stats.record_connection_closed();
                    }
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }
        let current = stats.current();
        assert_eq!(current.total_connections, 4000);
        assert_eq!(current.active_connections, 0);
    }
}
