use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;

use super::docctx::DocContext;

/// Room joined by connections whose request path is empty or `/`.
pub const DEFAULT_ROOM: &str = "default";

/// Map a request path to a room name.
///
/// Only a single leading `/` is stripped; everything else is kept verbatim.
pub fn resolve_room_name(request_path: &str) -> String {
    let name = request_path.strip_prefix('/').unwrap_or(request_path);
    if name.is_empty() {
        DEFAULT_ROOM.to_string()
    } else {
        name.to_string()
    }
}

struct Room {
    created_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
    connection_count: usize,
    doc: DocContext,
}

/// Point-in-time copy of one room.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RoomStatus {
    pub name: String,
    pub connection_count: usize,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

/// Result of a join.
#[derive(Debug)]
pub struct JoinOutcome {
    pub doc: DocContext,
    /// This join created the room.
    pub created: bool,
    pub connection_count: usize,
}

/// Result of a leave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// The room still has connections.
    Remaining(usize),
    /// The last connection left and the room was evicted.
    Destroyed,
    /// No such room; nothing changed.
    Unknown,
}

/// Concurrent map of room name to room state.
///
/// Rooms on different shards never contend; all updates to one room happen
/// under its shard's write lock, so counts are never lost.
pub struct RoomTable {
    rooms: DashMap<String, Room>,
    relay_capacity: usize,
}

impl RoomTable {
    pub fn new(relay_capacity: usize) -> Self {
        Self {
            rooms: DashMap::new(),
            relay_capacity,
        }
    }

    pub fn join(&self, room_name: &str) -> JoinOutcome {
        let now = Utc::now();
        let mut created = false;
        let mut room = self
            .rooms
            .entry(room_name.to_string())
            .or_insert_with(|| {
                created = true;
                Room {
                    created_at: now,
                    last_activity: now,
                    connection_count: 0,
                    doc: DocContext::new(room_name, self.relay_capacity),
                }
            });
        room.connection_count += 1;
        room.last_activity = now;
        let outcome = JoinOutcome {
            doc: room.doc.clone(),
            created,
            connection_count: room.connection_count,
        };
        drop(room);

        if created {
            info!(room = %room_name, "Room created");
        }
        outcome
    }

    pub fn leave(&self, room_name: &str) -> LeaveOutcome {
        let mut clamped = false;
        let outcome = match self.rooms.entry(room_name.to_string()) {
            Entry::Vacant(_) => LeaveOutcome::Unknown,
            Entry::Occupied(mut entry) => {
                let room = entry.get_mut();
                clamped = room.connection_count == 0;
                room.connection_count = room.connection_count.saturating_sub(1);
                if room.connection_count == 0 {
                    // Dropping the entry releases the table's document handle.
                    entry.remove();
                    LeaveOutcome::Destroyed
                } else {
                    LeaveOutcome::Remaining(room.connection_count)
                }
            }
        };

        // logged only once the shard lock is released
        if clamped {
            warn!(room = %room_name, "Leave on a room with no connections, clamping at zero");
        }
        match outcome {
            LeaveOutcome::Destroyed => info!(room = %room_name, "Room destroyed"),
            LeaveOutcome::Unknown => {
                warn!(room = %room_name, "Leave on unknown room ignored")
            }
            LeaveOutcome::Remaining(_) => {}
        }
        outcome
    }

    /// Copy of every room, ordered by name.
    pub fn snapshot(&self) -> Vec<RoomStatus> {
        let mut rooms: Vec<RoomStatus> = self
            .rooms
            .iter()
            .map(|entry| RoomStatus {
                name: entry.key().clone(),
                connection_count: entry.connection_count,
                created_at: entry.created_at,
                last_activity: entry.last_activity,
            })
            .collect();
        rooms.sort_by(|a, b| a.name.cmp(&b.name));
        rooms
    }

    pub fn get(&self, room_name: &str) -> Option<RoomStatus> {
        self.rooms.get(room_name).map(|room| RoomStatus {
            name: room_name.to_string(),
            connection_count: room.connection_count,
            created_at: room.created_at,
            last_activity: room.last_activity,
        })
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Sum of connection counts over all rooms.
    #[cfg(test)]
    pub fn total_connections(&self) -> usize {
        self.rooms.iter().map(|room| room.connection_count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn resolves_room_names_from_paths() {
        assert_eq!(resolve_room_name("/alpha"), "alpha");
        assert_eq!(resolve_room_name(""), DEFAULT_ROOM);
        assert_eq!(resolve_room_name("/"), "default");
        assert_eq!(resolve_room_name("/project-42"), "project-42");
        // only one separator is stripped, nothing else is normalized
        assert_eq!(resolve_room_name("//alpha"), "/alpha");
        assert_eq!(resolve_room_name("/Alpha/"), "Alpha/");
        assert_eq!(resolve_room_name("beta"), "beta");
    }

    #[test]
    fn first_join_creates_room() {
        let table = RoomTable::new(8);
        let outcome = table.join("docA");
        assert!(outcome.created);
        assert_eq!(outcome.connection_count, 1);
        assert_eq!(outcome.doc.room(), "docA");

        let status = table.get("docA").unwrap();
        assert_eq!(status.connection_count, 1);
        assert_eq!(status.created_at, status.last_activity);
    }

    #[test]
    fn second_join_shares_the_document() {
        let table = RoomTable::new(8);
        let first = table.join("docA");
        let second = table.join("docA");
        assert!(!second.created);
        assert_eq!(second.connection_count, 2);
        assert!(first.doc.same_document(&second.doc));

        let status = table.get("docA").unwrap();
        assert!(status.last_activity >= status.created_at);
        assert_eq!(table.snapshot().len(), 1);
    }

    #[test]
    fn last_leave_evicts_room() {
        let table = RoomTable::new(8);
        table.join("docA");
        table.join("docA");
        assert_eq!(table.leave("docA"), LeaveOutcome::Remaining(1));
        assert_eq!(table.leave("docA"), LeaveOutcome::Destroyed);
        assert!(table.get("docA").is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn leave_on_unknown_room_is_a_no_op() {
        let table = RoomTable::new(8);
        assert_eq!(table.leave("ghost"), LeaveOutcome::Unknown);
        table.join("docA");
        assert_eq!(table.leave("docA"), LeaveOutcome::Destroyed);
        // a repeated leave must not go negative or resurrect the room
        assert_eq!(table.leave("docA"), LeaveOutcome::Unknown);
        assert!(table.is_empty());
    }

    #[test]
    fn leave_does_not_hold_the_shard_while_logging() {
        struct Reentrant(Arc<RoomTable>);

        impl tracing::Subscriber for Reentrant {
            fn enabled(&self, _: &tracing::Metadata<'_>) -> bool {
                true
            }
            fn new_span(&self, _: &tracing::span::Attributes<'_>) -> tracing::span::Id {
                tracing::span::Id::from_u64(1)
            }
            fn record(&self, _: &tracing::span::Id, _: &tracing::span::Record<'_>) {}
            fn record_follows_from(&self, _: &tracing::span::Id, _: &tracing::span::Id) {}
            fn event(&self, _: &tracing::Event<'_>) {
                // a log sink reading the table would deadlock under the entry lock
                let _ = self.0.snapshot();
            }
            fn enter(&self, _: &tracing::span::Id) {}
            fn exit(&self, _: &tracing::span::Id) {}
        }

        let table = Arc::new(RoomTable::new(8));
        let subscriber = Reentrant(table.clone());
        tracing::subscriber::with_default(subscriber, || {
            table.join("docA");
            table.join("docA");
            assert_eq!(table.leave("docA"), LeaveOutcome::Remaining(1));
            assert_eq!(table.leave("docA"), LeaveOutcome::Destroyed);
            assert_eq!(table.leave("docA"), LeaveOutcome::Unknown);
        });
        assert!(table.is_empty());
    }

    #[test]
    fn rejoin_after_eviction_gets_a_fresh_document() {
        let table = RoomTable::new(8);
        let old = table.join("docA").doc;
        table.leave("docA");
        let fresh = table.join("docA");
        assert!(fresh.created);
        assert!(!old.same_document(&fresh.doc));
    }

    #[test]
    fn snapshot_is_ordered_by_name() {
        let table = RoomTable::new(8);
        table.join("zeta");
        table.join("alpha");
        table.join("alpha");
        table.join("mid");

        let names: Vec<_> = table.snapshot().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
        assert_eq!(table.total_connections(), 4);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_joins_and_leaves_keep_counts() {
        let table = Arc::new(RoomTable::new(8));
        let mut tasks = Vec::new();
        for i in 0..16 {
            let table = table.clone();
            tasks.push(tokio::spawn(async move {
                let room = format!("room-{}", i % 3);
                for _ in 0..200 {
                    table.join(&room);
                    tokio::task::yield_now().await;
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(table.total_connections(), 16 * 200);

        let mut tasks = Vec::new();
        for i in 0..16 {
            let table = table.clone();
            tasks.push(tokio::spawn(async move {
                let room = format!("room-{}", i % 3);
                for _ in 0..200 {
                    table.leave(&room);
                    tokio::task::yield_now().await;
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        assert!(table.is_empty());
    }
}
