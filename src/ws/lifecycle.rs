//! Per-connection lifecycle: `Accepted -> Joined -> Closed`.
//!
//! A [`ConnectionSession`] is created for every upgraded socket. It records the
//! room it joined so the close path never has to re-derive it, and it runs its
//! cleanup exactly once, whether the socket closed cleanly, failed, or the
//! session was simply dropped.

use std::sync::{Arc, RwLock, RwLockReadGuard};
use std::time::Duration;

use tokio::sync::Notify;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::docctx::DocContext;
use super::error::LifecycleError;
use super::room_table::{resolve_room_name, LeaveOutcome, RoomStatus, RoomTable};
use super::stats::{ConnectionStats, StatsSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Accepted,
    Joined,
    Closed,
}

/// What ended a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Peer or server closed the socket normally.
    Closed,
    /// The transport failed mid-session.
    TransportError,
    /// The connection outlived the shutdown grace period.
    Terminated,
    /// The session was dropped without an explicit close.
    Dropped,
}

/// Registers connections with the room table and the stats aggregator.
///
/// A join or leave updates the room count and the active counter as one step:
/// transitions hold `transition` shared, so they still run in parallel, and
/// [`ConnectionLifecycle::snapshot`] holds it exclusively while copying both.
pub struct ConnectionLifecycle {
    rooms: Arc<RoomTable>,
    stats: Arc<ConnectionStats>,
    transition: RwLock<()>,
    idle: Notify,
}

impl ConnectionLifecycle {
    pub fn new(rooms: Arc<RoomTable>, stats: Arc<ConnectionStats>) -> Self {
        Self {
            rooms,
            stats,
            transition: RwLock::new(()),
            idle: Notify::new(),
        }
    }

    /// Transport-level connection established.
    pub fn accept(self: &Arc<Self>) -> ConnectionSession {
        let id = Uuid::new_v4();
        self.stats.record_connection_accepted();
        info!(connection_id = %id, "Connection accepted");
        ConnectionSession {
            id,
            state: ConnectionState::Accepted,
            room: None,
            lifecycle: Arc::clone(self),
        }
    }

    /// Aggregate stats and room states taken at the same instant, so the
    /// active count always equals the sum of the room counts.
    pub fn snapshot(&self) -> (StatsSnapshot, Vec<RoomStatus>) {
        let _exclusive = self
            .transition
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let rooms = self.rooms.snapshot();
        (self.stats.current(), rooms)
    }

    fn in_transition(&self) -> RwLockReadGuard<'_, ()> {
        self.transition
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn active_connections(&self) -> u64 {
        self.stats.current().active_connections
    }

    /// Wait until no connection is active, giving up after `grace`.
    /// Returns `true` if every connection closed in time.
    pub async fn wait_idle(&self, grace: Duration) -> bool {
        tokio::time::timeout(grace, self.idle()).await.is_ok()
    }

    async fn idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.active_connections() == 0 {
                return;
            }
            notified.await;
        }
    }

    fn release(&self, id: Uuid, room: Option<&str>, reason: CloseReason) {
        // A connection that never joined holds no room slot and was never active.
        let active = match room {
            Some(room) => {
                let (outcome, active) = {
                    let _shared = self.in_transition();
                    let outcome = self.rooms.leave(room);
                    (outcome, self.stats.record_connection_closed())
                };
                if let LeaveOutcome::Remaining(left) = outcome {
                    debug!(room = %room, connection_count = left, "Room still in use");
                }
                active
            }
            None => self.active_connections(),
        };
        info!(
            connection_id = %id,
            room = room.unwrap_or("-"),
            reason = ?reason,
            active_connections = active,
            "Connection closed"
        );
        if active == 0 {
            self.idle.notify_waiters();
        }
    }
}

/// State record for one connection.
pub struct ConnectionSession {
    id: Uuid,
    state: ConnectionState,
    room: Option<String>,
    lifecycle: Arc<ConnectionLifecycle>,
}

impl ConnectionSession {
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[cfg(test)]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Room captured at join time.
    pub fn room(&self) -> Option<&str> {
        self.room.as_deref()
    }

    /// Resolve the room from the request path and register with it.
    pub fn join(&mut self, request_path: &str) -> Result<DocContext, LifecycleError> {
        if self.state != ConnectionState::Accepted {
            return Err(LifecycleError::InvalidJoin {
                connection_id: self.id,
                from: self.state,
            });
        }

        let room = resolve_room_name(request_path);
        let outcome = {
            let _shared = self.lifecycle.in_transition();
            self.lifecycle.stats.record_connection_joined();
            self.lifecycle.rooms.join(&room)
        };
        if outcome.created {
            self.lifecycle.stats.record_room_created();
        }
        info!(
            connection_id = %self.id,
            room = %room,
            connection_count = outcome.connection_count,
            "Connection joined room"
        );

        self.room = Some(room);
        self.state = ConnectionState::Joined;
        Ok(outcome.doc)
    }

    /// Run the close cleanup. Returns `false` if it already ran.
    pub fn close(&mut self, reason: CloseReason) -> bool {
        if self.state == ConnectionState::Closed {
            debug!(connection_id = %self.id, reason = ?reason, "Connection already closed");
            return false;
        }
        if reason == CloseReason::Dropped {
            warn!(connection_id = %self.id, room = self.room().unwrap_or("-"), "Connection dropped without close");
        }
        self.state = ConnectionState::Closed;
        self.lifecycle.release(self.id, self.room.as_deref(), reason);
        true
    }
}

impl Drop for ConnectionSession {
    fn drop(&mut self) {
        self.close(CloseReason::Dropped);
    }
}
