use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use loro::{ExportMode, LoroDoc};
use tokio::sync::broadcast;
use uuid::Uuid;

use super::error::EngineError;

/// An update accepted into a room document, fanned out to the other peers.
#[derive(Clone, Debug)]
pub struct RelayFrame {
    pub sender_id: Uuid,
    pub update: Arc<Vec<u8>>,
}

/// Per-room document handle.
///
/// Cloning is cheap; every connection in a room holds a clone of the same
/// handle. The room table owns the original and drops it when the room is
/// evicted, so the document is released once the last engine task ends.
#[derive(Clone)]
pub struct DocContext {
    inner: Arc<DocInner>,
}

struct DocInner {
    room: String,
    doc: Mutex<LoroDoc>,
    relay: broadcast::Sender<RelayFrame>,
    merged_updates: AtomicU64,
}

impl DocContext {
    pub fn new(room: &str, relay_capacity: usize) -> Self {
        let (relay, _rx) = broadcast::channel(relay_capacity.max(1));
        Self {
            inner: Arc::new(DocInner {
                room: room.to_string(),
                doc: Mutex::new(LoroDoc::new()),
                relay,
                merged_updates: AtomicU64::new(0),
            }),
        }
    }

    pub fn room(&self) -> &str {
        &self.inner.room
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RelayFrame> {
        self.inner.relay.subscribe()
    }

    /// Merge an update into the room document.
    pub fn import(&self, update: &[u8]) -> Result<(), EngineError> {
        let doc = self.inner.doc.lock().map_err(|_| EngineError::Poisoned)?;
        doc.import(update)
            .map_err(|e| EngineError::Import(e.to_string()))?;
        self.inner.merged_updates.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Snapshot of the merged document, `None` while nothing has been merged.
    pub fn snapshot(&self) -> Result<Option<Vec<u8>>, EngineError> {
        if self.inner.merged_updates.load(Ordering::Relaxed) == 0 {
            return Ok(None);
        }
        let doc = self.inner.doc.lock().map_err(|_| EngineError::Poisoned)?;
        doc.export(ExportMode::Snapshot)
            .map(Some)
            .map_err(|e| EngineError::Export(e.to_string()))
    }

    /// Relay an update to every subscriber. Returns how many peers got it.
    pub fn relay(&self, sender_id: Uuid, update: Vec<u8>) -> usize {
        self.inner
            .relay
            .send(RelayFrame {
                sender_id,
                update: Arc::new(update),
            })
            .unwrap_or(0)
    }

    pub fn peers(&self) -> usize {
        self.inner.relay.receiver_count()
    }

    #[cfg(test)]
    pub fn same_document(&self, other: &DocContext) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for DocContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocContext")
            .field("room", &self.inner.room)
            .field("peers", &self.peers())
            .field("merged_updates", &self.inner.merged_updates.load(Ordering::Relaxed))
            .finish()
    }
}
