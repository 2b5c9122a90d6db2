use std::future::Future;
use std::pin::Pin;

use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tracing::{debug, warn};
use uuid::Uuid;

use super::docctx::DocContext;
use super::error::EngineError;
use crate::shutdown::{wait_for_stage, ShutdownStage};

pub type EngineFuture = Pin<Box<dyn Future<Output = Result<(), EngineError>> + Send>>;

/// Document synchronization engine.
///
/// Takes over a joined connection and owns all message exchange on it until
/// the socket closes. Every connection in a room is handed the same
/// [`DocContext`]. The returned future resolves when the connection is done;
/// an `Err` means the transport failed.
pub trait SyncEngine: Send + Sync {
    fn serve(
        &self,
        socket: WebSocket,
        doc: DocContext,
        connection_id: Uuid,
        shutdown: watch::Receiver<ShutdownStage>,
    ) -> EngineFuture;
}

/// Relays binary Loro updates between the peers of a room, merging each one
/// into the room document so late joiners start from a snapshot.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoroRelay;

impl SyncEngine for LoroRelay {
    fn serve(
        &self,
        socket: WebSocket,
        doc: DocContext,
        connection_id: Uuid,
        shutdown: watch::Receiver<ShutdownStage>,
    ) -> EngineFuture {
        Box::pin(relay(socket, doc, connection_id, shutdown))
    }
}

async fn relay(
    socket: WebSocket,
    doc: DocContext,
    connection_id: Uuid,
    shutdown: watch::Receiver<ShutdownStage>,
) -> Result<(), EngineError> {
    // Subscribe before taking the snapshot; an update landing in between is
    // delivered twice, which a CRDT import tolerates.
    let mut relayed = doc.subscribe();
    let (mut sender, mut receiver) = socket.split();

    if let Some(snapshot) = doc.snapshot()? {
        debug!(room = %doc.room(), connection_id = %connection_id, bytes = snapshot.len(), "Sending document snapshot");
        sender.send(Message::Binary(snapshot)).await?;
    }

    let draining = wait_for_stage(shutdown, ShutdownStage::Draining);
    tokio::pin!(draining);

    loop {
        tokio::select! {
            inbound = receiver.next() => match inbound {
                None | Some(Ok(Message::Close(_))) => return Ok(()),
                Some(Err(e)) => return Err(e.into()),
                Some(Ok(Message::Binary(update))) => match doc.import(&update) {
                    Ok(()) => {
                        let peers = doc.relay(connection_id, update);
                        debug!(room = %doc.room(), connection_id = %connection_id, peers, "Update relayed");
                    }
                    Err(e) => {
                        warn!(room = %doc.room(), connection_id = %connection_id, "Dropping update: {}", e);
                    }
                },
                Some(Ok(Message::Text(_))) => {
                    debug!(room = %doc.room(), connection_id = %connection_id, "Ignoring text frame");
                }
                // ping/pong are answered by axum
                Some(Ok(_)) => {}
            },
            frame = relayed.recv() => match frame {
                Ok(frame) if frame.sender_id == connection_id => {}
                Ok(frame) => sender.send(Message::Binary(frame.update.as_ref().clone())).await?,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(room = %doc.room(), connection_id = %connection_id, skipped, "Peer lagging behind relay");
                }
                Err(RecvError::Closed) => return Ok(()),
            },
            _ = &mut draining => {
                let close = Message::Close(Some(CloseFrame {
                    code: close_code::AWAY,
                    reason: "server shutting down".into(),
                }));
                if let Err(e) = sender.send(close).await {
                    debug!(room = %doc.room(), connection_id = %connection_id, "Close frame not delivered: {}", e);
                }
                return Ok(());
            }
        }
    }
}
