use axum::{
    extract::{
        ws::{WebSocket, WebSocketUpgrade},
        State,
    },
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
};
use tracing::{debug, error, warn};

use super::error::EngineError;
use super::lifecycle::CloseReason;
use crate::handlers::liveness;
use crate::shutdown::ShutdownStage;
use crate::state::AppState;

/// Entry point for every non-API path.
///
/// Upgrade requests join the room named by the path. A plain GET on `/` is the
/// liveness probe; anything else is not found.
pub async fn room_entry(
    ws: Option<WebSocketUpgrade>,
    uri: Uri,
    State(state): State<AppState>,
) -> Response {
    let path = uri.path().to_string();
    match ws {
        Some(ws) => {
            debug!(path = %path, "WebSocket upgrade requested");
            ws.on_upgrade(move |socket| handle_socket(socket, path, state))
        }
        None if path == "/" => liveness().await.into_response(),
        None => (StatusCode::NOT_FOUND, "Not found").into_response(),
    }
}

/// Drive one upgraded connection through its lifecycle.
async fn handle_socket(socket: WebSocket, path: String, state: AppState) {
    let mut session = state.lifecycle.accept();

    let doc = match session.join(&path) {
        Ok(doc) => doc,
        Err(e) => {
            error!("Failed to join room for {}: {}", path, e);
            session.close(CloseReason::TransportError);
            return;
        }
    };
    let room = doc.room().to_string();

    let serve = state
        .engine
        .serve(socket, doc, session.id(), state.shutdown.subscribe());
    let result = tokio::select! {
        result = serve => result,
        _ = state.shutdown.reached(ShutdownStage::Terminating) => Err(EngineError::Terminated),
    };

    match result {
        Ok(()) => {
            session.close(CloseReason::Closed);
        }
        Err(EngineError::Terminated) => {
            warn!(room = %room, connection_id = %session.id(), "Connection forcibly terminated");
            session.close(CloseReason::Terminated);
        }
        Err(e) => {
            error!(room = %room, connection_id = %session.id(), "Connection error: {}", e);
            session.close(CloseReason::TransportError);
        }
    }
}
