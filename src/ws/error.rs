use super::lifecycle::ConnectionState;

/// Illegal transition of a connection's lifecycle state machine.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("connection {connection_id} cannot join from state {from:?}")]
    InvalidJoin {
        connection_id: uuid::Uuid,
        from: ConnectionState,
    },
}

/// Failures inside the synchronization engine for one connection.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("transport error: {0}")]
    Transport(#[from] axum::Error),

    #[error("failed to import update: {0}")]
    Import(String),

    #[error("failed to export snapshot: {0}")]
    Export(String),

    #[error("document lock poisoned")]
    Poisoned,

    #[error("connection terminated after shutdown grace period")]
    Terminated,
}
