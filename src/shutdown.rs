use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info};

/// Process shutdown stages, in the order they are entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ShutdownStage {
    Running,
    /// Listener stops accepting, the reporter emits its final report.
    Stopping,
    /// Open connections are asked to close.
    Draining,
    /// Connections still open after the grace period are dropped.
    Terminating,
}

/// Shared shutdown controller. The stage only ever moves forward.
#[derive(Clone, Debug)]
pub struct Shutdown {
    stage: Arc<watch::Sender<ShutdownStage>>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    pub fn new() -> Self {
        let (stage, _rx) = watch::channel(ShutdownStage::Running);
        Self {
            stage: Arc::new(stage),
        }
    }

    pub fn stage(&self) -> ShutdownStage {
        *self.stage.borrow()
    }

    /// Move to `stage` unless a later stage was already entered.
    pub fn advance(&self, stage: ShutdownStage) -> bool {
        let moved = self.stage.send_if_modified(|current| {
            if stage > *current {
                *current = stage;
                true
            } else {
                false
            }
        });
        if moved {
            info!(stage = ?stage, "Shutdown stage entered");
        }
        moved
    }

    pub fn subscribe(&self) -> watch::Receiver<ShutdownStage> {
        self.stage.subscribe()
    }

    /// Resolves once `stage` has been entered.
    pub async fn reached(&self, stage: ShutdownStage) {
        wait_for_stage(self.subscribe(), stage).await
    }
}

pub async fn wait_for_stage(mut rx: watch::Receiver<ShutdownStage>, stage: ShutdownStage) {
    // The sender lives in `Shutdown`; if every handle is gone there is nothing
    // left to wait for.
    let _ = rx.wait_for(|current| *current >= stage).await;
}

/// Resolves on SIGINT or SIGTERM.
pub async fn termination_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received interrupt signal"),
        _ = terminate => info!("Received terminate signal"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn stage_only_moves_forward() {
        let shutdown = Shutdown::new();
        assert_eq!(shutdown.stage(), ShutdownStage::Running);
        assert!(shutdown.advance(ShutdownStage::Draining));
        assert!(!shutdown.advance(ShutdownStage::Stopping));
        assert!(!shutdown.advance(ShutdownStage::Draining));
        assert_eq!(shutdown.stage(), ShutdownStage::Draining);
    }

    #[tokio::test]
    async fn waiters_wake_on_later_stages_too() {
        let shutdown = Shutdown::new();
        let waiter = tokio::spawn({
            let shutdown = shutdown.clone();
            async move { shutdown.reached(ShutdownStage::Stopping).await }
        });
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        shutdown.advance(ShutdownStage::Terminating);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter woke")
            .unwrap();
    }

    #[tokio::test]
    async fn reached_returns_immediately_for_past_stage() {
        let shutdown = Shutdown::new();
        shutdown.advance(ShutdownStage::Stopping);
        tokio::time::timeout(
            Duration::from_millis(100),
            shutdown.reached(ShutdownStage::Running),
        )
        .await
        .unwrap();
    }
}
