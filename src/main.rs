mod config;
mod docs;
mod handlers;
mod models;
mod routes;
mod services;
mod shutdown;
mod state;
mod ws;

use config::Config;
use routes::create_app;
use services::status_reporter::StatusReporter;
use shutdown::{termination_signal, Shutdown, ShutdownStage};
use state::AppState;
use std::panic;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// How long the listener task gets to finish once connections are drained.
const LISTENER_STOP_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() {

    // Set panic hook for better error messages
    panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
    }));

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "colabri_rooms=debug,tower_http=debug,axum::rejection=trace,info".into()
        }))
        .init();

    info!("Starting server...");

    // Load configuration
    let config = Config::load().unwrap_or_else(|e| {
        error!("Failed to load configuration: {}", e);
        warn!("Using default configuration");
        Config::default()
    });

    let shutdown = Shutdown::new();
    let state = AppState::new(&config, shutdown.clone());

    // Bind before anything else runs; a bind failure is fatal
    let listener = match tokio::net::TcpListener::bind(config.server_address()).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", config.server_address(), e);
            std::process::exit(1);
        }
    };

    info!("🚀 Server running on http://{}", config.server_address());
    info!("📡 Rooms available at ws://{}/<room>", config.server_address());
    if config.is_development() {
        info!("📚 Swagger UI available at http://{}/swagger", config.server_address());
    }

    let reporter = StatusReporter::new(state.lifecycle.clone(), config.report_interval())
        .spawn(shutdown.subscribe());

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            termination_signal().await;
            shutdown.advance(ShutdownStage::Stopping);
        }
    });

    let mut server = tokio::spawn({
        let app = create_app(state.clone());
        let shutdown = shutdown.clone();
        async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.reached(ShutdownStage::Stopping).await })
                .await
        }
    });

    // Run until a signal arrives or the listener fails
    let mut exit_code = 0;
    let mut server_done = false;
    tokio::select! {
        result = &mut server => {
            server_done = true;
            exit_code = 1;
            match result {
                Ok(Ok(())) => error!("Server stopped unexpectedly"),
                Ok(Err(e)) => error!("Server error: {}", e),
                Err(e) => error!("Server task failed: {}", e),
            }
            shutdown.advance(ShutdownStage::Stopping);
        }
        _ = shutdown.reached(ShutdownStage::Stopping) => {}
    }

    // The reporter emits its final report before connections are drained
    match reporter.await {
        Ok(Some(report)) => debug!(rooms = report.rooms.len(), "Final status report emitted"),
        Ok(None) => warn!("Status reporter stopped without a final report"),
        Err(e) => error!("Status reporter task failed: {}", e),
    }

    shutdown.advance(ShutdownStage::Draining);
    let grace = config.shutdown_grace();
    if !state.lifecycle.wait_idle(grace).await {
        warn!(
            active_connections = state.lifecycle.active_connections(),
            "Connections still open after {:?}, terminating them",
            grace
        );
        shutdown.advance(ShutdownStage::Terminating);
        if !state.lifecycle.wait_idle(Duration::from_secs(1)).await {
            error!(
                active_connections = state.lifecycle.active_connections(),
                "Connections did not terminate"
            );
        }
    }

    if !server_done {
        match tokio::time::timeout(LISTENER_STOP_TIMEOUT, server).await {
            Ok(Ok(Ok(()))) => info!("Listener closed"),
            Ok(Ok(Err(e))) => error!("Server error during shutdown: {}", e),
            Ok(Err(e)) => error!("Server task failed: {}", e),
            Err(_) => warn!("Listener did not stop within {:?}", LISTENER_STOP_TIMEOUT),
        }
    }

    let stats = state.stats.current();
    info!(
        total_connections = stats.total_connections,
        active_connections = stats.active_connections,
        rooms_created = stats.rooms_created,
        "Shutdown complete"
    );
    std::process::exit(exit_code);
}
