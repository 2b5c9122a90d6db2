use crate::{models::DiagnosticsResponse, state::AppState};
use axum::{extract::State, http::StatusCode, Json};
use std::sync::{Mutex, OnceLock};
use sysinfo::System;
use tracing::info;

static SYSTEM_MONITOR: OnceLock<Mutex<System>> = OnceLock::new();

/// Aggregate connection stats, room states and process resources
pub async fn diagnostics(
    State(state): State<AppState>,
) -> (StatusCode, Json<DiagnosticsResponse>) {

    let (stats, rooms) = state.lifecycle.snapshot();
    let n_rooms = rooms.len() as u32;

    // System stats
    let (cpu_usage, memory_alloc, memory_free, memory_total) = {
        let sys_lock = SYSTEM_MONITOR.get_or_init(|| {
            Mutex::new(System::new_all())
        });
        match sys_lock.lock() {
            Ok(mut sys) => {
                sys.refresh_cpu();
                sys.refresh_memory();
                (
                    sys.global_cpu_info().cpu_usage(),
                    sys.used_memory(),
                    sys.free_memory(),
                    sys.total_memory(),
                )
            }
            Err(_) => (0.0, 0, 0, 0)
        }
    };

    info!(
        "Diagnostics: CPU: {:.2}%, Mem: {}/{} MB (Free: {} MB), Conn: {}, Rooms: {}",
        cpu_usage,
        memory_alloc / 1024 / 1024,
        memory_total / 1024 / 1024,
        memory_free / 1024 / 1024,
        stats.active_connections,
        n_rooms
    );

    (
        StatusCode::OK,
        Json(DiagnosticsResponse {
            stats,
            n_rooms,
            rooms,
            cpu_usage,
            memory_alloc,
            memory_total,
            memory_free,
        }),
    )
}
