use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::shutdown::{wait_for_stage, ShutdownStage};
use crate::ws::lifecycle::ConnectionLifecycle;
use crate::ws::room_table::RoomStatus;
use crate::ws::stats::StatsSnapshot;

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    Periodic,
    Final,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub kind: ReportKind,
    pub generated_at: DateTime<Utc>,
    pub stats: StatsSnapshot,
    pub rooms: Vec<RoomStatus>,
}

/// Periodically logs the aggregate stats and every room's state.
pub struct StatusReporter {
    lifecycle: Arc<ConnectionLifecycle>,
    interval: Duration,
}

impl StatusReporter {
    pub fn new(lifecycle: Arc<ConnectionLifecycle>, interval: Duration) -> Self {
        Self {
            lifecycle,
            interval,
        }
    }

    /// Periodic reports are skipped while the server is completely idle; the
    /// final report is always produced.
    pub fn build(&self, kind: ReportKind) -> Option<StatusReport> {
        let (stats, rooms) = self.lifecycle.snapshot();
        if kind == ReportKind::Periodic && stats.active_connections == 0 && rooms.is_empty() {
            return None;
        }
        Some(StatusReport {
            kind,
            generated_at: Utc::now(),
            stats,
            rooms,
        })
    }

    pub fn emit(&self, kind: ReportKind) -> Option<StatusReport> {
        match self.build(kind) {
            Some(report) => {
                log_report(&report);
                Some(report)
            }
            None => {
                debug!("No active connections or rooms, skipping status report");
                None
            }
        }
    }

    /// Tick until the shutdown reaches `Stopping`, then emit the final report
    /// and hand it back.
    pub async fn run(self, shutdown: watch::Receiver<ShutdownStage>) -> Option<StatusReport> {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let stopping = wait_for_stage(shutdown, ShutdownStage::Stopping);
        tokio::pin!(stopping);

        let last = loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.emit(ReportKind::Periodic);
                }
                _ = &mut stopping => {
                    break self.emit(ReportKind::Final);
                }
            }
        };
        info!("Status reporter stopped");
        last
    }

    pub fn spawn(self, shutdown: watch::Receiver<ShutdownStage>) -> JoinHandle<Option<StatusReport>> {
        info!(interval_secs = self.interval.as_secs(), "Status reporter started");
        tokio::spawn(self.run(shutdown))
    }
}

fn log_report(report: &StatusReport) {
    info!(
        kind = ?report.kind,
        total_connections = report.stats.total_connections,
        active_connections = report.stats.active_connections,
        rooms_created = report.stats.rooms_created,
        rooms = report.rooms.len(),
        "Status report"
    );
    let room_connections: usize = report.rooms.iter().map(|room| room.connection_count).sum();
    if room_connections as u64 != report.stats.active_connections {
        warn!(
            room_connections,
            active_connections = report.stats.active_connections,
            "Room counts differ from active connections"
        );
    }
    for room in &report.rooms {
        info!(
            kind = ?report.kind,
            room = %room.name,
            connection_count = room.connection_count,
            last_activity = %room.last_activity.to_rfc3339(),
            "Room status"
        );
    }
    match serde_json::to_string(report) {
        Ok(json) => debug!(report = %json, "Status report detail"),
        Err(e) => warn!("Failed to serialize status report: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shutdown::Shutdown;
    use crate::ws::lifecycle::CloseReason;
    use crate::ws::room_table::RoomTable;
    use crate::ws::stats::ConnectionStats;

    fn reporter() -> (StatusReporter, Arc<ConnectionLifecycle>) {
        let lifecycle = Arc::new(ConnectionLifecycle::new(
            Arc::new(RoomTable::new(8)),
            Arc::new(ConnectionStats::new()),
        ));
        let reporter = StatusReporter::new(lifecycle.clone(), Duration::from_secs(300));
        (reporter, lifecycle)
    }

    #[test]
    fn idle_tick_emits_nothing() {
        let (reporter, _) = reporter();
        assert!(reporter.emit(ReportKind::Periodic).is_none());
    }

    #[test]
    fn tick_after_everyone_left_emits_nothing() {
        let (reporter, lifecycle) = reporter();
        let mut session = lifecycle.accept();
        session.join("/docA").unwrap();
        session.close(CloseReason::Closed);
        assert!(reporter.emit(ReportKind::Periodic).is_none());
    }

    #[test]
    fn tick_with_active_room_lists_it() {
        let (reporter, lifecycle) = reporter();
        let mut session = lifecycle.accept();
        session.join("/docA").unwrap();

        let report = reporter.emit(ReportKind::Periodic).expect("report");
        assert_eq!(report.stats.active_connections, 1);
        assert_eq!(report.rooms.len(), 1);
        assert_eq!(report.rooms[0].name, "docA");
        assert_eq!(report.rooms[0].connection_count, 1);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["kind"], "periodic");
        assert_eq!(json["rooms"][0]["connectionCount"], 1);
        assert_eq!(json["stats"]["roomsCreated"], 1);
    }

    #[test]
    fn final_report_is_always_emitted() {
        let (reporter, _) = reporter();
        let report = reporter.emit(ReportKind::Final).expect("final report");
        assert!(report.rooms.is_empty());
    }

    #[tokio::test]
    async fn shutdown_emits_final_report_with_every_room() {
        let (reporter, lifecycle) = reporter();
        let _sessions: Vec<_> = ["/alpha", "/beta", "/beta"]
            .into_iter()
            .map(|path| {
                let mut session = lifecycle.accept();
                session.join(path).unwrap();
                session
            })
            .collect();

        let shutdown = Shutdown::new();
        let task = reporter.spawn(shutdown.subscribe());
        shutdown.advance(ShutdownStage::Stopping);
        let report = tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("reporter stopped")
            .unwrap()
            .expect("final report");

        assert_eq!(report.kind, ReportKind::Final);
        assert_eq!(report.stats.active_connections, 3);
        let counts: Vec<_> = report
            .rooms
            .iter()
            .map(|r| (r.name.as_str(), r.connection_count))
            .collect();
        assert_eq!(counts, vec![("alpha", 1), ("beta", 2)]);
    }

    #[tokio::test(start_paused = true)]
    async fn keeps_ticking_until_stopped() {
        let (reporter, _) = reporter();
        let shutdown = Shutdown::new();
        let task = reporter.spawn(shutdown.subscribe());

        tokio::time::sleep(Duration::from_secs(3 * 300 + 1)).await;
        assert!(!task.is_finished());

        shutdown.advance(ShutdownStage::Draining);
        let report = task.await.unwrap().expect("final report");
        assert!(report.rooms.is_empty());
    }
}
