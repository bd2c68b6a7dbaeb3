//! Periodic overdue sweep.
//!
//! Every `sweep.interval_secs` the daemon moves open tasks past their due
//! time to `missed` and publishes the resulting change events. The sweep is
//! idempotent, so a restart or an overlapping manual sweep cannot penalize
//! a task twice.

use std::sync::Arc;
use std::time::Duration;

use quest_db::queries::tasks::{self, MissedTask};
use quest_db::DbError;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::DaemonState;

/// Outcome of one sweep.
#[derive(Debug)]
pub struct SweepReport {
    /// When the sweep before this one ran, if ever.
    pub previous_sweep_at: Option<u64>,
    pub missed: Vec<MissedTask>,
}

/// Run one sweep at `now` and publish its events.
pub async fn sweep_once(state: &DaemonState, now: u64) -> Result<SweepReport, DbError> {
    let report = {
        let mut db = state.db.lock().await;
        let previous_sweep_at = tasks::last_sweep_at(&db)?;
        let missed = tasks::sweep_overdue(&mut db, now)?;
        SweepReport {
            previous_sweep_at,
            missed,
        }
    };
    state.event_bus.tasks_missed(&report.missed);
    Ok(report)
}

/// Sweep on a fixed interval until shutdown.
pub async fn run(state: Arc<DaemonState>, mut shutdown_rx: broadcast::Receiver<()>) {
    let interval = Duration::from_secs(state.config.sweep.interval_secs.max(1));
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let last_sweep_at = {
        let db = state.db.lock().await;
        tasks::last_sweep_at(&db)
    };
    match last_sweep_at {
        Ok(last) => info!(
            interval_secs = interval.as_secs(),
            last_sweep_at = ?last,
            "overdue sweeper started"
        ),
        Err(e) => warn!("could not read last sweep time: {}", e),
    }

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = sweep_once(&state, crate::unix_now()).await {
                    warn!("overdue sweep failed: {}", e);
                }
            }
            _ = shutdown_rx.recv() => break,
        }
    }
}
