//! Mutable per-session bookkeeping, guarded by the coordinator's mutex.

use std::collections::HashSet;

use eco_quality::{AnomalyDetector, StallDetector};
use eco_types::TelemetryRecord;
use eco_window::MergeWindow;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tokio::time::Instant;

use crate::config::ReconcileConfig;

use super::types::{ReconcileOptions, ReconcileOutcome};

pub(super) type Waiter = oneshot::Sender<ReconcileOutcome>;

pub(super) struct InFlight {
    pub(super) run_id: u64,
    pub(super) abort: Option<AbortHandle>,
    pub(super) waiters: Vec<Waiter>,
    /// Real live records appended since a window-resetting run started.
    /// `None` when the run merges with the whole window.
    pub(super) live: Option<Vec<TelemetryRecord>>,
}

impl InFlight {
    pub(super) fn tracks_live(&self) -> bool {
        self.live.is_some()
    }

    pub(super) fn record_live(&mut self, record: TelemetryRecord) {
        if let Some(live) = self.live.as_mut()
            && record.is_real()
        {
            live.push(record);
        }
    }
}

pub(super) struct PendingRun {
    pub(super) options: ReconcileOptions,
    pub(super) waiters: Vec<Waiter>,
}

pub(super) struct State {
    pub(super) session_id: Option<String>,
    pub(super) generation: u64,
    pub(super) window: MergeWindow,
    pub(super) watermark_ms: Option<i64>,
    pub(super) last_full_at: Option<Instant>,
    pub(super) next_run_id: u64,
    pub(super) in_flight: Option<InFlight>,
    pub(super) pending: Option<PendingRun>,
    pub(super) stall: StallDetector,
    pub(super) anomalies: AnomalyDetector,
    pub(super) reported_gaps: HashSet<(i64, i64)>,
}

impl State {
    pub(super) fn new(config: &ReconcileConfig) -> Self {
        Self {
            session_id: None,
            generation: 0,
            window: MergeWindow::new(config.max_points),
            watermark_ms: None,
            last_full_at: None,
            next_run_id: 0,
            in_flight: None,
            pending: None,
            stall: StallDetector::new(config.quality.stall_timeout_ms),
            anomalies: AnomalyDetector::new(config.quality.clone()),
            reported_gaps: HashSet::new(),
        }
    }

    /// Forget everything tied to the current session's data.
    pub(super) fn clear_session_data(&mut self) {
        self.window.clear();
        self.watermark_ms = None;
        self.last_full_at = None;
        self.reported_gaps.clear();
        self.stall.reset();
        self.anomalies.reset();
    }

    /// Detach the in-flight run and the pending run, cancelling the driver.
    pub(super) fn take_all_waiters(&mut self) -> Vec<Waiter> {
        let mut waiters = Vec::new();
        if let Some(run) = self.in_flight.take() {
            if let Some(abort) = run.abort {
                abort.abort();
            }
            waiters.extend(run.waiters);
        }
        if let Some(pending) = self.pending.take() {
            waiters.extend(pending.waiters);
        }
        waiters
    }
}
