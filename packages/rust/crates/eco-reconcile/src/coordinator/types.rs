//! Public request / result types of the coordinator.

use eco_events::ReconcileStats;
use eco_window::{AppendOutcome, WindowSnapshot};
use serde::Serialize;
use tokio::time::Instant;

/// How a reconciliation request should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReconcileOptions {
    /// Bypass the throttle.
    pub force: bool,
    /// Fetch everything instead of starting at the watermark.
    pub full_refresh: bool,
    /// Start from an empty window instead of merging with it.
    pub reset_window: bool,
    /// Explicit lower bound for the fetch.
    pub since_ms: Option<i64>,
}

impl ReconcileOptions {
    /// Periodic refresh: incremental and throttled.
    #[must_use]
    pub const fn incremental() -> Self {
        Self {
            force: false,
            full_refresh: false,
            reset_window: false,
            since_ms: None,
        }
    }

    /// Forced full refetch merged with the current window.
    #[must_use]
    pub const fn forced() -> Self {
        Self {
            force: true,
            full_refresh: true,
            reset_window: false,
            since_ms: None,
        }
    }

    /// Page load: forced full refetch into an empty window.
    #[must_use]
    pub const fn initial() -> Self {
        Self {
            force: true,
            full_refresh: true,
            reset_window: true,
            since_ms: None,
        }
    }

    /// Collapse two queued requests into the most permissive one.
    #[must_use]
    pub fn coalesce(self, other: Self) -> Self {
        Self {
            force: self.force || other.force,
            full_refresh: self.full_refresh || other.full_refresh,
            reset_window: self.reset_window || other.reset_window,
            since_ms: match (self.since_ms, other.since_ms) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            },
        }
    }
}

/// How a request was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReconcileStatus {
    /// Run finished with every source answering.
    Completed,
    /// Run finished but at least one source failed.
    Degraded,
    /// Run finished; no source returned anything.
    Unchanged,
    /// Rejected by the throttle; window returned as is.
    Throttled {
        /// Time until a non-forced run is accepted again.
        retry_after_ms: u64,
    },
    /// Session changed (or the coordinator was reset) before the run finished.
    Superseded,
}

/// What every caller of one run receives.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconcileOutcome {
    /// Session the request was for.
    pub session_id: String,
    /// Resolution.
    #[serde(flatten)]
    pub status: ReconcileStatus,
    /// Window after the run (or unchanged window).
    #[serde(rename = "data")]
    pub snapshot: WindowSnapshot,
    /// Run statistics.
    pub stats: ReconcileStats,
}

/// Read-only view of the coordinator's bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationState {
    /// Active session.
    pub current_session_id: Option<String>,
    /// A run is `Reconciling`.
    pub in_flight: bool,
    /// Callers waiting on the coalesced pending run.
    pub pending_requests: usize,
    /// When the last run entered `Reconciling`.
    pub last_full_reconciliation_at: Option<Instant>,
    /// Watermark: newest timestamp a run has fetched from the sources.
    pub last_known_timestamp: Option<i64>,
    /// Records in the window.
    pub window_len: usize,
    /// Bumped on every session change and reset.
    pub generation: u64,
}

/// Result of the live fast path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveOutcome {
    /// What the window did with the record.
    pub append: AppendOutcome,
    /// The record started a new session (window cleared, full run scheduled).
    pub session_changed: bool,
}
