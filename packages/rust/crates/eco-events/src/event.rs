//! Core event model.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use eco_merge::GapEvent;
use eco_quality::QualitySignal;
use eco_types::SourceKind;
use eco_window::WindowSnapshot;
use serde::Serialize;
use uuid::Uuid;

use crate::topics;

/// Statistics attached to every published window.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconcileStats {
    /// Records in the published window.
    pub total: usize,
    /// Input records per source, before deduplication.
    pub from_each_source: BTreeMap<SourceKind, usize>,
    /// Synthetic points in the published window.
    pub interpolated: usize,
    /// Keys resolved by precedence.
    pub duplicates_resolved: usize,
    /// Records rejected during normalization.
    pub dropped: usize,
    /// Gaps left unfilled.
    pub gaps: usize,
    /// Records evicted by the window cap.
    pub evicted: usize,
    /// Median sampling interval used for interpolation.
    pub expected_interval_ms: Option<f64>,
    /// Wall time of the run.
    pub elapsed_ms: u64,
}

/// Event payloads.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// A run published a new window.
    DataReady {
        /// Published window.
        data: WindowSnapshot,
        /// Run statistics.
        stats: ReconcileStats,
        /// At least one source failed during the run.
        degraded: bool,
    },
    /// Fetch progress for long paginated reads.
    Progress {
        /// Source being read.
        source: SourceKind,
        /// Rows fetched so far in this run.
        rows_fetched: usize,
        /// Pages fetched so far.
        pages: usize,
    },
    /// A source failed; it contributed nothing to the run.
    SourceError {
        /// Failing source.
        source: SourceKind,
        /// Rendered error.
        error: String,
        /// Transient or unsupported (not a bug).
        is_expected: bool,
    },
    /// Gap left unfilled because it exceeded the interpolation bound.
    GapDetected(GapEvent),
    /// Request rejected by the throttle.
    Throttled {
        /// Time until a non-forced run is accepted again.
        retry_after_ms: u64,
    },
    /// Active session changed.
    SessionChanged {
        /// Session that was active, if any.
        previous: Option<String>,
        /// New session.
        current: String,
    },
    /// Records rejected during normalization.
    RecordsDropped {
        /// Source of the rejected records.
        source: SourceKind,
        /// Rejected count.
        count: usize,
        /// Count per rejection reason.
        reasons: BTreeMap<String, usize>,
    },
    /// A live record was folded into the window.
    LiveAppended {
        /// Rendered identity key.
        key: String,
        /// Record landed before the tail.
        out_of_order: bool,
        /// Window length afterwards.
        window_len: usize,
    },
    /// Stall or anomaly signal.
    Quality(QualitySignal),
}

impl EventKind {
    /// Routing topic for this payload.
    #[must_use]
    pub const fn topic(&self) -> &'static str {
        match self {
            Self::DataReady { .. } => topics::DATA_READY,
            Self::Progress { .. } => topics::PROGRESS,
            Self::SourceError { .. } => topics::SOURCE_ERROR,
            Self::GapDetected(_) => topics::GAP_DETECTED,
            Self::Throttled { .. } => topics::THROTTLED,
            Self::SessionChanged { .. } => topics::SESSION_CHANGED,
            Self::RecordsDropped { .. } => topics::RECORDS_DROPPED,
            Self::LiveAppended { .. } => topics::LIVE_APPENDED,
            Self::Quality(_) => topics::QUALITY,
        }
    }
}

/// Event envelope.
#[derive(Debug, Clone, Serialize)]
pub struct EngineEvent {
    /// Unique event identifier
    pub id: String,
    /// Session the event concerns
    pub session_id: String,
    /// Event timestamp
    pub timestamp: DateTime<Utc>,
    /// Payload
    pub kind: EventKind,
}

impl EngineEvent {
    /// Create a new event
    pub fn new(session_id: impl Into<String>, kind: EventKind) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            timestamp: Utc::now(),
            kind,
        }
    }

    /// Routing topic
    #[must_use]
    pub const fn topic(&self) -> &'static str {
        self.kind.topic()
    }
}

impl fmt::Display for EngineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} -> {}: ",
            self.timestamp.format("%H:%M:%S"),
            self.session_id,
            self.topic()
        )?;
        match &self.kind {
            EventKind::DataReady { stats, degraded, .. } => write!(
                f,
                "{} records ({} interpolated) in {} ms{}",
                stats.total,
                stats.interpolated,
                stats.elapsed_ms,
                if *degraded { ", degraded" } else { "" }
            ),
            EventKind::Progress {
                source,
                rows_fetched,
                pages,
            } => write!(f, "{source} {rows_fetched} rows / {pages} pages"),
            EventKind::SourceError { source, error, .. } => write!(f, "{source}: {error}"),
            EventKind::GapDetected(gap) => {
                write!(f, "{} ms gap {}..{}", gap.gap_ms, gap.start_ms, gap.end_ms)
            }
            EventKind::Throttled { retry_after_ms } => write!(f, "retry in {retry_after_ms} ms"),
            EventKind::SessionChanged { previous, current } => write!(
                f,
                "{} => {current}",
                previous.as_deref().unwrap_or("<none>")
            ),
            EventKind::RecordsDropped { source, count, .. } => {
                write!(f, "{count} records dropped from {source}")
            }
            EventKind::LiveAppended { key, window_len, .. } => {
                write!(f, "{key} (window {window_len})")
            }
            EventKind::Quality(signal) => match serde_json::to_string(signal) {
                Ok(json) => f.write_str(&json),
                Err(_) => f.write_str("quality signal"),
            },
        }
    }
}
