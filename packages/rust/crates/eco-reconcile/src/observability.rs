//! Stable `event` ids attached to every engine log line.

/// Structured log event ids, grouped by namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReconcileEvent {
    /// A run entered `Reconciling`.
    RunStarted,
    /// A run published its result.
    RunCompleted,
    /// A run published with at least one failed source.
    RunDegraded,
    /// A run finished for a stale generation and was dropped.
    RunDiscarded,
    /// A run ended without completing (task crashed).
    RunAbandoned,
    /// A request joined the pending run.
    RequestQueued,
    /// A request was rejected by the throttle.
    RequestThrottled,
    /// A gap was left unfilled.
    GapDetected,
    /// Settings file read.
    SettingsLoaded,
    /// Settings file skipped.
    SettingsIgnored,
    /// Live record folded into the window.
    LiveAppended,
    /// Live record arrived before the tail.
    LiveOutOfOrder,
    /// Live payload could not be normalized.
    LiveRejected,
    /// Active session changed.
    SessionChanged,
    /// Coordinator reset.
    SessionReset,
    /// Source fetch finished.
    SourceFetched,
    /// Source fetch failed.
    SourceFailed,
    /// One persisted page arrived.
    SourcePageFetched,
    /// Pagination hit `max_pages`.
    SourcePaginationTruncated,
    /// Records rejected during normalization.
    SourceRecordsDropped,
    /// Live feed went silent.
    QualityStalled,
    /// Live feed resumed.
    QualityResumed,
    /// Sensor anomaly found.
    QualityAnomaly,
}

impl ReconcileEvent {
    /// Every id, for registration checks.
    pub const ALL: [Self; 23] = [
        Self::RunStarted,
        Self::RunCompleted,
        Self::RunDegraded,
        Self::RunDiscarded,
        Self::RunAbandoned,
        Self::RequestQueued,
        Self::RequestThrottled,
        Self::GapDetected,
        Self::SettingsLoaded,
        Self::SettingsIgnored,
        Self::LiveAppended,
        Self::LiveOutOfOrder,
        Self::LiveRejected,
        Self::SessionChanged,
        Self::SessionReset,
        Self::SourceFetched,
        Self::SourceFailed,
        Self::SourcePageFetched,
        Self::SourcePaginationTruncated,
        Self::SourceRecordsDropped,
        Self::QualityStalled,
        Self::QualityResumed,
        Self::QualityAnomaly,
    ];

    /// Dotted id used as the `event` field.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RunStarted => "reconcile.run.started",
            Self::RunCompleted => "reconcile.run.completed",
            Self::RunDegraded => "reconcile.run.degraded",
            Self::RunDiscarded => "reconcile.run.discarded",
            Self::RunAbandoned => "reconcile.run.abandoned",
            Self::RequestQueued => "reconcile.request.queued",
            Self::RequestThrottled => "reconcile.request.throttled",
            Self::GapDetected => "reconcile.gap.detected",
            Self::SettingsLoaded => "reconcile.settings.loaded",
            Self::SettingsIgnored => "reconcile.settings.ignored",
            Self::LiveAppended => "live.record.appended",
            Self::LiveOutOfOrder => "live.record.out_of_order",
            Self::LiveRejected => "live.record.rejected",
            Self::SessionChanged => "session.changed",
            Self::SessionReset => "session.reset",
            Self::SourceFetched => "source.fetch.completed",
            Self::SourceFailed => "source.fetch.failed",
            Self::SourcePageFetched => "source.page.fetched",
            Self::SourcePaginationTruncated => "source.pagination.truncated",
            Self::SourceRecordsDropped => "source.records.dropped",
            Self::QualityStalled => "quality.stream.stalled",
            Self::QualityResumed => "quality.stream.resumed",
            Self::QualityAnomaly => "quality.anomaly.detected",
        }
    }
}
