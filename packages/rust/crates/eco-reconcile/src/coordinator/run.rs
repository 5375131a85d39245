//! Run lifecycle: admission, fetch driver, completion.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use eco_events::{EventKind, ReconcileStats};
use eco_merge::{MergeSource, build_series};
use eco_types::{SourceKind, TelemetryRecord, normalize_records};
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time::Instant;

use super::Inner;
use super::state::{InFlight, PendingRun, State, Waiter};
use super::types::{ReconcileOptions, ReconcileOutcome, ReconcileStatus};
use crate::error::SourceError;
use crate::observability::ReconcileEvent;
use crate::source::{FetchRequest, ProgressSink};

/// Reason attached to rows a source returned for another session.
const FOREIGN_SESSION: &str = "foreign_session";

pub(super) enum Admission {
    Resolved(ReconcileOutcome),
    Waiting(oneshot::Receiver<ReconcileOutcome>),
}

/// Immutable facts about one run, carried by its driver.
struct RunTicket {
    run_id: u64,
    generation: u64,
    session_id: String,
    since_ms: Option<i64>,
    full_refresh: bool,
    reset_window: bool,
    started: Instant,
}

/// One source's rows, normalized before the state lock is taken.
struct Fetched {
    rows: usize,
    records: Vec<TelemetryRecord>,
    dropped: BTreeMap<String, usize>,
}

impl Fetched {
    fn normalize(session_id: &str, rows: &[Value]) -> Self {
        let batch = normalize_records(rows);
        let mut dropped: BTreeMap<String, usize> = BTreeMap::new();
        for error in &batch.dropped {
            *dropped.entry(error.reason().to_string()).or_default() += 1;
        }
        let (records, foreign): (Vec<_>, Vec<_>) = batch
            .records
            .into_iter()
            .partition(|record| record.session_id == session_id);
        if !foreign.is_empty() {
            dropped.insert(FOREIGN_SESSION.to_string(), foreign.len());
        }
        Self {
            rows: rows.len(),
            records,
            dropped,
        }
    }
}

/// Resolves the run as abandoned if the driver is dropped before completing.
struct RunGuard {
    inner: Arc<Inner>,
    run_id: u64,
    generation: u64,
    armed: bool,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if self.armed {
            self.inner.abandon_run(self.run_id, self.generation);
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn resolve(waiters: Vec<Waiter>, outcome: &ReconcileOutcome) {
    for waiter in waiters {
        // Receiver gone means the caller stopped waiting.
        let _ = waiter.send(outcome.clone());
    }
}

impl Inner {
    /// Queue, reject, or start a run for the active session.
    pub(super) fn admit(
        self: &Arc<Self>,
        state: &mut State,
        session_id: &str,
        options: ReconcileOptions,
    ) -> Admission {
        let (tx, rx) = oneshot::channel();
        if state.in_flight.is_some() {
            let pending = state.pending.get_or_insert_with(|| PendingRun {
                options,
                waiters: Vec::new(),
            });
            pending.options = pending.options.coalesce(options);
            pending.waiters.push(tx);
            tracing::debug!(
                event = ReconcileEvent::RequestQueued.as_str(),
                session_id = %session_id,
                waiting = pending.waiters.len(),
                "reconcile request joined pending run"
            );
            return Admission::Waiting(rx);
        }
        if let Some(retry_after_ms) = self.throttle_remaining(state, options) {
            return Admission::Resolved(self.throttled(state, session_id, retry_after_ms));
        }
        self.start_run(state, session_id, options, vec![tx]);
        Admission::Waiting(rx)
    }

    fn throttle_remaining(&self, state: &State, options: ReconcileOptions) -> Option<u64> {
        if options.force {
            return None;
        }
        let min_interval = Duration::from_millis(self.config.min_interval_ms);
        let elapsed = state.last_full_at?.elapsed();
        (elapsed < min_interval).then(|| millis(min_interval - elapsed))
    }

    fn throttled(&self, state: &State, session_id: &str, retry_after_ms: u64) -> ReconcileOutcome {
        tracing::debug!(
            event = ReconcileEvent::RequestThrottled.as_str(),
            session_id = %session_id,
            retry_after_ms,
            "reconcile request throttled"
        );
        self.bus
            .emit(session_id, EventKind::Throttled { retry_after_ms });
        self.outcome(
            state,
            session_id,
            ReconcileStatus::Throttled { retry_after_ms },
        )
    }

    /// Outcome carrying the current window with no run behind it.
    pub(super) fn outcome(
        &self,
        state: &State,
        session_id: &str,
        status: ReconcileStatus,
    ) -> ReconcileOutcome {
        let snapshot = state.window.snapshot();
        let stats = ReconcileStats {
            total: snapshot.len(),
            interpolated: snapshot.interpolated_count(),
            ..ReconcileStats::default()
        };
        ReconcileOutcome {
            session_id: session_id.to_string(),
            status,
            snapshot,
            stats,
        }
    }

    /// Enter `Reconciling` and spawn the fetch driver.
    pub(super) fn start_run(
        self: &Arc<Self>,
        state: &mut State,
        session_id: &str,
        options: ReconcileOptions,
        waiters: Vec<Waiter>,
    ) {
        state.last_full_at = Some(Instant::now());
        let since_ms = if options.full_refresh {
            None
        } else {
            let derived = state
                .watermark_ms
                .map(|watermark| watermark.saturating_sub(self.config.overlap_ms).max(0));
            match (options.since_ms, derived) {
                (Some(explicit), Some(derived)) => Some(explicit.min(derived)),
                (explicit, derived) => explicit.or(derived),
            }
        };

        state.next_run_id += 1;
        let ticket = RunTicket {
            run_id: state.next_run_id,
            generation: state.generation,
            session_id: session_id.to_string(),
            since_ms,
            full_refresh: options.full_refresh,
            reset_window: options.reset_window,
            started: Instant::now(),
        };
        tracing::info!(
            event = ReconcileEvent::RunStarted.as_str(),
            session_id = %ticket.session_id,
            run_id = ticket.run_id,
            full_refresh = ticket.full_refresh,
            reset_window = ticket.reset_window,
            since_ms = ?ticket.since_ms,
            waiters = waiters.len(),
            "reconcile run started"
        );

        let run_id = ticket.run_id;
        let live = ticket.reset_window.then(Vec::new);
        let driver = Arc::clone(self);
        let handle = self.spawn(async move { driver.drive(ticket).await });
        match handle {
            Some(handle) => {
                state.in_flight = Some(InFlight {
                    run_id,
                    abort: Some(handle.abort_handle()),
                    waiters,
                    live,
                });
            }
            None => {
                tracing::error!(
                    event = ReconcileEvent::RunAbandoned.as_str(),
                    session_id = %session_id,
                    run_id,
                    "no tokio runtime available to drive the run"
                );
                let outcome = self.outcome(state, session_id, ReconcileStatus::Degraded);
                resolve(waiters, &outcome);
            }
        }
    }

    async fn drive(self: Arc<Self>, ticket: RunTicket) {
        let mut guard = RunGuard {
            inner: Arc::clone(&self),
            run_id: ticket.run_id,
            generation: ticket.generation,
            armed: true,
        };
        let request = FetchRequest {
            session_id: ticket.session_id.clone(),
            since_ms: ticket.since_ms,
            history_limit: self.config.history_limit,
            history_direction: self.config.history_direction,
        };
        let persisted_progress =
            ProgressSink::new(self.bus.clone(), &ticket.session_id, SourceKind::Persisted);
        let history_progress = ProgressSink::new(
            self.bus.clone(),
            &ticket.session_id,
            SourceKind::ChannelHistory,
        );
        let (persisted, history) = tokio::join!(
            self.persisted
                .fetch_persisted(&request, &persisted_progress),
            self.history.fetch_history(&request, &history_progress),
        );
        guard.armed = false;
        let persisted = persisted.map(|rows| Fetched::normalize(&ticket.session_id, &rows));
        let history = history.map(|rows| Fetched::normalize(&ticket.session_id, &rows));
        self.complete_run(&ticket, persisted, history);
    }

    fn complete_run(
        self: &Arc<Self>,
        ticket: &RunTicket,
        persisted: Result<Fetched, SourceError>,
        history: Result<Fetched, SourceError>,
    ) {
        let mut state = self.lock();
        let current = state.generation == ticket.generation
            && state
                .in_flight
                .as_ref()
                .is_some_and(|run| run.run_id == ticket.run_id);
        if !current {
            tracing::debug!(
                event = ReconcileEvent::RunDiscarded.as_str(),
                session_id = %ticket.session_id,
                run_id = ticket.run_id,
                "stale reconcile result discarded"
            );
            return;
        }
        let Some(mut run) = state.in_flight.take() else {
            return;
        };

        let mut stats = ReconcileStats::default();
        let mut failures = 0_usize;
        let persisted =
            self.accept_source(ticket, SourceKind::Persisted, persisted, &mut stats, &mut failures);
        let history = self.accept_source(
            ticket,
            SourceKind::ChannelHistory,
            history,
            &mut stats,
            &mut failures,
        );

        // Total failure leaves the window untouched, even for a reset.
        let status = if failures == 2 {
            ReconcileStatus::Degraded
        } else {
            let existing = match run.live.take() {
                Some(live) => {
                    state.watermark_ms = None;
                    state.reported_gaps.clear();
                    live
                }
                None => state.window.real_records(),
            };
            let series = build_series(
                &[
                    MergeSource::new(SourceKind::Existing, &existing),
                    MergeSource::new(SourceKind::Persisted, &persisted),
                    MergeSource::new(SourceKind::ChannelHistory, &history),
                ],
                &self.config.precedence,
                self.config.max_points,
                &self.config.interpolation,
            );

            let fetched_max = persisted
                .iter()
                .chain(&history)
                .map(|record| record.timestamp_ms)
                .max();
            state.watermark_ms = state.watermark_ms.max(fetched_max);

            for gap in &series.gaps {
                if !state.reported_gaps.insert((gap.start_ms, gap.end_ms)) {
                    continue;
                }
                tracing::info!(
                    event = ReconcileEvent::GapDetected.as_str(),
                    session_id = %gap.session_id,
                    start_ms = gap.start_ms,
                    end_ms = gap.end_ms,
                    gap_ms = gap.gap_ms,
                    "gap exceeds interpolation bound"
                );
                self.bus
                    .emit(&ticket.session_id, EventKind::GapDetected(gap.clone()));
            }

            stats.from_each_source = series.merge.per_source.clone();
            stats.duplicates_resolved = series.merge.duplicates_resolved;
            stats.expected_interval_ms = series.expected_interval_ms;
            stats.gaps = series.gaps.len();
            stats.evicted = series.merge.evicted + series.evicted;
            stats.evicted += state.window.replace(series.records);

            if failures > 0 {
                ReconcileStatus::Degraded
            } else if persisted.is_empty() && history.is_empty() {
                ReconcileStatus::Unchanged
            } else {
                ReconcileStatus::Completed
            }
        };

        let snapshot = state.window.snapshot();
        stats.total = snapshot.len();
        stats.interpolated = snapshot.interpolated_count();
        stats.elapsed_ms = millis(ticket.started.elapsed());
        let degraded = status == ReconcileStatus::Degraded;

        if degraded {
            tracing::warn!(
                event = ReconcileEvent::RunDegraded.as_str(),
                session_id = %ticket.session_id,
                run_id = ticket.run_id,
                failures,
                total = stats.total,
                elapsed_ms = stats.elapsed_ms,
                "reconcile run completed with failed sources"
            );
        } else {
            tracing::info!(
                event = ReconcileEvent::RunCompleted.as_str(),
                session_id = %ticket.session_id,
                run_id = ticket.run_id,
                total = stats.total,
                interpolated = stats.interpolated,
                duplicates_resolved = stats.duplicates_resolved,
                elapsed_ms = stats.elapsed_ms,
                "reconcile run completed"
            );
        }
        self.bus.emit(
            &ticket.session_id,
            EventKind::DataReady {
                data: snapshot.clone(),
                stats: stats.clone(),
                degraded,
            },
        );

        let outcome = ReconcileOutcome {
            session_id: ticket.session_id.clone(),
            status,
            snapshot,
            stats,
        };
        resolve(run.waiters, &outcome);
        self.start_pending(&mut state);
    }

    /// Report one source result; failures and drops become events.
    fn accept_source(
        &self,
        ticket: &RunTicket,
        source: SourceKind,
        result: Result<Fetched, SourceError>,
        stats: &mut ReconcileStats,
        failures: &mut usize,
    ) -> Vec<TelemetryRecord> {
        let fetched = match result {
            Ok(fetched) => fetched,
            Err(error) => {
                *failures += 1;
                tracing::warn!(
                    event = ReconcileEvent::SourceFailed.as_str(),
                    session_id = %ticket.session_id,
                    source = %source,
                    expected = error.is_expected(),
                    error = %error,
                    "source fetch failed"
                );
                self.bus.emit(
                    &ticket.session_id,
                    EventKind::SourceError {
                        source,
                        error: error.to_string(),
                        is_expected: error.is_expected(),
                    },
                );
                return Vec::new();
            }
        };

        let Fetched {
            rows,
            records,
            dropped: reasons,
        } = fetched;
        let count: usize = reasons.values().sum();
        if count > 0 {
            stats.dropped += count;
            tracing::warn!(
                event = ReconcileEvent::SourceRecordsDropped.as_str(),
                session_id = %ticket.session_id,
                source = %source,
                count,
                reasons = ?reasons,
                "source records dropped during normalization"
            );
            self.bus.emit(
                &ticket.session_id,
                EventKind::RecordsDropped {
                    source,
                    count,
                    reasons,
                },
            );
        }
        tracing::debug!(
            event = ReconcileEvent::SourceFetched.as_str(),
            session_id = %ticket.session_id,
            source = %source,
            rows,
            accepted = records.len(),
            "source fetch completed"
        );
        records
    }

    /// Start the coalesced pending run, if any.
    fn start_pending(self: &Arc<Self>, state: &mut State) {
        let Some(pending) = state.pending.take() else {
            return;
        };
        let Some(session_id) = state.session_id.clone() else {
            let outcome = self.outcome(state, "", ReconcileStatus::Superseded);
            resolve(pending.waiters, &outcome);
            return;
        };
        if let Some(retry_after_ms) = self.throttle_remaining(state, pending.options) {
            let outcome = self.throttled(state, &session_id, retry_after_ms);
            resolve(pending.waiters, &outcome);
            return;
        }
        self.start_run(state, &session_id, pending.options, pending.waiters);
    }

    /// Driver dropped without completing: fail its waiters and move on.
    fn abandon_run(self: &Arc<Self>, run_id: u64, generation: u64) {
        let mut state = self.lock();
        let current = state.generation == generation
            && state
                .in_flight
                .as_ref()
                .is_some_and(|run| run.run_id == run_id);
        if !current {
            return;
        }
        let Some(run) = state.in_flight.take() else {
            return;
        };
        let session_id = state.session_id.clone().unwrap_or_default();
        tracing::warn!(
            event = ReconcileEvent::RunAbandoned.as_str(),
            session_id = %session_id,
            run_id,
            "reconcile run ended without completing"
        );
        let outcome = self.outcome(&state, &session_id, ReconcileStatus::Degraded);
        resolve(run.waiters, &outcome);
        self.start_pending(&mut state);
    }
}
