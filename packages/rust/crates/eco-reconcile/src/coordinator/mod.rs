//! Reconciliation coordinator.
//!
//! One coordinator owns the merge window for the active session. Requests
//! are throttled and coalesced so at most one run is `Reconciling` and at
//! most one more is pending; every caller of a run receives the same
//! outcome. Live records bypass runs entirely and are folded straight into
//! the window.

mod run;
mod state;
mod types;

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use eco_events::{EngineEvent, EventBus, EventKind};
use eco_quality::QualitySignal;
use eco_types::{RecordError, SourceKind, TelemetryRecord, derive_fields};
use eco_window::{AppendAction, WindowSnapshot};
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::config::ReconcileConfig;
use crate::observability::ReconcileEvent;
use crate::source::{ChannelHistory, PersistedStore};

use run::Admission;
use state::{InFlight, State};

pub use types::{
    LiveOutcome, ReconcileOptions, ReconcileOutcome, ReconcileStatus, ReconciliationState,
};

/// Shared engine state behind every [`Coordinator`] clone.
pub(crate) struct Inner {
    config: ReconcileConfig,
    persisted: Arc<dyn PersistedStore>,
    history: Arc<dyn ChannelHistory>,
    bus: EventBus,
    state: Mutex<State>,
    origin: Instant,
    runtime: Option<Handle>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn spawn<F>(&self, future: F) -> Option<JoinHandle<()>>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match Handle::try_current() {
            Ok(handle) => Some(handle.spawn(future)),
            Err(_) => self.runtime.as_ref().map(|handle| handle.spawn(future)),
        }
    }

    fn now_ms(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// Switch the active session: cancel runs, clear the window.
    fn change_session(&self, state: &mut State, session_id: &str) {
        let previous = state.session_id.replace(session_id.to_string());
        state.generation += 1;
        let waiters = state.take_all_waiters();
        if !waiters.is_empty() {
            let outcome = self.outcome(
                state,
                previous.as_deref().unwrap_or_default(),
                ReconcileStatus::Superseded,
            );
            for waiter in waiters {
                let _ = waiter.send(outcome.clone());
            }
        }
        state.clear_session_data();
        tracing::info!(
            event = ReconcileEvent::SessionChanged.as_str(),
            previous = ?previous,
            current = %session_id,
            generation = state.generation,
            "active session changed"
        );
        self.bus.emit(
            session_id,
            EventKind::SessionChanged {
                previous,
                current: session_id.to_string(),
            },
        );
    }
}

/// Reconciliation engine for one live view.
///
/// Cheap to clone; clones share the window, the run state, and the bus.
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Coordinator {
    /// Build a coordinator over the two fetchable sources.
    ///
    /// Captures the ambient tokio runtime (if any) so live records that
    /// start a new session can schedule a run from non-async callers.
    #[must_use]
    pub fn new(
        config: ReconcileConfig,
        persisted: Arc<dyn PersistedStore>,
        history: Arc<dyn ChannelHistory>,
    ) -> Self {
        let config = config.normalized();
        let bus = EventBus::new(config.event_capacity);
        let state = State::new(&config);
        Self {
            inner: Arc::new(Inner {
                config,
                persisted,
                history,
                bus,
                state: Mutex::new(state),
                origin: Instant::now(),
                runtime: Handle::try_current().ok(),
            }),
        }
    }

    /// Effective (normalized) configuration.
    #[must_use]
    pub fn config(&self) -> &ReconcileConfig {
        &self.inner.config
    }

    /// Event bus; use its `on_*` helpers for callback-style listeners.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.inner.bus
    }

    /// Receive every event published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.inner.bus.subscribe()
    }

    /// Request a run for `session_id`.
    ///
    /// A different session first clears the window and turns the request
    /// into a forced full refetch. While a run is in flight the request
    /// joins the single pending run; otherwise a non-forced request inside
    /// `min_interval_ms` of the last run resolves at once as `Throttled`.
    pub async fn trigger_reconcile(
        &self,
        session_id: &str,
        options: ReconcileOptions,
    ) -> ReconcileOutcome {
        let admission = {
            let mut state = self.inner.lock();
            let mut options = options;
            if state.session_id.as_deref() != Some(session_id) {
                self.inner.change_session(&mut state, session_id);
                options = options.coalesce(ReconcileOptions::initial());
            }
            self.inner.admit(&mut state, session_id, options)
        };
        match admission {
            Admission::Resolved(outcome) => outcome,
            Admission::Waiting(rx) => match rx.await {
                Ok(outcome) => outcome,
                Err(_) => {
                    let state = self.inner.lock();
                    self.inner
                        .outcome(&state, session_id, ReconcileStatus::Superseded)
                }
            },
        }
    }

    /// Page load: forced full refetch into an empty window.
    pub async fn initial_load(&self, session_id: &str) -> ReconcileOutcome {
        self.trigger_reconcile(session_id, ReconcileOptions::initial())
            .await
    }

    /// Periodic refresh: throttled, incremental from the watermark.
    pub async fn refresh(&self, session_id: &str) -> ReconcileOutcome {
        self.trigger_reconcile(session_id, ReconcileOptions::incremental())
            .await
    }

    /// Forced full refetch merged with the current window.
    pub async fn force_refresh(&self, session_id: &str) -> ReconcileOutcome {
        self.trigger_reconcile(session_id, ReconcileOptions::forced())
            .await
    }

    /// Fold one live record into the window without waiting on any run.
    ///
    /// A record for another session switches sessions first and schedules
    /// a forced full run for it.
    pub fn merge_realtime(&self, record: TelemetryRecord) -> LiveOutcome {
        let mut record = record;
        derive_fields(&mut record);
        let session_id = record.session_id.clone();
        let key = record.key();

        let mut state = self.inner.lock();
        let session_changed = state.session_id.as_deref() != Some(session_id.as_str());
        if session_changed {
            self.inner.change_session(&mut state, &session_id);
            // Nobody awaits this run; its result arrives as `DataReady`.
            let _ = self
                .inner
                .admit(&mut state, &session_id, ReconcileOptions::initial());
        }

        let anomalies = state.anomalies.observe(&record);
        let tracked = state
            .in_flight
            .as_ref()
            .is_some_and(InFlight::tracks_live)
            .then(|| record.clone());
        let append = state.window.append_live(record);
        let window_len = state.window.len();
        if let (Some(record), Some(run)) = (tracked, state.in_flight.as_mut())
            && append.action != AppendAction::Ignored
        {
            run.record_live(record);
        }

        if append.out_of_order {
            tracing::debug!(
                event = ReconcileEvent::LiveOutOfOrder.as_str(),
                session_id = %session_id,
                key = %key,
                action = ?append.action,
                "live record arrived behind the tail"
            );
        } else {
            tracing::trace!(
                event = ReconcileEvent::LiveAppended.as_str(),
                session_id = %session_id,
                key = %key,
                window_len,
                "live record appended"
            );
        }
        if append.action != AppendAction::Ignored {
            self.inner.bus.emit(
                &session_id,
                EventKind::LiveAppended {
                    key: key.to_string(),
                    out_of_order: append.out_of_order,
                    window_len,
                },
            );
        }

        if let Some(signal) = state.stall.record_arrival(self.inner.now_ms()) {
            tracing::info!(
                event = ReconcileEvent::QualityResumed.as_str(),
                session_id = %session_id,
                signal = ?signal,
                "live feed resumed"
            );
            self.inner
                .bus
                .emit(&session_id, EventKind::Quality(signal));
        }
        for anomaly in anomalies {
            tracing::warn!(
                event = ReconcileEvent::QualityAnomaly.as_str(),
                session_id = %session_id,
                field = %anomaly.field,
                value = anomaly.value,
                reason = ?anomaly.reason,
                severity = ?anomaly.severity,
                "sensor anomaly detected"
            );
            self.inner
                .bus
                .emit(&session_id, EventKind::Quality(QualitySignal::Anomaly(anomaly)));
        }

        LiveOutcome {
            append,
            session_changed,
        }
    }

    /// Normalize a raw live payload, then [`Self::merge_realtime`] it.
    ///
    /// # Errors
    ///
    /// Returns the normalization error when the payload carries no usable
    /// key; a `RecordsDropped` event is published for it.
    pub fn merge_realtime_json(&self, payload: &Value) -> Result<LiveOutcome, RecordError> {
        match TelemetryRecord::from_json(payload) {
            Ok(record) => Ok(self.merge_realtime(record)),
            Err(error) => {
                let session_id = self.current_session().unwrap_or_default();
                tracing::warn!(
                    event = ReconcileEvent::LiveRejected.as_str(),
                    session_id = %session_id,
                    reason = error.reason(),
                    error = %error,
                    "live payload rejected"
                );
                self.inner.bus.emit(
                    &session_id,
                    EventKind::RecordsDropped {
                        source: SourceKind::Realtime,
                        count: 1,
                        reasons: [(error.reason().to_string(), 1)].into_iter().collect(),
                    },
                );
                Err(error)
            }
        }
    }

    /// Report a live-feed stall once the feed has been silent too long.
    pub fn check_stall(&self) -> Option<QualitySignal> {
        let mut state = self.inner.lock();
        let signal = state.stall.check(self.inner.now_ms())?;
        let session_id = state.session_id.clone().unwrap_or_default();
        drop(state);
        tracing::warn!(
            event = ReconcileEvent::QualityStalled.as_str(),
            session_id = %session_id,
            signal = ?signal,
            "live feed stalled"
        );
        self.inner
            .bus
            .emit(&session_id, EventKind::Quality(signal.clone()));
        Some(signal)
    }

    /// Current published window.
    #[must_use]
    pub fn snapshot(&self) -> WindowSnapshot {
        self.inner.lock().window.snapshot()
    }

    /// Active session, if any.
    #[must_use]
    pub fn current_session(&self) -> Option<String> {
        self.inner.lock().session_id.clone()
    }

    /// Bookkeeping snapshot.
    #[must_use]
    pub fn state(&self) -> ReconciliationState {
        let state = self.inner.lock();
        ReconciliationState {
            current_session_id: state.session_id.clone(),
            in_flight: state.in_flight.is_some(),
            pending_requests: state
                .pending
                .as_ref()
                .map_or(0, |pending| pending.waiters.len()),
            last_full_reconciliation_at: state.last_full_at,
            last_known_timestamp: state.watermark_ms,
            window_len: state.window.len(),
            generation: state.generation,
        }
    }

    /// Drop the session: cancel runs, clear the window and detectors.
    pub fn reset(&self) {
        let mut state = self.inner.lock();
        let previous = state.session_id.take();
        state.generation += 1;
        let waiters = state.take_all_waiters();
        let outcome = self.inner.outcome(
            &state,
            previous.as_deref().unwrap_or_default(),
            ReconcileStatus::Superseded,
        );
        for waiter in waiters {
            let _ = waiter.send(outcome.clone());
        }
        state.clear_session_data();
        tracing::info!(
            event = ReconcileEvent::SessionReset.as_str(),
            previous = ?previous,
            generation = state.generation,
            "coordinator reset"
        );
    }

    /// Drive periodic refreshes and stall checks for the active session.
    ///
    /// Must be called from within a tokio runtime. Abort the handle to stop.
    #[must_use]
    pub fn spawn_refresh_loop(&self, period: Duration) -> JoinHandle<()> {
        let coordinator = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period.max(Duration::from_millis(1)));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                coordinator.check_stall();
                if let Some(session_id) = coordinator.current_session() {
                    coordinator.refresh(&session_id).await;
                }
            }
        })
    }
}
