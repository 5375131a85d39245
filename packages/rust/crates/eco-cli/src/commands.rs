//! Command implementations, kept free of argument parsing.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use eco_merge::{GapEvent, InterpolationConfig, estimate_interval, interpolate_gaps, merge};
use eco_reconcile::{
    AppendAction, ChannelHistory, Coordinator, NoChannelHistory, PagedPersistedStore,
    ReconcileConfig, ReconcileOutcome, ReconcileStats, ReconcileStatus,
};
use eco_types::normalize_records;
use serde::Serialize;

use crate::jsonl::{JsonlHistory, JsonlStore, read_jsonl};

/// Coordinator over a persisted JSONL file and an optional history file.
///
/// # Errors
///
/// Fails when either file cannot be read or parsed.
pub fn build_coordinator(
    config: ReconcileConfig,
    persisted: &Path,
    history: Option<&Path>,
) -> Result<Coordinator> {
    let store = JsonlStore::open(persisted)?;
    tracing::info!(
        path = %persisted.display(),
        rows = store.len(),
        "persisted source loaded"
    );
    let history: Arc<dyn ChannelHistory> = match history {
        Some(path) => Arc::new(JsonlHistory::open(path)?),
        None => Arc::new(NoChannelHistory),
    };
    let persisted = Arc::new(PagedPersistedStore::from_config(store, &config));
    Ok(Coordinator::new(config, persisted, history))
}

/// Stats-only view of an outcome.
#[derive(Debug, Serialize)]
pub struct RunSummary<'a> {
    /// Session reconciled.
    pub session_id: &'a str,
    /// Resolution.
    #[serde(flatten)]
    pub status: &'a ReconcileStatus,
    /// Run statistics.
    pub stats: &'a ReconcileStats,
}

impl<'a> From<&'a ReconcileOutcome> for RunSummary<'a> {
    fn from(outcome: &'a ReconcileOutcome) -> Self {
        Self {
            session_id: &outcome.session_id,
            status: &outcome.status,
            stats: &outcome.stats,
        }
    }
}

/// Initial load of one session; the full outcome goes to `out` when given.
///
/// # Errors
///
/// Fails when `out` cannot be written.
pub async fn run_reconcile(
    coordinator: &Coordinator,
    session_id: &str,
    out: Option<&Path>,
) -> Result<ReconcileOutcome> {
    let outcome = coordinator.initial_load(session_id).await;
    if let Some(path) = out {
        let body = serde_json::to_vec_pretty(&outcome).context("failed to encode outcome")?;
        std::fs::write(path, body)
            .with_context(|| format!("failed to write {}", path.display()))?;
        tracing::info!(
            path = %path.display(),
            total = outcome.stats.total,
            "merged series written"
        );
    }
    Ok(outcome)
}

/// Pacing for [`run_replay`].
#[derive(Debug, Clone, Copy)]
pub struct ReplayOptions {
    /// Delay between live records.
    pub interval: Duration,
    /// Period of the background refresh loop.
    pub refresh_every: Duration,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self {
            interval: Duration::ZERO,
            refresh_every: Duration::from_secs(5),
        }
    }
}

/// What a replay did with the live file.
#[derive(Debug, Default, Serialize)]
pub struct ReplaySummary {
    /// Lines in the live file.
    pub live_rows: usize,
    /// Records inserted into the window.
    pub inserted: usize,
    /// Records that replaced an existing key.
    pub replaced: usize,
    /// Records ignored (interpolated over real).
    pub ignored: usize,
    /// Records that arrived behind the tail.
    pub out_of_order: usize,
    /// Payloads that could not be normalized.
    pub rejected: usize,
    /// Live records that started a new session.
    pub session_changes: usize,
    /// Window length after the closing refresh.
    pub final_len: usize,
    /// Stats of the closing refresh.
    pub stats: ReconcileStats,
}

/// Initial load, then feed the live file through the fast path while a
/// refresh loop runs; ends with a forced refresh.
///
/// # Errors
///
/// Fails when the live file cannot be read.
pub async fn run_replay(
    coordinator: &Coordinator,
    session_id: &str,
    live: &Path,
    options: ReplayOptions,
) -> Result<ReplaySummary> {
    let live_rows = read_jsonl(live)?;
    let _listener = coordinator.events().on(
        |_| true,
        |event| tracing::info!(topic = event.topic(), detail = %event, "engine event"),
    );

    let initial = coordinator.initial_load(session_id).await;
    tracing::info!(
        session_id = %session_id,
        total = initial.stats.total,
        "initial load finished"
    );
    let refresher = coordinator.spawn_refresh_loop(options.refresh_every);

    let mut summary = ReplaySummary {
        live_rows: live_rows.len(),
        ..ReplaySummary::default()
    };
    for row in &live_rows {
        match coordinator.merge_realtime_json(row) {
            Ok(outcome) => {
                match outcome.append.action {
                    AppendAction::Inserted => summary.inserted += 1,
                    AppendAction::Replaced => summary.replaced += 1,
                    AppendAction::Ignored => summary.ignored += 1,
                }
                summary.out_of_order += usize::from(outcome.append.out_of_order);
                summary.session_changes += usize::from(outcome.session_changed);
            }
            Err(_) => summary.rejected += 1,
        }
        if !options.interval.is_zero() {
            tokio::time::sleep(options.interval).await;
        }
    }
    refresher.abort();

    let session_id = coordinator
        .current_session()
        .unwrap_or_else(|| session_id.to_string());
    let closing = coordinator.force_refresh(&session_id).await;
    summary.final_len = closing.snapshot.len();
    summary.stats = closing.stats;
    Ok(summary)
}

/// Offline gap analysis of one file.
#[derive(Debug, Serialize)]
pub struct GapReport {
    /// Usable records after dedup.
    pub records: usize,
    /// Rows that could not be normalized.
    pub dropped: usize,
    /// Median spacing, when there were enough records.
    pub expected_interval_ms: Option<f64>,
    /// Synthetic points interpolation would add.
    pub inserted: usize,
    /// Gaps too long to fill.
    pub gaps: Vec<GapEvent>,
}

/// Estimate the interval of a JSONL file and list its gaps.
///
/// # Errors
///
/// Fails when the input file cannot be read or parsed.
pub fn run_gaps(
    input: &Path,
    session_id: Option<&str>,
    config: &InterpolationConfig,
) -> Result<GapReport> {
    let rows = read_jsonl(input)?;
    let batch = normalize_records(&rows);
    let dropped = batch.dropped.len();
    let records: Vec<_> = batch
        .records
        .into_iter()
        .filter(|record| session_id.is_none_or(|session| record.session_id == session))
        .collect();
    let records = merge(&[records.as_slice()], usize::MAX);

    let expected_interval_ms = estimate_interval(&records);
    let (inserted, gaps) = match expected_interval_ms {
        Some(interval) => {
            let outcome = interpolate_gaps(&records, interval, config);
            (outcome.inserted, outcome.gaps)
        }
        None => (0, Vec::new()),
    };
    Ok(GapReport {
        records: records.len(),
        dropped,
        expected_interval_ms,
        inserted,
        gaps,
    })
}
