//! JSONL-file sources for offline reconciliation.

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use eco_reconcile::{
    ChannelHistory, FetchRequest, HistoryDirection, PageFetcher, ProgressSink, SourceError,
};
use eco_types::parse_timestamp;
use serde_json::Value;

/// Read a JSON-lines file; blank lines are skipped.
///
/// # Errors
///
/// Fails when the file cannot be read or a line is not valid JSON.
pub fn read_jsonl(path: &Path) -> Result<Vec<Value>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("{}:{}: invalid JSON", path.display(), idx + 1))
        })
        .collect()
}

fn row_session(row: &Value) -> Option<&str> {
    row.get("session_id")
        .or_else(|| row.get("sessionId"))
        .and_then(Value::as_str)
}

/// Rows for `session_id` at or after `since_ms`, in file order.
///
/// Rows whose timestamp cannot be parsed are kept so the engine can count
/// them as dropped.
fn matching<'a>(
    rows: &'a [Value],
    session_id: &'a str,
    since_ms: Option<i64>,
) -> impl Iterator<Item = &'a Value> + 'a {
    rows.iter().filter(move |row| {
        if row_session(row).is_some_and(|session| session != session_id) {
            return false;
        }
        match (since_ms, row.get("timestamp").map(parse_timestamp)) {
            (Some(since), Some(Ok(ts))) => ts >= since,
            _ => true,
        }
    })
}

/// Persisted store backed by an in-memory copy of a JSONL file.
#[derive(Debug, Clone, Default)]
pub struct JsonlStore {
    rows: Vec<Value>,
}

impl JsonlStore {
    /// Store over already-parsed rows.
    #[must_use]
    pub fn new(rows: Vec<Value>) -> Self {
        Self { rows }
    }

    /// Load a JSONL file.
    ///
    /// # Errors
    ///
    /// See [`read_jsonl`].
    pub fn open(path: &Path) -> Result<Self> {
        read_jsonl(path).map(Self::new)
    }

    /// Row count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when the file had no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[async_trait]
impl PageFetcher for JsonlStore {
    async fn fetch_page(
        &self,
        session_id: &str,
        since_ms: Option<i64>,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Value>, SourceError> {
        Ok(matching(&self.rows, session_id, since_ms)
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }
}

/// Channel history backed by a JSONL file, bounded like a real channel.
#[derive(Debug, Clone, Default)]
pub struct JsonlHistory {
    rows: Vec<Value>,
}

impl JsonlHistory {
    /// History over already-parsed rows, oldest first.
    #[must_use]
    pub fn new(rows: Vec<Value>) -> Self {
        Self { rows }
    }

    /// Load a JSONL file.
    ///
    /// # Errors
    ///
    /// See [`read_jsonl`].
    pub fn open(path: &Path) -> Result<Self> {
        read_jsonl(path).map(Self::new)
    }
}

#[async_trait]
impl ChannelHistory for JsonlHistory {
    async fn fetch_history(
        &self,
        request: &FetchRequest,
        progress: &ProgressSink,
    ) -> Result<Vec<Value>, SourceError> {
        let matched: Vec<&Value> =
            matching(&self.rows, &request.session_id, request.since_ms).collect();
        let kept = match request.history_direction {
            HistoryDirection::Backwards => {
                let skip = matched.len().saturating_sub(request.history_limit);
                &matched[skip..]
            }
            HistoryDirection::Forwards => {
                &matched[..matched.len().min(request.history_limit)]
            }
        };
        let rows: Vec<Value> = kept.iter().map(|row| (*row).clone()).collect();
        progress.report(rows.len(), 1);
        Ok(rows)
    }
}
