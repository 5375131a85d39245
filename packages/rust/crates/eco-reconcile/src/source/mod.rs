//! Source fetcher seams.
//!
//! Transport clients live outside the engine; they plug in through these
//! traits and hand back raw JSON rows, which the coordinator normalizes.

mod paged;

use async_trait::async_trait;
use eco_events::{EventBus, EventKind};
use eco_types::SourceKind;
use serde_json::Value;

use crate::config::HistoryDirection;
use crate::error::SourceError;
use crate::observability::ReconcileEvent;

pub use paged::{PageFetcher, PagedPersistedStore};

/// What a run asks each source for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Session to read.
    pub session_id: String,
    /// Only records at or after this timestamp; `None` reads everything.
    pub since_ms: Option<i64>,
    /// Channel-history message limit.
    pub history_limit: usize,
    /// Channel-history read order.
    pub history_direction: HistoryDirection,
}

/// Progress reporter handed to a fetch.
///
/// Publishes `Progress` events for the run's session; a detached sink
/// (tests, ad-hoc calls) only logs.
#[derive(Debug, Clone)]
pub struct ProgressSink {
    bus: Option<EventBus>,
    session_id: String,
    source: SourceKind,
}

impl ProgressSink {
    /// Sink publishing on `bus`.
    #[must_use]
    pub fn new(bus: EventBus, session_id: impl Into<String>, source: SourceKind) -> Self {
        Self {
            bus: Some(bus),
            session_id: session_id.into(),
            source,
        }
    }

    /// Sink that only logs.
    #[must_use]
    pub fn detached(source: SourceKind) -> Self {
        Self {
            bus: None,
            session_id: String::new(),
            source,
        }
    }

    /// Source this sink reports for.
    #[must_use]
    pub const fn source(&self) -> SourceKind {
        self.source
    }

    /// Report cumulative rows and pages for the current fetch.
    pub fn report(&self, rows_fetched: usize, pages: usize) {
        tracing::debug!(
            event = ReconcileEvent::SourcePageFetched.as_str(),
            source = %self.source,
            session_id = %self.session_id,
            rows_fetched,
            pages,
            "source progress"
        );
        if let Some(bus) = &self.bus {
            bus.emit(
                &self.session_id,
                EventKind::Progress {
                    source: self.source,
                    rows_fetched,
                    pages,
                },
            );
        }
    }
}

/// Paginated persisted store, flattened.
#[async_trait]
pub trait PersistedStore: Send + Sync {
    /// All rows for the session since `request.since_ms`.
    async fn fetch_persisted(
        &self,
        request: &FetchRequest,
        progress: &ProgressSink,
    ) -> Result<Vec<Value>, SourceError>;
}

/// Bounded-retention channel history.
///
/// Implementations filter out other sessions and return an empty list when
/// history is not offered by the backend.
#[async_trait]
pub trait ChannelHistory: Send + Sync {
    /// Recent rows for the session since `request.since_ms`.
    async fn fetch_history(
        &self,
        request: &FetchRequest,
        progress: &ProgressSink,
    ) -> Result<Vec<Value>, SourceError>;
}

/// Channel history for backends without one.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoChannelHistory;

#[async_trait]
impl ChannelHistory for NoChannelHistory {
    async fn fetch_history(
        &self,
        _request: &FetchRequest,
        _progress: &ProgressSink,
    ) -> Result<Vec<Value>, SourceError> {
        Ok(Vec::new())
    }
}
