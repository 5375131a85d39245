//! Transparent pagination over a page-at-a-time backend.

use async_trait::async_trait;
use serde_json::Value;

use super::{FetchRequest, PersistedStore, ProgressSink};
use crate::config::ReconcileConfig;
use crate::error::SourceError;
use crate::observability::ReconcileEvent;

/// One page of persisted rows.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Rows `offset..offset + limit` for the session, oldest first.
    async fn fetch_page(
        &self,
        session_id: &str,
        since_ms: Option<i64>,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Value>, SourceError>;
}

/// [`PersistedStore`] that walks pages until a short page or `max_pages`.
#[derive(Debug, Clone)]
pub struct PagedPersistedStore<F> {
    fetcher: F,
    page_size: usize,
    max_pages: usize,
}

impl<F: PageFetcher> PagedPersistedStore<F> {
    /// Pager with explicit limits (each at least one).
    pub fn new(fetcher: F, page_size: usize, max_pages: usize) -> Self {
        Self {
            fetcher,
            page_size: page_size.max(1),
            max_pages: max_pages.max(1),
        }
    }

    /// Pager using `page_size` / `max_pages` from the engine config.
    pub fn from_config(fetcher: F, config: &ReconcileConfig) -> Self {
        Self::new(fetcher, config.page_size, config.max_pages)
    }

    /// Wrapped fetcher.
    pub const fn fetcher(&self) -> &F {
        &self.fetcher
    }
}

#[async_trait]
impl<F: PageFetcher> PersistedStore for PagedPersistedStore<F> {
    async fn fetch_persisted(
        &self,
        request: &FetchRequest,
        progress: &ProgressSink,
    ) -> Result<Vec<Value>, SourceError> {
        let mut rows = Vec::new();
        for page in 0..self.max_pages {
            let batch = self
                .fetcher
                .fetch_page(
                    &request.session_id,
                    request.since_ms,
                    page * self.page_size,
                    self.page_size,
                )
                .await?;
            let short = batch.len() < self.page_size;
            rows.extend(batch);
            progress.report(rows.len(), page + 1);
            if short {
                return Ok(rows);
            }
        }
        tracing::warn!(
            event = ReconcileEvent::SourcePaginationTruncated.as_str(),
            session_id = %request.session_id,
            max_pages = self.max_pages,
            page_size = self.page_size,
            rows = rows.len(),
            "persisted fetch stopped at page limit"
        );
        Ok(rows)
    }
}
