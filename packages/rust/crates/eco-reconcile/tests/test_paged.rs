#![allow(missing_docs)]

use std::sync::Mutex;

use async_trait::async_trait;
use eco_reconcile::{
    EventBus, EventKind, FetchRequest, HistoryDirection, PageFetcher, PagedPersistedStore,
    PersistedStore, ProgressSink, SourceError, SourceKind,
};
use serde_json::{Value, json};

struct VecFetcher {
    rows: Vec<Value>,
    requests: Mutex<Vec<(usize, usize)>>,
    fail_at_offset: Option<usize>,
}

impl VecFetcher {
    fn new(count: i64) -> Self {
        Self {
            rows: (0..count)
                .map(|i| json!({ "timestamp": i * 100, "session_id": "s1" }))
                .collect(),
            requests: Mutex::new(Vec::new()),
            fail_at_offset: None,
        }
    }
}

#[async_trait]
impl PageFetcher for VecFetcher {
    async fn fetch_page(
        &self,
        _session_id: &str,
        _since_ms: Option<i64>,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Value>, SourceError> {
        self.requests.lock().unwrap().push((offset, limit));
        if self.fail_at_offset == Some(offset) {
            return Err(SourceError::Timeout(1_000));
        }
        Ok(self.rows.iter().skip(offset).take(limit).cloned().collect())
    }
}

fn request() -> FetchRequest {
    FetchRequest {
        session_id: "s1".to_string(),
        since_ms: None,
        history_limit: 100,
        history_direction: HistoryDirection::Backwards,
    }
}

#[tokio::test]
async fn test_pages_until_short_page() {
    let store = PagedPersistedStore::new(VecFetcher::new(25), 10, 50);
    let bus = EventBus::new(16);
    let mut rx = bus.subscribe();
    let progress = ProgressSink::new(bus.clone(), "s1", SourceKind::Persisted);

    let rows = store.fetch_persisted(&request(), &progress).await.unwrap();

    assert_eq!(rows.len(), 25);
    assert_eq!(
        *store.fetcher().requests.lock().unwrap(),
        [(0, 10), (10, 10), (20, 10)]
    );
    let mut reported = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let EventKind::Progress {
            rows_fetched, pages, ..
        } = event.kind
        {
            reported.push((rows_fetched, pages));
        }
    }
    assert_eq!(reported, [(10, 1), (20, 2), (25, 3)]);
}

#[tokio::test]
async fn test_exact_multiple_needs_one_empty_page() {
    let store = PagedPersistedStore::new(VecFetcher::new(20), 10, 50);
    let rows = store
        .fetch_persisted(&request(), &ProgressSink::detached(SourceKind::Persisted))
        .await
        .unwrap();
    assert_eq!(rows.len(), 20);
    assert_eq!(store.fetcher().requests.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn test_stops_at_page_limit() {
    let store = PagedPersistedStore::new(VecFetcher::new(100), 10, 2);
    let rows = store
        .fetch_persisted(&request(), &ProgressSink::detached(SourceKind::Persisted))
        .await
        .unwrap();
    assert_eq!(rows.len(), 20);
    assert_eq!(store.fetcher().requests.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_page_failure_fails_fetch() {
    let mut fetcher = VecFetcher::new(30);
    fetcher.fail_at_offset = Some(10);
    let store = PagedPersistedStore::new(fetcher, 10, 50);
    let error = store
        .fetch_persisted(&request(), &ProgressSink::detached(SourceKind::Persisted))
        .await
        .unwrap_err();
    assert_eq!(error, SourceError::Timeout(1_000));
    assert!(error.is_expected());
}
