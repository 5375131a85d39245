//! Integration tests for EventBus fan-out and listeners.

use std::time::Duration;

use eco_events::{EngineEvent, EventBus, EventKind, ReconcileStats, topics};
use eco_types::SourceKind;
use eco_window::WindowSnapshot;
use tokio::sync::mpsc;
use tokio::time::timeout;

fn progress(rows: usize) -> EventKind {
    EventKind::Progress {
        source: SourceKind::Persisted,
        rows_fetched: rows,
        pages: 1,
    }
}

#[tokio::test]
async fn test_publish_without_subscribers_is_not_an_error() {
    let bus = EventBus::new(4);
    assert_eq!(bus.emit("s1", progress(1)), 0);
}

#[tokio::test]
async fn test_multiple_subscribers_see_the_same_event() {
    let bus = EventBus::new(10);
    let mut rx1 = bus.subscribe();
    let mut rx2 = bus.subscribe();

    assert_eq!(bus.emit("s1", progress(5)), 2);

    let a = rx1.recv().await.unwrap();
    let b = rx2.recv().await.unwrap();
    assert_eq!(a.id, b.id);
    assert_eq!(a.topic(), topics::PROGRESS);
}

#[tokio::test]
async fn test_listeners_filter_by_topic() {
    let bus = EventBus::new(10);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _errors = bus.on_error(move |event: &EngineEvent| {
        let _ = tx.send(event.topic());
    });

    bus.emit("s1", progress(1));
    bus.emit(
        "s1",
        EventKind::SourceError {
            source: SourceKind::ChannelHistory,
            error: "unavailable".into(),
            is_expected: true,
        },
    );

    let got = timeout(Duration::from_secs(1), rx.recv()).await.unwrap();
    assert_eq!(got, Some(topics::SOURCE_ERROR));
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_several_listeners_for_one_topic() {
    let bus = EventBus::new(10);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let tx2 = tx.clone();
    let _a = bus.on_data_ready(move |_| {
        let _ = tx.send("a");
    });
    let _b = bus.on_data_ready(move |_| {
        let _ = tx2.send("b");
    });

    bus.emit(
        "s1",
        EventKind::DataReady {
            data: WindowSnapshot::default(),
            stats: ReconcileStats::default(),
            degraded: false,
        },
    );

    let mut got = vec![
        timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap(),
        timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap(),
    ];
    got.sort_unstable();
    assert_eq!(got, vec!["a", "b"]);
}

#[tokio::test]
async fn test_dropping_handle_unregisters_listener() {
    let bus = EventBus::new(10);
    let handle = bus.on(|_| true, |_| {});
    assert_eq!(bus.subscriber_count(), 1);

    handle.cancel();
    for _ in 0..50 {
        if bus.subscriber_count() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(bus.subscriber_count(), 0);
}

#[tokio::test]
async fn test_lagging_listener_skips_ahead() {
    let bus = EventBus::new(2);
    let mut rx = bus.subscribe();
    for rows in 0..5 {
        bus.emit("s1", progress(rows));
    }
    assert!(rx.recv().await.is_err());
    let next = rx.recv().await.unwrap();
    match next.kind {
        EventKind::Progress { rows_fetched, .. } => assert_eq!(rows_fetched, 3),
        other => panic!("unexpected event {other:?}"),
    }
}

#[test]
fn test_data_ready_serializes_with_type_tag() {
    let event = EngineEvent::new(
        "s1",
        EventKind::DataReady {
            data: WindowSnapshot::default(),
            stats: ReconcileStats::default(),
            degraded: true,
        },
    );
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["kind"]["type"], "data_ready");
    assert_eq!(json["kind"]["degraded"], true);
    assert_eq!(json["session_id"], "s1");
}
