#![allow(missing_docs)]

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use eco_cli::{
    JsonlHistory, JsonlStore, ReplayOptions, build_coordinator, read_jsonl, run_gaps,
    run_reconcile, run_replay,
};
use eco_merge::InterpolationConfig;
use eco_reconcile::{
    ChannelHistory, FetchRequest, HistoryDirection, PageFetcher, ProgressSink, ReconcileConfig,
    ReconcileStatus, SourceKind,
};
use serde_json::{Value, json};

fn write_rows(dir: &Path, name: &str, rows: &[Value]) -> PathBuf {
    let mut body = String::new();
    for row in rows {
        writeln!(body, "{row}").unwrap();
    }
    let path = dir.join(name);
    fs::write(&path, body).unwrap();
    path
}

fn series(session_id: &str, from: i64, to: i64) -> Vec<Value> {
    (from..=to)
        .step_by(100)
        .map(|ts| json!({ "timestamp": ts, "session_id": session_id, "speed_ms": 4.0 }))
        .collect()
}

fn request(limit: usize, direction: HistoryDirection) -> FetchRequest {
    FetchRequest {
        session_id: "s1".to_string(),
        since_ms: None,
        history_limit: limit,
        history_direction: direction,
    }
}

#[test]
fn test_read_jsonl_skips_blank_lines_and_reports_bad_line() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("good.jsonl");
    fs::write(&good, "{\"a\":1}\n\n{\"a\":2}\n").unwrap();
    assert_eq!(read_jsonl(&good).unwrap().len(), 2);

    let bad = dir.path().join("bad.jsonl");
    fs::write(&bad, "{\"a\":1}\nnot json\n").unwrap();
    let error = read_jsonl(&bad).unwrap_err();
    assert!(format!("{error:#}").contains("bad.jsonl:2"));
}

#[tokio::test]
async fn test_jsonl_store_pages_by_session_and_since() {
    let mut rows = series("s1", 0, 900);
    rows.extend(series("s2", 0, 900));
    let store = JsonlStore::new(rows);

    let page = store.fetch_page("s1", Some(500), 0, 3).await.unwrap();
    let timestamps: Vec<i64> = page.iter().map(|r| r["timestamp"].as_i64().unwrap()).collect();
    assert_eq!(timestamps, [500, 600, 700]);

    let tail = store.fetch_page("s1", Some(500), 3, 3).await.unwrap();
    assert_eq!(tail.len(), 2);
}

#[tokio::test]
async fn test_jsonl_history_honors_limit_and_direction() {
    let history = JsonlHistory::new(series("s1", 0, 900));
    let progress = ProgressSink::detached(SourceKind::ChannelHistory);

    let newest = history
        .fetch_history(&request(3, HistoryDirection::Backwards), &progress)
        .await
        .unwrap();
    assert_eq!(newest[0]["timestamp"], 700);
    assert_eq!(newest.len(), 3);

    let oldest = history
        .fetch_history(&request(3, HistoryDirection::Forwards), &progress)
        .await
        .unwrap();
    assert_eq!(oldest[2]["timestamp"], 200);
}

#[tokio::test]
async fn test_reconcile_writes_merged_series() {
    let dir = tempfile::tempdir().unwrap();
    let persisted = write_rows(dir.path(), "persisted.jsonl", &series("s1", 0, 900));
    let history = write_rows(dir.path(), "history.jsonl", &series("s1", 800, 1_400));
    let out = dir.path().join("out.json");
    let config = ReconcileConfig {
        page_size: 4,
        ..ReconcileConfig::default()
    };

    let coordinator = build_coordinator(config, &persisted, Some(&history)).unwrap();
    let outcome = run_reconcile(&coordinator, "s1", Some(&out)).await.unwrap();

    assert_eq!(outcome.status, ReconcileStatus::Completed);
    assert_eq!(outcome.snapshot.len(), 15);
    let written: Value = serde_json::from_slice(&fs::read(&out).unwrap()).unwrap();
    assert_eq!(written["status"], "completed");
    assert_eq!(written["data"].as_array().unwrap().len(), 15);
    assert_eq!(written["stats"]["total"], 15);
}

#[tokio::test]
async fn test_missing_persisted_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = build_coordinator(
        ReconcileConfig::default(),
        &dir.path().join("absent.jsonl"),
        None,
    );
    assert!(result.is_err());
}

#[tokio::test]
async fn test_replay_feeds_live_records() {
    let dir = tempfile::tempdir().unwrap();
    let persisted = write_rows(dir.path(), "persisted.jsonl", &series("s1", 0, 900));
    let mut live_rows = series("s1", 1_000, 1_400);
    live_rows.push(json!({ "timestamp": 500, "session_id": "s1", "speed_ms": 6.0 }));
    live_rows.push(json!({ "session_id": "s1" }));
    let live = write_rows(dir.path(), "live.jsonl", &live_rows);

    let coordinator = build_coordinator(ReconcileConfig::default(), &persisted, None).unwrap();
    let options = ReplayOptions {
        interval: Duration::ZERO,
        refresh_every: Duration::from_secs(60),
    };
    let summary = run_replay(&coordinator, "s1", &live, options).await.unwrap();

    assert_eq!(summary.live_rows, 7);
    assert_eq!(summary.inserted, 5);
    assert_eq!(summary.replaced, 1);
    assert_eq!(summary.out_of_order, 1);
    assert_eq!(summary.rejected, 1);
    assert_eq!(summary.session_changes, 0);
    assert_eq!(summary.final_len, 15);
}

#[test]
fn test_gaps_reports_fillable_and_long_gaps() {
    let dir = tempfile::tempdir().unwrap();
    let mut rows = series("s1", 0, 900);
    rows.push(json!({ "timestamp": 1_300, "session_id": "s1" }));
    rows.extend(series("s1", 5_000, 5_900));
    rows.push(json!({ "session_id": "s1" }));
    let input = write_rows(dir.path(), "input.jsonl", &rows);

    let report = run_gaps(&input, Some("s1"), &InterpolationConfig::default()).unwrap();

    assert_eq!(report.records, 21);
    assert_eq!(report.dropped, 1);
    assert_eq!(report.expected_interval_ms, Some(100.0));
    assert_eq!(report.inserted, 3);
    assert_eq!(report.gaps.len(), 1);
    assert_eq!(report.gaps[0].start_ms, 1_300);
    assert_eq!(report.gaps[0].end_ms, 5_000);
}

#[test]
fn test_gaps_without_enough_records() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_rows(dir.path(), "input.jsonl", &series("s1", 0, 100));
    let report = run_gaps(&input, None, &InterpolationConfig::default()).unwrap();
    assert_eq!(report.records, 2);
    assert_eq!(report.expected_interval_ms, None);
    assert_eq!(report.inserted, 0);
    assert!(report.gaps.is_empty());
}
