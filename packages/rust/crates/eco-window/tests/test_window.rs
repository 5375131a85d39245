//! Integration tests for MergeWindow.

use eco_types::{TelemetryRecord, key_of};
use eco_window::{AppendAction, MergeWindow};

fn rec(ts: i64, id: u64, v: f64) -> TelemetryRecord {
    TelemetryRecord::new("s1", ts).with_message_id(id).with_field("v", v)
}

fn timestamps(w: &MergeWindow) -> Vec<i64> {
    w.iter().map(|r| r.timestamp_ms).collect()
}

#[test]
fn test_in_order_append() {
    let mut w = MergeWindow::new(10);
    for i in 0..5 {
        let out = w.append_live(rec(i * 100, i as u64, 0.0));
        assert_eq!(out.action, AppendAction::Inserted);
        assert!(!out.out_of_order);
    }
    assert_eq!(timestamps(&w), vec![0, 100, 200, 300, 400]);
    assert_eq!(w.last_timestamp(), Some(400));
}

#[test]
fn test_late_record_is_inserted_in_place() {
    let mut w = MergeWindow::new(10);
    w.append_live(rec(100, 1, 0.0));
    w.append_live(rec(300, 3, 0.0));
    let out = w.append_live(rec(200, 2, 0.0));
    assert_eq!(out.action, AppendAction::Inserted);
    assert!(out.out_of_order);
    assert_eq!(timestamps(&w), vec![100, 200, 300]);
}

#[test]
fn test_real_overwrites_real_last_write_wins() {
    let mut w = MergeWindow::new(10);
    w.append_live(rec(100, 1, 5.0));
    let out = w.append_live(rec(100, 1, 9.0));
    assert_eq!(out.action, AppendAction::Replaced);
    assert_eq!(w.len(), 1);
    assert_eq!(w.iter().next().and_then(|r| r.number("v")), Some(9.0));
}

#[test]
fn test_real_overwrites_interpolated_but_not_reverse() {
    let mut w = MergeWindow::new(10);
    w.append_live(rec(100, 1, 1.0).into_interpolated());
    let out = w.append_live(rec(100, 1, 2.0));
    assert_eq!(out.action, AppendAction::Replaced);

    let out = w.append_live(rec(100, 1, 3.0).into_interpolated());
    assert_eq!(out.action, AppendAction::Ignored);

    let kept = w.get(&key_of(&rec(100, 1, 0.0))).unwrap();
    assert!(kept.is_real());
    assert_eq!(kept.number("v"), Some(2.0));
}

#[test]
fn test_cap_evicts_oldest() {
    let mut w = MergeWindow::new(3);
    let mut evicted = 0;
    for i in 0..5 {
        evicted += w.append_live(rec(i, i as u64, 0.0)).evicted;
    }
    assert_eq!(evicted, 2);
    assert_eq!(timestamps(&w), vec![2, 3, 4]);
    assert_eq!(w.max_points(), 3);
}

#[test]
fn test_replace_sorts_and_dedups_unordered_input() {
    let mut w = MergeWindow::new(10);
    let evicted = w.replace(vec![
        rec(300, 3, 0.0),
        rec(100, 1, 1.0),
        rec(100, 1, 2.0),
        rec(200, 2, 0.0).into_interpolated(),
        rec(200, 2, 7.0),
    ]);
    assert_eq!(evicted, 0);
    assert_eq!(timestamps(&w), vec![100, 200, 300]);
    let at_200 = w.get(&key_of(&rec(200, 2, 0.0))).unwrap();
    assert!(at_200.is_real());
    assert_eq!(w.real_records().len(), 3);
}

#[test]
fn test_snapshot_is_immutable_and_shared_until_mutation() {
    let mut w = MergeWindow::new(10);
    w.append_live(rec(1, 1, 0.0));
    let first = w.snapshot();
    let again = w.snapshot();
    assert!(first.ptr_eq(&again));

    w.append_live(rec(2, 2, 0.0));
    let second = w.snapshot();
    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 2);
    assert!(!first.ptr_eq(&second));

    w.clear();
    assert!(w.is_empty());
    assert_eq!(second.len(), 2);
}

#[test]
fn test_snapshot_serializes_as_array() {
    let mut w = MergeWindow::new(10);
    w.append_live(rec(1, 1, 0.5));
    let json = serde_json::to_value(w.snapshot()).unwrap();
    assert_eq!(json[0]["timestamp"], 1);
    assert_eq!(json[0]["v"], 0.5);
}
