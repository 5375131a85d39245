//! Integration tests for gap estimation and interpolation.

use eco_merge::{
    InterpolationConfig, MergeSource, SourcePrecedence, build_series, estimate_interval,
    interpolate_gaps,
};
use eco_types::{FieldValue, SourceKind, TelemetryRecord};

fn rec(ts: i64, v: f64) -> TelemetryRecord {
    TelemetryRecord::new("s1", ts).with_field("v", v)
}

#[test]
fn test_long_gap_is_reported_not_filled() {
    let records = vec![rec(0, 0.0), rec(200, 1.0), rec(400, 2.0), rec(1400, 3.0)];
    let out = interpolate_gaps(&records, 200.0, &InterpolationConfig::default());

    assert_eq!(out.inserted, 0);
    assert_eq!(out.records, records);
    assert_eq!(out.gaps.len(), 1);
    let gap = &out.gaps[0];
    assert_eq!((gap.start_ms, gap.end_ms, gap.gap_ms), (400, 1400, 1000));
    assert_eq!(gap.session_id, "s1");
}

#[test]
fn test_short_gap_gets_one_midpoint() {
    let records = vec![rec(0, 0.0), rec(200, 10.0), rec(600, 30.0)];
    let out = interpolate_gaps(&records, 200.0, &InterpolationConfig::default());

    assert_eq!(out.inserted, 1);
    assert!(out.gaps.is_empty());
    let ts: Vec<i64> = out.records.iter().map(|r| r.timestamp_ms).collect();
    assert_eq!(ts, vec![0, 200, 400, 600]);

    let point = &out.records[2];
    assert!(point.interpolated);
    assert_eq!(point.message_id, None);
    assert_eq!(point.number("v"), Some(20.0));
}

#[test]
fn test_points_per_gap_are_capped_and_evenly_spaced() {
    let records = vec![rec(0, 0.0), rec(700, 70.0)];
    let config = InterpolationConfig {
        max_points_per_gap: 2,
        ..InterpolationConfig::default()
    };
    let out = interpolate_gaps(&records, 100.0, &config);

    assert_eq!(out.inserted, 2);
    let ts: Vec<i64> = out.records.iter().map(|r| r.timestamp_ms).collect();
    assert_eq!(ts[1..3], [233, 466]);
    assert!(out.records.windows(2).all(|p| p[0].timestamp_ms < p[1].timestamp_ms));
}

#[test]
fn test_gap_below_threshold_is_ignored() {
    let records = vec![rec(0, 0.0), rec(240, 1.0)];
    let out = interpolate_gaps(&records, 200.0, &InterpolationConfig::default());
    assert_eq!(out.inserted, 0);
    assert!(out.gaps.is_empty());
}

#[test]
fn test_never_interpolates_across_sessions() {
    let records = vec![rec(0, 0.0), TelemetryRecord::new("s2", 400).with_field("v", 4.0)];
    let out = interpolate_gaps(&records, 200.0, &InterpolationConfig::default());
    assert_eq!(out.inserted, 0);
    assert!(out.gaps.is_empty());
}

#[test]
fn test_one_sided_and_text_fields() {
    let a = rec(0, 0.0).with_field("only_a", 3.0).with_field("mode", "eco");
    let b = rec(400, 4.0).with_field("only_b", 8.0).with_field("mode", "sport");
    let out = interpolate_gaps(&[a, b], 200.0, &InterpolationConfig::default());

    let point = &out.records[1];
    assert_eq!(point.number("v"), Some(2.0));
    assert_eq!(point.number("only_a"), Some(3.0));
    assert_eq!(point.number("only_b"), Some(8.0));
    assert_eq!(point.fields.get("mode"), Some(&FieldValue::Text("sport".into())));
}

#[test]
fn test_invalid_interval_returns_input() {
    let records = vec![rec(0, 0.0), rec(600, 1.0)];
    let out = interpolate_gaps(&records, 0.0, &InterpolationConfig::default());
    assert_eq!(out.records, records);
    let out = interpolate_gaps(&records, f64::NAN, &InterpolationConfig::default());
    assert_eq!(out.records, records);
}

#[test]
fn test_interpolation_bound_holds_between_real_points() {
    let records: Vec<TelemetryRecord> = [0, 100, 200, 300, 1000, 1100, 1200, 1250]
        .iter()
        .map(|t| rec(*t, 0.0))
        .collect();
    let config = InterpolationConfig {
        max_gap_ms: 1000,
        ..InterpolationConfig::default()
    };
    let interval = estimate_interval(&records).unwrap();
    let out = interpolate_gaps(&records, interval, &config);

    let mut run = 0;
    for record in &out.records {
        if record.interpolated {
            run += 1;
            assert!(run <= config.max_points_per_gap);
        } else {
            run = 0;
        }
    }
    assert_eq!(out.inserted, 4);
}

#[test]
fn test_build_series_recomputes_synthetic_points_and_caps() {
    let existing = vec![rec(0, 0.0), rec(200, 2.0), rec(300, 99.0).into_interpolated()];
    let persisted = vec![rec(400, 4.0), rec(600, 6.0), rec(1000, 10.0)];
    let sources = [
        MergeSource::new(SourceKind::Existing, &existing),
        MergeSource::new(SourceKind::Persisted, &persisted),
    ];
    let out = build_series(&sources, &SourcePrecedence::default(), 100, &InterpolationConfig::default());

    assert_eq!(out.expected_interval_ms, Some(200.0));
    let ts: Vec<i64> = out.records.iter().map(|r| r.timestamp_ms).collect();
    assert_eq!(ts, vec![0, 200, 400, 600, 800, 1000]);
    assert_eq!(out.interpolated, 1);
    assert_eq!(out.records[4].number("v"), Some(8.0));

    let capped = build_series(&sources, &SourcePrecedence::default(), 3, &InterpolationConfig::default());
    assert_eq!(capped.records.len(), 3);
    assert_eq!(capped.records.last().map(|r| r.timestamp_ms), Some(1000));
}

#[test]
fn test_extreme_timestamps_do_not_overflow() {
    let records = vec![
        rec(i64::MIN, 0.0),
        rec(0, 1.0),
        rec(1, 2.0),
        rec(2, 3.0),
        rec(3, 4.0),
        rec(i64::MAX, 5.0),
    ];
    let sources = [MergeSource::new(SourceKind::Persisted, &records)];
    let out = build_series(&sources, &SourcePrecedence::default(), 100, &InterpolationConfig::default());
    assert_eq!(out.expected_interval_ms, Some(1.0));
    assert_eq!(out.interpolated, 0);
    assert_eq!(out.gaps.len(), 2);

    let config = InterpolationConfig {
        max_gap_ms: i64::MAX,
        max_points_per_gap: 2,
        ..InterpolationConfig::default()
    };
    let filled = interpolate_gaps(&records[1..], 1.0, &config);
    assert_eq!(filled.inserted, 2);
    let ts: Vec<i64> = filled.records.iter().map(|r| r.timestamp_ms).collect();
    assert!(ts.windows(2).all(|pair| pair[0] < pair[1]));
}
