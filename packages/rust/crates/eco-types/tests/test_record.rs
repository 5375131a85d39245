//! Integration tests for the record model and identity key.

use std::cmp::Ordering;

use eco_types::{SourceKind, TelemetryRecord, compare_records, key_of};
use serde_json::json;

#[test]
fn test_key_renders_timestamp_and_message_id() {
    let record = TelemetryRecord::new("s1", 1000).with_message_id(1);
    assert_eq!(key_of(&record).to_string(), "1000::1");
}

#[test]
fn test_key_without_message_id_has_empty_suffix() {
    let record = TelemetryRecord::new("s1", 1000);
    assert_eq!(key_of(&record).to_string(), "1000::");
}

#[test]
fn test_key_is_stable_across_fields_and_sessions() {
    let a = TelemetryRecord::new("s1", 5).with_message_id(3).with_field("v", 1.0);
    let b = TelemetryRecord::new("s1", 5).with_message_id(3).with_field("v", 9.0);
    assert_eq!(key_of(&a), key_of(&b));
}

#[test]
fn test_ordering_breaks_ties_by_message_id_with_absent_last() {
    let with_low = TelemetryRecord::new("s1", 100).with_message_id(1);
    let with_high = TelemetryRecord::new("s1", 100).with_message_id(2);
    let without = TelemetryRecord::new("s1", 100);
    let earlier = TelemetryRecord::new("s1", 99);

    assert_eq!(compare_records(&with_low, &with_high), Ordering::Less);
    assert_eq!(compare_records(&with_high, &without), Ordering::Less);
    assert_eq!(compare_records(&without, &with_low), Ordering::Greater);
    assert_eq!(compare_records(&earlier, &without), Ordering::Less);

    let mut records = vec![without.clone(), with_high.clone(), earlier.clone(), with_low.clone()];
    records.sort_by(compare_records);
    assert_eq!(records, vec![earlier, with_low, with_high, without]);
}

#[test]
fn test_serde_representation_is_flat() {
    let record = TelemetryRecord::new("s1", 1000)
        .with_message_id(4)
        .with_field("speed_ms", 4.5)
        .with_field("data_source", "esp32");
    let value = serde_json::to_value(&record).unwrap();
    assert_eq!(
        value,
        json!({
            "timestamp": 1000,
            "session_id": "s1",
            "message_id": 4,
            "speed_ms": 4.5,
            "data_source": "esp32"
        })
    );

    let back: TelemetryRecord = serde_json::from_value(value).unwrap();
    assert_eq!(back, record);
}

#[test]
fn test_interpolated_flag_is_serialized_only_when_set() {
    let record = TelemetryRecord::new("s1", 10).into_interpolated();
    let value = serde_json::to_value(&record).unwrap();
    assert_eq!(value["interpolated"], json!(true));
    assert!(!record.is_real());
}

#[test]
fn test_source_kind_names_round_trip() {
    for kind in SourceKind::MERGE_ORDER {
        assert_eq!(kind.as_str().parse::<SourceKind>(), Ok(kind));
    }
    assert_eq!("live".parse::<SourceKind>(), Ok(SourceKind::Realtime));
    assert_eq!("channel-history".parse::<SourceKind>(), Ok(SourceKind::ChannelHistory));
    assert!("bogus".parse::<SourceKind>().is_err());
}
