#![allow(missing_docs)]

use std::fs;

use eco_reconcile::{
    HistoryDirection, ReconcileConfig, SettingsError, SourceKind, load_runtime_settings_from_paths,
    load_settings_file,
};

#[test]
fn test_missing_files_yield_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let settings = load_runtime_settings_from_paths(
        &dir.path().join("system.yaml"),
        &dir.path().join("user.yaml"),
    );
    assert_eq!(settings.into_config(), ReconcileConfig::default());
}

#[test]
fn test_user_settings_override_system_settings() {
    let dir = tempfile::tempdir().unwrap();
    let system = dir.path().join("system.yaml");
    let user = dir.path().join("user.yaml");
    fs::write(
        &system,
        r"
reconcile:
  max_points: 20000
  min_interval_ms: 3000
sources:
  page_size: 500
  history_direction: forwards
quality:
  bounds:
    voltage_v: { min: 40.0, max: 55.0 }
",
    )
    .unwrap();
    fs::write(
        &user,
        r"
reconcile:
  min_interval_ms: 1000
  precedence: [persisted, existing, channel_history, realtime]
interpolation:
  max_gap_ms: 1500
quality:
  stall_timeout_ms: 8000
  gyro_rate_max: 500.0
  bounds:
    speed_ms: { min: 0.0, max: 30.0 }
",
    )
    .unwrap();

    let config = load_runtime_settings_from_paths(&system, &user).into_config();

    assert_eq!(config.max_points, 20_000);
    assert_eq!(config.min_interval_ms, 1_000);
    assert_eq!(config.page_size, 500);
    assert_eq!(config.history_direction, HistoryDirection::Forwards);
    assert_eq!(config.interpolation.max_gap_ms, 1_500);
    assert_eq!(config.interpolation.max_points_per_gap, 4);
    assert_eq!(
        config.precedence.kinds(),
        [
            SourceKind::Persisted,
            SourceKind::Existing,
            SourceKind::ChannelHistory,
            SourceKind::Realtime,
        ]
    );
    assert_eq!(config.quality.stall_timeout_ms, 8_000);
    assert_eq!(config.quality.bounds["voltage_v"].min, 40.0);
    assert_eq!(config.quality.bounds["speed_ms"].max, 30.0);
    assert!(config.quality.bounds.contains_key("current_a"));
    assert_eq!(config.quality.gyro_rate_max, 500.0);
    assert_eq!(config.quality.accel_magnitude_max, 80.0);
}

#[test]
fn test_out_of_range_values_are_clamped() {
    let dir = tempfile::tempdir().unwrap();
    let user = dir.path().join("user.yaml");
    fs::write(
        &user,
        "reconcile:\n  max_points: 0\n  overlap_ms: -50\nsources:\n  page_size: 0\ninterpolation:\n  gap_threshold_factor: 0.5\n",
    )
    .unwrap();

    let config = load_runtime_settings_from_paths(&dir.path().join("none.yaml"), &user).into_config();

    assert_eq!(config.max_points, 1);
    assert_eq!(config.overlap_ms, 0);
    assert_eq!(config.page_size, 1);
    assert!((config.interpolation.gap_threshold_factor - 1.0).abs() < f64::EPSILON);
}

#[test]
fn test_malformed_file_is_ignored_by_loader_but_reported_strictly() {
    let dir = tempfile::tempdir().unwrap();
    let system = dir.path().join("system.yaml");
    let user = dir.path().join("user.yaml");
    fs::write(&system, "reconcile:\n  max_points: 1234\n").unwrap();
    fs::write(&user, "reconcile: [not, a, map]\n").unwrap();

    let config = load_runtime_settings_from_paths(&system, &user).into_config();
    assert_eq!(config.max_points, 1_234);

    let error = load_settings_file(&user).unwrap_err();
    assert!(matches!(error, SettingsError::Parse { .. }));
    assert!(error.to_string().contains("user.yaml"));
}

#[test]
fn test_empty_file_is_default() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.yaml");
    fs::write(&path, "\n").unwrap();
    let settings = load_settings_file(&path).unwrap();
    assert_eq!(settings.into_config(), ReconcileConfig::default());
}

#[test]
fn test_unreadable_file_reports_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let error = load_settings_file(&dir.path().join("missing.yaml")).unwrap_err();
    assert!(matches!(error, SettingsError::Read { .. }));
}
