//! Sensor anomaly detection.
//!
//! Checks run per record in a fixed order (bounds, rolling statistics, IMU,
//! GPS, speed, cumulative counters, stuck sensors). A field is reported at
//! most once per record: the first check that flags it wins.

use std::collections::{BTreeMap, HashMap};

use eco_types::TelemetryRecord;
use serde::Serialize;

use crate::{Anomaly, AnomalyReason, QualityConfig, RollingWindow, Severity};

/// Flagged fields at or above this count raise severity to warning.
const MANY_FIELDS: usize = 3;
const HIGH_CONFIDENCE: f64 = 0.9;
const JUMP_CONFIDENCE: f64 = 0.7;
const CROSS_CHECK_CONFIDENCE: f64 = 0.6;
const INCREASE_CONFIDENCE: f64 = 0.8;

/// Flat-earth approximation, good enough between consecutive fixes.
const METRES_PER_DEG_LAT: f64 = 111_000.0;
const METRES_PER_DEG_LON: f64 = 78_000.0;

const ACCEL_AXES: [&str; 3] = ["accel_x", "accel_y", "accel_z"];
const GYRO_AXES: [&str; 3] = ["gyro_x", "gyro_y", "gyro_z"];

/// Running totals since the last reset.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QualityStats {
    /// Real records inspected.
    pub records_checked: u64,
    /// Records with at least one finding.
    pub records_flagged: u64,
    /// Findings per field.
    pub by_field: BTreeMap<String, u64>,
    /// Flagged records per record-level severity.
    pub by_severity: BTreeMap<Severity, u64>,
}

#[derive(Debug, Default)]
struct StuckState {
    last: Option<f64>,
    repeats: usize,
}

#[derive(Debug, Clone, Copy)]
struct GpsFix {
    lat: f64,
    lon: f64,
    alt: f64,
}

struct Finding {
    field: String,
    value: f64,
    reason: AnomalyReason,
    confidence: f64,
}

#[derive(Default)]
struct Findings(Vec<Finding>);

impl Findings {
    fn has(&self, field: &str) -> bool {
        self.0.iter().any(|f| f.field == field)
    }

    fn flag(&mut self, field: &str, value: f64, reason: AnomalyReason, confidence: f64) {
        if !self.has(field) {
            self.0.push(Finding {
                field: field.to_string(),
                value,
                reason,
                confidence,
            });
        }
    }
}

/// Stateful checker fed one real record at a time, in series order.
#[derive(Debug)]
pub struct AnomalyDetector {
    config: QualityConfig,
    windows: HashMap<String, RollingWindow>,
    stuck: HashMap<String, StuckState>,
    last_cumulative: HashMap<String, f64>,
    last_fix: Option<GpsFix>,
    stats: QualityStats,
}

impl AnomalyDetector {
    /// Detector with the given thresholds.
    #[must_use]
    pub fn new(config: QualityConfig) -> Self {
        Self {
            config,
            windows: HashMap::new(),
            stuck: HashMap::new(),
            last_cumulative: HashMap::new(),
            last_fix: None,
            stats: QualityStats::default(),
        }
    }

    /// Check one record. Interpolated records are skipped.
    ///
    /// Every returned finding carries the record's severity: critical when
    /// any critical field fired, warning when many fields fired or one fired
    /// with high confidence, info otherwise.
    pub fn observe(&mut self, record: &TelemetryRecord) -> Vec<Anomaly> {
        if !record.is_real() {
            return Vec::new();
        }
        let mut found = Findings::default();
        self.check_bounds(record, &mut found);
        self.check_rolling(record, &mut found);
        self.check_imu(record, &mut found);
        self.check_gps(record, &mut found);
        self.check_speed_rate(record, &mut found);
        self.check_cumulative(record, &mut found);
        self.check_stuck(record, &mut found);
        self.push_windows(record);

        self.stats.records_checked += 1;
        let findings = found.0;
        if findings.is_empty() {
            return Vec::new();
        }

        let severity = if findings
            .iter()
            .any(|f| self.config.critical_fields.contains(&f.field))
        {
            Severity::Critical
        } else if findings.len() >= MANY_FIELDS
            || findings.iter().any(|f| f.confidence > HIGH_CONFIDENCE)
        {
            Severity::Warning
        } else {
            Severity::Info
        };
        self.stats.records_flagged += 1;
        *self.stats.by_severity.entry(severity).or_default() += 1;

        findings
            .into_iter()
            .map(|finding| {
                *self.stats.by_field.entry(finding.field.clone()).or_default() += 1;
                Anomaly {
                    timestamp_ms: record.timestamp_ms,
                    field: finding.field,
                    value: finding.value,
                    reason: finding.reason,
                    confidence: finding.confidence,
                    severity,
                }
            })
            .collect()
    }

    fn check_bounds(&self, record: &TelemetryRecord, found: &mut Findings) {
        for field in &self.config.non_negative_fields {
            if let Some(value) = record.number(field)
                && value < 0.0
            {
                found.flag(field, value, AnomalyReason::NegativeValue, 1.0);
            }
        }
        for (field, bounds) in &self.config.bounds {
            if let Some(value) = record.number(field)
                && !bounds.contains(value)
            {
                found.flag(field, value, AnomalyReason::AbsoluteBound, 1.0);
            }
        }
    }

    /// z-score and relative jump against the field's rolling window.
    fn check_rolling(&self, record: &TelemetryRecord, found: &mut Findings) {
        let cfg = &self.config;
        for field in &cfg.rolling_fields {
            let Some(value) = record.number(field) else {
                continue;
            };
            let Some(window) = self.windows.get(field) else {
                continue;
            };
            if found.has(field) || window.len() < cfg.min_samples {
                continue;
            }
            let mean = window.mean();
            let std_dev = window.std_dev();
            if std_dev > 0.0 {
                let z = (value - mean).abs() / std_dev;
                if z > cfg.z_score_threshold {
                    let confidence = (z / (cfg.z_score_threshold * 2.0)).min(1.0);
                    found.flag(field, value, AnomalyReason::ZScoreExceeded, confidence);
                }
            }
            if cfg.jump_fields.contains(field)
                && mean > 0.0
                && (value - mean).abs() / mean > cfg.electrical_jump_pct
            {
                found.flag(field, value, AnomalyReason::SuddenJump, JUMP_CONFIDENCE);
            }
        }
    }

    fn check_imu(&self, record: &TelemetryRecord, found: &mut Findings) {
        let cfg = &self.config;
        let accel: Vec<(&str, f64)> = ACCEL_AXES
            .iter()
            .filter_map(|axis| record.number(axis).map(|v| (*axis, v)))
            .collect();
        let magnitude = accel.iter().map(|(_, v)| v * v).sum::<f64>().sqrt();
        if magnitude > cfg.accel_magnitude_max
            && let Some((axis, value)) = accel
                .iter()
                .copied()
                .max_by(|a, b| a.1.abs().total_cmp(&b.1.abs()))
        {
            let confidence = (magnitude / cfg.accel_magnitude_max).min(1.0);
            found.flag(axis, value, AnomalyReason::MagnitudeExceeded, confidence);
        }

        for axis in GYRO_AXES {
            let Some(value) = record.number(axis) else {
                continue;
            };
            if let Some(previous) = self.windows.get(axis).and_then(RollingWindow::last) {
                let rate = (value - previous).abs();
                if rate > cfg.gyro_rate_max {
                    let confidence = (rate / (cfg.gyro_rate_max * 2.0)).min(1.0);
                    found.flag(axis, value, AnomalyReason::RateOfChange, confidence);
                }
            }
        }

        let speed = record.number("speed_ms").unwrap_or(0.0);
        if speed < cfg.stationary_speed_ms
            && let Some(gyro_z) = record.number("gyro_z")
        {
            let rotation = GYRO_AXES
                .iter()
                .map(|axis| record.number(axis).unwrap_or(0.0).powi(2))
                .sum::<f64>()
                .sqrt();
            if rotation > cfg.stationary_gyro_max {
                found.flag(
                    "gyro_z",
                    gyro_z,
                    AnomalyReason::CrossValidationFailed,
                    CROSS_CHECK_CONFIDENCE,
                );
            }
        }
    }

    /// Movement between consecutive fixes; the track advances on every fix.
    fn check_gps(&mut self, record: &TelemetryRecord, found: &mut Findings) {
        let (Some(lat), Some(lon)) = (record.number("latitude"), record.number("longitude")) else {
            return;
        };
        let alt = record.number("altitude").unwrap_or(0.0);
        let cfg = &self.config;

        if let Some(previous) = self.last_fix {
            let distance = ((lat - previous.lat) * METRES_PER_DEG_LAT)
                .hypot((lon - previous.lon) * METRES_PER_DEG_LON);
            let dt = cfg.sample_interval_secs();

            let expected = record.number("speed_ms").unwrap_or(0.0) * dt;
            if expected > 0.0 {
                let ratio = distance / expected;
                if ratio > cfg.gps_speed_distance_ratio {
                    let confidence = (ratio / (cfg.gps_speed_distance_ratio * 2.0)).min(1.0);
                    found.flag("latitude", lat, AnomalyReason::GpsSpeedMismatch, confidence);
                }
            }

            let implied_speed = distance / dt;
            if implied_speed > cfg.gps_impossible_speed {
                let confidence = (implied_speed / (cfg.gps_impossible_speed * 2.0)).min(1.0);
                found.flag("latitude", lat, AnomalyReason::ImpossibleSpeed, confidence);
            }

            let climb = (alt - previous.alt).abs();
            if climb > cfg.altitude_rate_max {
                let confidence = (climb / (cfg.altitude_rate_max * 2.0)).min(1.0);
                found.flag("altitude", alt, AnomalyReason::AltitudeRate, confidence);
            }
        }
        self.last_fix = Some(GpsFix { lat, lon, alt });
    }

    fn check_speed_rate(&self, record: &TelemetryRecord, found: &mut Findings) {
        let Some(speed) = record.number("speed_ms") else {
            return;
        };
        let Some(previous) = self.windows.get("speed_ms").and_then(RollingWindow::last) else {
            return;
        };
        let cfg = &self.config;
        let accel = (speed - previous).abs() / cfg.sample_interval_secs();
        if accel > cfg.speed_impossible_accel {
            let confidence = (accel / (cfg.speed_impossible_accel * 2.0)).min(1.0);
            found.flag("speed_ms", speed, AnomalyReason::RateOfChange, confidence);
        }
    }

    fn check_cumulative(&mut self, record: &TelemetryRecord, found: &mut Findings) {
        for (field, max_step) in &self.config.cumulative_fields {
            let Some(value) = record.number(field) else {
                continue;
            };
            let Some(previous) = self.last_cumulative.insert(field.clone(), value) else {
                continue;
            };
            if value < previous {
                found.flag(field, value, AnomalyReason::NonMonotonic, 1.0);
            } else if value - previous > *max_step {
                found.flag(
                    field,
                    value,
                    AnomalyReason::ImplausibleIncrease,
                    INCREASE_CONFIDENCE,
                );
            }
        }
    }

    fn check_stuck(&mut self, record: &TelemetryRecord, found: &mut Findings) {
        let stuck_count = self.config.stuck_count.max(1);
        for field in &self.config.rolling_fields {
            let Some(value) = record.number(field) else {
                continue;
            };
            let state = self.stuck.entry(field.clone()).or_default();
            if state.last == Some(value) {
                state.repeats += 1;
            } else {
                state.repeats = 0;
            }
            state.last = Some(value);
            if state.repeats >= stuck_count {
                #[allow(clippy::cast_precision_loss)]
                let confidence = (state.repeats as f64 / (stuck_count as f64 * 2.0)).min(1.0);
                found.flag(field, value, AnomalyReason::StuckSensor, confidence);
            }
        }
    }

    fn push_windows(&mut self, record: &TelemetryRecord) {
        for field in &self.config.rolling_fields {
            if let Some(value) = record.number(field) {
                self.windows
                    .entry(field.clone())
                    .or_insert_with(|| RollingWindow::new(self.config.window_size))
                    .push(value);
            }
        }
    }

    /// Totals since the last reset.
    #[must_use]
    pub const fn stats(&self) -> &QualityStats {
        &self.stats
    }

    /// Thresholds in use.
    #[must_use]
    pub const fn config(&self) -> &QualityConfig {
        &self.config
    }

    /// Forget all history (new session).
    pub fn reset(&mut self) {
        self.windows.clear();
        self.stuck.clear();
        self.last_cumulative.clear();
        self.last_fix = None;
        self.stats = QualityStats::default();
    }
}
