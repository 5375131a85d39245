//! Detector thresholds.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Inclusive range of plausible values for one field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldBounds {
    /// Lowest plausible value.
    pub min: f64,
    /// Highest plausible value.
    pub max: f64,
}

impl FieldBounds {
    /// Build a range.
    #[must_use]
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// True when `value` lies inside the range.
    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Thresholds for [`crate::AnomalyDetector`] and [`crate::StallDetector`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Rolling window length per field.
    pub window_size: usize,
    /// |z| above this flags a statistical outlier.
    pub z_score_threshold: f64,
    /// Samples required before z-scores are trusted.
    pub min_samples: usize,
    /// Identical consecutive readings before a sensor counts as stuck.
    pub stuck_count: usize,
    /// Live silence before the stream counts as stalled.
    pub stall_timeout_ms: u64,
    /// Nominal spacing of live samples, used for per-sample rates.
    pub sample_interval_ms: u64,
    /// Absolute bounds per field.
    pub bounds: BTreeMap<String, FieldBounds>,
    /// Fields that can never be negative.
    pub non_negative_fields: Vec<String>,
    /// Fields tracked with rolling statistics.
    pub rolling_fields: Vec<String>,
    /// Fields checked for jumps away from their rolling mean.
    pub jump_fields: Vec<String>,
    /// Relative distance from the rolling mean that counts as a jump.
    pub electrical_jump_pct: f64,
    /// Ceiling for `|(accel_x, accel_y, accel_z)|`.
    pub accel_magnitude_max: f64,
    /// Largest plausible gyro change between two samples.
    pub gyro_rate_max: f64,
    /// Below this speed the vehicle counts as stationary.
    pub stationary_speed_ms: f64,
    /// Gyro magnitude that contradicts a stationary vehicle.
    pub stationary_gyro_max: f64,
    /// GPS distance over `speed * interval` above this is a mismatch.
    pub gps_speed_distance_ratio: f64,
    /// GPS-implied speed (m/s) that cannot be real.
    pub gps_impossible_speed: f64,
    /// Largest plausible altitude change between two fixes (m).
    pub altitude_rate_max: f64,
    /// Largest plausible speed change rate (m/s²).
    pub speed_impossible_accel: f64,
    /// Counters that must never decrease, with the largest plausible
    /// increase between two samples.
    pub cumulative_fields: BTreeMap<String, f64>,
    /// A finding on any of these makes the whole record critical.
    pub critical_fields: Vec<String>,
}

impl QualityConfig {
    /// Sample interval in seconds, never zero.
    #[must_use]
    pub fn sample_interval_secs(&self) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let secs = self.sample_interval_ms.max(1) as f64 / 1_000.0;
        secs
    }
}

impl Default for QualityConfig {
    fn default() -> Self {
        let bounds = [
            ("voltage_v", FieldBounds::new(35.0, 60.0)),
            ("current_a", FieldBounds::new(-10.0, 35.0)),
            ("power_w", FieldBounds::new(-500.0, 2500.0)),
            ("speed_ms", FieldBounds::new(0.0, 50.0)),
            ("altitude", FieldBounds::new(-500.0, 10_000.0)),
            ("latitude", FieldBounds::new(-90.0, 90.0)),
            ("longitude", FieldBounds::new(-180.0, 180.0)),
        ]
        .into_iter()
        .map(|(name, range)| (name.to_string(), range))
        .collect();

        Self {
            window_size: 50,
            z_score_threshold: 5.0,
            min_samples: 10,
            stuck_count: 15,
            stall_timeout_ms: 5_000,
            sample_interval_ms: 200,
            bounds,
            non_negative_fields: strings(&["speed_ms"]),
            rolling_fields: strings(&[
                "voltage_v", "current_a", "power_w", "gyro_x", "gyro_y", "gyro_z", "accel_x",
                "accel_y", "accel_z", "speed_ms",
            ]),
            jump_fields: strings(&["voltage_v"]),
            electrical_jump_pct: 0.5,
            accel_magnitude_max: 80.0,
            gyro_rate_max: 1_000.0,
            stationary_speed_ms: 0.5,
            stationary_gyro_max: 10.0,
            gps_speed_distance_ratio: 20.0,
            gps_impossible_speed: 500.0,
            altitude_rate_max: 50.0,
            speed_impossible_accel: 50.0,
            cumulative_fields: [("energy_j", 50_000.0), ("distance_m", 100.0)]
                .into_iter()
                .map(|(name, step)| (name.to_string(), step))
                .collect(),
            critical_fields: strings(&["voltage_v", "current_a", "power_w"]),
        }
    }
}

fn strings(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| (*s).to_string()).collect()
}
