//! Quality findings.

use serde::{Deserialize, Serialize};

/// How loudly a finding should be surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Worth a note.
    Info,
    /// Probably wrong.
    Warning,
    /// Safety-relevant field out of range.
    Critical,
}

impl Severity {
    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

/// Why a value was flagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyReason {
    /// Outside the configured bounds.
    AbsoluteBound,
    /// Far from the rolling mean.
    ZScoreExceeded,
    /// Relative jump away from the rolling mean.
    SuddenJump,
    /// Same reading for too many samples.
    StuckSensor,
    /// Acceleration vector longer than physically plausible.
    MagnitudeExceeded,
    /// Changed faster between two samples than the sensor allows.
    RateOfChange,
    /// Contradicts another sensor (rotation while stationary).
    CrossValidationFailed,
    /// GPS displacement disagrees with the reported speed.
    GpsSpeedMismatch,
    /// GPS displacement implies an impossible speed.
    ImpossibleSpeed,
    /// Altitude changed too fast between two fixes.
    AltitudeRate,
    /// Negative reading of a non-negative quantity.
    NegativeValue,
    /// Cumulative counter went backwards.
    NonMonotonic,
    /// Cumulative counter grew too much in one sample.
    ImplausibleIncrease,
}

impl AnomalyReason {
    /// snake_case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AbsoluteBound => "absolute_bound",
            Self::ZScoreExceeded => "z_score_exceeded",
            Self::SuddenJump => "sudden_jump",
            Self::StuckSensor => "stuck_sensor",
            Self::MagnitudeExceeded => "magnitude_exceeded",
            Self::RateOfChange => "rate_of_change",
            Self::CrossValidationFailed => "cross_validation_failed",
            Self::GpsSpeedMismatch => "gps_speed_mismatch",
            Self::ImpossibleSpeed => "impossible_speed",
            Self::AltitudeRate => "altitude_rate",
            Self::NegativeValue => "negative_value",
            Self::NonMonotonic => "non_monotonic",
            Self::ImplausibleIncrease => "implausible_increase",
        }
    }
}

/// One flagged field on one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    /// Record timestamp.
    pub timestamp_ms: i64,
    /// Field name.
    pub field: String,
    /// Offending value.
    pub value: f64,
    /// Check that fired.
    pub reason: AnomalyReason,
    /// 0..=1.
    pub confidence: f64,
    /// Severity of the whole record; shared by every finding on it.
    pub severity: Severity,
}

/// Anything the quality layer wants surfaced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QualitySignal {
    /// No live record for longer than the stall timeout.
    StreamStalled {
        /// Silence so far.
        silent_for_ms: u64,
    },
    /// Live records are flowing again after a stall.
    StreamResumed {
        /// Length of the silence that ended.
        silent_for_ms: u64,
    },
    /// Sensor value looked wrong.
    Anomaly(Anomaly),
}
