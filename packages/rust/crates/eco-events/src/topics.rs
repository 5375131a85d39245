//! Event topic constants for type-safe routing.

/// A reconciliation run published a new window.
pub const DATA_READY: &str = "telemetry/data_ready";
/// One page (or batch) of a source fetch arrived.
pub const PROGRESS: &str = "telemetry/progress";
/// A source fetch failed; the run continued without it.
pub const SOURCE_ERROR: &str = "telemetry/source_error";
/// A gap too long to interpolate was left in the series.
pub const GAP_DETECTED: &str = "telemetry/gap_detected";
/// A reconciliation request was rejected by the throttle.
pub const THROTTLED: &str = "telemetry/throttled";
/// The active session changed; the window was reset.
pub const SESSION_CHANGED: &str = "telemetry/session_changed";
/// Records were rejected during normalization.
pub const RECORDS_DROPPED: &str = "telemetry/records_dropped";
/// A live record was folded into the window.
pub const LIVE_APPENDED: &str = "telemetry/live_appended";
/// Stall or anomaly signal.
pub const QUALITY: &str = "telemetry/quality";

/// All topics as a const array for iteration
pub const ALL_TOPICS: &[(&str, &str)] = &[
    ("DATA_READY", DATA_READY),
    ("PROGRESS", PROGRESS),
    ("SOURCE_ERROR", SOURCE_ERROR),
    ("GAP_DETECTED", GAP_DETECTED),
    ("THROTTLED", THROTTLED),
    ("SESSION_CHANGED", SESSION_CHANGED),
    ("RECORDS_DROPPED", RECORDS_DROPPED),
    ("LIVE_APPENDED", LIVE_APPENDED),
    ("QUALITY", QUALITY),
];
