//! eco-quality: data-quality signals for a telemetry stream.
//!
//! - [`StallDetector`]: notices when the live feed goes quiet and when it
//!   comes back.
//! - [`AnomalyDetector`]: checks on real records. Electrical bounds, z-score
//!   and jumps; IMU magnitude, gyro rate and a stationary cross-check; GPS
//!   bounds, implied speed and climb rate; speed rate; cumulative counters;
//!   stuck sensors. Severity is decided once per record.
//!
//! Both are plain state machines driven by the caller; neither reads a clock
//! or spawns anything.

mod anomaly;
mod config;
mod rolling;
mod signal;
mod stall;

pub use anomaly::{AnomalyDetector, QualityStats};
pub use config::{FieldBounds, QualityConfig};
pub use rolling::RollingWindow;
pub use signal::{Anomaly, AnomalyReason, QualitySignal, Severity};
pub use stall::StallDetector;
