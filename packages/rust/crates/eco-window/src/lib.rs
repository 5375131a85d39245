//! eco-window: bounded per-session telemetry window.
//!
//! A sorted, deduplicated ring of records capped at `max_points`. The live
//! path inserts by binary search so a single record never costs a full sort;
//! consumers read immutable [`WindowSnapshot`]s and never touch the ring.

mod snapshot;
mod window;

pub use snapshot::WindowSnapshot;
pub use window::{AppendAction, AppendOutcome, MergeWindow};
