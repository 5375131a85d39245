//! eco-merge - Pure series algorithms for telemetry reconciliation
//!
//! Nothing here does I/O or holds state between calls:
//!
//! - [`merge`] / [`merge_sources`]: deduplicate and order records from any
//!   number of sources under a precedence rule, then cap the length.
//! - [`estimate_interval`]: median sampling interval of a series.
//! - [`interpolate_gaps`]: fill short gaps with marked synthetic points and
//!   report long ones as [`GapEvent`]s.
//! - [`build_series`]: the three steps above as one pass, as used by a
//!   reconciliation run.
//!
//! # Precedence
//!
//! Sources are folded in precedence order; a later source overwrites an
//! earlier one with the same key, except that an interpolated record never
//! overwrites a real one.
//!
//! ```rust
//! use eco_merge::merge;
//! use eco_types::TelemetryRecord;
//!
//! let persisted = vec![TelemetryRecord::new("s", 1000).with_message_id(1).with_field("v", 5.0)];
//! let history = vec![TelemetryRecord::new("s", 1000).with_message_id(1).with_field("v", 9.0)];
//! let merged = merge(&[&persisted, &history], 100);
//! assert_eq!(merged.len(), 1);
//! assert_eq!(merged[0].number("v"), Some(9.0));
//! ```

mod interpolate;
mod interval;
mod merge;
mod series;

pub use interpolate::{GapEvent, InterpolationConfig, InterpolationOutcome, interpolate_gaps};
pub use interval::estimate_interval;
pub use merge::{MergeReport, MergeSource, SourcePrecedence, merge, merge_sources};
pub use series::{SeriesOutcome, build_series};
