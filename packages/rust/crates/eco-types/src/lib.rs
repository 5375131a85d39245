//! eco-types - Canonical telemetry types for the Eco-Telemetry engine
//!
//! This crate provides the record model shared by every other crate:
//! the flat [`TelemetryRecord`], its identity [`RecordKey`], the
//! [`SourceKind`] tags used for merge precedence, and the tolerant JSON
//! normalization applied to records coming from external fetchers.
//!
//! # Identity
//!
//! Two records describe the same sample when their [`RecordKey`]s are equal.
//! The key is `(timestamp_ms, message_id)` and renders as `"<ts>::<id>"`,
//! with an empty id part when the producer did not assign one.
//!
//! ```rust
//! use eco_types::{TelemetryRecord, key_of};
//!
//! let record = TelemetryRecord::new("run-1", 1_000).with_message_id(7);
//! assert_eq!(key_of(&record).to_string(), "1000::7");
//! ```

#![allow(clippy::doc_markdown)]

// ============================================================================
// Module Declarations
// ============================================================================

mod error;
mod key;
mod normalize;
mod record;
mod source;

// ============================================================================
// Public Re-exports
// ============================================================================

pub use error::{ParseSourceKindError, RecordError};
pub use key::{RecordKey, compare_records, key_of};
pub use normalize::{NormalizedBatch, derive_fields, normalize_records, parse_timestamp};
pub use record::{FieldValue, TelemetryRecord};
pub use source::SourceKind;
