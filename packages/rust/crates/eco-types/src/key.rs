//! Identity key used for deduplication and ordering.

use std::cmp::Ordering;
use std::fmt;

use crate::record::TelemetryRecord;

/// `(timestamp_ms, message_id)` identity of a sample.
///
/// Ordering is by timestamp, then message id ascending, with an absent
/// message id sorting after every present one at the same timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordKey {
    /// Epoch milliseconds.
    pub timestamp_ms: i64,
    /// Producer message id, if any.
    pub message_id: Option<u64>,
}

impl Ord for RecordKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.timestamp_ms
            .cmp(&other.timestamp_ms)
            .then_with(|| match (self.message_id, other.message_id) {
                (Some(a), Some(b)) => a.cmp(&b),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
    }
}

impl PartialOrd for RecordKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.message_id {
            Some(id) => write!(f, "{}::{id}", self.timestamp_ms),
            None => write!(f, "{}::", self.timestamp_ms),
        }
    }
}

/// Compute the identity key of a record. Pure and total.
#[must_use]
pub fn key_of(record: &TelemetryRecord) -> RecordKey {
    RecordKey {
        timestamp_ms: record.timestamp_ms,
        message_id: record.message_id,
    }
}

/// Canonical series order: ascending key.
#[must_use]
pub fn compare_records(a: &TelemetryRecord, b: &TelemetryRecord) -> Ordering {
    key_of(a).cmp(&key_of(b))
}
