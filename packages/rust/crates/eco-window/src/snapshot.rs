//! Immutable, cheaply clonable view of a window.

use std::ops::Deref;
use std::sync::Arc;

use eco_types::TelemetryRecord;
use serde::{Serialize, Serializer};

/// Read-only copy of a window at one point in time.
///
/// Cloning shares the underlying buffer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WindowSnapshot {
    records: Arc<[TelemetryRecord]>,
}

impl WindowSnapshot {
    /// Wrap an already ordered record list.
    #[must_use]
    pub fn new(records: Vec<TelemetryRecord>) -> Self {
        Self {
            records: records.into(),
        }
    }

    /// Records in ascending key order.
    #[must_use]
    pub fn records(&self) -> &[TelemetryRecord] {
        &self.records
    }

    /// Timestamp of the newest record.
    #[must_use]
    pub fn last_timestamp(&self) -> Option<i64> {
        self.records.last().map(|r| r.timestamp_ms)
    }

    /// Number of synthesized points.
    #[must_use]
    pub fn interpolated_count(&self) -> usize {
        self.records.iter().filter(|r| r.interpolated).count()
    }

    /// True when both snapshots share the same buffer.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.records, &other.records)
    }
}

impl Deref for WindowSnapshot {
    type Target = [TelemetryRecord];

    fn deref(&self) -> &Self::Target {
        &self.records
    }
}

impl Serialize for WindowSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.records.iter())
    }
}
