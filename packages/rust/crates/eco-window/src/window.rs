//! Merge window: bounded, key-ordered ring of telemetry records.

use std::cmp::Ordering;
use std::collections::VecDeque;
use std::sync::OnceLock;

use eco_types::{RecordKey, TelemetryRecord, compare_records, key_of};

use crate::WindowSnapshot;

/// What the live path did with a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendAction {
    /// New key, inserted in order.
    Inserted,
    /// Existing key, entry overwritten.
    Replaced,
    /// Interpolated record that would have shadowed a real one.
    Ignored,
}

/// Result of [`MergeWindow::append_live`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendOutcome {
    /// Insert / replace / ignore.
    pub action: AppendAction,
    /// Record landed before the tail (late arrival).
    pub out_of_order: bool,
    /// Records dropped from the head to respect the cap.
    pub evicted: usize,
}

/// Bounded window of records, strictly ascending by [`RecordKey`].
///
/// No two entries share a key. When the cap is exceeded the oldest entries
/// are evicted; eviction never reorders what remains.
#[derive(Debug)]
pub struct MergeWindow {
    ring: VecDeque<TelemetryRecord>,
    max_points: usize,
    snapshot: OnceLock<WindowSnapshot>,
}

impl MergeWindow {
    /// Empty window holding at most `max_points` records (at least one).
    #[must_use]
    pub fn new(max_points: usize) -> Self {
        let max_points = max_points.max(1);
        Self {
            ring: VecDeque::with_capacity(max_points.min(4096)),
            max_points,
            snapshot: OnceLock::new(),
        }
    }

    /// Fold one live record into the window.
    ///
    /// Real records overwrite any entry with the same key (last write wins);
    /// an interpolated record never overwrites a real one. The insert point
    /// is found by binary search, so in-order arrivals cost O(log n) plus
    /// the push.
    pub fn append_live(&mut self, record: TelemetryRecord) -> AppendOutcome {
        let key = key_of(&record);
        let outcome = match self.position(&key) {
            Ok(idx) => {
                if self.ring[idx].is_real() && !record.is_real() {
                    return AppendOutcome {
                        action: AppendAction::Ignored,
                        out_of_order: false,
                        evicted: 0,
                    };
                }
                self.ring[idx] = record;
                AppendOutcome {
                    action: AppendAction::Replaced,
                    out_of_order: idx + 1 < self.ring.len(),
                    evicted: 0,
                }
            }
            Err(idx) => {
                let out_of_order = idx < self.ring.len();
                if out_of_order {
                    self.ring.insert(idx, record);
                } else {
                    self.ring.push_back(record);
                }
                AppendOutcome {
                    action: AppendAction::Inserted,
                    out_of_order,
                    evicted: self.trim(),
                }
            }
        };
        self.invalidate();
        outcome
    }

    /// Replace the whole window with `records`. Returns the evicted count.
    ///
    /// Input is normally merge output and already ordered; anything else is
    /// sorted and deduplicated (last entry per key wins) first.
    pub fn replace(&mut self, mut records: Vec<TelemetryRecord>) -> usize {
        let ordered = records
            .windows(2)
            .all(|pair| compare_records(&pair[0], &pair[1]) == Ordering::Less);
        if !ordered {
            records.sort_by(compare_records);
            let mut deduped: Vec<TelemetryRecord> = Vec::with_capacity(records.len());
            for record in records {
                match deduped.last_mut() {
                    Some(last) if key_of(last) == key_of(&record) => {
                        if record.is_real() || !last.is_real() {
                            *last = record;
                        }
                    }
                    _ => deduped.push(record),
                }
            }
            records = deduped;
        }
        self.ring = records.into();
        let evicted = self.trim();
        self.invalidate();
        evicted
    }

    /// Drop every record.
    pub fn clear(&mut self) {
        self.ring.clear();
        self.invalidate();
    }

    /// Watermark: timestamp of the newest record.
    #[must_use]
    pub fn last_timestamp(&self) -> Option<i64> {
        self.ring.back().map(|r| r.timestamp_ms)
    }

    /// Copies of the non-interpolated records, in order.
    #[must_use]
    pub fn real_records(&self) -> Vec<TelemetryRecord> {
        self.ring.iter().filter(|r| r.is_real()).cloned().collect()
    }

    /// Immutable view, shared until the next mutation.
    #[must_use]
    pub fn snapshot(&self) -> WindowSnapshot {
        self.snapshot
            .get_or_init(|| WindowSnapshot::new(self.ring.iter().cloned().collect()))
            .clone()
    }

    /// Look up a record by key.
    #[must_use]
    pub fn get(&self, key: &RecordKey) -> Option<&TelemetryRecord> {
        self.position(key).ok().map(|idx| &self.ring[idx])
    }

    /// Records in order.
    pub fn iter(&self) -> impl Iterator<Item = &TelemetryRecord> {
        self.ring.iter()
    }

    /// Number of records held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// True when the window holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Configured cap.
    #[must_use]
    pub const fn max_points(&self) -> usize {
        self.max_points
    }

    fn position(&self, key: &RecordKey) -> Result<usize, usize> {
        // Fast path: most live records land at the tail.
        match self.ring.back().map(|last| key_of(last).cmp(key)) {
            None | Some(Ordering::Less) => Err(self.ring.len()),
            Some(Ordering::Equal) => Ok(self.ring.len() - 1),
            Some(Ordering::Greater) => self.ring.binary_search_by(|slot| key_of(slot).cmp(key)),
        }
    }

    fn trim(&mut self) -> usize {
        let excess = self.ring.len().saturating_sub(self.max_points);
        self.ring.drain(..excess);
        excess
    }

    fn invalidate(&mut self) {
        self.snapshot = OnceLock::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tail_lookup_matches_binary_search() {
        let mut w = MergeWindow::new(10);
        for ts in [10, 20, 30] {
            w.append_live(TelemetryRecord::new("s", ts));
        }
        let key = key_of(&TelemetryRecord::new("s", 30));
        assert_eq!(w.position(&key), Ok(2));
        let key = key_of(&TelemetryRecord::new("s", 15));
        assert_eq!(w.position(&key), Err(1));
    }
}
