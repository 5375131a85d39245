//! Deduplicating, precedence-aware merge.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use eco_types::{RecordKey, SourceKind, TelemetryRecord, key_of};
use serde::{Deserialize, Serialize};

/// One input batch tagged with its origin.
#[derive(Debug, Clone, Copy)]
pub struct MergeSource<'a> {
    /// Where the batch came from.
    pub kind: SourceKind,
    /// Records in any order.
    pub records: &'a [TelemetryRecord],
}

impl<'a> MergeSource<'a> {
    /// Tag a batch.
    #[must_use]
    pub const fn new(kind: SourceKind, records: &'a [TelemetryRecord]) -> Self {
        Self { kind, records }
    }
}

/// Fold order for [`merge_sources`], lowest precedence first.
///
/// Kinds not listed are folded before every listed kind, in argument order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourcePrecedence(Vec<SourceKind>);

impl SourcePrecedence {
    /// Custom order. Duplicates keep their first position.
    #[must_use]
    pub fn new(order: impl IntoIterator<Item = SourceKind>) -> Self {
        let mut kinds = Vec::new();
        for kind in order {
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        Self(kinds)
    }

    /// Listed kinds, lowest precedence first.
    #[must_use]
    pub fn kinds(&self) -> &[SourceKind] {
        &self.0
    }

    fn rank(&self, kind: SourceKind) -> Option<usize> {
        self.0.iter().position(|k| *k == kind)
    }
}

impl Default for SourcePrecedence {
    fn default() -> Self {
        Self(SourceKind::MERGE_ORDER.to_vec())
    }
}

/// Output of [`merge_sources`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MergeReport {
    /// Deduplicated records in ascending key order.
    pub records: Vec<TelemetryRecord>,
    /// Records per source before deduplication.
    pub per_source: BTreeMap<SourceKind, usize>,
    /// Keys seen more than once and resolved by precedence.
    pub duplicates_resolved: usize,
    /// Interpolated inputs rejected because a real record held the key.
    pub real_kept_over_interpolated: usize,
    /// Oldest records dropped to respect `max_points`.
    pub evicted: usize,
}

/// Merge batches given in precedence order (later slices win).
#[must_use]
pub fn merge(sources: &[&[TelemetryRecord]], max_points: usize) -> Vec<TelemetryRecord> {
    let mut report = MergeReport::default();
    fold(sources.iter().copied(), max_points, &mut report);
    report.records
}

/// Merge tagged batches, ordering them by `precedence` first.
#[must_use]
pub fn merge_sources(
    sources: &[MergeSource<'_>],
    precedence: &SourcePrecedence,
    max_points: usize,
) -> MergeReport {
    let mut ordered: Vec<&MergeSource<'_>> = sources.iter().collect();
    // Stable: equal ranks keep argument order; unlisted kinds go first.
    ordered.sort_by_key(|s| precedence.rank(s.kind).map_or(0, |r| r + 1));

    let mut report = MergeReport::default();
    for source in &ordered {
        *report.per_source.entry(source.kind).or_default() += source.records.len();
    }
    fold(ordered.iter().map(|s| s.records), max_points, &mut report);
    report
}

fn fold<'a>(
    batches: impl Iterator<Item = &'a [TelemetryRecord]>,
    max_points: usize,
    report: &mut MergeReport,
) {
    let mut by_key: BTreeMap<RecordKey, TelemetryRecord> = BTreeMap::new();
    for batch in batches {
        for record in batch {
            match by_key.entry(key_of(record)) {
                Entry::Vacant(slot) => {
                    slot.insert(record.clone());
                }
                Entry::Occupied(mut slot) => {
                    report.duplicates_resolved += 1;
                    if slot.get().is_real() && !record.is_real() {
                        report.real_kept_over_interpolated += 1;
                    } else {
                        slot.insert(record.clone());
                    }
                }
            }
        }
    }

    let mut records: Vec<TelemetryRecord> = by_key.into_values().collect();
    let excess = records.len().saturating_sub(max_points);
    if excess > 0 {
        records.drain(..excess);
    }
    report.evicted = excess;
    report.records = records;
}
