//! Merge, estimate, interpolate, trim: one reconciliation pass.

use eco_types::TelemetryRecord;

use crate::interpolate::{GapEvent, InterpolationConfig, interpolate_gaps};
use crate::interval::estimate_interval;
use crate::merge::{MergeReport, MergeSource, SourcePrecedence, merge_sources};

/// Output of [`build_series`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeriesOutcome {
    /// Final series: real and synthetic points, ordered, capped.
    pub records: Vec<TelemetryRecord>,
    /// Merge statistics (records field is left empty).
    pub merge: MergeReport,
    /// Interval used for interpolation, if one could be estimated.
    pub expected_interval_ms: Option<f64>,
    /// Synthetic points present in `records`.
    pub interpolated: usize,
    /// Gaps left unfilled.
    pub gaps: Vec<GapEvent>,
    /// Points dropped from the head after interpolation.
    pub evicted: usize,
}

/// Build a series from tagged sources.
///
/// Interpolated inputs take part in precedence but are stripped after the
/// merge: synthetic points are always recomputed from the real ones.
#[must_use]
pub fn build_series(
    sources: &[MergeSource<'_>],
    precedence: &SourcePrecedence,
    max_points: usize,
    interpolation: &InterpolationConfig,
) -> SeriesOutcome {
    let mut merge = merge_sources(sources, precedence, max_points);
    let real: Vec<TelemetryRecord> = std::mem::take(&mut merge.records)
        .into_iter()
        .filter(TelemetryRecord::is_real)
        .collect();

    let expected_interval_ms = estimate_interval(&real);
    let (mut records, gaps) = match expected_interval_ms {
        Some(interval) => {
            let filled = interpolate_gaps(&real, interval, interpolation);
            (filled.records, filled.gaps)
        }
        None => (real, Vec::new()),
    };

    let excess = records.len().saturating_sub(max_points);
    records.drain(..excess);
    let interpolated = records.iter().filter(|r| r.interpolated).count();

    SeriesOutcome {
        records,
        merge,
        expected_interval_ms,
        interpolated,
        gaps,
        evicted: excess,
    }
}
