//! Short-gap interpolation.

use std::collections::BTreeMap;

use eco_types::{FieldValue, TelemetryRecord};
use serde::{Deserialize, Serialize};

/// Bounds for [`interpolate_gaps`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InterpolationConfig {
    /// A pair is a gap once it exceeds `factor * expected_interval`.
    pub gap_threshold_factor: f64,
    /// Gaps longer than this are outages: reported, never filled.
    pub max_gap_ms: i64,
    /// Cap on synthetic points per gap.
    pub max_points_per_gap: usize,
}

impl Default for InterpolationConfig {
    fn default() -> Self {
        Self {
            gap_threshold_factor: 1.25,
            max_gap_ms: 800,
            max_points_per_gap: 4,
        }
    }
}

/// A gap left unfilled because it exceeded `max_gap_ms`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapEvent {
    /// Session both endpoints belong to.
    pub session_id: String,
    /// Timestamp of the record before the gap.
    pub start_ms: i64,
    /// Timestamp of the record after the gap.
    pub end_ms: i64,
    /// `end_ms - start_ms`.
    pub gap_ms: i64,
    /// Interval the gap was measured against.
    pub expected_interval_ms: f64,
}

/// Output of [`interpolate_gaps`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InterpolationOutcome {
    /// Input records with synthetic points spliced in, still ordered.
    pub records: Vec<TelemetryRecord>,
    /// Number of synthetic points added.
    pub inserted: usize,
    /// Gaps too long to fill.
    pub gaps: Vec<GapEvent>,
}

/// Fill short gaps between consecutive real records.
///
/// For a pair `(a, b)` with `g = b - a`:
/// - `g <= factor * interval`: not a gap
/// - `g > max_gap_ms`: left as is, reported as a [`GapEvent`]
/// - otherwise `n = floor(g / interval) - 1` points (capped) at
///   `a + g * j / (n + 1)`, numeric fields linearly interpolated
///
/// Pairs spanning two sessions, or involving an already interpolated
/// record, are never filled. A non-positive or non-finite interval returns
/// the input unchanged.
#[must_use]
pub fn interpolate_gaps(
    records: &[TelemetryRecord],
    expected_interval_ms: f64,
    config: &InterpolationConfig,
) -> InterpolationOutcome {
    let mut outcome = InterpolationOutcome {
        records: Vec::with_capacity(records.len()),
        ..InterpolationOutcome::default()
    };
    if !expected_interval_ms.is_finite() || expected_interval_ms <= 0.0 {
        outcome.records = records.to_vec();
        return outcome;
    }

    let threshold = expected_interval_ms * config.gap_threshold_factor.max(1.0);
    for (idx, current) in records.iter().enumerate() {
        outcome.records.push(current.clone());
        let Some(next) = records.get(idx + 1) else {
            break;
        };
        if current.session_id != next.session_id || !current.is_real() || !next.is_real() {
            continue;
        }

        let gap = next.timestamp_ms.saturating_sub(current.timestamp_ms);
        #[allow(clippy::cast_precision_loss)]
        let gap_f = gap as f64;
        if gap_f <= threshold {
            continue;
        }
        if gap > config.max_gap_ms {
            outcome.gaps.push(GapEvent {
                session_id: current.session_id.clone(),
                start_ms: current.timestamp_ms,
                end_ms: next.timestamp_ms,
                gap_ms: gap,
                expected_interval_ms,
            });
            continue;
        }

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let slots = ((gap_f / expected_interval_ms).floor() as usize).saturating_sub(1);
        let count = slots.min(config.max_points_per_gap);
        for j in 1..=count {
            if let Some(point) = synthesize(current, next, j, count + 1) {
                outcome.records.push(point);
                outcome.inserted += 1;
            }
        }
    }
    outcome
}

fn synthesize(a: &TelemetryRecord, b: &TelemetryRecord, j: usize, parts: usize) -> Option<TelemetryRecord> {
    let gap = i128::from(b.timestamp_ms) - i128::from(a.timestamp_ms);
    let offset = gap * i128::try_from(j).ok()? / i128::try_from(parts).ok()?;
    let timestamp_ms = i64::try_from(i128::from(a.timestamp_ms) + offset).ok()?;
    if timestamp_ms <= a.timestamp_ms || timestamp_ms >= b.timestamp_ms {
        return None;
    }

    #[allow(clippy::cast_precision_loss)]
    let frac = j as f64 / parts as f64;
    let mut fields = BTreeMap::new();
    for name in a.fields.keys().chain(b.fields.keys()) {
        if fields.contains_key(name) {
            continue;
        }
        let value = match (a.fields.get(name), b.fields.get(name)) {
            (Some(FieldValue::Number(x)), Some(FieldValue::Number(y))) => {
                FieldValue::Number(x + (y - x) * frac)
            }
            (Some(x), Some(y)) => {
                if frac < 0.5 {
                    x.clone()
                } else {
                    y.clone()
                }
            }
            (Some(only), None) | (None, Some(only)) => only.clone(),
            (None, None) => continue,
        };
        fields.insert(name.clone(), value);
    }

    Some(TelemetryRecord {
        timestamp_ms,
        session_id: a.session_id.clone(),
        message_id: None,
        interpolated: true,
        fields,
    })
}
