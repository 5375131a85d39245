//! Expected sampling interval.

use eco_types::TelemetryRecord;

const MIN_DELTAS: usize = 3;

/// Median positive inter-arrival time in milliseconds.
///
/// Non-positive deltas (duplicates, out-of-order pairs) are ignored. Returns
/// `None` with fewer than three usable deltas. The median keeps a single
/// outage from dragging the estimate up.
#[must_use]
pub fn estimate_interval(records: &[TelemetryRecord]) -> Option<f64> {
    let mut deltas: Vec<i64> = records
        .windows(2)
        .map(|pair| pair[1].timestamp_ms.saturating_sub(pair[0].timestamp_ms))
        .filter(|delta| *delta > 0)
        .collect();
    if deltas.len() < MIN_DELTAS {
        return None;
    }
    deltas.sort_unstable();

    let mid = deltas.len() / 2;
    #[allow(clippy::cast_precision_loss)]
    let median = if deltas.len() % 2 == 0 {
        (deltas[mid - 1] as f64 + deltas[mid] as f64) / 2.0
    } else {
        deltas[mid] as f64
    };
    Some(median)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(ts: &[i64]) -> Vec<TelemetryRecord> {
        ts.iter().map(|t| TelemetryRecord::new("s", *t)).collect()
    }

    #[test]
    fn median_ignores_outage() {
        assert_eq!(estimate_interval(&at(&[0, 200, 400, 600, 5000])), Some(200.0));
    }

    #[test]
    fn even_count_averages_middle_pair() {
        assert_eq!(estimate_interval(&at(&[0, 100, 300, 600, 1000])), Some(250.0));
    }

    #[test]
    fn extreme_spacing_does_not_overflow() {
        let records = at(&[i64::MIN, 0, 1, 2, 3]);
        assert_eq!(estimate_interval(&records), Some(1.0));
        let wide = at(&[i64::MIN, 0, i64::MAX - 2, i64::MAX - 1, i64::MAX]);
        assert!(estimate_interval(&wide).is_some_and(f64::is_finite));
    }

    #[test]
    fn too_few_deltas() {
        assert_eq!(estimate_interval(&at(&[0, 100, 200])), None);
        assert_eq!(estimate_interval(&at(&[0, 0, 0, 100, 200])), None);
        assert_eq!(estimate_interval(&[]), None);
    }
}
