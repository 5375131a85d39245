//! Fixed-size rolling statistics.

use std::collections::VecDeque;

/// Last `size` samples of one field. O(1) push, drop oldest when full.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    values: VecDeque<f64>,
    size: usize,
}

impl RollingWindow {
    /// Empty window of at most `size` samples (at least one).
    #[must_use]
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            values: VecDeque::with_capacity(size),
            size,
        }
    }

    /// Add a sample.
    pub fn push(&mut self, value: f64) {
        if self.values.len() == self.size {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    /// Samples held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when nothing has been pushed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Most recent sample.
    #[must_use]
    pub fn last(&self) -> Option<f64> {
        self.values.back().copied()
    }

    /// Arithmetic mean, `0.0` when empty.
    #[must_use]
    pub fn mean(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let n = self.values.len() as f64;
        self.values.iter().sum::<f64>() / n
    }

    /// Population standard deviation, `0.0` below two samples.
    #[must_use]
    pub fn std_dev(&self) -> f64 {
        if self.values.len() < 2 {
            return 0.0;
        }
        let mean = self.mean();
        #[allow(clippy::cast_precision_loss)]
        let n = self.values.len() as f64;
        (self.values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt()
    }

    /// Drop all samples.
    pub fn clear(&mut self) {
        self.values.clear();
    }
}
