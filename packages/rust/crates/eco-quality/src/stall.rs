//! Live-feed stall detection.

use crate::QualitySignal;

/// Tracks live arrivals on a caller-supplied monotonic millisecond clock.
///
/// A stall is reported once; the next arrival reports the resume.
#[derive(Debug, Clone)]
pub struct StallDetector {
    timeout_ms: u64,
    last_arrival_ms: Option<u64>,
    stalled: bool,
}

impl StallDetector {
    /// Detector that fires after `timeout_ms` of silence.
    #[must_use]
    pub const fn new(timeout_ms: u64) -> Self {
        Self {
            timeout_ms,
            last_arrival_ms: None,
            stalled: false,
        }
    }

    /// Note a live arrival at `now_ms`.
    pub fn record_arrival(&mut self, now_ms: u64) -> Option<QualitySignal> {
        let previous = self.last_arrival_ms.replace(now_ms);
        if !std::mem::take(&mut self.stalled) {
            return None;
        }
        Some(QualitySignal::StreamResumed {
            silent_for_ms: previous.map_or(0, |last| now_ms.saturating_sub(last)),
        })
    }

    /// Report a stall if the feed has been silent too long.
    ///
    /// Nothing is reported before the first arrival.
    pub fn check(&mut self, now_ms: u64) -> Option<QualitySignal> {
        let last = self.last_arrival_ms?;
        let silent_for_ms = now_ms.saturating_sub(last);
        if self.stalled || silent_for_ms <= self.timeout_ms {
            return None;
        }
        self.stalled = true;
        Some(QualitySignal::StreamStalled { silent_for_ms })
    }

    /// True while a reported stall has not yet resumed.
    #[must_use]
    pub const fn is_stalled(&self) -> bool {
        self.stalled
    }

    /// Forget all arrivals (new session).
    pub fn reset(&mut self) {
        self.last_arrival_ms = None;
        self.stalled = false;
    }
}
