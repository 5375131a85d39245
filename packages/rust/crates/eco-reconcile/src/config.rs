//! Typed engine configuration.

use std::fmt;
use std::str::FromStr;

use eco_merge::{InterpolationConfig, SourcePrecedence};
use eco_quality::QualityConfig;
use serde::{Deserialize, Serialize};

/// Order in which channel history is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryDirection {
    /// Newest first.
    #[default]
    Backwards,
    /// Oldest first.
    Forwards,
}

impl HistoryDirection {
    /// snake_case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Backwards => "backwards",
            Self::Forwards => "forwards",
        }
    }
}

impl fmt::Display for HistoryDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HistoryDirection {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "backwards" | "backward" | "newest_first" => Ok(Self::Backwards),
            "forwards" | "forward" | "oldest_first" => Ok(Self::Forwards),
            other => Err(format!("unknown history direction: {other}")),
        }
    }
}

/// Everything a [`crate::Coordinator`] needs to know.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileConfig {
    /// Window cap.
    pub max_points: usize,
    /// Minimum spacing between non-forced full runs.
    pub min_interval_ms: u64,
    /// Incremental fetches start this far before the watermark.
    pub overlap_ms: i64,
    /// Gap filling bounds.
    pub interpolation: InterpolationConfig,
    /// Persisted-store page size.
    pub page_size: usize,
    /// Persisted-store page limit per fetch.
    pub max_pages: usize,
    /// Channel-history message limit per fetch.
    pub history_limit: usize,
    /// Channel-history read order.
    pub history_direction: HistoryDirection,
    /// Merge precedence, lowest first.
    pub precedence: SourcePrecedence,
    /// Stall and anomaly thresholds.
    pub quality: QualityConfig,
    /// Event bus capacity.
    pub event_capacity: usize,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            max_points: 50_000,
            min_interval_ms: 5_000,
            overlap_ms: 4_000,
            interpolation: InterpolationConfig::default(),
            page_size: 1_000,
            max_pages: 50,
            history_limit: 1_000,
            history_direction: HistoryDirection::Backwards,
            precedence: SourcePrecedence::default(),
            quality: QualityConfig::default(),
            event_capacity: 1_024,
        }
    }
}

impl ReconcileConfig {
    /// Clamp values that would make the engine misbehave.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.max_points = self.max_points.max(1);
        self.page_size = self.page_size.max(1);
        self.max_pages = self.max_pages.max(1);
        self.history_limit = self.history_limit.max(1);
        self.event_capacity = self.event_capacity.max(1);
        self.overlap_ms = self.overlap_ms.max(0);
        self.interpolation.max_gap_ms = self.interpolation.max_gap_ms.max(0);
        if !self.interpolation.gap_threshold_factor.is_finite()
            || self.interpolation.gap_threshold_factor < 1.0
        {
            self.interpolation.gap_threshold_factor = 1.0;
        }
        self
    }
}
