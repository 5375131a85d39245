//! Where a record came from.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseSourceKindError;

/// Origin of a batch of records, used for merge precedence and stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Data already held in the in-memory window.
    Existing,
    /// Paginated persisted store.
    Persisted,
    /// Bounded-retention channel history.
    ChannelHistory,
    /// Live push feed.
    Realtime,
    /// Points synthesized by the interpolator.
    Interpolator,
}

impl SourceKind {
    /// Default merge order: later entries overwrite earlier ones.
    pub const MERGE_ORDER: [Self; 4] = [
        Self::Existing,
        Self::Persisted,
        Self::ChannelHistory,
        Self::Realtime,
    ];

    /// Stable snake_case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Existing => "existing",
            Self::Persisted => "persisted",
            Self::ChannelHistory => "channel_history",
            Self::Realtime => "realtime",
            Self::Interpolator => "interpolator",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = ParseSourceKindError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "existing" | "memory" => Ok(Self::Existing),
            "persisted" | "store" | "database" => Ok(Self::Persisted),
            "channel_history" | "history" => Ok(Self::ChannelHistory),
            "realtime" | "live" => Ok(Self::Realtime),
            "interpolator" => Ok(Self::Interpolator),
            other => Err(ParseSourceKindError(other.to_string())),
        }
    }
}
