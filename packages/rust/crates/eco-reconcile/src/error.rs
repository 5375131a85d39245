//! Error types for eco-reconcile.

use std::path::PathBuf;

use thiserror::Error;

/// Failure of one source fetch.
///
/// Never fatal to a reconciliation run: the failing source contributes no
/// records and the failure is reported as an event.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// Backend unreachable or the feature is not offered.
    #[error("source unavailable: {0}")]
    Unavailable(String),

    /// Backend did not answer in time.
    #[error("source timed out after {0} ms")]
    Timeout(u64),

    /// Backend answered with something unreadable.
    #[error("failed to decode source payload: {0}")]
    Decode(String),

    /// Anything else.
    #[error("source fetch failed: {0}")]
    Failed(String),
}

impl SourceError {
    /// Transient or environmental failure, as opposed to a bug.
    #[must_use]
    pub const fn is_expected(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout(_))
    }
}

/// Failure to load a settings file strictly.
#[derive(Error, Debug)]
pub enum SettingsError {
    /// File exists but could not be read.
    #[error("failed to read settings file {}: {source}", path.display())]
    Read {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// File is not valid settings YAML.
    #[error("failed to parse settings file {}: {source}", path.display())]
    Parse {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_yaml::Error,
    },
}
