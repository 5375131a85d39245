//! Error types for record normalization.
//!
//! Library crates use `thiserror` for explicit error enums.

use thiserror::Error;

/// Reasons a raw record cannot become a [`crate::TelemetryRecord`].
///
/// None of these abort a batch: callers count them and move on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    /// Payload is not a JSON object.
    #[error("record is not a JSON object")]
    NotAnObject,

    /// No `timestamp` attribute; the record cannot be keyed.
    #[error("record has no timestamp")]
    MissingTimestamp,

    /// `timestamp` is present but unusable.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// No `session_id` attribute, or an empty one.
    #[error("record has no session id")]
    MissingSession,

    /// `message_id` is present but not a non-negative integer.
    #[error("invalid message id: {0}")]
    InvalidMessageId(String),
}

impl RecordError {
    /// Short machine-readable reason, used as a counter label.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::NotAnObject => "not_an_object",
            Self::MissingTimestamp => "missing_timestamp",
            Self::InvalidTimestamp(_) => "invalid_timestamp",
            Self::MissingSession => "missing_session",
            Self::InvalidMessageId(_) => "invalid_message_id",
        }
    }

    /// True for failures that make the record impossible to key.
    #[must_use]
    pub const fn is_unkeyable(&self) -> bool {
        matches!(self, Self::MissingTimestamp | Self::InvalidTimestamp(_))
    }
}

/// Unknown source name in settings or CLI input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown source kind: {0}")]
pub struct ParseSourceKindError(pub String);
