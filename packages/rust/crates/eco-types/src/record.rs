//! The canonical telemetry record.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::key::{RecordKey, key_of};

/// One sensor field value.
///
/// Numbers are the interpolatable case; text and flags are carried through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Numeric reading.
    Number(f64),
    /// Boolean flag.
    Bool(bool),
    /// Free-form text (e.g. `data_source`).
    Text(String),
}

impl FieldValue {
    /// Numeric value, if this is a number.
    #[must_use]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            _ => None,
        }
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for FieldValue {
    #[allow(clippy::cast_precision_loss)]
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// A single telemetry sample.
///
/// The core attributes are typed; sensor readings live in the open `fields`
/// map so interpolation stays generic. Serialized flat:
/// `{"timestamp": 1000, "session_id": "s", "message_id": 1, "speed_ms": 4.2}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    /// Epoch milliseconds.
    #[serde(rename = "timestamp")]
    pub timestamp_ms: i64,
    /// Recording session this sample belongs to.
    pub session_id: String,
    /// Producer-assigned sequence number, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<u64>,
    /// True only for points synthesized by the interpolator.
    #[serde(default, skip_serializing_if = "is_false")]
    pub interpolated: bool,
    /// Sensor readings keyed by field name.
    #[serde(flatten)]
    pub fields: BTreeMap<String, FieldValue>,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_false(value: &bool) -> bool {
    !*value
}

impl TelemetryRecord {
    /// Build a real record with no sensor fields.
    pub fn new(session_id: impl Into<String>, timestamp_ms: i64) -> Self {
        Self {
            timestamp_ms,
            session_id: session_id.into(),
            message_id: None,
            interpolated: false,
            fields: BTreeMap::new(),
        }
    }

    /// Attach a producer message id.
    #[must_use]
    pub fn with_message_id(mut self, message_id: u64) -> Self {
        self.message_id = Some(message_id);
        self
    }

    /// Attach one sensor field.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Mark the record as synthesized.
    #[must_use]
    pub fn into_interpolated(mut self) -> Self {
        self.interpolated = true;
        self
    }

    /// Numeric field lookup.
    #[must_use]
    pub fn number(&self, name: &str) -> Option<f64> {
        self.fields.get(name).and_then(FieldValue::as_f64)
    }

    /// Identity key of this record.
    #[must_use]
    pub fn key(&self) -> RecordKey {
        key_of(self)
    }

    /// True for producer data, false for synthesized points.
    #[must_use]
    pub const fn is_real(&self) -> bool {
        !self.interpolated
    }
}
