//! Tolerant JSON normalization for records coming from external fetchers.
//!
//! Sources disagree on spelling (`session_id` vs `sessionId`) and on the
//! timestamp shape (epoch millis, numeric strings, RFC 3339). Everything is
//! folded into a [`TelemetryRecord`] here so the merge path only ever sees
//! one shape. A bad record becomes a [`RecordError`]; it never fails a batch.

use chrono::{DateTime, NaiveDateTime};
use serde_json::{Map, Value};

use crate::error::RecordError;
use crate::record::{FieldValue, TelemetryRecord};

/// Producer's unset-clock sentinel.
const EPOCH_SENTINEL: &str = "1970-01-01";

const NAIVE_FORMATS: [&str; 3] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
];

const CORE_KEYS: [&str; 7] = [
    "timestamp",
    "session_id",
    "sessionId",
    "message_id",
    "messageId",
    "interpolated",
    "outliers",
];

/// Result of normalizing a batch.
#[derive(Debug, Clone, Default)]
pub struct NormalizedBatch {
    /// Records that normalized cleanly, in input order.
    pub records: Vec<TelemetryRecord>,
    /// One entry per rejected input.
    pub dropped: Vec<RecordError>,
}

impl NormalizedBatch {
    /// Number of rejected inputs that had no usable timestamp.
    #[must_use]
    pub fn unkeyable(&self) -> usize {
        self.dropped.iter().filter(|e| e.is_unkeyable()).count()
    }
}

/// Parse a timestamp attribute into epoch milliseconds.
///
/// # Errors
///
/// Returns [`RecordError::InvalidTimestamp`] for negative or non-finite
/// numbers, unparseable strings, dates before 1970, the `1970-01-01`
/// sentinel, and non-scalar values.
pub fn parse_timestamp(value: &Value) -> Result<i64, RecordError> {
    match value {
        Value::Number(number) => {
            if let Some(ms) = number.as_i64() {
                return non_negative(ms, value);
            }
            match number.as_f64() {
                #[allow(clippy::cast_possible_truncation)]
                Some(ms) if ms.is_finite() && ms >= 0.0 => Ok(ms.round() as i64),
                _ => Err(RecordError::InvalidTimestamp(value.to_string())),
            }
        }
        Value::String(raw) => parse_timestamp_str(raw.trim()),
        _ => Err(RecordError::InvalidTimestamp(value.to_string())),
    }
}

fn non_negative(ms: i64, value: &Value) -> Result<i64, RecordError> {
    if ms < 0 {
        Err(RecordError::InvalidTimestamp(value.to_string()))
    } else {
        Ok(ms)
    }
}

fn parse_timestamp_str(raw: &str) -> Result<i64, RecordError> {
    if raw.is_empty() || raw.starts_with(EPOCH_SENTINEL) {
        return Err(RecordError::InvalidTimestamp(raw.to_string()));
    }
    if let Ok(ms) = raw.parse::<i64>() {
        return non_negative(ms, &Value::String(raw.to_string()));
    }
    let invalid = || RecordError::InvalidTimestamp(raw.to_string());
    let ms = match DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => dt.timestamp_millis(),
        Err(_) => NAIVE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .map(|naive| naive.and_utc().timestamp_millis())
            .ok_or_else(invalid)?,
    };
    (ms >= 0).then_some(ms).ok_or_else(invalid)
}

fn parse_message_id(value: &Value) -> Result<Option<u64>, RecordError> {
    let invalid = || RecordError::InvalidMessageId(value.to_string());
    match value {
        Value::Null => Ok(None),
        Value::Number(number) => {
            if let Some(id) = number.as_u64() {
                return Ok(Some(id));
            }
            match number.as_f64() {
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                Some(id) if id.is_finite() && id >= 0.0 && id.fract() == 0.0 => Ok(Some(id as u64)),
                _ => Err(invalid()),
            }
        }
        Value::String(raw) if raw.trim().is_empty() => Ok(None),
        Value::String(raw) => raw.trim().parse::<u64>().map(Some).map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}

fn field_value(value: &Value) -> Option<FieldValue> {
    match value {
        Value::Number(number) => number
            .as_f64()
            .filter(|v| v.is_finite())
            .map(FieldValue::Number),
        Value::Bool(flag) => Some(FieldValue::Bool(*flag)),
        Value::String(text) => Some(FieldValue::Text(text.clone())),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn first<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| object.get(*key))
        .find(|value| !value.is_null())
}

impl TelemetryRecord {
    /// Normalize one raw JSON record.
    ///
    /// # Errors
    ///
    /// Returns a [`RecordError`] describing why the record was rejected.
    pub fn from_json(value: &Value) -> Result<Self, RecordError> {
        let object = value.as_object().ok_or(RecordError::NotAnObject)?;

        let timestamp_ms = object
            .get("timestamp")
            .filter(|v| !v.is_null())
            .ok_or(RecordError::MissingTimestamp)
            .and_then(parse_timestamp)?;

        let session_id = first(object, &["session_id", "sessionId"])
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(RecordError::MissingSession)?;

        let message_id = match first(object, &["message_id", "messageId"]) {
            Some(raw) => parse_message_id(raw)?,
            None => None,
        };

        let interpolated = object
            .get("interpolated")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let fields = object
            .iter()
            .filter(|(key, _)| !CORE_KEYS.contains(&key.as_str()))
            .filter_map(|(key, raw)| field_value(raw).map(|v| (key.clone(), v)))
            .collect();

        Ok(Self {
            timestamp_ms,
            session_id: session_id.to_string(),
            message_id,
            interpolated,
            fields,
        })
    }
}

/// Normalize a whole batch, collecting rejects instead of failing.
#[must_use]
pub fn normalize_records(values: &[Value]) -> NormalizedBatch {
    let mut batch = NormalizedBatch::default();
    for value in values {
        match TelemetryRecord::from_json(value) {
            Ok(mut record) => {
                derive_fields(&mut record);
                batch.records.push(record);
            }
            Err(err) => batch.dropped.push(err),
        }
    }
    batch
}

fn clamp01(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

fn round_to(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (value * scale).round() / scale
}

fn is_unset(record: &TelemetryRecord, name: &str) -> bool {
    record.number(name).is_none_or(|v| v == 0.0)
}

fn is_set(record: &TelemetryRecord, name: &str) -> bool {
    !is_unset(record, name)
}

/// Fill derived sensor fields the producer sometimes leaves out.
///
/// - `power_w = voltage_v * current_a` when both inputs exist and power is
///   absent or zero
/// - `total_acceleration = |(accel_x, accel_y, accel_z)|` when any axis
///   exists and the total is absent or zero
/// - `throttle`/`throttle_pct` and `brake`/`brake_pct` are kept in sync
///   between the 0..1 and percent scales
///
/// Non-finite numbers are replaced with `0.0` first.
pub fn derive_fields(record: &mut TelemetryRecord) {
    for value in record.fields.values_mut() {
        if let FieldValue::Number(n) = value
            && !n.is_finite()
        {
            *n = 0.0;
        }
    }

    if is_unset(record, "power_w")
        && let (Some(voltage), Some(current)) = (record.number("voltage_v"), record.number("current_a"))
    {
        record
            .fields
            .insert("power_w".to_string(), FieldValue::Number(voltage * current));
    }

    let axes = ["accel_x", "accel_y", "accel_z"];
    if is_unset(record, "total_acceleration") && axes.iter().any(|a| record.number(a).is_some()) {
        let total = axes
            .iter()
            .map(|a| record.number(a).unwrap_or(0.0).powi(2))
            .sum::<f64>()
            .sqrt();
        record
            .fields
            .insert("total_acceleration".to_string(), FieldValue::Number(total));
    }

    for (ratio, pct) in [("throttle", "throttle_pct"), ("brake", "brake_pct")] {
        if is_unset(record, pct) && is_set(record, ratio) {
            let value = round_to(clamp01(record.number(ratio).unwrap_or(0.0)) * 100.0, 2);
            record.fields.insert(pct.to_string(), FieldValue::Number(value));
        }
        if is_unset(record, ratio) && is_set(record, pct) {
            let value = round_to(clamp01(record.number(pct).unwrap_or(0.0) / 100.0), 3);
            record.fields.insert(ratio.to_string(), FieldValue::Number(value));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn naive_strings_are_utc() {
        let ms = parse_timestamp(&Value::String("2024-05-01T10:00:00".into()));
        assert_eq!(ms, Ok(1_714_557_600_000));
    }

    #[test]
    fn dates_before_epoch_are_rejected() {
        for raw in ["0001-01-01T00:00:00Z", "1969-12-31T23:59:59Z", "1969-12-31 23:59:59"] {
            assert!(
                matches!(
                    parse_timestamp(&Value::String(raw.into())),
                    Err(RecordError::InvalidTimestamp(_))
                ),
                "{raw}"
            );
        }
    }

    #[test]
    fn rounding_keeps_two_places() {
        assert!((round_to(12.3456, 2) - 12.35).abs() < 1e-9);
    }
}
