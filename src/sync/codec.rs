//! Typed-value shapes shared by import and export.
//!
//! Parse represents non-scalar values as objects tagged with `__type`:
//!
//! ```json
//! {"__type": "Date", "iso": "2024-03-01T00:00:00.000Z"}
//! {"__type": "File", "name": "a1b2.png", "url": "https://..."}
//! {"__type": "Pointer", "className": "Author", "objectId": "ab12"}
//! ```
//!
//! Decoding a `Date` or `Pointer` shape and encoding it again yields the same
//! JSON (dates at millisecond precision).

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{json, Map, Value};

use crate::model::{FieldKind, FieldValue};

/// Discriminator key of a typed-value shape.
pub const TYPE_KEY: &str = "__type";

/// Timestamp layout Parse uses: UTC with exactly three fractional digits.
const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// A typed-value shape found in a remote object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypedValue<'a> {
    Date { iso: &'a str },
    File { name: &'a str, url: Option<&'a str> },
    Pointer { class_name: &'a str, object_id: &'a str },
    /// Unknown tag, missing tag, or a known tag with missing members.
    Unsupported { detail: String },
}

impl<'a> TypedValue<'a> {
    /// Classify an object value.
    #[must_use]
    pub fn parse(map: &'a Map<String, Value>) -> Self {
        let str_member = |key: &str| map.get(key).and_then(Value::as_str);

        match str_member(TYPE_KEY) {
            Some("Date") => match str_member("iso") {
                Some(iso) => Self::Date { iso },
                None => Self::unsupported("Date without 'iso'"),
            },
            Some("File") => match str_member("name") {
                Some(name) => Self::File {
                    name,
                    url: str_member("url"),
                },
                None => Self::unsupported("File without 'name'"),
            },
            Some("Pointer") => match (str_member("className"), str_member("objectId")) {
                (Some(class_name), Some(object_id)) => Self::Pointer {
                    class_name,
                    object_id,
                },
                _ => Self::unsupported("Pointer without 'className'/'objectId'"),
            },
            Some(tag) => Self::unsupported(&format!("unhandled type '{tag}'")),
            None => Self::unsupported("object without '__type'"),
        }
    }

    fn unsupported(detail: &str) -> Self {
        Self::Unsupported {
            detail: detail.to_string(),
        }
    }
}

/// Format an instant the way Parse does.
#[must_use]
pub fn format_iso(at: &DateTime<Utc>) -> String {
    at.format(ISO_FORMAT).to_string()
}

/// Parse an ISO-8601 timestamp.
///
/// Accepts RFC 3339 with any offset, a naive timestamp (taken as UTC), or a
/// bare `YYYY-MM-DD` date (midnight UTC).
#[must_use]
pub fn parse_iso(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(s) {
        return Some(at.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// `Date` shape for an instant.
#[must_use]
pub fn encode_date_time(at: &DateTime<Utc>) -> Value {
    json!({ "__type": "Date", "iso": format_iso(at) })
}

/// `Date` shape for a calendar date (midnight UTC).
#[must_use]
pub fn encode_date(date: NaiveDate) -> Value {
    json!({ "__type": "Date", "iso": format!("{}T00:00:00.000Z", date.format("%Y-%m-%d")) })
}

/// `File` shape referencing an uploaded file.
#[must_use]
pub fn encode_file(name: &str) -> Value {
    json!({ "__type": "File", "name": name })
}

/// `Pointer` shape.
#[must_use]
pub fn encode_pointer(class_name: &str, object_id: &str) -> Value {
    json!({ "__type": "Pointer", "className": class_name, "objectId": object_id })
}

/// Decode a `Date` shape's timestamp for a field of the given kind.
///
/// `date` fields keep the calendar date; anything else keeps the instant.
#[must_use]
pub fn decode_date(kind: &FieldKind, iso: &str) -> Option<FieldValue> {
    let at = parse_iso(iso)?;
    Some(match kind {
        FieldKind::Date => FieldValue::Date(at.date_naive()),
        _ => FieldValue::DateTime(at),
    })
}

// `i64::MAX as f64` rounds up to 2^63, so the upper bound is exclusive.
const I64_MIN_F64: f64 = -9_223_372_036_854_775_808.0;
const I64_MAX_F64: f64 = 9_223_372_036_854_775_808.0;

/// Coerce a plain (untagged) JSON value to a field's kind.
///
/// Returns `None` when the value does not fit, e.g. a string for an integer
/// field or any plain value for a file field.
#[must_use]
pub fn decode_scalar(kind: &FieldKind, value: &Value) -> Option<FieldValue> {
    match kind {
        FieldKind::Json => Some(FieldValue::Json(value.clone())),
        FieldKind::Text => value.as_str().map(|s| FieldValue::Text(s.to_string())),
        FieldKind::Integer => value
            .as_i64()
            .or_else(|| {
                value
                    .as_f64()
                    .filter(|f| f.fract() == 0.0 && (I64_MIN_F64..I64_MAX_F64).contains(f))
                    .map(|f| f as i64)
            })
            .map(FieldValue::Integer),
        FieldKind::Float => value.as_f64().map(FieldValue::Float),
        FieldKind::Boolean => value.as_bool().map(FieldValue::Boolean),
        FieldKind::Date | FieldKind::DateTime => {
            value.as_str().and_then(|iso| decode_date(kind, iso))
        }
        FieldKind::ForeignKey { .. } | FieldKind::OneToOne { .. } => {
            value.as_str().map(|id| FieldValue::Pointer(id.to_string()))
        }
        FieldKind::File | FieldKind::Image => None,
    }
}

/// Short description of a JSON value for diagnostics.
#[must_use]
pub fn describe(value: &Value) -> String {
    let text = value.to_string();
    if text.len() > 80 {
        let cut = (0..=80).rev().find(|i| text.is_char_boundary(*i)).unwrap_or(0);
        format!("{}...", &text[..cut])
    } else {
        text
    }
}
