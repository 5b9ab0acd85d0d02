//! Conversion of captured strings into typed column values.

use crate::catalog::{Catalog, FieldType};
use crate::entry::Entry;
use crate::error::{Error, Result};
use chrono::{DateTime, FixedOffset};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The value nginx writes for a variable that has no value.
pub const NIL: &str = "-";

/// chrono layout of `$time_local`, e.g. `10/Oct/2024:13:55:36 -0700`.
pub const TIME_LOCAL_FORMAT: &str = "%d/%b/%Y:%H:%M:%S %z";

/// A captured value converted to its column type.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum TypedValue {
    Integer(i64),
    Float(f64),
    Timestamp(DateTime<FixedOffset>),
    String(String),
}

impl TypedValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<FixedOffset>> {
        match self {
            Self::Timestamp(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }
}

/// Parse a `$time_local` value.
pub fn parse_time_local(value: &str) -> Result<DateTime<FixedOffset>> {
    DateTime::parse_from_str(value, TIME_LOCAL_FORMAT)
        .map_err(|e| Error::invalid_timestamp("time_local", value, e))
}

/// Parse a `$time_iso8601` value (RFC 3339).
pub fn parse_time_iso8601(value: &str) -> Result<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(value)
        .map_err(|e| Error::invalid_timestamp("time_iso8601", value, e))
}

/// Convert a raw value to the column type of `name`.
///
/// A value equal to `nil` means the field is absent and yields `Ok(None)`,
/// whatever its type. Any other value that does not parse is an error.
///
/// ```rust
/// use ngxrow::typed::{type_field, TypedValue};
///
/// assert_eq!(type_field("status", "404", "-").unwrap(), Some(TypedValue::Integer(404)));
/// assert_eq!(type_field("status", "-", "-").unwrap(), None);
/// assert!(type_field("status", "abc", "-").is_err());
/// ```
pub fn type_field(name: &str, raw: &str, nil: &str) -> Result<Option<TypedValue>> {
    if raw == nil {
        return Ok(None);
    }
    type_field_as(name, raw, Catalog::global().field_type(name)).map(Some)
}

/// Convert a raw value to an explicit column type.
pub fn type_field_as(name: &str, raw: &str, field_type: FieldType) -> Result<TypedValue> {
    match field_type {
        FieldType::String => Ok(TypedValue::String(raw.to_string())),
        FieldType::Integer => raw
            .parse::<i64>()
            .map(TypedValue::Integer)
            .map_err(|e| Error::field_parse_error(name, raw, "integer", e)),
        FieldType::Float => raw
            .parse::<f64>()
            .map(TypedValue::Float)
            .map_err(|e| Error::field_parse_error(name, raw, "float", e)),
        FieldType::Timestamp => {
            let parsed = if name == "time_local" {
                DateTime::parse_from_str(raw, TIME_LOCAL_FORMAT)
            } else {
                DateTime::parse_from_rfc3339(raw)
            };
            parsed
                .map(TypedValue::Timestamp)
                .map_err(|e| Error::invalid_timestamp(name, raw, e))
        }
    }
}

/// Which field a canonical timestamp was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampSource {
    TimeLocal,
    TimeIso8601,
}

/// Determine the row timestamp.
///
/// `time_local` is preferred, then `time_iso8601`. When neither parses the
/// error names the first present field; a row with neither is
/// [`Error::MissingTimestamp`].
pub fn canonical_timestamp(
    entry: &Entry,
    nil: &str,
) -> Result<(DateTime<FixedOffset>, TimestampSource)> {
    let local = entry
        .value("time_local", nil)
        .map(|v| parse_time_local(v).map(|t| (t, TimestampSource::TimeLocal)));
    let iso = entry
        .value("time_iso8601", nil)
        .map(|v| parse_time_iso8601(v).map(|t| (t, TimestampSource::TimeIso8601)));

    match (local, iso) {
        (Some(Ok(found)), _) | (_, Some(Ok(found))) => Ok(found),
        (Some(Err(e)), _) | (None, Some(Err(e))) => Err(e),
        (None, None) => Err(Error::MissingTimestamp),
    }
}
