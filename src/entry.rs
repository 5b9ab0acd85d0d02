//! The raw field map extracted from one log line.

use crate::error::{Error, Result};
use std::collections::HashMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Type alias for the underlying field storage.
/// All field values are stored as captured, with type conversion on demand.
pub type Fields = HashMap<String, String>;

/// Named captures from one log line.
///
/// Only fields that took part in the match are present. A field missing from
/// the line is absent from the map, never an empty placeholder.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Entry {
    fields: Fields,
}

impl Entry {
    /// Create a new empty entry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new entry from a fields map.
    pub fn from_fields(fields: Fields) -> Self {
        Self { fields }
    }

    /// Get a field value as a string.
    ///
    /// # Arguments
    ///
    /// * `name` - The field name to retrieve
    ///
    /// # Returns
    ///
    /// The captured value, or [`Error::FieldNotFound`] if the field was not
    /// part of the match.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use ngxrow::Entry;
    /// # use std::collections::HashMap;
    /// let mut fields = HashMap::new();
    /// fields.insert("status".to_string(), "200".to_string());
    /// let entry = Entry::from_fields(fields);
    ///
    /// assert_eq!(entry.field("status").unwrap(), "200");
    /// assert!(entry.field("nonexistent").is_err());
    /// ```
    pub fn field(&self, name: &str) -> Result<&str> {
        self.get(name).ok_or_else(|| Error::field_not_found(name))
    }

    /// Get a field value if it was captured.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(|s| s.as_str())
    }

    /// Get a field value unless it is absent or equal to the nil sentinel.
    ///
    /// # Arguments
    ///
    /// * `name` - The field name to retrieve
    /// * `nil` - The sentinel nginx writes for an empty value, usually `-`
    ///
    /// ```rust
    /// # use ngxrow::Entry;
    /// let mut entry = Entry::new();
    /// entry.set_field("remote_user", "-");
    /// entry.set_field("remote_addr", "127.0.0.1");
    ///
    /// assert_eq!(entry.value("remote_user", "-"), None);
    /// assert_eq!(entry.value("remote_addr", "-"), Some("127.0.0.1"));
    /// ```
    pub fn value(&self, name: &str, nil: &str) -> Option<&str> {
        self.get(name).filter(|v| *v != nil)
    }

    /// Check whether a field was captured.
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Get a field value as a float.
    ///
    /// # Arguments
    ///
    /// * `name` - The field name to retrieve and convert
    ///
    /// # Returns
    ///
    /// The field value as an f64, or an error if the field doesn't exist or cannot be parsed.
    pub fn float_field(&self, name: &str) -> Result<f64> {
        let value = self.field(name)?;
        value
            .parse::<f64>()
            .map_err(|e| Error::field_parse_error(name, value, "f64", e))
    }

    /// Get a field value as a 64-bit integer.
    ///
    /// # Arguments
    ///
    /// * `name` - The field name to retrieve and convert
    ///
    /// # Returns
    ///
    /// The field value as an i64, or an error if the field doesn't exist or cannot be parsed.
    pub fn int64_field(&self, name: &str) -> Result<i64> {
        let value = self.field(name)?;
        value
            .parse::<i64>()
            .map_err(|e| Error::field_parse_error(name, value, "i64", e))
    }

    /// Set a field value.
    pub fn set_field(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Get an iterator over all field names and values.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.fields.iter()
    }

    /// Get the number of fields in this entry.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if this entry has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Get a reference to the underlying fields map.
    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    /// Consume the entry, returning the fields map.
    pub fn into_fields(self) -> Fields {
        self.fields
    }
}

impl From<Fields> for Entry {
    fn from(fields: Fields) -> Self {
        Self::from_fields(fields)
    }
}

impl From<Entry> for Fields {
    fn from(entry: Entry) -> Self {
        entry.fields
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Entry {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_accessors() {
        let entry: Entry = [("status", "404"), ("request_time", "0.125"), ("bytes", "abc")]
            .into_iter()
            .collect();

        assert_eq!(entry.int64_field("status").unwrap(), 404);
        assert!((entry.float_field("request_time").unwrap() - 0.125).abs() < f64::EPSILON);
        assert!(matches!(
            entry.int64_field("bytes").unwrap_err(),
            Error::FieldParseError { .. }
        ));
        assert!(matches!(
            entry.int64_field("missing").unwrap_err(),
            Error::FieldNotFound { .. }
        ));
    }

    #[test]
    fn test_value_honours_sentinel() {
        let entry: Entry = [("remote_user", "-"), ("host", "")].into_iter().collect();

        assert_eq!(entry.value("remote_user", "-"), None);
        assert_eq!(entry.get("remote_user"), Some("-"));
        assert_eq!(entry.value("host", "-"), Some(""));
        assert!(entry.contains("host"));
        assert!(!entry.contains("http_host"));
    }
}
