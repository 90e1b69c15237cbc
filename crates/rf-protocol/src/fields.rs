//! Flat string field-value lists.
//!
//! Both IPC payloads and stored table entries are lists of `(field, value)`
//! string pairs. An absent field and an empty value both mean "unset".

use crate::error::FieldError;
use rf_types::{parse_id, MacAddress};
use std::str::FromStr;

/// Key-value tuple representing a field and its value.
pub type FieldValue = (String, String);

/// Collection of field-value pairs for a message or table entry.
pub type FieldValues = Vec<FieldValue>;

/// Helper trait for reading typed values out of a field-value list.
pub trait FieldValuesExt {
    /// Gets the raw value for a field, if present.
    fn get_field(&self, field: &str) -> Option<&str>;

    /// Checks if a field exists.
    fn has_field(&self, field: &str) -> bool;

    /// Returns the value of a field that must be present and non-empty.
    fn require(&self, field: &str) -> Result<&str, FieldError> {
        match self.get_field(field) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(FieldError::missing(field)),
        }
    }

    /// Reads a required numeric field (decimal or `0x` hex).
    fn require_num<T: TryFrom<u64>>(&self, field: &str) -> Result<T, FieldError> {
        let raw = self.require(field)?;
        parse_num(field, raw)
    }

    /// Reads a required MAC address field.
    fn require_mac(&self, field: &str) -> Result<MacAddress, FieldError> {
        let raw = self.require(field)?;
        raw.parse().map_err(|_| FieldError::invalid(field, raw))
    }

    /// Reads an optional numeric field; absent and empty both yield `None`.
    fn optional_num<T: TryFrom<u64>>(&self, field: &str) -> Result<Option<T>, FieldError> {
        match self.get_field(field) {
            None | Some("") => Ok(None),
            Some(raw) => parse_num(field, raw).map(Some),
        }
    }

    /// Reads an optional field with any `FromStr` type.
    fn optional_parse<T: FromStr>(&self, field: &str) -> Result<Option<T>, FieldError> {
        match self.get_field(field) {
            None | Some("") => Ok(None),
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|_| FieldError::invalid(field, raw)),
        }
    }
}

impl FieldValuesExt for FieldValues {
    fn get_field(&self, field: &str) -> Option<&str> {
        self.iter()
            .find(|(f, _)| f == field)
            .map(|(_, v)| v.as_str())
    }

    fn has_field(&self, field: &str) -> bool {
        self.iter().any(|(f, _)| f == field)
    }
}

fn parse_num<T: TryFrom<u64>>(field: &str, raw: &str) -> Result<T, FieldError> {
    parse_id(raw)
        .ok()
        .and_then(|n| T::try_from(n).ok())
        .ok_or_else(|| FieldError::invalid(field, raw))
}

/// Builds a FieldValues collection from key-value pairs.
#[macro_export]
macro_rules! field_values {
    ($($field:expr => $value:expr),* $(,)?) => {
        vec![
            $(($field.to_string(), $value.to_string()),)*
        ]
    };
}
