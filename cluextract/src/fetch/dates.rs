//! Date attribute normalization.
//!
//! Feature services send dates as milliseconds since the Unix epoch. Output
//! stores them as calendar dates in UTC, formatted with a strftime pattern.

use std::fmt;

use chrono::format::{Item, StrftimeItems};
use chrono::DateTime;
use serde_json::Value;

/// Default output date pattern (`01/31/2021`).
pub const DEFAULT_DATE_FORMAT: &str = "%m/%d/%Y";

/// A validated strftime pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateFormat(String);

impl DateFormat {
    /// Validates `pattern`.
    pub fn new(pattern: impl Into<String>) -> Result<Self, String> {
        let pattern = pattern.into();
        if StrftimeItems::new(&pattern).any(|item| matches!(item, Item::Error)) {
            return Err(format!("invalid date format '{}'", pattern));
        }
        Ok(Self(pattern))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Formats an epoch-milliseconds attribute value.
    ///
    /// Nulls, `"null"` and empty strings become JSON null. Numeric strings
    /// are accepted. Anything else that is not a timestamp is passed through
    /// unchanged.
    pub fn normalize(&self, value: &Value) -> Value {
        let millis = match value {
            Value::Null => return Value::Null,
            Value::Number(n) => n.as_f64(),
            Value::String(s) => {
                let s = s.trim();
                if s.is_empty() || s.eq_ignore_ascii_case("null") {
                    return Value::Null;
                }
                s.parse::<f64>().ok()
            }
            _ => None,
        };

        millis
            .filter(|m| m.is_finite())
            .and_then(|m| DateTime::from_timestamp_millis(m as i64))
            .map(|date| Value::String(date.format(&self.0).to_string()))
            .unwrap_or_else(|| value.clone())
    }
}

impl Default for DateFormat {
    fn default() -> Self {
        Self(DEFAULT_DATE_FORMAT.to_string())
    }
}

impl fmt::Display for DateFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_epoch_millis_formatted_in_utc() {
        let format = DateFormat::default();
        assert_eq!(format.normalize(&json!(1609459200000i64)), json!("01/01/2021"));
        // 23:30 UTC stays on the same calendar day.
        assert_eq!(format.normalize(&json!(1609543800000i64)), json!("01/01/2021"));
    }

    #[test]
    fn test_null_like_values() {
        let format = DateFormat::default();
        assert_eq!(format.normalize(&Value::Null), Value::Null);
        assert_eq!(format.normalize(&json!("null")), Value::Null);
        assert_eq!(format.normalize(&json!("Null")), Value::Null);
        assert_eq!(format.normalize(&json!("")), Value::Null);
    }

    #[test]
    fn test_numeric_string_and_float() {
        let format = DateFormat::default();
        assert_eq!(format.normalize(&json!("1609459200000")), json!("01/01/2021"));
        assert_eq!(format.normalize(&json!(1609459200000.0)), json!("01/01/2021"));
    }

    #[test]
    fn test_unparseable_value_passes_through() {
        let format = DateFormat::default();
        assert_eq!(format.normalize(&json!("yesterday")), json!("yesterday"));
    }

    #[test]
    fn test_custom_format() {
        let format = DateFormat::new("%Y-%m-%d").unwrap();
        assert_eq!(format.normalize(&json!(1609459200000i64)), json!("2021-01-01"));
    }

    #[test]
    fn test_invalid_format_rejected() {
        assert!(DateFormat::new("%Y %").is_err());
    }
}
