//! Values carried by source and target records

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// ISO-8601 layout used when rendering dates.
pub const ISO_DATE: &str = "%Y-%m-%d";

/// ISO-8601 layout used when rendering timestamps.
pub const ISO_DATE_TIME: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// A single cell value in a record
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Absent or null value
    #[default]
    Null,

    /// String value
    String(String),

    /// Integer value
    Integer(i64),

    /// Exact decimal value (amounts, prices)
    Decimal(Decimal),

    /// Boolean value
    Boolean(bool),

    /// Calendar date
    Date(NaiveDate),

    /// Date and time without zone
    DateTime(NaiveDateTime),
}

impl Value {
    /// Convert value to string, `None` for null
    #[must_use]
    pub fn as_string(&self) -> Option<String> {
        match self {
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    /// Borrow the inner string if this is a string value
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Check if value is null
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short name of the variant, used in error messages
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::String(_) => "string",
            Value::Integer(_) => "integer",
            Value::Decimal(_) => "decimal",
            Value::Boolean(_) => "boolean",
            Value::Date(_) => "date",
            Value::DateTime(_) => "datetime",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::String(s) => f.write_str(s),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Decimal(d) => write!(f, "{d}"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Date(d) => write!(f, "{}", d.format(ISO_DATE)),
            Value::DateTime(dt) => write!(f, "{}", dt.format(ISO_DATE_TIME)),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::String(s) => serializer.serialize_str(s),
            Value::Integer(i) => serializer.serialize_i64(*i),
            // Keeps the decimal's scale ("25.00") instead of going through f64.
            Value::Decimal(d) => serde_json::Number::from_str(&d.to_string())
                .map_err(serde::ser::Error::custom)?
                .serialize(serializer),
            Value::Boolean(b) => serializer.serialize_bool(*b),
            Value::Date(_) | Value::DateTime(_) => serializer.collect_str(self),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(i64::from(value))
    }
}

impl From<Decimal> for Value {
    fn from(value: Decimal) -> Self {
        Value::Decimal(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self {
        Value::Date(value)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Value::DateTime(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_display_renders_iso_dates() {
        assert_eq!(Value::Date(date(2024, 3, 15)).to_string(), "2024-03-15");
        let dt = date(2024, 3, 15).and_hms_opt(8, 30, 0).unwrap();
        assert_eq!(Value::DateTime(dt).to_string(), "2024-03-15T08:30:00");
    }

    #[test]
    fn test_display_keeps_decimal_scale() {
        let amount = Decimal::new(2500, 2);
        assert_eq!(Value::Decimal(amount).to_string(), "25.00");
    }

    #[test]
    fn test_as_string_null_is_none() {
        assert_eq!(Value::Null.as_string(), None);
        assert_eq!(Value::Integer(7).as_string(), Some("7".to_string()));
        assert_eq!(Value::Boolean(true).as_string(), Some("true".to_string()));
    }

    #[test]
    fn test_serialize_dates_as_strings() {
        let json = serde_json::to_string(&Value::Date(date(2024, 3, 15))).unwrap();
        assert_eq!(json, "\"2024-03-15\"");
    }

    #[test]
    fn test_serialize_decimal_as_number() {
        let json = serde_json::to_string(&Value::Decimal(Decimal::new(2500, 2))).unwrap();
        assert_eq!(json, "25.00");
    }

    #[test]
    fn test_serialize_null() {
        assert_eq!(serde_json::to_string(&Value::Null).unwrap(), "null");
    }

    #[test]
    fn test_from_option() {
        assert_eq!(Value::from(None::<String>), Value::Null);
        assert_eq!(Value::from(Some("x")), Value::String("x".to_string()));
    }
}
