//! Built-in transforms
//!
//! Every built-in maps `Null` to `Null`.

use chrono::NaiveDate;
use erpmap_model::Value;
use rust_decimal::Decimal;
use std::fmt::Write as _;
use std::str::FromStr;

use crate::date_pattern::DatePattern;
use crate::registry::TransformFunction;

/// `TRIM`: strip leading and trailing whitespace
#[derive(Debug, Clone, Copy, Default)]
pub struct Trim;

impl TransformFunction for Trim {
    fn name(&self) -> &str {
        "TRIM"
    }

    fn apply(&self, value: &Value, _arg: Option<&str>) -> crate::Result<Value> {
        Ok(match value {
            Value::Null => Value::Null,
            Value::String(s) => Value::String(s.trim().to_string()),
            other => Value::String(other.to_string().trim().to_string()),
        })
    }
}

/// `UPPER`: uppercase the value's text
#[derive(Debug, Clone, Copy, Default)]
pub struct Upper;

impl TransformFunction for Upper {
    fn name(&self) -> &str {
        "UPPER"
    }

    fn apply(&self, value: &Value, _arg: Option<&str>) -> crate::Result<Value> {
        Ok(match value {
            Value::Null => Value::Null,
            Value::String(s) => Value::String(s.to_uppercase()),
            other => Value::String(other.to_string().to_uppercase()),
        })
    }
}

/// `DATE_FMT:<pattern>`: format a date
///
/// Dates and timestamps are formatted directly, strings are parsed as ISO
/// calendar dates first. Anything else fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateFormat;

impl TransformFunction for DateFormat {
    fn name(&self) -> &str {
        "DATE_FMT"
    }

    fn apply(&self, value: &Value, arg: Option<&str>) -> crate::Result<Value> {
        let Some(pattern) = arg else {
            return Ok(value.clone());
        };
        if value.is_null() {
            return Ok(Value::Null);
        }

        let pattern = DatePattern::compile(pattern)?;
        let items = pattern.items()?;
        let mut out = String::new();
        let written = match value {
            Value::Date(date) => write!(out, "{}", date.format_with_items(items.iter())),
            Value::DateTime(dt) => write!(out, "{}", dt.format_with_items(items.iter())),
            other => {
                let date = parse_iso_date(other)?;
                write!(out, "{}", date.format_with_items(items.iter()))
            }
        };
        written.map_err(|_| {
            crate::Error::transform(
                "DATE_FMT",
                format!(
                    "Pattern '{}' cannot be applied to {} value '{value}'",
                    pattern.source(),
                    value.kind()
                ),
            )
        })?;

        Ok(Value::String(out))
    }
}

/// `SUM`: coerce the value to an exact decimal
///
/// Strings are parsed after trimming, plain or in scientific notation.
/// Anything that is not a number yields `Null`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sum;

impl TransformFunction for Sum {
    fn name(&self) -> &str {
        "SUM"
    }

    fn apply(&self, value: &Value, _arg: Option<&str>) -> crate::Result<Value> {
        let number = match value {
            Value::Integer(n) => Some(Decimal::from(*n)),
            Value::Decimal(d) => Some(*d),
            Value::String(s) => {
                let s = s.trim();
                Decimal::from_str(s)
                    .or_else(|_| Decimal::from_scientific(s))
                    .ok()
            }
            _ => None,
        };
        Ok(number.map_or(Value::Null, Value::Decimal))
    }
}

/// `JOIN`: the value's text
#[derive(Debug, Clone, Copy, Default)]
pub struct Join;

impl TransformFunction for Join {
    fn name(&self) -> &str {
        "JOIN"
    }

    fn apply(&self, value: &Value, _arg: Option<&str>) -> crate::Result<Value> {
        Ok(match value {
            Value::Null => Value::Null,
            Value::String(s) => Value::String(s.clone()),
            other => Value::String(other.to_string()),
        })
    }
}

/// `FIRST`: the value itself, since a rule reads a single cell
#[derive(Debug, Clone, Copy, Default)]
pub struct First;

impl TransformFunction for First {
    fn name(&self) -> &str {
        "FIRST"
    }

    fn apply(&self, value: &Value, _arg: Option<&str>) -> crate::Result<Value> {
        Ok(value.clone())
    }
}

fn parse_iso_date(value: &Value) -> crate::Result<NaiveDate> {
    let text = value.to_string();
    text.trim().parse::<NaiveDate>().map_err(|error| {
        crate::Error::transform(
            "DATE_FMT",
            format!(
                "Cannot parse {} value '{text}' as an ISO date: {error}",
                value.kind()
            ),
        )
    })
}
