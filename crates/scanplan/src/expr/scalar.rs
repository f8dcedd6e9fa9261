use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// A literal value in an expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarValue {
    Null,
    Boolean(bool),
    Int64(i64),
    Float64(f64),
    /// Decimal stored as an unscaled integer.
    Decimal {
        value: i128,
        scale: u8,
    },
    Utf8(String),
    Date(NaiveDate),
    Datetime(NaiveDateTime),
}

/// Writes the unscaled decimal with a decimal point inserted `scale` digits
/// from the right.
pub(crate) fn write_decimal(f: &mut impl fmt::Write, value: i128, scale: u8) -> fmt::Result {
    if scale == 0 {
        return write!(f, "{value}");
    }

    let sign = if value < 0 { "-" } else { "" };
    let digits = value.unsigned_abs().to_string();
    let scale = scale as usize;

    if digits.len() <= scale {
        write!(f, "{sign}0.{digits:0>scale$}")
    } else {
        let (int, frac) = digits.split_at(digits.len() - scale);
        write!(f, "{sign}{int}.{frac}")
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Boolean(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::Float64(v) => write!(f, "{v}"),
            Self::Decimal { value, scale } => write_decimal(f, *value, *scale),
            // Quote strings since this is used when printing expressions.
            Self::Utf8(v) => write!(f, "'{v}'"),
            Self::Date(v) => write!(f, "{v}"),
            Self::Datetime(v) => write!(f, "{v}"),
        }
    }
}

impl From<bool> for ScalarValue {
    fn from(value: bool) -> Self {
        ScalarValue::Boolean(value)
    }
}

impl From<i32> for ScalarValue {
    fn from(value: i32) -> Self {
        ScalarValue::Int64(value as i64)
    }
}

impl From<i64> for ScalarValue {
    fn from(value: i64) -> Self {
        ScalarValue::Int64(value)
    }
}

impl From<f64> for ScalarValue {
    fn from(value: f64) -> Self {
        ScalarValue::Float64(value)
    }
}

impl From<&str> for ScalarValue {
    fn from(value: &str) -> Self {
        ScalarValue::Utf8(value.to_string())
    }
}

impl From<String> for ScalarValue {
    fn from(value: String) -> Self {
        ScalarValue::Utf8(value)
    }
}

impl From<NaiveDate> for ScalarValue {
    fn from(value: NaiveDate) -> Self {
        ScalarValue::Date(value)
    }
}

impl From<NaiveDateTime> for ScalarValue {
    fn from(value: NaiveDateTime) -> Self {
        ScalarValue::Datetime(value)
    }
}
