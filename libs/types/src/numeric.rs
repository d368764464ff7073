//! Numeric values carried by store documents
//!
//! Balances, scores, prices and quantities arrive from the store as JSON
//! numbers. `Amount` keeps the original JSON representation so integers are
//! re-emitted as integers, while still offering a total order for ranking.

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::cmp::Ordering;
use std::fmt;

/// A JSON number taken verbatim from a store document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(Number);

impl Amount {
    /// Zero, used wherever a field is missing
    pub fn zero() -> Self {
        Self(Number::from(0))
    }

    /// Create from a float. Returns `None` for NaN and infinities.
    pub fn from_f64(value: f64) -> Option<Self> {
        Number::from_f64(value).map(Self)
    }

    /// Extract from an arbitrary JSON value, if it is a number
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => Some(Self(n.clone())),
            _ => None,
        }
    }

    /// Numeric value used for ordering
    pub fn as_f64(&self) -> f64 {
        self.0.as_f64().unwrap_or(0.0)
    }

    pub fn into_number(self) -> Number {
        self.0
    }

    /// Total order over amounts (`f64::total_cmp` on the numeric value)
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        self.as_f64().total_cmp(&other.as_f64())
    }
}

impl Default for Amount {
    fn default() -> Self {
        Self::zero()
    }
}

impl From<i64> for Amount {
    fn from(value: i64) -> Self {
        Self(Number::from(value))
    }
}

impl From<Number> for Amount {
    fn from(value: Number) -> Self {
        Self(value)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Loose truthiness of a stored field: null, false, zero, NaN and the
/// empty string count as unset
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Numeric reading of a stored field used for ordering.
///
/// Numbers are taken as is and numeric strings are parsed. Unset values
/// and anything that does not read as a number count as 0.
pub fn coerce_f64(value: &Value) -> f64 {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Some(0.0)
            } else {
                trimmed.parse::<f64>().ok()
            }
        }
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    };
    parsed.filter(|f| f.is_finite()).unwrap_or(0.0)
}
