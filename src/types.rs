//! Core data types used throughout the rollup index
//!
//! # Key Types
//!
//! - **`Value`**: a typed field value handed over by the parsing layer
//! - **`InputRow`**: one ingested event (timestamp + named fields)
//! - **`MetricValue`**: the final value read out of an aggregator
//! - **`TimeRange`**: inclusive time window
//!
//! # Example
//!
//! ```rust
//! use kuba_rollup::types::{InputRow, Value};
//!
//! let row = InputRow::new(1_000)
//!     .with("city", "NY")
//!     .with("x", 3);
//!
//! assert_eq!(row.get("x"), &Value::Long(3));
//! assert!(row.get("missing").is_null());
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A single typed field value
///
/// Deserializes untagged, so a JSON row like
/// `{"timestamp": 0, "fields": {"city": "NY", "x": 1, "tags": ["a", "b"]}}`
/// maps directly onto it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Value {
    /// Missing or explicit null
    #[default]
    Null,
    /// 64-bit integer
    Long(i64),
    /// 64-bit float
    Double(f64),
    /// UTF-8 string
    String(String),
    /// Multi-value field
    List(Vec<String>),
}

static NULL_VALUE: Value = Value::Null;

impl Value {
    /// True for `Value::Null`
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Long(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::String(s) => write!(f, "{}", s),
            Value::List(values) => write!(f, "[{}]", values.join(", ")),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Long(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Vec<&str>> for Value {
    fn from(v: Vec<&str>) -> Self {
        Value::List(v.into_iter().map(str::to_string).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// One ingested event
///
/// The parsing layer produces these; the index never sees raw bytes.
/// Dimension and metric columns are both looked up by name in `fields`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputRow {
    /// Event time in milliseconds since epoch (not yet bucketed)
    pub timestamp: i64,

    /// Named field values
    #[serde(default)]
    pub fields: HashMap<String, Value>,
}

impl InputRow {
    /// Create an empty row at the given event time
    pub fn new(timestamp: i64) -> Self {
        Self {
            timestamp,
            fields: HashMap::new(),
        }
    }

    /// Builder-style field setter
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    /// Field value by name; missing fields read as `Value::Null`
    pub fn get(&self, name: &str) -> &Value {
        self.fields.get(name).unwrap_or(&NULL_VALUE)
    }
}

/// Final value read out of an aggregator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    /// No value has been aggregated
    Null,
    /// Integral result
    Long(i64),
    /// Single-precision result
    Float(f32),
    /// Double-precision result
    Double(f64),
    /// String result (first/last string aggregators)
    String(String),
}

impl MetricValue {
    /// Numeric view as i64 (strings and nulls read as 0)
    pub fn as_long(&self) -> i64 {
        match self {
            MetricValue::Long(v) => *v,
            MetricValue::Float(v) => *v as i64,
            MetricValue::Double(v) => *v as i64,
            MetricValue::Null | MetricValue::String(_) => 0,
        }
    }

    /// Numeric view as f64 (strings and nulls read as 0.0)
    pub fn as_double(&self) -> f64 {
        match self {
            MetricValue::Long(v) => *v as f64,
            MetricValue::Float(v) => *v as f64,
            MetricValue::Double(v) => *v,
            MetricValue::Null | MetricValue::String(_) => 0.0,
        }
    }
}

/// Time range (inclusive on both ends)
///
/// # Example
///
/// ```rust
/// use kuba_rollup::types::TimeRange;
///
/// let range = TimeRange::new(1000, 2000).unwrap();
/// assert!(range.contains(1000));
/// assert!(range.contains(2000));
/// assert!(!range.contains(2001));
/// assert_eq!(range.duration_ms(), Some(1000));
///
/// assert!(TimeRange::new(2000, 1000).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    /// Start timestamp in milliseconds (inclusive)
    pub start: i64,

    /// End timestamp in milliseconds (inclusive)
    pub end: i64,
}

impl TimeRange {
    /// Create a new time range, rejecting `start > end`
    pub fn new(start: i64, end: i64) -> Result<Self, crate::error::Error> {
        if start > end {
            return Err(crate::error::Error::Configuration(format!(
                "Invalid time range: start {} > end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// Check if a timestamp falls within this range (inclusive)
    pub fn contains(&self, timestamp: i64) -> bool {
        timestamp >= self.start && timestamp <= self.end
    }

    /// Duration in milliseconds, `None` on overflow
    pub fn duration_ms(&self) -> Option<i64> {
        self.end.checked_sub(self.start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_builder_and_missing_field() {
        let row = InputRow::new(5).with("a", "x").with("b", 2.5);
        assert_eq!(row.get("a"), &Value::String("x".to_string()));
        assert_eq!(row.get("b"), &Value::Double(2.5));
        assert!(row.get("c").is_null());
    }

    #[test]
    fn test_value_deserializes_untagged() {
        let row: InputRow = serde_json::from_str(
            r#"{"timestamp": 10, "fields": {"n": 1, "d": 1.5, "s": "v", "l": ["a", "b"], "z": null}}"#,
        )
        .unwrap();
        assert_eq!(row.get("n"), &Value::Long(1));
        assert_eq!(row.get("d"), &Value::Double(1.5));
        assert_eq!(row.get("s"), &Value::String("v".to_string()));
        assert_eq!(
            row.get("l"),
            &Value::List(vec!["a".to_string(), "b".to_string()])
        );
        assert!(row.get("z").is_null());
    }

    #[test]
    fn test_metric_value_numeric_views() {
        assert_eq!(MetricValue::Double(2.9).as_long(), 2);
        assert_eq!(MetricValue::Long(3).as_double(), 3.0);
        assert_eq!(MetricValue::Null.as_long(), 0);
    }

    #[test]
    fn test_time_range_validation() {
        assert!(TimeRange::new(1, 0).is_err());
        let r = TimeRange::new(i64::MIN, i64::MAX).unwrap();
        assert_eq!(r.duration_ms(), None);
    }
}
