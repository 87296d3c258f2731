//! Column value selectors and the per-index selector cache
//!
//! A `ColumnSelector` is the typed accessor an aggregator is factorized
//! against: it knows which column to read and how to coerce the raw `Value`
//! into the aggregator's input type. Selectors are resolved once per column
//! and cached for the lifetime of the index so the per-row hot path never
//! re-derives them.
//!
//! # Thread Safety
//!
//! The cache is a `DashMap` when the index accepts concurrent writers and a
//! plain `HashMap` behind an uncontended mutex otherwise. Population is
//! idempotent, so a racing double insert is harmless.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::error::AggregateError;
use crate::types::{InputRow, Value};

/// Typed accessor for one column of the current row
#[derive(Debug)]
pub struct ColumnSelector {
    column: Arc<str>,
}

impl ColumnSelector {
    /// Create a selector for `column`
    pub fn new(column: &str) -> Self {
        Self {
            column: Arc::from(column),
        }
    }

    /// Column this selector reads
    pub fn column(&self) -> &str {
        &self.column
    }

    /// Raw value of the column in `row`
    pub fn value<'r>(&self, row: &'r InputRow) -> &'r Value {
        row.get(&self.column)
    }

    /// Coerce to i64; `Ok(None)` for null
    ///
    /// Doubles truncate toward zero; strings parse as integer first, then
    /// as a float.
    pub fn get_long(&self, row: &InputRow) -> Result<Option<i64>, AggregateError> {
        match self.value(row) {
            Value::Null => Ok(None),
            Value::Long(v) => Ok(Some(*v)),
            Value::Double(v) => Ok(Some(*v as i64)),
            Value::String(s) => {
                let trimmed = s.trim();
                if let Ok(v) = trimmed.parse::<i64>() {
                    return Ok(Some(v));
                }
                trimmed
                    .parse::<f64>()
                    .map(|v| Some(v as i64))
                    .map_err(|_| self.unparseable(s))
            },
            Value::List(_) => Err(self.unsupported(self.value(row), "long")),
        }
    }

    /// Coerce to f64; `Ok(None)` for null
    pub fn get_double(&self, row: &InputRow) -> Result<Option<f64>, AggregateError> {
        match self.value(row) {
            Value::Null => Ok(None),
            Value::Long(v) => Ok(Some(*v as f64)),
            Value::Double(v) => Ok(Some(*v)),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .map(Some)
                .map_err(|_| self.unparseable(s)),
            Value::List(_) => Err(self.unsupported(self.value(row), "double")),
        }
    }

    /// Render as a string; `None` for null
    pub fn get_string(&self, row: &InputRow) -> Option<String> {
        match self.value(row) {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    fn unparseable(&self, raw: &str) -> AggregateError {
        AggregateError::Unparseable {
            field: self.column.to_string(),
            value: raw.to_string(),
        }
    }

    fn unsupported(&self, value: &Value, target: &'static str) -> AggregateError {
        AggregateError::Unsupported {
            field: self.column.to_string(),
            value: value.to_string(),
            target,
        }
    }
}

/// Memoizes selectors per column name
#[derive(Debug)]
pub enum SelectorCache {
    /// Used when writers may run in parallel
    Concurrent(DashMap<String, Arc<ColumnSelector>>),
    /// Used for single-threaded ingestion
    Plain(Mutex<HashMap<String, Arc<ColumnSelector>>>),
}

impl SelectorCache {
    /// Pick the backing structure from the concurrency flag
    pub fn new(concurrent_event_add: bool) -> Self {
        if concurrent_event_add {
            SelectorCache::Concurrent(DashMap::new())
        } else {
            SelectorCache::Plain(Mutex::new(HashMap::new()))
        }
    }

    /// Resolve the selector for `column`, creating it on first use
    pub fn resolve(&self, column: &str) -> Arc<ColumnSelector> {
        match self {
            SelectorCache::Concurrent(map) => {
                // Fast path: shard read lock only
                if let Some(existing) = map.get(column) {
                    return Arc::clone(existing.value());
                }
                Arc::clone(
                    map.entry(column.to_string())
                        .or_insert_with(|| Arc::new(ColumnSelector::new(column)))
                        .value(),
                )
            },
            SelectorCache::Plain(map) => {
                let mut map = map.lock();
                Arc::clone(
                    map.entry(column.to_string())
                        .or_insert_with(|| Arc::new(ColumnSelector::new(column))),
                )
            },
        }
    }

    /// Number of cached selectors
    pub fn len(&self) -> usize {
        match self {
            SelectorCache::Concurrent(map) => map.len(),
            SelectorCache::Plain(map) => map.lock().len(),
        }
    }

    /// True when nothing has been resolved yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every cached selector
    pub fn clear(&self) {
        match self {
            SelectorCache::Concurrent(map) => map.clear(),
            SelectorCache::Plain(map) => map.lock().clear(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_long_coercion() {
        let sel = ColumnSelector::new("x");
        let row = InputRow::new(0).with("x", "42");
        assert_eq!(sel.get_long(&row).unwrap(), Some(42));

        let row = InputRow::new(0).with("x", " 7.9 ");
        assert_eq!(sel.get_long(&row).unwrap(), Some(7));

        let row = InputRow::new(0).with("x", 3.5);
        assert_eq!(sel.get_long(&row).unwrap(), Some(3));

        let row = InputRow::new(0);
        assert_eq!(sel.get_long(&row).unwrap(), None);
    }

    #[test]
    fn test_unparseable_values_error() {
        let sel = ColumnSelector::new("x");
        let row = InputRow::new(0).with("x", "abc");
        assert!(matches!(
            sel.get_double(&row),
            Err(AggregateError::Unparseable { .. })
        ));

        let row = InputRow::new(0).with("x", vec!["1", "2"]);
        assert!(matches!(
            sel.get_long(&row),
            Err(AggregateError::Unsupported { target: "long", .. })
        ));
    }

    #[test]
    fn test_string_rendering() {
        let sel = ColumnSelector::new("s");
        assert_eq!(sel.get_string(&InputRow::new(0).with("s", 5)), Some("5".to_string()));
        assert_eq!(sel.get_string(&InputRow::new(0)), None);
    }

    #[test]
    fn test_cache_memoizes_both_variants() {
        for concurrent in [true, false] {
            let cache = SelectorCache::new(concurrent);
            let a = cache.resolve("x");
            let b = cache.resolve("x");
            assert!(Arc::ptr_eq(&a, &b));
            cache.resolve("y");
            assert_eq!(cache.len(), 2);
            cache.clear();
            assert!(cache.is_empty());
        }
    }
}
