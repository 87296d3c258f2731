//! Dimension schema, per-dimension dictionaries and value conversion
//!
//! String dimension values are interned once per dimension so every row key
//! holding `"us-east-1"` shares one allocation.
//!
//! # Thread Safety
//!
//! `DimensionDictionary` uses a read-lock fast path for values it has
//! already seen and only takes the write lock to insert a new one.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::index::row_key::DimensionValue;
use crate::types::Value;

/// Value type of a dimension, which also fixes its sort order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DimensionKind {
    /// Lexicographic strings; lists become multi-values
    #[default]
    String,
    /// Signed 64-bit integers
    Long,
    /// 64-bit floats
    Double,
}

/// One dimension column of the schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionSchema {
    /// Input column name
    pub name: String,

    /// Value type
    #[serde(default)]
    pub kind: DimensionKind,
}

impl DimensionSchema {
    /// String dimension
    pub fn string(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: DimensionKind::String,
        }
    }

    /// Long dimension
    pub fn long(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: DimensionKind::Long,
        }
    }

    /// Double dimension
    pub fn double(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: DimensionKind::Double,
        }
    }
}

// ============================================================================
// Dictionary
// ============================================================================

/// Interns the distinct string values of one dimension
#[derive(Debug, Default)]
pub struct DimensionDictionary {
    /// Shared copies of every value seen
    values: RwLock<HashSet<Arc<str>>>,
}

impl DimensionDictionary {
    /// Create an empty dictionary
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the shared copy of `value`, inserting it on first sight
    pub fn intern(&self, value: &str) -> Arc<str> {
        // Fast path: read lock only
        {
            let values = self.values.read();
            if let Some(existing) = values.get(value) {
                return Arc::clone(existing);
            }
        }

        let mut values = self.values.write();
        if let Some(existing) = values.get(value) {
            return Arc::clone(existing);
        }

        let shared: Arc<str> = Arc::from(value);
        values.insert(Arc::clone(&shared));
        shared
    }

    /// Number of distinct values seen
    pub fn cardinality(&self) -> usize {
        self.values.read().len()
    }

    /// Forget every value
    pub fn clear(&self) {
        self.values.write().clear();
    }
}

// ============================================================================
// Column
// ============================================================================

/// A schema dimension together with its dictionary
#[derive(Debug)]
pub struct DimensionColumn {
    schema: DimensionSchema,
    dictionary: DimensionDictionary,
}

impl DimensionColumn {
    /// Create an empty column for `schema`
    pub fn new(schema: DimensionSchema) -> Self {
        Self {
            schema,
            dictionary: DimensionDictionary::new(),
        }
    }

    /// Column name
    pub fn name(&self) -> &str {
        &self.schema.name
    }

    /// Column schema
    pub fn schema(&self) -> &DimensionSchema {
        &self.schema
    }

    /// Column dictionary
    pub fn dictionary(&self) -> &DimensionDictionary {
        &self.dictionary
    }

    /// Convert a raw value into its key component
    ///
    /// Unconvertible input yields `Null` plus a warning message; it never
    /// rejects the row.
    pub fn convert(&self, value: &Value) -> (DimensionValue, Option<String>) {
        match self.schema.kind {
            DimensionKind::String => (self.convert_string(value), None),
            DimensionKind::Long => match value {
                Value::Null => (DimensionValue::Null, None),
                Value::Long(v) => (DimensionValue::Long(*v), None),
                Value::Double(v) => (DimensionValue::Long(*v as i64), None),
                Value::String(s) => {
                    let trimmed = s.trim();
                    match trimmed.parse::<i64>() {
                        Ok(v) => (DimensionValue::Long(v), None),
                        Err(_) => match trimmed.parse::<f64>() {
                            Ok(v) => (DimensionValue::Long(v as i64), None),
                            Err(_) => (DimensionValue::Null, Some(self.warning(value, "long"))),
                        },
                    }
                },
                Value::List(_) => (DimensionValue::Null, Some(self.warning(value, "long"))),
            },
            DimensionKind::Double => match value {
                Value::Null => (DimensionValue::Null, None),
                Value::Long(v) => (DimensionValue::Double(*v as f64), None),
                Value::Double(v) => (DimensionValue::Double(*v), None),
                Value::String(s) => match s.trim().parse::<f64>() {
                    Ok(v) => (DimensionValue::Double(v), None),
                    Err(_) => (DimensionValue::Null, Some(self.warning(value, "double"))),
                },
                Value::List(_) => (DimensionValue::Null, Some(self.warning(value, "double"))),
            },
        }
    }

    fn convert_string(&self, value: &Value) -> DimensionValue {
        match value {
            Value::Null => DimensionValue::Null,
            Value::String(s) => DimensionValue::String(self.dictionary.intern(s)),
            Value::List(values) => {
                let mut sorted: Vec<&str> = values.iter().map(String::as_str).collect();
                sorted.sort_unstable();
                sorted.dedup();
                match sorted.as_slice() {
                    [] => DimensionValue::Null,
                    [single] => DimensionValue::String(self.dictionary.intern(single)),
                    many => DimensionValue::Multi(many.iter().map(|v| self.dictionary.intern(v)).collect()),
                }
            },
            other => DimensionValue::String(self.dictionary.intern(&other.to_string())),
        }
    }

    fn warning(&self, value: &Value, target: &str) -> String {
        format!(
            "could not convert value [{}] to {} for dimension [{}]",
            value, target, self.schema.name
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_shares_allocation() {
        let dict = DimensionDictionary::new();
        let a = dict.intern("us-east-1");
        let b = dict.intern("us-east-1");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(dict.cardinality(), 1);
        dict.intern("eu-west-1");
        assert_eq!(dict.cardinality(), 2);
        dict.clear();
        assert_eq!(dict.cardinality(), 0);
    }

    #[test]
    fn test_list_normalization() {
        let col = DimensionColumn::new(DimensionSchema::string("tags"));
        let (v, _) = col.convert(&Value::from(vec!["b", "a", "b"]));
        let (w, _) = col.convert(&Value::from(vec!["a", "b"]));
        assert_eq!(v, w);
        assert!(matches!(v, DimensionValue::Multi(_)));

        let (single, _) = col.convert(&Value::from(vec!["x", "x"]));
        assert_eq!(single, DimensionValue::String(Arc::from("x")));

        let (empty, _) = col.convert(&Value::List(Vec::new()));
        assert!(empty.is_null());
    }

    #[test]
    fn test_numeric_dimensions_parse_or_warn() {
        let col = DimensionColumn::new(DimensionSchema::long("port"));
        assert_eq!(col.convert(&Value::from("8080")).0, DimensionValue::Long(8080));

        let (v, warning) = col.convert(&Value::from("http"));
        assert!(v.is_null());
        assert!(warning.unwrap().contains("port"));

        let col = DimensionColumn::new(DimensionSchema::double("ratio"));
        assert_eq!(col.convert(&Value::from(2)).0, DimensionValue::Double(2.0));
    }

    #[test]
    fn test_numbers_in_string_dimension_render() {
        let col = DimensionColumn::new(DimensionSchema::string("code"));
        assert_eq!(col.convert(&Value::from(404)).0, DimensionValue::String(Arc::from("404")));
    }
}
