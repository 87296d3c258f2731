//! Row keys: bucketed timestamp plus ordered dimension values
//!
//! Two rows roll up into the same fact iff their keys are equal. Ordering is
//! timestamp first, then dimensions in schema order with nulls first.
//! String and multi-value dimensions compare as sorted value lists, so a
//! scalar `"a"` sorts like the one-element set `["a"]`.

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::mem::size_of;
use std::sync::Arc;

use crate::types::Value;

/// One dimension value inside a row key
#[derive(Debug, Clone)]
pub enum DimensionValue {
    /// Missing value
    Null,
    /// Integral dimension
    Long(i64),
    /// Floating-point dimension, ordered by `f64::total_cmp`
    Double(f64),
    /// Interned string
    String(Arc<str>),
    /// Sorted, de-duplicated set of interned strings (two or more)
    Multi(Arc<[Arc<str>]>),
}

impl DimensionValue {
    fn rank(&self) -> u8 {
        match self {
            DimensionValue::Null => 0,
            DimensionValue::Long(_) => 1,
            DimensionValue::Double(_) => 2,
            DimensionValue::String(_) | DimensionValue::Multi(_) => 3,
        }
    }

    fn as_strings(&self) -> &[Arc<str>] {
        match self {
            DimensionValue::String(s) => std::slice::from_ref(s),
            DimensionValue::Multi(values) => values,
            _ => &[],
        }
    }

    /// True for `DimensionValue::Null`
    pub fn is_null(&self) -> bool {
        matches!(self, DimensionValue::Null)
    }

    /// Plain value form for snapshots
    pub fn to_value(&self) -> Value {
        match self {
            DimensionValue::Null => Value::Null,
            DimensionValue::Long(v) => Value::Long(*v),
            DimensionValue::Double(v) => Value::Double(*v),
            DimensionValue::String(s) => Value::String(s.to_string()),
            DimensionValue::Multi(values) => Value::List(values.iter().map(|v| v.to_string()).collect()),
        }
    }

    /// Approximate heap footprint, including the inline enum
    ///
    /// Interned string bytes are counted even though the dictionary shares
    /// them; the estimate errs high.
    pub fn estimate_bytes_in_memory(&self) -> usize {
        let inline = size_of::<DimensionValue>();
        match self {
            DimensionValue::Null | DimensionValue::Long(_) | DimensionValue::Double(_) => inline,
            DimensionValue::String(s) => inline + s.len(),
            DimensionValue::Multi(values) => {
                inline
                    + 2 * size_of::<usize>()
                    + values
                        .iter()
                        .map(|v| size_of::<Arc<str>>() + v.len())
                        .sum::<usize>()
            },
        }
    }
}

impl PartialEq for DimensionValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for DimensionValue {}

impl PartialOrd for DimensionValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DimensionValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (DimensionValue::Long(a), DimensionValue::Long(b)) => a.cmp(b),
            (DimensionValue::Double(a), DimensionValue::Double(b)) => a.total_cmp(b),
            _ if self.rank() == 3 && other.rank() == 3 => {
                self.as_strings().iter().cmp(other.as_strings().iter())
            },
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl Hash for DimensionValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            DimensionValue::Null => {},
            DimensionValue::Long(v) => v.hash(state),
            DimensionValue::Double(v) => v.to_bits().hash(state),
            DimensionValue::String(_) | DimensionValue::Multi(_) => {
                for s in self.as_strings() {
                    s.hash(state);
                }
                self.as_strings().len().hash(state);
            },
        }
    }
}

/// Identity of a fact: bucketed timestamp plus dimension values in schema order
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RowKey {
    timestamp: i64,
    dims: Vec<DimensionValue>,
}

impl RowKey {
    /// Build a key from an already-bucketed timestamp
    pub fn new(timestamp: i64, dims: Vec<DimensionValue>) -> Self {
        Self { timestamp, dims }
    }

    /// Lower bound for every key at `timestamp`
    pub(crate) fn time_bound(timestamp: i64) -> Self {
        Self {
            timestamp,
            dims: Vec::new(),
        }
    }

    /// Bucketed timestamp
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Dimension values in schema order
    pub fn dims(&self) -> &[DimensionValue] {
        &self.dims
    }

    /// Approximate heap footprint of this key
    pub fn estimate_bytes_in_memory(&self) -> usize {
        size_of::<RowKey>()
            + self
                .dims
                .iter()
                .map(DimensionValue::estimate_bytes_in_memory)
                .sum::<usize>()
    }
}
