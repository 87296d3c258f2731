//! Metric definitions and the aggregators they produce
//!
//! An `AggregatorFactory` is the schema-level description of one metric. It
//! is serializable so schemas can live in TOML files:
//!
//! ```toml
//! [[metrics]]
//! type = "longSum"
//! name = "total"
//! field_name = "x"
//! ```

use serde::{Deserialize, Serialize};

use crate::aggregation::aggregator::Aggregator;
use crate::aggregation::kinds::{
    CardinalityAggregator, CountAggregator, DoubleAnyAggregator, DoubleExtremumAggregator,
    DoubleSumAggregator, DoubleTimeOrderedAggregator, Extremum, FloatSumAggregator,
    LongAnyAggregator, LongExtremumAggregator, LongSumAggregator, LongTimeOrderedAggregator,
    StringTimeOrderedAggregator, TimeOrder,
};
use crate::aggregation::sketch::{self, CardinalityEstimator};
use crate::error::ValidationError;
use crate::selector::SelectorCache;

/// Default cap on stored first/last strings
pub const DEFAULT_MAX_STRING_BYTES: usize = 1024;

const LONG_BYTES: usize = std::mem::size_of::<i64>();
const FLOAT_BYTES: usize = std::mem::size_of::<f32>();
const NULL_FLAG_BYTES: usize = 1;

fn default_max_string_bytes() -> usize {
    DEFAULT_MAX_STRING_BYTES
}

fn default_k() -> usize {
    sketch::DEFAULT_K
}

/// Aggregation kind plus its kind-specific parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AggregatorKind {
    /// Row count
    Count,
    /// Sum as i64
    LongSum {
        /// Input column
        field_name: String,
    },
    /// Sum as f64
    DoubleSum {
        /// Input column
        field_name: String,
    },
    /// Sum as f32
    FloatSum {
        /// Input column
        field_name: String,
    },
    /// Minimum as i64
    LongMin {
        /// Input column
        field_name: String,
    },
    /// Maximum as i64
    LongMax {
        /// Input column
        field_name: String,
    },
    /// Minimum as f64
    DoubleMin {
        /// Input column
        field_name: String,
    },
    /// Maximum as f64
    DoubleMax {
        /// Input column
        field_name: String,
    },
    /// Earliest-event value as i64
    LongFirst {
        /// Input column
        field_name: String,
    },
    /// Latest-event value as i64
    LongLast {
        /// Input column
        field_name: String,
    },
    /// Earliest-event value as f64
    DoubleFirst {
        /// Input column
        field_name: String,
    },
    /// Latest-event value as f64
    DoubleLast {
        /// Input column
        field_name: String,
    },
    /// Earliest-event value as string
    StringFirst {
        /// Input column
        field_name: String,
        /// Stored values are cut to this many bytes
        #[serde(default = "default_max_string_bytes")]
        max_string_bytes: usize,
    },
    /// Latest-event value as string
    StringLast {
        /// Input column
        field_name: String,
        /// Stored values are cut to this many bytes
        #[serde(default = "default_max_string_bytes")]
        max_string_bytes: usize,
    },
    /// Any non-null value as i64
    LongAny {
        /// Input column
        field_name: String,
    },
    /// Any non-null value as f64
    DoubleAny {
        /// Input column
        field_name: String,
    },
    /// Approximate distinct count
    Cardinality {
        /// Input columns
        fields: Vec<String>,
        /// Count distinct value tuples instead of distinct values
        #[serde(default)]
        by_row: bool,
        /// Sketch size
        #[serde(default = "default_k")]
        k: usize,
    },
}

/// Definition of one metric column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatorFactory {
    /// Output metric name, unique within a schema
    pub name: String,

    /// What and how to aggregate
    #[serde(flatten)]
    pub kind: AggregatorKind,
}

impl AggregatorFactory {
    /// Build a factory from parts
    pub fn new(name: &str, kind: AggregatorKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
        }
    }

    /// `count` metric
    pub fn count(name: &str) -> Self {
        Self::new(name, AggregatorKind::Count)
    }

    /// `longSum` metric
    pub fn long_sum(name: &str, field_name: &str) -> Self {
        Self::new(
            name,
            AggregatorKind::LongSum {
                field_name: field_name.to_string(),
            },
        )
    }

    /// `doubleSum` metric
    pub fn double_sum(name: &str, field_name: &str) -> Self {
        Self::new(
            name,
            AggregatorKind::DoubleSum {
                field_name: field_name.to_string(),
            },
        )
    }

    /// `longLast` metric
    pub fn long_last(name: &str, field_name: &str) -> Self {
        Self::new(
            name,
            AggregatorKind::LongLast {
                field_name: field_name.to_string(),
            },
        )
    }

    /// `longFirst` metric
    pub fn long_first(name: &str, field_name: &str) -> Self {
        Self::new(
            name,
            AggregatorKind::LongFirst {
                field_name: field_name.to_string(),
            },
        )
    }

    /// `cardinality` metric with the default sketch size
    pub fn cardinality(name: &str, fields: &[&str]) -> Self {
        Self::new(
            name,
            AggregatorKind::Cardinality {
                fields: fields.iter().map(|f| f.to_string()).collect(),
                by_row: false,
                k: sketch::DEFAULT_K,
            },
        )
    }

    /// Output metric name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wire name of the aggregation kind
    pub fn type_name(&self) -> &'static str {
        match self.kind {
            AggregatorKind::Count => "count",
            AggregatorKind::LongSum { .. } => "longSum",
            AggregatorKind::DoubleSum { .. } => "doubleSum",
            AggregatorKind::FloatSum { .. } => "floatSum",
            AggregatorKind::LongMin { .. } => "longMin",
            AggregatorKind::LongMax { .. } => "longMax",
            AggregatorKind::DoubleMin { .. } => "doubleMin",
            AggregatorKind::DoubleMax { .. } => "doubleMax",
            AggregatorKind::LongFirst { .. } => "longFirst",
            AggregatorKind::LongLast { .. } => "longLast",
            AggregatorKind::DoubleFirst { .. } => "doubleFirst",
            AggregatorKind::DoubleLast { .. } => "doubleLast",
            AggregatorKind::StringFirst { .. } => "stringFirst",
            AggregatorKind::StringLast { .. } => "stringLast",
            AggregatorKind::LongAny { .. } => "longAny",
            AggregatorKind::DoubleAny { .. } => "doubleAny",
            AggregatorKind::Cardinality { .. } => "cardinality",
        }
    }

    /// Input columns this metric reads
    pub fn required_columns(&self) -> Vec<&str> {
        match &self.kind {
            AggregatorKind::Count => Vec::new(),
            AggregatorKind::Cardinality { fields, .. } => fields.iter().map(String::as_str).collect(),
            AggregatorKind::LongSum { field_name }
            | AggregatorKind::DoubleSum { field_name }
            | AggregatorKind::FloatSum { field_name }
            | AggregatorKind::LongMin { field_name }
            | AggregatorKind::LongMax { field_name }
            | AggregatorKind::DoubleMin { field_name }
            | AggregatorKind::DoubleMax { field_name }
            | AggregatorKind::LongFirst { field_name }
            | AggregatorKind::LongLast { field_name }
            | AggregatorKind::DoubleFirst { field_name }
            | AggregatorKind::DoubleLast { field_name }
            | AggregatorKind::StringFirst { field_name, .. }
            | AggregatorKind::StringLast { field_name, .. }
            | AggregatorKind::LongAny { field_name }
            | AggregatorKind::DoubleAny { field_name } => vec![field_name.as_str()],
        }
    }

    /// Upper bound on the intermediate state size of one aggregator, in bytes
    ///
    /// Used only for row size estimation.
    pub fn max_intermediate_size(&self) -> usize {
        match &self.kind {
            AggregatorKind::Count => LONG_BYTES,
            AggregatorKind::FloatSum { .. } => FLOAT_BYTES + NULL_FLAG_BYTES,
            AggregatorKind::LongSum { .. }
            | AggregatorKind::DoubleSum { .. }
            | AggregatorKind::LongMin { .. }
            | AggregatorKind::LongMax { .. }
            | AggregatorKind::DoubleMin { .. }
            | AggregatorKind::DoubleMax { .. }
            | AggregatorKind::LongAny { .. }
            | AggregatorKind::DoubleAny { .. } => LONG_BYTES + NULL_FLAG_BYTES,
            AggregatorKind::LongFirst { .. }
            | AggregatorKind::LongLast { .. }
            | AggregatorKind::DoubleFirst { .. }
            | AggregatorKind::DoubleLast { .. } => LONG_BYTES * 2 + NULL_FLAG_BYTES,
            AggregatorKind::StringFirst {
                max_string_bytes, ..
            }
            | AggregatorKind::StringLast {
                max_string_bytes, ..
            } => LONG_BYTES + std::mem::size_of::<u32>() + max_string_bytes,
            AggregatorKind::Cardinality { k, .. } => CardinalityEstimator::max_size_bytes(*k),
        }
    }

    /// Check parameters that serde cannot
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.is_empty() {
            return Err(ValidationError::MissingField("metrics.name".to_string()));
        }
        match &self.kind {
            AggregatorKind::Cardinality { fields, k, .. } => {
                if fields.is_empty() {
                    return Err(ValidationError::MissingField(format!(
                        "metrics.{}.fields",
                        self.name
                    )));
                }
                CardinalityEstimator::new(*k).map(|_| ())
            },
            AggregatorKind::StringFirst {
                max_string_bytes, ..
            }
            | AggregatorKind::StringLast {
                max_string_bytes, ..
            } if *max_string_bytes == 0 => Err(ValidationError::OutOfRange {
                field: format!("metrics.{}.max_string_bytes", self.name),
                value: "0".to_string(),
                min: "1".to_string(),
                max: usize::MAX.to_string(),
            }),
            _ => {
                if self.required_columns().iter().any(|c| c.is_empty()) {
                    return Err(ValidationError::MissingField(format!(
                        "metrics.{}.field_name",
                        self.name
                    )));
                }
                Ok(())
            },
        }
    }

    /// Create a fresh aggregator bound to the index's cached selectors
    pub fn factorize(&self, selectors: &SelectorCache) -> Result<Box<dyn Aggregator>, ValidationError> {
        let agg: Box<dyn Aggregator> = match &self.kind {
            AggregatorKind::Count => Box::new(CountAggregator::new()),
            AggregatorKind::LongSum { field_name } => {
                Box::new(LongSumAggregator::new(selectors.resolve(field_name)))
            },
            AggregatorKind::DoubleSum { field_name } => {
                Box::new(DoubleSumAggregator::new(selectors.resolve(field_name)))
            },
            AggregatorKind::FloatSum { field_name } => {
                Box::new(FloatSumAggregator::new(selectors.resolve(field_name)))
            },
            AggregatorKind::LongMin { field_name } => Box::new(LongExtremumAggregator::new(
                selectors.resolve(field_name),
                Extremum::Min,
            )),
            AggregatorKind::LongMax { field_name } => Box::new(LongExtremumAggregator::new(
                selectors.resolve(field_name),
                Extremum::Max,
            )),
            AggregatorKind::DoubleMin { field_name } => Box::new(DoubleExtremumAggregator::new(
                selectors.resolve(field_name),
                Extremum::Min,
            )),
            AggregatorKind::DoubleMax { field_name } => Box::new(DoubleExtremumAggregator::new(
                selectors.resolve(field_name),
                Extremum::Max,
            )),
            AggregatorKind::LongFirst { field_name } => Box::new(LongTimeOrderedAggregator::new(
                selectors.resolve(field_name),
                TimeOrder::First,
            )),
            AggregatorKind::LongLast { field_name } => Box::new(LongTimeOrderedAggregator::new(
                selectors.resolve(field_name),
                TimeOrder::Last,
            )),
            AggregatorKind::DoubleFirst { field_name } => Box::new(
                DoubleTimeOrderedAggregator::new(selectors.resolve(field_name), TimeOrder::First),
            ),
            AggregatorKind::DoubleLast { field_name } => Box::new(
                DoubleTimeOrderedAggregator::new(selectors.resolve(field_name), TimeOrder::Last),
            ),
            AggregatorKind::StringFirst {
                field_name,
                max_string_bytes,
            } => Box::new(StringTimeOrderedAggregator::new(
                selectors.resolve(field_name),
                TimeOrder::First,
                *max_string_bytes,
            )),
            AggregatorKind::StringLast {
                field_name,
                max_string_bytes,
            } => Box::new(StringTimeOrderedAggregator::new(
                selectors.resolve(field_name),
                TimeOrder::Last,
                *max_string_bytes,
            )),
            AggregatorKind::LongAny { field_name } => {
                Box::new(LongAnyAggregator::new(selectors.resolve(field_name)))
            },
            AggregatorKind::DoubleAny { field_name } => {
                Box::new(DoubleAnyAggregator::new(selectors.resolve(field_name)))
            },
            AggregatorKind::Cardinality { fields, by_row, k } => {
                Box::new(CardinalityAggregator::new(
                    fields.iter().map(|f| selectors.resolve(f)).collect(),
                    *by_row,
                    CardinalityEstimator::new(*k)?,
                ))
            },
        };
        Ok(agg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{InputRow, MetricValue};

    #[test]
    fn test_toml_form() {
        #[derive(Deserialize)]
        struct Wrapper {
            metrics: Vec<AggregatorFactory>,
        }
        let parsed: Wrapper = toml::from_str(
            r#"
            [[metrics]]
            type = "count"
            name = "rows"

            [[metrics]]
            type = "longSum"
            name = "total"
            field_name = "x"

            [[metrics]]
            type = "stringLast"
            name = "latest_status"
            field_name = "status"
            "#,
        )
        .unwrap();
        assert_eq!(parsed.metrics[0], AggregatorFactory::count("rows"));
        assert_eq!(parsed.metrics[1], AggregatorFactory::long_sum("total", "x"));
        assert_eq!(
            parsed.metrics[2].kind,
            AggregatorKind::StringLast {
                field_name: "status".to_string(),
                max_string_bytes: DEFAULT_MAX_STRING_BYTES,
            }
        );
    }

    #[test]
    fn test_factorize_shares_selectors() {
        let cache = SelectorCache::new(false);
        let sum = AggregatorFactory::long_sum("a", "x");
        let last = AggregatorFactory::long_last("b", "x");
        let mut a = sum.factorize(&cache).unwrap();
        let mut b = last.factorize(&cache).unwrap();
        assert_eq!(cache.len(), 1);

        let row = InputRow::new(3).with("x", 4);
        a.aggregate(&row).unwrap();
        b.aggregate(&row).unwrap();
        assert_eq!(a.get(), MetricValue::Long(4));
        assert_eq!(b.get_long(), 4);
    }

    #[test]
    fn test_max_intermediate_size() {
        assert_eq!(AggregatorFactory::count("c").max_intermediate_size(), 8);
        assert_eq!(AggregatorFactory::long_sum("s", "x").max_intermediate_size(), 9);
        assert_eq!(AggregatorFactory::long_last("l", "x").max_intermediate_size(), 17);
        let card = AggregatorFactory::cardinality("u", &["user"]);
        assert!(card.max_intermediate_size() >= sketch::DEFAULT_K * 8);
    }

    #[test]
    fn test_validate() {
        assert!(AggregatorFactory::count("").validate().is_err());
        assert!(AggregatorFactory::long_sum("s", "").validate().is_err());
        assert!(AggregatorFactory::cardinality("u", &[]).validate().is_err());
        let bad_k = AggregatorFactory::new(
            "u",
            AggregatorKind::Cardinality {
                fields: vec!["a".to_string()],
                by_row: false,
                k: 1,
            },
        );
        assert!(bad_k.validate().is_err());
        assert!(AggregatorFactory::double_sum("d", "x").validate().is_ok());
    }
}
