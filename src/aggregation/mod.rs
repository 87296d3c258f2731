//! Metric aggregation
//!
//! # Key Components
//!
//! - **`Aggregator`**: the fold/read/close capability every metric kind implements
//! - **`AggregatorFactory`**: serializable metric definition that builds aggregators
//! - **Kinds**: count, sums, min/max, first/last, any, and a distinct-count sketch
//!
//! # Example
//!
//! ```rust
//! use kuba_rollup::aggregation::AggregatorFactory;
//! use kuba_rollup::selector::SelectorCache;
//! use kuba_rollup::types::InputRow;
//!
//! let cache = SelectorCache::new(false);
//! let mut total = AggregatorFactory::long_sum("total", "x").factorize(&cache).unwrap();
//!
//! total.aggregate(&InputRow::new(0).with("x", 1)).unwrap();
//! total.aggregate(&InputRow::new(0).with("x", 2)).unwrap();
//! assert_eq!(total.get_long(), 3);
//! ```

pub mod aggregator;
pub mod factory;
pub mod kinds;
pub mod sketch;

pub use aggregator::Aggregator;
pub use factory::{AggregatorFactory, AggregatorKind, DEFAULT_MAX_STRING_BYTES};
pub use sketch::CardinalityEstimator;
