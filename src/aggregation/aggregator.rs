//! The aggregator capability set
//!
//! Every metric kind implements one flat trait. The index holds each
//! aggregator behind its own mutex, so implementations are plain `&mut self`
//! state machines and never synchronize internally.

use std::fmt;

use crate::error::AggregateError;
use crate::types::{InputRow, MetricValue};

/// A stateful accumulator bound to one metric definition
///
/// Created by `AggregatorFactory::factorize` against the index's cached
/// column selectors, then folded once per row that lands in its fact.
pub trait Aggregator: Send + fmt::Debug {
    /// Fold one row into the running aggregate
    ///
    /// A returned error means this row contributed nothing to this metric;
    /// the aggregate state must be left unchanged.
    fn aggregate(&mut self, row: &InputRow) -> Result<(), AggregateError>;

    /// Current value as an object
    fn get(&self) -> MetricValue;

    /// Current value as i64
    fn get_long(&self) -> i64;

    /// Current value as f32
    fn get_float(&self) -> f32 {
        self.get_double() as f32
    }

    /// Current value as f64
    fn get_double(&self) -> f64;

    /// Whether no value has been aggregated yet
    fn is_null(&self) -> bool {
        false
    }

    /// Release held resources; the aggregator is not used afterwards
    fn close(&mut self) {}
}
