//! Concrete aggregator implementations
//!
//! Null handling is uniform: sums, extrema, first/last and any skip null
//! inputs, `count` counts every row, and `is_null` stays true until a
//! non-null value has been folded. Coercion errors leave state untouched.

use std::sync::Arc;

use crate::aggregation::aggregator::Aggregator;
use crate::aggregation::sketch::CardinalityEstimator;
use crate::error::AggregateError;
use crate::selector::ColumnSelector;
use crate::types::{InputRow, MetricValue, Value};

// ============================================================================
// Count
// ============================================================================

/// Counts every row folded into the fact
#[derive(Debug, Default)]
pub struct CountAggregator {
    count: i64,
}

impl CountAggregator {
    /// Create a zeroed counter
    pub fn new() -> Self {
        Self::default()
    }
}

impl Aggregator for CountAggregator {
    fn aggregate(&mut self, _row: &InputRow) -> Result<(), AggregateError> {
        self.count += 1;
        Ok(())
    }

    fn get(&self) -> MetricValue {
        MetricValue::Long(self.count)
    }

    fn get_long(&self) -> i64 {
        self.count
    }

    fn get_double(&self) -> f64 {
        self.count as f64
    }
}

// ============================================================================
// Sums
// ============================================================================

/// Wrapping i64 sum
#[derive(Debug)]
pub struct LongSumAggregator {
    selector: Arc<ColumnSelector>,
    sum: i64,
    seen: bool,
}

impl LongSumAggregator {
    /// Sum `selector`'s column as i64
    pub fn new(selector: Arc<ColumnSelector>) -> Self {
        Self {
            selector,
            sum: 0,
            seen: false,
        }
    }
}

impl Aggregator for LongSumAggregator {
    fn aggregate(&mut self, row: &InputRow) -> Result<(), AggregateError> {
        if let Some(v) = self.selector.get_long(row)? {
            self.sum = self.sum.wrapping_add(v);
            self.seen = true;
        }
        Ok(())
    }

    fn get(&self) -> MetricValue {
        if self.seen {
            MetricValue::Long(self.sum)
        } else {
            MetricValue::Null
        }
    }

    fn get_long(&self) -> i64 {
        self.sum
    }

    fn get_double(&self) -> f64 {
        self.sum as f64
    }

    fn is_null(&self) -> bool {
        !self.seen
    }
}

/// f64 sum
#[derive(Debug)]
pub struct DoubleSumAggregator {
    selector: Arc<ColumnSelector>,
    sum: f64,
    seen: bool,
}

impl DoubleSumAggregator {
    /// Sum `selector`'s column as f64
    pub fn new(selector: Arc<ColumnSelector>) -> Self {
        Self {
            selector,
            sum: 0.0,
            seen: false,
        }
    }
}

impl Aggregator for DoubleSumAggregator {
    fn aggregate(&mut self, row: &InputRow) -> Result<(), AggregateError> {
        if let Some(v) = self.selector.get_double(row)? {
            self.sum += v;
            self.seen = true;
        }
        Ok(())
    }

    fn get(&self) -> MetricValue {
        if self.seen {
            MetricValue::Double(self.sum)
        } else {
            MetricValue::Null
        }
    }

    fn get_long(&self) -> i64 {
        self.sum as i64
    }

    fn get_double(&self) -> f64 {
        self.sum
    }

    fn is_null(&self) -> bool {
        !self.seen
    }
}

/// f32 sum
#[derive(Debug)]
pub struct FloatSumAggregator {
    selector: Arc<ColumnSelector>,
    sum: f32,
    seen: bool,
}

impl FloatSumAggregator {
    /// Sum `selector`'s column as f32
    pub fn new(selector: Arc<ColumnSelector>) -> Self {
        Self {
            selector,
            sum: 0.0,
            seen: false,
        }
    }
}

impl Aggregator for FloatSumAggregator {
    fn aggregate(&mut self, row: &InputRow) -> Result<(), AggregateError> {
        if let Some(v) = self.selector.get_double(row)? {
            self.sum += v as f32;
            self.seen = true;
        }
        Ok(())
    }

    fn get(&self) -> MetricValue {
        if self.seen {
            MetricValue::Float(self.sum)
        } else {
            MetricValue::Null
        }
    }

    fn get_long(&self) -> i64 {
        self.sum as i64
    }

    fn get_float(&self) -> f32 {
        self.sum
    }

    fn get_double(&self) -> f64 {
        self.sum as f64
    }

    fn is_null(&self) -> bool {
        !self.seen
    }
}

// ============================================================================
// Min / Max
// ============================================================================

/// Which end of the ordering an extremum aggregator keeps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extremum {
    /// Keep the smallest value
    Min,
    /// Keep the largest value
    Max,
}

impl Extremum {
    fn pick_long(self, current: i64, candidate: i64) -> i64 {
        match self {
            Extremum::Min => current.min(candidate),
            Extremum::Max => current.max(candidate),
        }
    }

    /// NaN on either side wins, unlike `f64::min`/`f64::max`
    fn pick_double(self, current: f64, candidate: f64) -> f64 {
        if current.is_nan() || candidate.is_nan() {
            return f64::NAN;
        }
        match self {
            Extremum::Min => current.min(candidate),
            Extremum::Max => current.max(candidate),
        }
    }
}

/// i64 min or max
#[derive(Debug)]
pub struct LongExtremumAggregator {
    selector: Arc<ColumnSelector>,
    extremum: Extremum,
    value: Option<i64>,
}

impl LongExtremumAggregator {
    /// Track the `extremum` of `selector`'s column as i64
    pub fn new(selector: Arc<ColumnSelector>, extremum: Extremum) -> Self {
        Self {
            selector,
            extremum,
            value: None,
        }
    }
}

impl Aggregator for LongExtremumAggregator {
    fn aggregate(&mut self, row: &InputRow) -> Result<(), AggregateError> {
        if let Some(v) = self.selector.get_long(row)? {
            self.value = Some(match self.value {
                Some(current) => self.extremum.pick_long(current, v),
                None => v,
            });
        }
        Ok(())
    }

    fn get(&self) -> MetricValue {
        self.value.map_or(MetricValue::Null, MetricValue::Long)
    }

    fn get_long(&self) -> i64 {
        self.value.unwrap_or(0)
    }

    fn get_double(&self) -> f64 {
        self.get_long() as f64
    }

    fn is_null(&self) -> bool {
        self.value.is_none()
    }
}

/// f64 min or max
#[derive(Debug)]
pub struct DoubleExtremumAggregator {
    selector: Arc<ColumnSelector>,
    extremum: Extremum,
    value: Option<f64>,
}

impl DoubleExtremumAggregator {
    /// Track the `extremum` of `selector`'s column as f64
    pub fn new(selector: Arc<ColumnSelector>, extremum: Extremum) -> Self {
        Self {
            selector,
            extremum,
            value: None,
        }
    }
}

impl Aggregator for DoubleExtremumAggregator {
    fn aggregate(&mut self, row: &InputRow) -> Result<(), AggregateError> {
        if let Some(v) = self.selector.get_double(row)? {
            self.value = Some(match self.value {
                Some(current) => self.extremum.pick_double(current, v),
                None => v,
            });
        }
        Ok(())
    }

    fn get(&self) -> MetricValue {
        self.value.map_or(MetricValue::Null, MetricValue::Double)
    }

    fn get_long(&self) -> i64 {
        self.get_double() as i64
    }

    fn get_double(&self) -> f64 {
        self.value.unwrap_or(0.0)
    }

    fn is_null(&self) -> bool {
        self.value.is_none()
    }
}

// ============================================================================
// First / Last / Any
// ============================================================================

/// Which event a time-ordered aggregator keeps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeOrder {
    /// Earliest event time; ties keep the first folded
    First,
    /// Latest event time; ties keep the last folded
    Last,
}

impl TimeOrder {
    /// Whether an event at `candidate` replaces the one held at `held`
    fn replaces(self, held: Option<i64>, candidate: i64) -> bool {
        match (self, held) {
            (_, None) => true,
            (TimeOrder::First, Some(t)) => candidate < t,
            (TimeOrder::Last, Some(t)) => candidate >= t,
        }
    }
}

/// Numeric payload of a first/last/any aggregator
pub trait NumericCell: Copy + Send + std::fmt::Debug + 'static {
    /// Read and coerce the column; `Ok(None)` for null
    fn read(selector: &ColumnSelector, row: &InputRow) -> Result<Option<Self>, AggregateError>;
    /// Object form
    fn to_metric(self) -> MetricValue;
    /// i64 view
    fn to_long(self) -> i64;
    /// f64 view
    fn to_double(self) -> f64;
}

impl NumericCell for i64 {
    fn read(selector: &ColumnSelector, row: &InputRow) -> Result<Option<Self>, AggregateError> {
        selector.get_long(row)
    }

    fn to_metric(self) -> MetricValue {
        MetricValue::Long(self)
    }

    fn to_long(self) -> i64 {
        self
    }

    fn to_double(self) -> f64 {
        self as f64
    }
}

impl NumericCell for f64 {
    fn read(selector: &ColumnSelector, row: &InputRow) -> Result<Option<Self>, AggregateError> {
        selector.get_double(row)
    }

    fn to_metric(self) -> MetricValue {
        MetricValue::Double(self)
    }

    fn to_long(self) -> i64 {
        self as i64
    }

    fn to_double(self) -> f64 {
        self
    }
}

/// Numeric first/last by event timestamp
///
/// Compares the row's original event time, not the bucketed fact time, so
/// ordering inside one bucket is preserved.
#[derive(Debug)]
pub struct NumericTimeOrderedAggregator<T> {
    selector: Arc<ColumnSelector>,
    order: TimeOrder,
    time: Option<i64>,
    value: Option<T>,
}

/// i64 first/last
pub type LongTimeOrderedAggregator = NumericTimeOrderedAggregator<i64>;

/// f64 first/last
pub type DoubleTimeOrderedAggregator = NumericTimeOrderedAggregator<f64>;

impl<T: NumericCell> NumericTimeOrderedAggregator<T> {
    /// Keep the `order` value of `selector`'s column
    pub fn new(selector: Arc<ColumnSelector>, order: TimeOrder) -> Self {
        Self {
            selector,
            order,
            time: None,
            value: None,
        }
    }
}

impl<T: NumericCell> Aggregator for NumericTimeOrderedAggregator<T> {
    fn aggregate(&mut self, row: &InputRow) -> Result<(), AggregateError> {
        if !self.order.replaces(self.time, row.timestamp) {
            return Ok(());
        }
        // A null event still claims the slot; the result becomes null
        let value = T::read(&self.selector, row)?;
        self.time = Some(row.timestamp);
        self.value = value;
        Ok(())
    }

    fn get(&self) -> MetricValue {
        self.value.map_or(MetricValue::Null, T::to_metric)
    }

    fn get_long(&self) -> i64 {
        self.value.map_or(0, T::to_long)
    }

    fn get_double(&self) -> f64 {
        self.value.map_or(0.0, T::to_double)
    }

    fn is_null(&self) -> bool {
        self.value.is_none()
    }
}

/// String first/last by event timestamp, truncated to `max_string_bytes`
#[derive(Debug)]
pub struct StringTimeOrderedAggregator {
    selector: Arc<ColumnSelector>,
    order: TimeOrder,
    max_string_bytes: usize,
    time: Option<i64>,
    value: Option<String>,
}

impl StringTimeOrderedAggregator {
    /// Keep the `order` value of `selector`'s column as a string
    pub fn new(selector: Arc<ColumnSelector>, order: TimeOrder, max_string_bytes: usize) -> Self {
        Self {
            selector,
            order,
            max_string_bytes,
            time: None,
            value: None,
        }
    }
}

/// Cut `s` to at most `max_bytes`, backing off to a char boundary
pub(crate) fn truncate_utf8(mut s: String, max_bytes: usize) -> String {
    if s.len() > max_bytes {
        let mut end = max_bytes;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        s.truncate(end);
    }
    s
}

impl Aggregator for StringTimeOrderedAggregator {
    fn aggregate(&mut self, row: &InputRow) -> Result<(), AggregateError> {
        if !self.order.replaces(self.time, row.timestamp) {
            return Ok(());
        }
        self.time = Some(row.timestamp);
        self.value = self
            .selector
            .get_string(row)
            .map(|s| truncate_utf8(s, self.max_string_bytes));
        Ok(())
    }

    fn get(&self) -> MetricValue {
        self.value
            .as_ref()
            .map_or(MetricValue::Null, |s| MetricValue::String(s.clone()))
    }

    fn get_long(&self) -> i64 {
        self.value
            .as_deref()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0)
    }

    fn get_double(&self) -> f64 {
        self.value
            .as_deref()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0.0)
    }

    fn is_null(&self) -> bool {
        self.value.is_none()
    }

    fn close(&mut self) {
        self.value = None;
    }
}

/// Keeps the first non-null value in arrival order
#[derive(Debug)]
pub struct NumericAnyAggregator<T: NumericCell> {
    selector: Arc<ColumnSelector>,
    value: Option<T>,
}

/// i64 any
pub type LongAnyAggregator = NumericAnyAggregator<i64>;

/// f64 any
pub type DoubleAnyAggregator = NumericAnyAggregator<f64>;

impl<T: NumericCell> NumericAnyAggregator<T> {
    /// Keep any one value of `selector`'s column
    pub fn new(selector: Arc<ColumnSelector>) -> Self {
        Self {
            selector,
            value: None,
        }
    }
}

impl<T: NumericCell> Aggregator for NumericAnyAggregator<T> {
    fn aggregate(&mut self, row: &InputRow) -> Result<(), AggregateError> {
        if self.value.is_none() {
            self.value = T::read(&self.selector, row)?;
        }
        Ok(())
    }

    fn get(&self) -> MetricValue {
        self.value.map_or(MetricValue::Null, T::to_metric)
    }

    fn get_long(&self) -> i64 {
        self.value.map_or(0, T::to_long)
    }

    fn get_double(&self) -> f64 {
        self.value.map_or(0.0, T::to_double)
    }

    fn is_null(&self) -> bool {
        self.value.is_none()
    }
}

// ============================================================================
// Cardinality
// ============================================================================

/// Approximate distinct count over one or more columns
///
/// By value, each non-null element of each column is hashed separately. By
/// row, the tuple of all column values is hashed as one element.
#[derive(Debug)]
pub struct CardinalityAggregator {
    selectors: Vec<Arc<ColumnSelector>>,
    by_row: bool,
    sketch: CardinalityEstimator,
}

impl CardinalityAggregator {
    /// Estimate distinct values across `selectors`
    pub fn new(selectors: Vec<Arc<ColumnSelector>>, by_row: bool, sketch: CardinalityEstimator) -> Self {
        Self {
            selectors,
            by_row,
            sketch,
        }
    }
}

impl Aggregator for CardinalityAggregator {
    fn aggregate(&mut self, row: &InputRow) -> Result<(), AggregateError> {
        if self.by_row {
            let mut tuple: Vec<String> = Vec::with_capacity(self.selectors.len());
            for selector in &self.selectors {
                tuple.push(match selector.value(row) {
                    Value::Null => String::new(),
                    Value::List(values) => {
                        let mut sorted = values.clone();
                        sorted.sort();
                        sorted.join("\u{1}")
                    },
                    other => other.to_string(),
                });
            }
            self.sketch.add(&tuple);
            return Ok(());
        }

        for selector in &self.selectors {
            match selector.value(row) {
                Value::Null => {},
                Value::List(values) => values.iter().for_each(|v| self.sketch.add(v.as_str())),
                Value::String(s) => self.sketch.add(s.as_str()),
                other => self.sketch.add(other.to_string().as_str()),
            }
        }
        Ok(())
    }

    fn get(&self) -> MetricValue {
        MetricValue::Long(self.sketch.estimate() as i64)
    }

    fn get_long(&self) -> i64 {
        self.sketch.estimate() as i64
    }

    fn get_double(&self) -> f64 {
        self.sketch.estimate() as f64
    }

    fn close(&mut self) {
        self.sketch.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sel(name: &str) -> Arc<ColumnSelector> {
        Arc::new(ColumnSelector::new(name))
    }

    #[test]
    fn test_count_counts_null_rows() {
        let mut agg = CountAggregator::new();
        agg.aggregate(&InputRow::new(0)).unwrap();
        agg.aggregate(&InputRow::new(0).with("x", 1)).unwrap();
        assert_eq!(agg.get_long(), 2);
        assert!(!agg.is_null());
    }

    #[test]
    fn test_long_sum_skips_null_and_keeps_state_on_error() {
        let mut agg = LongSumAggregator::new(sel("x"));
        assert!(agg.is_null());
        agg.aggregate(&InputRow::new(0).with("x", 5)).unwrap();
        agg.aggregate(&InputRow::new(0)).unwrap();
        assert!(agg.aggregate(&InputRow::new(0).with("x", "oops")).is_err());
        agg.aggregate(&InputRow::new(0).with("x", "3")).unwrap();
        assert_eq!(agg.get(), MetricValue::Long(8));
    }

    #[test]
    fn test_float_sum_reads_as_float() {
        let mut agg = FloatSumAggregator::new(sel("x"));
        agg.aggregate(&InputRow::new(0).with("x", 1.25)).unwrap();
        agg.aggregate(&InputRow::new(0).with("x", 2)).unwrap();
        assert_eq!(agg.get_float(), 3.25);
        assert_eq!(agg.get(), MetricValue::Float(3.25));
    }

    #[test]
    fn test_extrema() {
        let mut min = LongExtremumAggregator::new(sel("x"), Extremum::Min);
        let mut max = DoubleExtremumAggregator::new(sel("x"), Extremum::Max);
        for v in [4, -2, 9] {
            let row = InputRow::new(0).with("x", v);
            min.aggregate(&row).unwrap();
            max.aggregate(&row).unwrap();
        }
        assert_eq!(min.get_long(), -2);
        assert_eq!(max.get_double(), 9.0);
    }

    #[test]
    fn test_first_uses_event_time_not_arrival() {
        let mut first = LongTimeOrderedAggregator::new(sel("x"), TimeOrder::First);
        first.aggregate(&InputRow::new(10).with("x", 1)).unwrap();
        first.aggregate(&InputRow::new(5).with("x", 2)).unwrap();
        first.aggregate(&InputRow::new(5).with("x", 3)).unwrap();
        assert_eq!(first.get_long(), 2);
    }

    #[test]
    fn test_last_ties_keep_latest_fold() {
        let mut last = DoubleTimeOrderedAggregator::new(sel("x"), TimeOrder::Last);
        last.aggregate(&InputRow::new(50).with("x", 1.0)).unwrap();
        last.aggregate(&InputRow::new(10).with("x", 2.0)).unwrap();
        assert_eq!(last.get_double(), 1.0);
        last.aggregate(&InputRow::new(50).with("x", 3.0)).unwrap();
        assert_eq!(last.get_double(), 3.0);
    }

    #[test]
    fn test_last_null_event_at_later_time_wins() {
        let mut last = LongTimeOrderedAggregator::new(sel("x"), TimeOrder::Last);
        last.aggregate(&InputRow::new(10).with("x", 7)).unwrap();
        last.aggregate(&InputRow::new(50)).unwrap();
        assert!(last.is_null());
        assert_eq!(last.get(), MetricValue::Null);
        // An older non-null event does not displace the newer null
        last.aggregate(&InputRow::new(20).with("x", 9)).unwrap();
        assert!(last.is_null());
        last.aggregate(&InputRow::new(60).with("x", 3)).unwrap();
        assert_eq!(last.get(), MetricValue::Long(3));
    }

    #[test]
    fn test_first_null_event_at_earlier_time_wins() {
        let mut first = StringTimeOrderedAggregator::new(sel("s"), TimeOrder::First, 16);
        first.aggregate(&InputRow::new(10).with("s", "late")).unwrap();
        first.aggregate(&InputRow::new(5)).unwrap();
        assert!(first.is_null());
        first.aggregate(&InputRow::new(7).with("s", "mid")).unwrap();
        assert_eq!(first.get(), MetricValue::Null);
    }

    #[test]
    fn test_double_extrema_propagate_nan() {
        let mut min = DoubleExtremumAggregator::new(sel("x"), Extremum::Min);
        let mut max = DoubleExtremumAggregator::new(sel("x"), Extremum::Max);
        for v in [Value::from(1.0), Value::from("NaN"), Value::from(5.0)] {
            let row = InputRow::new(0).with("x", v);
            min.aggregate(&row).unwrap();
            max.aggregate(&row).unwrap();
        }
        assert!(min.get_double().is_nan());
        assert!(max.get_double().is_nan());
    }

    #[test]
    fn test_string_last_truncates_on_char_boundary() {
        let mut last = StringTimeOrderedAggregator::new(sel("s"), TimeOrder::Last, 4);
        last.aggregate(&InputRow::new(1).with("s", "héllo")).unwrap();
        assert_eq!(last.get(), MetricValue::String("hél".to_string()));
        last.close();
        assert!(last.is_null());
    }

    #[test]
    fn test_any_keeps_first_non_null() {
        let mut any = LongAnyAggregator::new(sel("x"));
        any.aggregate(&InputRow::new(0)).unwrap();
        any.aggregate(&InputRow::new(0).with("x", 7)).unwrap();
        any.aggregate(&InputRow::new(0).with("x", 8)).unwrap();
        assert_eq!(any.get(), MetricValue::Long(7));
    }

    #[test]
    fn test_cardinality_by_value_and_by_row() {
        let mut by_value = CardinalityAggregator::new(
            vec![sel("a"), sel("b")],
            false,
            CardinalityEstimator::new(64).unwrap(),
        );
        let mut by_row = CardinalityAggregator::new(
            vec![sel("a"), sel("b")],
            true,
            CardinalityEstimator::new(64).unwrap(),
        );
        for (a, b) in [("x", "y"), ("y", "x"), ("x", "y")] {
            let row = InputRow::new(0).with("a", a).with("b", b);
            by_value.aggregate(&row).unwrap();
            by_row.aggregate(&row).unwrap();
        }
        assert_eq!(by_value.get_long(), 2);
        assert_eq!(by_row.get_long(), 2);
    }
}
