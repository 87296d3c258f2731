//! In-memory rollup index
//!
//! `IncrementalIndex` buffers rows for one ingestion interval. Rows with the
//! same bucketed timestamp and dimension values fold into one fact; each fact
//! owns an array of aggregators, one per metric.
//!
//! # Architecture
//!
//! ```text
//! InputRow ──► RowKey ──► FactsHolder ──► slot index ──► SlotStore
//!  (fields)   (bucketed     (sorted /        (u32)       [Mutex<Aggregator>; M]
//!              ts + dims)    unsorted /
//!                            plain)
//! ```
//!
//! # Insertion
//!
//! A lookup hit folds straight into the existing slot. A miss builds a
//! tentative slot, folds the row into it, then races to publish it:
//!
//! - **Published**: this writer won; row and byte counters advance
//! - **FoldedAndDiscarded**: another writer published first; the row is
//!   folded into the winner and the tentative slot is dropped
//! - **Rejected**: a capacity limit was reached before publishing
//!
//! # Thread Safety
//!
//! Any number of writers and readers may share one index through `Arc`.
//! Aggregators are the unit of locking; there is no index-wide lock on the
//! write path. `close` must not race with `add`.
//!
//! # Example
//!
//! ```rust
//! use kuba_rollup::aggregation::AggregatorFactory;
//! use kuba_rollup::config::{IndexConfig, IndexSchema};
//! use kuba_rollup::index::{DimensionSchema, IncrementalIndex};
//! use kuba_rollup::types::InputRow;
//!
//! let schema = IndexSchema {
//!     metrics: vec![
//!         AggregatorFactory::count("count"),
//!         AggregatorFactory::long_sum("x", "x"),
//!     ],
//!     dimensions: vec![DimensionSchema::string("city")],
//!     ..IndexSchema::default()
//! };
//! let index = IncrementalIndex::new(schema, IndexConfig::default()).unwrap();
//!
//! index.add(&InputRow::new(0).with("city", "NY").with("x", 1)).unwrap();
//! index.add(&InputRow::new(0).with("city", "NY").with("x", 2)).unwrap();
//!
//! assert_eq!(index.size(), 1);
//! assert_eq!(index.get_metric_long(0, 1), Some(3));
//! ```

pub mod accounting;
pub mod dimension;
pub mod facts;
pub mod row_key;
pub mod slots;

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::aggregation::Aggregator;
use crate::config::{IndexConfig, IndexSchema, RollupConfig};
use crate::error::{Error, Result};
use crate::metrics::{self, AddOutcome};
use crate::selector::{ColumnSelector, SelectorCache};
use crate::types::{InputRow, MetricValue, TimeRange, Value};

pub use accounting::{Accounting, DEFAULT_ENTRY_OVERHEAD_BYTES};
pub use dimension::{DimensionColumn, DimensionDictionary, DimensionKind, DimensionSchema};
pub use facts::{FactEntry, FactIter, FactsHolder};
pub use row_key::{DimensionValue, RowKey};
pub use slots::{Slot, SlotStore};

/// Totals after a successful `add`
#[derive(Debug, Clone, PartialEq)]
pub struct AddRowResult {
    /// Facts in the index
    pub row_count: usize,
    /// Estimated bytes held by the index
    pub bytes_in_memory: u64,
    /// Values that could not be aggregated or converted
    pub parse_warnings: Vec<String>,
    /// How the row was absorbed
    pub outcome: AddOutcome,
}

/// Materialized fact for persistence
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Row {
    /// Bucketed timestamp
    pub timestamp: i64,
    /// Dimension values by name
    pub dimensions: BTreeMap<String, Value>,
    /// Final metric values by name
    pub metrics: BTreeMap<String, MetricValue>,
}

/// Result of racing a tentative slot into the fact table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Insertion {
    Published,
    FoldedAndDiscarded,
    Rejected,
}

/// Concurrent in-memory rollup index
#[derive(Debug)]
pub struct IncrementalIndex {
    schema: IndexSchema,
    config: IndexConfig,
    metric_names: Vec<String>,
    metric_positions: HashMap<String, usize>,
    dimensions: Vec<DimensionColumn>,
    dimension_positions: HashMap<String, usize>,
    selectors: SelectorCache,
    facts: Box<dyn FactsHolder>,
    slots: SlotStore,
    accounting: Accounting,
    min_time: AtomicI64,
    max_time: AtomicI64,
    closed: AtomicBool,
}

impl IncrementalIndex {
    /// Create an empty index, validating schema and config
    pub fn new(schema: IndexSchema, config: IndexConfig) -> Result<Self> {
        schema.validate()?;
        config.validate()?;

        let metric_names = schema.metric_names();
        let metric_positions = metric_names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        let dimensions: Vec<DimensionColumn> = schema
            .dimensions
            .iter()
            .cloned()
            .map(DimensionColumn::new)
            .collect();
        let dimension_positions = dimensions
            .iter()
            .enumerate()
            .map(|(i, col)| (col.name().to_string(), i))
            .collect();
        let accounting = Accounting::new(
            config.max_row_count,
            config.max_bytes_in_memory,
            config.entry_overhead_bytes,
            &schema.metrics,
        );

        info!(
            metrics = metric_names.len(),
            dimensions = dimensions.len(),
            rollup = schema.rollup,
            max_row_count = config.max_row_count,
            max_bytes_in_memory = config.max_bytes_in_memory,
            concurrent = config.concurrent_event_add,
            "Created incremental index"
        );
        metrics::record_index_opened();

        Ok(Self {
            facts: facts::facts_holder(schema.rollup, config.sort_facts),
            selectors: SelectorCache::new(config.concurrent_event_add),
            slots: SlotStore::new(),
            min_time: AtomicI64::new(i64::MAX),
            max_time: AtomicI64::new(i64::MIN),
            closed: AtomicBool::new(false),
            metric_names,
            metric_positions,
            dimensions,
            dimension_positions,
            accounting,
            schema,
            config,
        })
    }

    /// Create an index from a loaded configuration file
    pub fn from_config(config: &RollupConfig) -> Result<Self> {
        Self::new(config.schema.clone(), config.index.clone())
    }

    // ========================================================================
    // Ingestion
    // ========================================================================

    /// Add one row, enforcing capacity limits on new facts
    pub fn add(&self, row: &InputRow) -> Result<AddRowResult> {
        self.add_with_options(row, false)
    }

    /// Add one row, optionally skipping the capacity check
    pub fn add_with_options(&self, row: &InputRow, skip_max_rows_check: bool) -> Result<AddRowResult> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::Closed);
        }
        if let Some(min_timestamp) = self.schema.min_timestamp {
            if row.timestamp < min_timestamp {
                return Err(Error::TimestampOutOfRange {
                    timestamp: row.timestamp,
                    min_timestamp,
                });
            }
        }

        let start = Instant::now();
        let mut parse_warnings = Vec::new();
        let key = self.to_row_key(row, &mut parse_warnings);

        let outcome = match self.facts.prior_index(&key) {
            Some(row_index) => {
                self.fold_into(row_index, row, &mut parse_warnings);
                AddOutcome::Folded
            },
            None => match self.insert_new(key, row, skip_max_rows_check, &mut parse_warnings)? {
                Insertion::Published => AddOutcome::NewFact,
                Insertion::FoldedAndDiscarded => AddOutcome::RaceLost,
                Insertion::Rejected => {
                    metrics::record_add(AddOutcome::Rejected, start.elapsed().as_secs_f64(), 0);
                    warn!(
                        timestamp = row.timestamp,
                        max_row_count = self.accounting.max_row_count(),
                        max_bytes_in_memory = self.accounting.max_bytes_in_memory(),
                        "Rejected new fact: index is full"
                    );
                    return Err(Error::CapacityExceeded {
                        max_row_count: self.accounting.max_row_count(),
                        max_bytes_in_memory: self.accounting.max_bytes_in_memory(),
                    });
                },
            },
        };

        metrics::record_add(outcome, start.elapsed().as_secs_f64(), parse_warnings.len());
        let (row_count, bytes_in_memory) = self.accounting.totals();
        Ok(AddRowResult {
            row_count,
            bytes_in_memory,
            parse_warnings,
            outcome,
        })
    }

    fn to_row_key(&self, row: &InputRow, parse_warnings: &mut Vec<String>) -> RowKey {
        let timestamp = self.schema.query_granularity.truncate(row.timestamp);
        let dims = self
            .dimensions
            .iter()
            .map(|col| {
                let (value, warning) = col.convert(row.get(col.name()));
                if let Some(warning) = warning {
                    debug!(dimension = col.name(), warning = %warning, "Failed to convert dimension");
                    parse_warnings.push(warning);
                }
                value
            })
            .collect();
        RowKey::new(timestamp, dims)
    }

    fn fold_into(&self, row_index: u32, row: &InputRow, parse_warnings: &mut Vec<String>) {
        // A published slot is only missing once close() has run
        if let Some(slot) = self.slots.get(row_index) {
            slot.fold(row, &self.metric_names, parse_warnings);
        }
    }

    fn factorize_slot(&self) -> Result<Slot> {
        let aggregators = self
            .schema
            .metrics
            .iter()
            .map(|m| m.factorize(&self.selectors))
            .collect::<std::result::Result<Vec<Box<dyn Aggregator>>, _>>()?;
        Ok(Slot::new(aggregators))
    }

    fn insert_new(
        &self,
        key: RowKey,
        row: &InputRow,
        skip_max_rows_check: bool,
        parse_warnings: &mut Vec<String>,
    ) -> Result<Insertion> {
        let slot = self.factorize_slot()?;
        let tentative_warnings = parse_warnings.len();
        slot.fold(row, &self.metric_names, parse_warnings);

        let Some(row_index) = self.slots.reserve() else {
            return Ok(Insertion::Rejected);
        };
        self.slots.insert(row_index, Arc::new(slot));

        if !skip_max_rows_check && self.accounting.is_full() && self.facts.prior_index(&key).is_none() {
            self.slots.remove(row_index);
            return Ok(Insertion::Rejected);
        }

        let timestamp = key.timestamp();
        let row_bytes = self.accounting.estimate_row_size_in_bytes(&key);
        match self.facts.put_if_absent(key, row_index) {
            None => {
                // Time bounds first so a non-zero size always has valid bounds
                self.min_time.fetch_min(timestamp, Ordering::AcqRel);
                self.max_time.fetch_max(timestamp, Ordering::AcqRel);
                self.accounting.register(row_bytes);
                metrics::record_new_fact(row_bytes);
                Ok(Insertion::Published)
            },
            Some(winner) => {
                debug!(row_index, winner, "Lost insert race, folding into published fact");
                self.slots.remove(row_index);
                parse_warnings.truncate(tentative_warnings);
                self.fold_into(winner, row, parse_warnings);
                Ok(Insertion::FoldedAndDiscarded)
            },
        }
    }

    // ========================================================================
    // Capacity
    // ========================================================================

    /// Advisory capacity check
    ///
    /// When this returns false, `out_of_rows_reason` explains which limit
    /// was reached. `add` re-checks authoritatively.
    pub fn can_append_row(&self) -> bool {
        self.accounting.can_append_row()
    }

    /// Reason recorded by the last failed `can_append_row`
    pub fn out_of_rows_reason(&self) -> Option<String> {
        self.accounting.out_of_rows_reason()
    }

    /// Estimated bytes a new fact for `key` would add
    pub fn estimate_row_size_in_bytes(&self, key: &RowKey) -> u64 {
        self.accounting.estimate_row_size_in_bytes(key)
    }

    // ========================================================================
    // Read access
    // ========================================================================

    fn with_aggregator<R>(
        &self,
        row_offset: u32,
        metric_offset: usize,
        f: impl FnOnce(&dyn Aggregator) -> R,
    ) -> Option<R> {
        self.slots.get(row_offset)?.with_aggregator(metric_offset, f)
    }

    /// Metric value as an object
    pub fn get_metric_value(&self, row_offset: u32, metric_offset: usize) -> Option<MetricValue> {
        self.with_aggregator(row_offset, metric_offset, |a| a.get())
    }

    /// Metric value as i64
    pub fn get_metric_long(&self, row_offset: u32, metric_offset: usize) -> Option<i64> {
        self.with_aggregator(row_offset, metric_offset, |a| a.get_long())
    }

    /// Metric value as f32
    pub fn get_metric_float(&self, row_offset: u32, metric_offset: usize) -> Option<f32> {
        self.with_aggregator(row_offset, metric_offset, |a| a.get_float())
    }

    /// Metric value as f64
    pub fn get_metric_double(&self, row_offset: u32, metric_offset: usize) -> Option<f64> {
        self.with_aggregator(row_offset, metric_offset, |a| a.get_double())
    }

    /// Whether the metric has not seen a non-null value
    pub fn is_null(&self, row_offset: u32, metric_offset: usize) -> Option<bool> {
        self.with_aggregator(row_offset, metric_offset, |a| a.is_null())
    }

    /// Cached selector for `column`
    pub fn resolve_selector(&self, column: &str) -> Arc<ColumnSelector> {
        self.selectors.resolve(column)
    }

    /// Published facts, in key order when facts are sorted
    pub fn facts(&self) -> FactIter<'_> {
        self.facts.iter(false)
    }

    /// Published facts with bucketed timestamp in `[start, end)`
    pub fn facts_in_range(&self, start: i64, end: i64, descending: bool) -> FactIter<'_> {
        self.facts.time_range(start, end, descending)
    }

    /// Materialize every fact with its final metric values
    pub fn rows(&self, descending: bool) -> Vec<Row> {
        self.facts
            .iter(descending)
            .filter_map(|fact| self.materialize(&fact))
            .collect()
    }

    fn materialize(&self, fact: &FactEntry) -> Option<Row> {
        let slot = self.slots.get(fact.row_index)?;
        let dimensions = self
            .dimensions
            .iter()
            .zip(fact.key.dims())
            .map(|(col, value)| (col.name().to_string(), value.to_value()))
            .collect();
        let metrics = self
            .metric_names
            .iter()
            .enumerate()
            .filter_map(|(i, name)| slot.with_aggregator(i, |a| (name.clone(), a.get())))
            .collect();
        Some(Row {
            timestamp: fact.key.timestamp(),
            dimensions,
            metrics,
        })
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    /// Number of facts
    pub fn size(&self) -> usize {
        self.accounting.totals().0
    }

    /// True when no fact has been published
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Estimated bytes held
    pub fn bytes_in_memory(&self) -> u64 {
        self.accounting.totals().1
    }

    /// Highest slot index handed out, including discarded tentative slots
    pub fn last_row_index(&self) -> Option<u32> {
        self.slots.last_index()
    }

    /// Earliest bucketed timestamp
    pub fn min_time(&self) -> Option<i64> {
        if self.is_empty() {
            return None;
        }
        Some(self.min_time.load(Ordering::Acquire))
    }

    /// Latest bucketed timestamp
    pub fn max_time(&self) -> Option<i64> {
        if self.is_empty() {
            return None;
        }
        Some(self.max_time.load(Ordering::Acquire))
    }

    /// Time covered by the facts, through the end of the last bucket
    pub fn interval(&self) -> Option<TimeRange> {
        let start = self.min_time()?;
        let end = self
            .schema
            .query_granularity
            .bucket_end(self.max_time()?)
            .saturating_sub(1);
        Some(TimeRange {
            start,
            end: end.max(start),
        })
    }

    /// Metric names in schema order
    pub fn metric_names(&self) -> &[String] {
        &self.metric_names
    }

    /// Dimension names in schema order
    pub fn dimension_names(&self) -> Vec<&str> {
        self.dimensions.iter().map(DimensionColumn::name).collect()
    }

    /// Offset of a metric by name
    pub fn metric_index(&self, name: &str) -> Option<usize> {
        self.metric_positions.get(name).copied()
    }

    /// Distinct string values seen for a dimension
    pub fn dimension_cardinality(&self, name: &str) -> Option<usize> {
        self.dimension_positions
            .get(name)
            .map(|&i| self.dimensions[i].dictionary().cardinality())
    }

    /// Schema this index was built from
    pub fn schema(&self) -> &IndexSchema {
        &self.schema
    }

    /// Config this index was built from
    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Whether `close` has run
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    // ========================================================================
    // Teardown
    // ========================================================================

    /// Release every aggregator and clear all tables
    ///
    /// Must not race with `add`. Counters keep their final values so callers
    /// can still report what the index held. A second call is a no-op.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let (rows, bytes) = self.accounting.totals();
        let slots = self.slots.len();
        self.slots.close_all();
        self.facts.clear();
        self.selectors.clear();
        for col in &self.dimensions {
            col.dictionary().clear();
        }
        metrics::record_index_closed(rows, bytes);
        info!(rows, bytes, slots, "Closed incremental index");
    }
}

impl Drop for IncrementalIndex {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::AggregatorFactory;
    use crate::granularity::Granularity;

    fn schema() -> IndexSchema {
        IndexSchema {
            metrics: vec![
                AggregatorFactory::count("count"),
                AggregatorFactory::long_sum("x", "x"),
            ],
            dimensions: vec![DimensionSchema::string("city")],
            ..IndexSchema::default()
        }
    }

    fn row(ts: i64, city: &str, x: i64) -> InputRow {
        InputRow::new(ts).with("city", city).with("x", x)
    }

    #[test]
    fn test_rollup_scenario() {
        let index = IncrementalIndex::new(schema(), IndexConfig::default()).unwrap();
        index.add(&row(0, "NY", 1)).unwrap();
        index.add(&row(0, "NY", 2)).unwrap();
        let result = index.add(&row(0, "SF", 5)).unwrap();
        assert_eq!(result.row_count, 2);
        assert_eq!(result.outcome, AddOutcome::NewFact);

        let rows = index.rows(false);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].dimensions["city"], Value::String("NY".to_string()));
        assert_eq!(rows[0].metrics["count"], MetricValue::Long(2));
        assert_eq!(rows[0].metrics["x"], MetricValue::Long(3));
        assert_eq!(rows[1].metrics["count"], MetricValue::Long(1));
        assert_eq!(rows[1].metrics["x"], MetricValue::Long(5));
    }

    #[test]
    fn test_folds_do_not_move_counters() {
        let index = IncrementalIndex::new(schema(), IndexConfig::default()).unwrap();
        let first = index.add(&row(0, "NY", 1)).unwrap();
        let second = index.add(&row(0, "NY", 1)).unwrap();
        assert_eq!(second.outcome, AddOutcome::Folded);
        assert_eq!(first.row_count, second.row_count);
        assert_eq!(first.bytes_in_memory, second.bytes_in_memory);
        assert!(first.bytes_in_memory > 0);
    }

    #[test]
    fn test_capacity_enforced_only_for_new_keys() {
        let config = IndexConfig {
            max_row_count: 2,
            ..IndexConfig::default()
        };
        let index = IncrementalIndex::new(schema(), config).unwrap();
        index.add(&row(0, "A", 1)).unwrap();
        index.add(&row(0, "B", 1)).unwrap();
        assert!(!index.can_append_row());
        assert_eq!(
            index.out_of_rows_reason().as_deref(),
            Some("Maximum number of rows [2] reached")
        );

        assert!(index.add(&row(0, "A", 1)).is_ok());
        let err = index.add(&row(0, "C", 1)).unwrap_err();
        assert!(matches!(err, Error::CapacityExceeded { max_row_count: 2, .. }));
        assert_eq!(index.size(), 2);
        // The rejected tentative slot is gone
        assert_eq!(index.get_metric_long(index.last_row_index().unwrap(), 0), None);

        let forced = index.add_with_options(&row(0, "C", 1), true).unwrap();
        assert_eq!(forced.row_count, 3);
    }

    #[test]
    fn test_parse_warnings_do_not_reject_row() {
        let index = IncrementalIndex::new(schema(), IndexConfig::default()).unwrap();
        let result = index
            .add(&InputRow::new(0).with("city", "NY").with("x", "not a number"))
            .unwrap();
        assert_eq!(result.parse_warnings.len(), 1);
        assert_eq!(result.row_count, 1);
        assert_eq!(index.get_metric_long(0, 0), Some(1));
        assert_eq!(index.is_null(0, 1), Some(true));
    }

    #[test]
    fn test_granularity_buckets_rows() {
        let schema = IndexSchema {
            query_granularity: Granularity::Minute,
            ..schema()
        };
        let index = IncrementalIndex::new(schema, IndexConfig::default()).unwrap();
        index.add(&row(1_000, "NY", 1)).unwrap();
        index.add(&row(59_999, "NY", 1)).unwrap();
        index.add(&row(60_000, "NY", 1)).unwrap();
        assert_eq!(index.size(), 2);
        assert_eq!(index.min_time(), Some(0));
        assert_eq!(index.max_time(), Some(60_000));
        assert_eq!(index.interval(), Some(TimeRange { start: 0, end: 119_999 }));
    }

    #[test]
    fn test_plain_mode_keeps_every_row() {
        let schema = IndexSchema {
            rollup: false,
            ..schema()
        };
        let index = IncrementalIndex::new(schema, IndexConfig::default()).unwrap();
        index.add(&row(0, "NY", 1)).unwrap();
        index.add(&row(0, "NY", 2)).unwrap();
        assert_eq!(index.size(), 2);
        assert_eq!(index.facts().count(), 2);
    }

    #[test]
    fn test_min_timestamp_rejects_early_rows() {
        let schema = IndexSchema {
            min_timestamp: Some(100),
            ..schema()
        };
        let index = IncrementalIndex::new(schema, IndexConfig::default()).unwrap();
        assert!(matches!(
            index.add(&row(99, "NY", 1)),
            Err(Error::TimestampOutOfRange { timestamp: 99, min_timestamp: 100 })
        ));
        assert!(index.add(&row(100, "NY", 1)).is_ok());
    }

    #[test]
    fn test_readers_return_none_for_unknown_offsets() {
        let index = IncrementalIndex::new(schema(), IndexConfig::default()).unwrap();
        index.add(&row(0, "NY", 1)).unwrap();
        assert_eq!(index.get_metric_value(0, 1), Some(MetricValue::Long(1)));
        assert_eq!(index.get_metric_double(0, 1), Some(1.0));
        assert_eq!(index.get_metric_float(0, 1), Some(1.0));
        assert_eq!(index.get_metric_value(7, 0), None);
        assert_eq!(index.get_metric_value(0, 9), None);
    }

    #[test]
    fn test_close_is_idempotent_and_blocks_add() {
        let index = IncrementalIndex::new(schema(), IndexConfig::default()).unwrap();
        index.add(&row(0, "NY", 1)).unwrap();
        index.close();
        index.close();
        assert!(index.is_closed());
        assert!(matches!(index.add(&row(0, "NY", 1)), Err(Error::Closed)));
        assert_eq!(index.facts().count(), 0);
        assert_eq!(index.get_metric_long(0, 0), None);
        assert_eq!(index.dimension_cardinality("city"), Some(0));
    }

    #[test]
    fn test_lost_races_leave_no_slots_behind() {
        for sort_facts in [true, false] {
            let config = IndexConfig {
                sort_facts,
                ..IndexConfig::default()
            };
            let index = IncrementalIndex::new(schema(), config).unwrap();
            std::thread::scope(|scope| {
                for _ in 0..8 {
                    scope.spawn(|| {
                        for i in 0..2_000 {
                            index.add(&row(0, &format!("k{}", i % 500), 1)).unwrap();
                        }
                    });
                }
            });
            assert_eq!(index.size(), 500);
            assert_eq!(index.slots.len(), index.size());
            assert_eq!(index.facts.len(), index.size());
        }
    }

    #[test]
    fn test_rejected_slot_is_removed() {
        let config = IndexConfig {
            max_row_count: 1,
            ..IndexConfig::default()
        };
        let index = IncrementalIndex::new(schema(), config).unwrap();
        index.add(&row(0, "A", 1)).unwrap();
        assert!(index.add(&row(0, "B", 1)).is_err());
        assert_eq!(index.slots.len(), 1);
    }

    #[test]
    fn test_introspection() {
        let index = IncrementalIndex::new(schema(), IndexConfig::default()).unwrap();
        assert!(index.is_empty());
        assert_eq!(index.min_time(), None);
        index.add(&row(0, "NY", 1)).unwrap();
        index.add(&row(0, "SF", 1)).unwrap();
        assert_eq!(index.metric_index("x"), Some(1));
        assert_eq!(index.metric_index("nope"), None);
        assert_eq!(index.dimension_names(), vec!["city"]);
        assert_eq!(index.dimension_cardinality("city"), Some(2));
        assert_eq!(index.dimension_cardinality("nope"), None);
        assert_eq!(index.resolve_selector("x").column(), "x");
    }
}
