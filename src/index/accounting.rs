//! Row and byte accounting for capacity enforcement
//!
//! Counters move only when a new fact is published. Folds into an existing
//! fact never change them, so both counters are monotonic while the index is
//! open.

use std::mem::size_of;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::aggregation::{Aggregator, AggregatorFactory};
use crate::index::row_key::RowKey;
use crate::index::slots::Slot;
use crate::selector::ColumnSelector;

/// Default per-fact bookkeeping estimate, in bytes
///
/// Covers a fact table node (key, slot index, an average two-level tower
/// plus node header), a slot store entry (index, `Arc<Slot>`, hash), and the
/// shared slot header (reference counts plus the boxed aggregator slice).
pub const DEFAULT_ENTRY_OVERHEAD_BYTES: u64 = (size_of::<RowKey>()
    + size_of::<u32>()
    + 4 * size_of::<usize>()
    + size_of::<u32>()
    + size_of::<Arc<Slot>>()
    + size_of::<u64>()
    + 2 * size_of::<usize>()
    + size_of::<Box<[u8]>>()) as u64;

/// Per-aggregator bookkeeping inside a slot: the lock, the boxed trait
/// object, and the selector handle it holds
const PER_AGGREGATOR_OVERHEAD_BYTES: u64 = (size_of::<Mutex<Box<dyn Aggregator>>>()
    + 2 * size_of::<usize>()
    + size_of::<Arc<ColumnSelector>>()) as u64;

/// Worst-case aggregator bytes for one fact
pub fn max_bytes_per_row_for_aggregators(metrics: &[AggregatorFactory]) -> u64 {
    metrics
        .iter()
        .map(|m| m.max_intermediate_size() as u64 + PER_AGGREGATOR_OVERHEAD_BYTES)
        .sum()
}

/// Atomic counters plus the limits they are checked against
#[derive(Debug)]
pub struct Accounting {
    rows: AtomicUsize,
    bytes: AtomicU64,
    max_row_count: usize,
    /// 0 disables the byte limit
    max_bytes_in_memory: u64,
    entry_overhead_bytes: u64,
    max_bytes_per_row_for_aggregators: u64,
    out_of_rows_reason: Mutex<Option<String>>,
}

impl Accounting {
    /// Create zeroed counters for the given limits
    pub fn new(
        max_row_count: usize,
        max_bytes_in_memory: u64,
        entry_overhead_bytes: u64,
        metrics: &[AggregatorFactory],
    ) -> Self {
        Self {
            rows: AtomicUsize::new(0),
            bytes: AtomicU64::new(0),
            max_row_count,
            max_bytes_in_memory,
            entry_overhead_bytes,
            max_bytes_per_row_for_aggregators: max_bytes_per_row_for_aggregators(metrics),
            out_of_rows_reason: Mutex::new(None),
        }
    }

    /// Estimated cost of publishing a new fact for `key`
    pub fn estimate_row_size_in_bytes(&self, key: &RowKey) -> u64 {
        self.entry_overhead_bytes
            + key.estimate_bytes_in_memory() as u64
            + self.max_bytes_per_row_for_aggregators
    }

    /// Cached worst-case aggregator bytes per fact
    pub fn max_bytes_per_row_for_aggregators(&self) -> u64 {
        self.max_bytes_per_row_for_aggregators
    }

    fn rows_full(&self) -> bool {
        self.rows.load(Ordering::Acquire) >= self.max_row_count
    }

    fn bytes_full(&self) -> bool {
        self.max_bytes_in_memory > 0 && self.bytes.load(Ordering::Acquire) >= self.max_bytes_in_memory
    }

    /// Whether either limit has been reached
    pub fn is_full(&self) -> bool {
        self.rows_full() || self.bytes_full()
    }

    /// Advisory check; records a reason when it returns false
    pub fn can_append_row(&self) -> bool {
        let reason = match (self.rows_full(), self.bytes_full()) {
            (false, false) => None,
            (true, false) => Some(format!("Maximum number of rows [{}] reached", self.max_row_count)),
            (false, true) => Some(format!(
                "Maximum size in bytes [{}] reached",
                self.max_bytes_in_memory
            )),
            (true, true) => Some(format!(
                "Maximum number of rows [{}] and maximum size in bytes [{}] reached",
                self.max_row_count, self.max_bytes_in_memory
            )),
        };
        let can_append = reason.is_none();
        *self.out_of_rows_reason.lock() = reason;
        can_append
    }

    /// Reason recorded by the last failed `can_append_row`
    pub fn out_of_rows_reason(&self) -> Option<String> {
        self.out_of_rows_reason.lock().clone()
    }

    /// Count a newly published fact, returning the new totals
    pub fn register(&self, row_bytes: u64) -> (usize, u64) {
        let rows = self.rows.fetch_add(1, Ordering::AcqRel) + 1;
        let bytes = self.bytes.fetch_add(row_bytes, Ordering::AcqRel) + row_bytes;
        (rows, bytes)
    }

    /// Current (rows, bytes)
    pub fn totals(&self) -> (usize, u64) {
        (self.rows.load(Ordering::Acquire), self.bytes.load(Ordering::Acquire))
    }

    /// Configured row limit
    pub fn max_row_count(&self) -> usize {
        self.max_row_count
    }

    /// Configured byte limit, 0 when disabled
    pub fn max_bytes_in_memory(&self) -> u64 {
        self.max_bytes_in_memory
    }
}
