//! Aggregator slots: one array of per-metric aggregators per fact
//!
//! Each aggregator sits behind its own mutex, so two writers folding into
//! the same fact contend per metric, and writers on different facts never
//! contend at all. Readers take the same per-aggregator lock for the
//! duration of one accessor call.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;

use crate::aggregation::Aggregator;
use crate::types::InputRow;

/// The aggregator array of one fact
#[derive(Debug)]
pub struct Slot {
    aggregators: Box<[Mutex<Box<dyn Aggregator>>]>,
}

impl Slot {
    /// Wrap freshly factorized aggregators, one per metric in schema order
    pub fn new(aggregators: Vec<Box<dyn Aggregator>>) -> Self {
        Self {
            aggregators: aggregators.into_iter().map(Mutex::new).collect(),
        }
    }

    /// Fold `row` into every aggregator
    ///
    /// A failing aggregator is skipped and its message appended to
    /// `warnings`; the remaining metrics still see the row.
    pub fn fold(&self, row: &InputRow, metric_names: &[String], warnings: &mut Vec<String>) {
        for (i, cell) in self.aggregators.iter().enumerate() {
            let result = cell.lock().aggregate(row);
            if let Err(e) = result {
                debug!(
                    metric = metric_names.get(i).map(String::as_str).unwrap_or("?"),
                    timestamp = row.timestamp,
                    error = %e,
                    "Failed to aggregate metric"
                );
                warnings.push(e.to_string());
            }
        }
    }

    /// Run `f` against one aggregator under its lock
    pub fn with_aggregator<R>(&self, metric_offset: usize, f: impl FnOnce(&dyn Aggregator) -> R) -> Option<R> {
        self.aggregators
            .get(metric_offset)
            .map(|cell| f(&**cell.lock()))
    }

    /// Close every aggregator
    pub fn close(&self) {
        for cell in self.aggregators.iter() {
            cell.lock().close();
        }
    }
}

/// Concurrent map from slot index to slot
#[derive(Debug, Default)]
pub struct SlotStore {
    slots: DashMap<u32, Arc<Slot>>,
    next_index: AtomicU32,
}

impl SlotStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the next slot index, `None` once the index space is exhausted
    pub fn reserve(&self) -> Option<u32> {
        self.next_index
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |i| i.checked_add(1))
            .ok()
    }

    /// Register a slot under a reserved index
    pub fn insert(&self, index: u32, slot: Arc<Slot>) {
        self.slots.insert(index, slot);
    }

    /// Slot at `index`
    ///
    /// The `Arc` is cloned out so the map shard is not held while the
    /// caller locks aggregators.
    pub fn get(&self, index: u32) -> Option<Arc<Slot>> {
        self.slots.get(&index).map(|entry| Arc::clone(entry.value()))
    }

    /// Remove a slot that was never published
    pub fn remove(&self, index: u32) -> Option<Arc<Slot>> {
        self.slots.remove(&index).map(|(_, slot)| slot)
    }

    /// Highest index handed out so far
    pub fn last_index(&self) -> Option<u32> {
        self.next_index.load(Ordering::Acquire).checked_sub(1)
    }

    /// Number of registered slots, published or tentative
    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    /// Close every aggregator and drop every slot
    pub fn close_all(&self) {
        for entry in self.slots.iter() {
            entry.value().close();
        }
        self.slots.clear();
    }
}
