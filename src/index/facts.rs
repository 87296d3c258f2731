//! Fact tables: row key -> aggregator slot index
//!
//! Three layouts, chosen once at construction:
//!
//! - **Sorted rollup**: `SkipMap<RowKey, u32>`, iteration in key order
//! - **Unsorted rollup**: `DashMap<RowKey, u32>`, unspecified iteration order
//! - **Plain**: every row is its own fact under a unique sequence number;
//!   ordered by time then arrival when sorted, by arrival alone otherwise

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_skiplist::SkipMap;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::index::row_key::RowKey;

/// A published fact: its key and the slot holding its aggregators
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactEntry {
    /// Row key
    pub key: RowKey,
    /// Slot index in the slot store
    pub row_index: u32,
}

/// Boxed iterator over published facts
pub type FactIter<'a> = Box<dyn Iterator<Item = FactEntry> + 'a>;

/// Concurrent mapping from row keys to slot indices
pub trait FactsHolder: Send + Sync + fmt::Debug {
    /// Slot index already published for `key`
    fn prior_index(&self, key: &RowKey) -> Option<u32>;

    /// Publish `row_index` for `key` unless a slot is already there
    ///
    /// Returns `None` when this call won, otherwise the existing index.
    fn put_if_absent(&self, key: RowKey, row_index: u32) -> Option<u32>;

    /// Every fact, in key order when the table is sorted
    fn iter(&self, descending: bool) -> FactIter<'_>;

    /// Facts with bucketed timestamp in `[start, end)`
    fn time_range(&self, start: i64, end: i64, descending: bool) -> FactIter<'_>;

    /// Number of published facts
    fn len(&self) -> usize;

    /// True when no fact has been published
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every fact
    fn clear(&self);
}

// ============================================================================
// Rollup
// ============================================================================

/// Rollup facts kept in row key order
#[derive(Debug, Default)]
pub struct SortedRollupFacts {
    facts: SkipMap<RowKey, u32>,
}

impl SortedRollupFacts {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }
}

impl FactsHolder for SortedRollupFacts {
    fn prior_index(&self, key: &RowKey) -> Option<u32> {
        self.facts.get(key).map(|entry| *entry.value())
    }

    fn put_if_absent(&self, key: RowKey, row_index: u32) -> Option<u32> {
        let entry = self.facts.get_or_insert(key, row_index);
        let published = *entry.value();
        // Slot indices are unique, so seeing our own index means we won
        if published == row_index {
            None
        } else {
            Some(published)
        }
    }

    fn iter(&self, descending: bool) -> FactIter<'_> {
        let to_fact = |e: crossbeam_skiplist::map::Entry<'_, RowKey, u32>| FactEntry {
            key: e.key().clone(),
            row_index: *e.value(),
        };
        if descending {
            Box::new(self.facts.iter().rev().map(to_fact))
        } else {
            Box::new(self.facts.iter().map(to_fact))
        }
    }

    fn time_range(&self, start: i64, end: i64, descending: bool) -> FactIter<'_> {
        if start >= end {
            return Box::new(std::iter::empty());
        }
        let to_fact = |e: crossbeam_skiplist::map::Entry<'_, RowKey, u32>| FactEntry {
            key: e.key().clone(),
            row_index: *e.value(),
        };
        let range = self
            .facts
            .range(RowKey::time_bound(start)..RowKey::time_bound(end));
        if descending {
            Box::new(range.rev().map(to_fact))
        } else {
            Box::new(range.map(to_fact))
        }
    }

    fn len(&self) -> usize {
        self.facts.len()
    }

    fn clear(&self) {
        self.facts.clear();
    }
}

/// Rollup facts without ordering
#[derive(Debug, Default)]
pub struct UnsortedRollupFacts {
    facts: DashMap<RowKey, u32>,
}

impl UnsortedRollupFacts {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }
}

impl FactsHolder for UnsortedRollupFacts {
    fn prior_index(&self, key: &RowKey) -> Option<u32> {
        self.facts.get(key).map(|entry| *entry.value())
    }

    fn put_if_absent(&self, key: RowKey, row_index: u32) -> Option<u32> {
        match self.facts.entry(key) {
            Entry::Occupied(existing) => Some(*existing.get()),
            Entry::Vacant(vacant) => {
                vacant.insert(row_index);
                None
            },
        }
    }

    fn iter(&self, _descending: bool) -> FactIter<'_> {
        Box::new(self.facts.iter().map(|e| FactEntry {
            key: e.key().clone(),
            row_index: *e.value(),
        }))
    }

    fn time_range(&self, start: i64, end: i64, _descending: bool) -> FactIter<'_> {
        Box::new(
            self.facts
                .iter()
                .filter(move |e| e.key().timestamp() >= start && e.key().timestamp() < end)
                .map(|e| FactEntry {
                    key: e.key().clone(),
                    row_index: *e.value(),
                }),
        )
    }

    fn len(&self) -> usize {
        self.facts.len()
    }

    fn clear(&self) {
        self.facts.clear();
    }
}

// ============================================================================
// Plain
// ============================================================================

/// Every row is its own fact
#[derive(Debug)]
pub struct PlainFacts {
    /// (ordering timestamp, arrival sequence) -> fact
    facts: SkipMap<(i64, u64), FactEntry>,
    sequence: AtomicU64,
    sort_by_time: bool,
}

impl PlainFacts {
    /// Create an empty table; `sort_by_time = false` keeps arrival order
    pub fn new(sort_by_time: bool) -> Self {
        Self {
            facts: SkipMap::new(),
            sequence: AtomicU64::new(0),
            sort_by_time,
        }
    }
}

impl FactsHolder for PlainFacts {
    fn prior_index(&self, _key: &RowKey) -> Option<u32> {
        None
    }

    fn put_if_absent(&self, key: RowKey, row_index: u32) -> Option<u32> {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let order_ts = if self.sort_by_time { key.timestamp() } else { 0 };
        self.facts.insert((order_ts, seq), FactEntry { key, row_index });
        None
    }

    fn iter(&self, descending: bool) -> FactIter<'_> {
        if descending {
            Box::new(self.facts.iter().rev().map(|e| e.value().clone()))
        } else {
            Box::new(self.facts.iter().map(|e| e.value().clone()))
        }
    }

    fn time_range(&self, start: i64, end: i64, descending: bool) -> FactIter<'_> {
        if start >= end {
            return Box::new(std::iter::empty());
        }
        if !self.sort_by_time {
            return Box::new(
                self.iter(descending)
                    .filter(move |f| f.key.timestamp() >= start && f.key.timestamp() < end),
            );
        }
        let range = self.facts.range((start, 0)..(end, 0));
        if descending {
            Box::new(range.rev().map(|e| e.value().clone()))
        } else {
            Box::new(range.map(|e| e.value().clone()))
        }
    }

    fn len(&self) -> usize {
        self.facts.len()
    }

    fn clear(&self) {
        self.facts.clear();
    }
}

/// Pick the fact table layout for a rollup/sort combination
pub fn facts_holder(rollup: bool, sort_facts: bool) -> Box<dyn FactsHolder> {
    match (rollup, sort_facts) {
        (true, true) => Box::new(SortedRollupFacts::new()),
        (true, false) => Box::new(UnsortedRollupFacts::new()),
        (false, sort) => Box::new(PlainFacts::new(sort)),
    }
}
