//! Concurrency stress tests for the incremental index
//!
//! Many writer threads hammer the same and different keys while readers
//! poll aggregates. Checks that no update is lost, that every key is
//! published exactly once, and that counters only move on new facts.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use kuba_rollup::aggregation::AggregatorFactory;
use kuba_rollup::config::{IndexConfig, IndexSchema};
use kuba_rollup::index::{DimensionSchema, IncrementalIndex};
use kuba_rollup::{AddOutcome, Error, InputRow};

fn schema() -> IndexSchema {
    IndexSchema {
        metrics: vec![
            AggregatorFactory::count("count"),
            AggregatorFactory::long_sum("x", "x"),
            AggregatorFactory::long_last("last", "x"),
        ],
        dimensions: vec![DimensionSchema::string("key")],
        ..IndexSchema::default()
    }
}

// ============================================================================
// Same-key contention
// ============================================================================

/// Test: N threads adding the same key lose no updates and publish one slot
#[test]
fn test_no_lost_updates_on_same_key() {
    for sort_facts in [true, false] {
        let config = IndexConfig {
            sort_facts,
            ..IndexConfig::default()
        };
        let index = Arc::new(IncrementalIndex::new(schema(), config).unwrap());
        let threads = 8;
        let per_thread = 500;
        let barrier = Arc::new(Barrier::new(threads));

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let index = Arc::clone(&index);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    let mut new_facts = 0;
                    for _ in 0..per_thread {
                        let row = InputRow::new(0).with("key", "hot").with("x", 1);
                        let result = index.add(&row).expect("add failed");
                        if result.outcome == AddOutcome::NewFact {
                            new_facts += 1;
                        }
                    }
                    new_facts
                })
            })
            .collect();

        let published: usize = handles
            .into_iter()
            .map(|h| h.join().expect("Thread panicked"))
            .sum();

        assert_eq!(published, 1);
        assert_eq!(index.size(), 1);
        let fact = index.facts().next().unwrap();
        assert_eq!(
            index.get_metric_long(fact.row_index, 0),
            Some((threads * per_thread) as i64)
        );
        assert_eq!(
            index.get_metric_long(fact.row_index, 1),
            Some((threads * per_thread) as i64)
        );
    }
}

/// Number of row offsets that still resolve to a live slot
fn live_offsets(index: &IncrementalIndex) -> usize {
    match index.last_row_index() {
        Some(last) => (0..=last)
            .filter(|&r| index.get_metric_value(r, 0).is_some())
            .count(),
        None => 0,
    }
}

/// Test: slots discarded after a lost publish race are unreachable
#[test]
fn test_lost_races_discard_tentative_slots() {
    for sort_facts in [true, false] {
        let config = IndexConfig {
            sort_facts,
            ..IndexConfig::default()
        };
        let index = Arc::new(IncrementalIndex::new(schema(), config).unwrap());
        let threads = 8;
        let barrier = Arc::new(Barrier::new(threads));

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let index = Arc::clone(&index);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    for i in 0..2_000 {
                        let row = InputRow::new(0).with("key", format!("k{}", i % 500)).with("x", 1);
                        index.add(&row).expect("add failed");
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().expect("Thread panicked");
        }

        assert_eq!(index.size(), 500);
        assert_eq!(live_offsets(&index), index.size());
        let total: i64 = index
            .facts()
            .map(|f| index.get_metric_long(f.row_index, 1).unwrap())
            .sum();
        assert_eq!(total, (threads * 2_000) as i64);
    }
}

/// Test: concurrent distinct keys each appear once with correct totals
#[test]
fn test_concurrent_distinct_keys() {
    let index = Arc::new(IncrementalIndex::new(schema(), IndexConfig::default()).unwrap());
    let threads = 8;
    let keys = 50;

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let index = Arc::clone(&index);
            thread::spawn(move || {
                for i in 0..keys {
                    let row = InputRow::new(0)
                        .with("key", format!("k{}", (i + t) % keys))
                        .with("x", 2);
                    index.add(&row).expect("add failed");
                }
            })
        })
        .collect();
    for h in handles {
        h.join().expect("Thread panicked");
    }

    assert_eq!(index.size(), keys);
    for fact in index.facts() {
        assert_eq!(index.get_metric_long(fact.row_index, 0), Some(threads as i64));
        assert_eq!(index.get_metric_long(fact.row_index, 1), Some(2 * threads as i64));
    }
}

// ============================================================================
// Readers during writes
// ============================================================================

/// Test: readers observe monotonic counts while writers fold
#[test]
fn test_readers_during_writes() {
    let index = Arc::new(IncrementalIndex::new(schema(), IndexConfig::default()).unwrap());
    index.add(&InputRow::new(0).with("key", "k").with("x", 1)).unwrap();
    let done = Arc::new(AtomicBool::new(false));

    let reader = {
        let index = Arc::clone(&index);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut last = 0;
            while !done.load(Ordering::Acquire) {
                let count = index.get_metric_long(0, 0).unwrap();
                assert!(count >= last, "count went backwards");
                last = count;
                let _ = index.rows(false);
            }
        })
    };

    let writers: Vec<_> = (0..4)
        .map(|_| {
            let index = Arc::clone(&index);
            thread::spawn(move || {
                for _ in 0..1_000 {
                    index.add(&InputRow::new(0).with("key", "k").with("x", 1)).unwrap();
                }
            })
        })
        .collect();
    for w in writers {
        w.join().expect("Thread panicked");
    }
    done.store(true, Ordering::Release);
    reader.join().expect("Reader panicked");

    assert_eq!(index.get_metric_long(0, 0), Some(4_001));
}

// ============================================================================
// Capacity under contention
// ============================================================================

/// Test: the row limit holds when many threads race new keys
#[test]
fn test_capacity_under_contention() {
    let config = IndexConfig {
        max_row_count: 10,
        ..IndexConfig::default()
    };
    let index = Arc::new(IncrementalIndex::new(schema(), config).unwrap());

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let index = Arc::clone(&index);
            thread::spawn(move || {
                let mut rejected = 0;
                for i in 0..20 {
                    let row = InputRow::new(0).with("key", format!("t{}-{}", t, i)).with("x", 1);
                    match index.add(&row) {
                        Ok(_) => {},
                        Err(Error::CapacityExceeded { .. }) => rejected += 1,
                        Err(e) => panic!("unexpected error: {}", e),
                    }
                }
                rejected
            })
        })
        .collect();
    let rejected: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

    // Checks race with publishes, so a few extra facts can slip through,
    // bounded by the number of writers
    assert!(index.size() >= 10);
    assert!(index.size() < 10 + 8);
    assert_eq!(index.size() + rejected, 8 * 20);
}
