//! Prometheus metrics for the rollup index
//!
//! Collectors are process-global and shared by every open index. Gauges are
//! adjusted incrementally, so they report the sum over live indexes.

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Encoder, Histogram, IntCounter, IntCounterVec, IntGauge, TextEncoder,
};

use crate::error::{Error, Result};

lazy_static! {
    // === Ingestion Counters ===

    /// Rows passed to `add`, by outcome
    pub static ref ROWS_ADDED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "rollup_rows_added_total",
        "Rows passed to add, by outcome",
        &["outcome"]
    ).expect("rollup_rows_added_total registers once");

    /// Per-metric and per-dimension parse warnings
    pub static ref PARSE_WARNINGS_TOTAL: IntCounter = register_int_counter!(
        "rollup_parse_warnings_total",
        "Values that could not be aggregated or converted"
    ).expect("rollup_parse_warnings_total registers once");

    /// New facts refused because a limit was reached
    pub static ref CAPACITY_REJECTIONS_TOTAL: IntCounter = register_int_counter!(
        "rollup_capacity_rejections_total",
        "New facts rejected by the row or byte limit"
    ).expect("rollup_capacity_rejections_total registers once");

    // === Latency Histograms ===

    /// `add` latency
    pub static ref ADD_DURATION: Histogram = register_histogram!(
        "rollup_add_duration_seconds",
        "add latency in seconds",
        vec![0.000_001, 0.000_01, 0.000_1, 0.001, 0.01, 0.1]
    ).expect("rollup_add_duration_seconds registers once");

    // === Resource Gauges ===

    /// Facts held by open indexes
    pub static ref LIVE_FACTS: IntGauge = register_int_gauge!(
        "rollup_live_facts",
        "Facts held by open indexes"
    ).expect("rollup_live_facts registers once");

    /// Estimated bytes held by open indexes
    pub static ref LIVE_BYTES: IntGauge = register_int_gauge!(
        "rollup_live_bytes",
        "Estimated bytes held by open indexes"
    ).expect("rollup_live_bytes registers once");

    /// Open indexes
    pub static ref OPEN_INDEXES: IntGauge = register_int_gauge!(
        "rollup_open_indexes",
        "Indexes created and not yet closed"
    ).expect("rollup_open_indexes registers once");
}

/// How an `add` call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// A new fact was published
    NewFact,
    /// Folded into an existing fact found on lookup
    Folded,
    /// Lost the publish race and folded into the winner
    RaceLost,
    /// Rejected by a capacity limit
    Rejected,
}

impl AddOutcome {
    /// Label value
    pub fn as_str(&self) -> &'static str {
        match self {
            AddOutcome::NewFact => "new_fact",
            AddOutcome::Folded => "folded",
            AddOutcome::RaceLost => "race_lost",
            AddOutcome::Rejected => "rejected",
        }
    }
}

/// Get metrics in Prometheus text format
pub fn gather() -> Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = vec![];

    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| Error::Serialization(format!("Failed to encode metrics: {}", e)))?;

    String::from_utf8(buffer)
        .map_err(|e| Error::Serialization(format!("Metrics contain invalid UTF-8: {}", e)))
}

/// Record one `add` call
#[inline]
pub fn record_add(outcome: AddOutcome, duration_secs: f64, parse_warnings: usize) {
    ROWS_ADDED_TOTAL.with_label_values(&[outcome.as_str()]).inc();
    ADD_DURATION.observe(duration_secs);
    if parse_warnings > 0 {
        PARSE_WARNINGS_TOTAL.inc_by(parse_warnings as u64);
    }
    if outcome == AddOutcome::Rejected {
        CAPACITY_REJECTIONS_TOTAL.inc();
    }
}

/// Account a newly published fact
#[inline]
pub fn record_new_fact(row_bytes: u64) {
    LIVE_FACTS.inc();
    LIVE_BYTES.add(row_bytes as i64);
}

/// Account an index opening
#[inline]
pub fn record_index_opened() {
    OPEN_INDEXES.inc();
}

/// Release everything a closing index contributed
#[inline]
pub fn record_index_closed(facts: usize, bytes: u64) {
    OPEN_INDEXES.dec();
    LIVE_FACTS.sub(facts as i64);
    LIVE_BYTES.sub(bytes as i64);
}
