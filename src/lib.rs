//! Kuba Rollup - concurrent in-memory rollup index for streaming ingestion
//!
//! This library buffers incoming events for one ingestion interval and
//! pre-aggregates them as they arrive:
//! - Rows with the same bucketed timestamp and dimensions fold into one fact
//! - Per-metric aggregators (sums, extrema, first/last, distinct counts)
//! - Lock-free fact lookup with per-aggregator locking on the write path
//! - Row and byte capacity limits that signal when to persist and rotate

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod granularity;
pub mod index;
pub mod selector;
pub mod types;

/// Prometheus metrics and telemetry
pub mod metrics;

/// Configuration management with TOML support
pub mod config;

/// Metric aggregators and their serializable definitions
pub mod aggregation;

// Re-export main types
pub use aggregation::{Aggregator, AggregatorFactory, AggregatorKind};
pub use config::{IndexConfig, IndexSchema, RollupConfig};
pub use error::{Error, Result};
pub use granularity::Granularity;
pub use index::{AddRowResult, DimensionSchema, IncrementalIndex, Row};
pub use metrics::AddOutcome;
pub use types::{InputRow, MetricValue, TimeRange, Value};
