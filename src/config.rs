//! Configuration management for the rollup index
//!
//! This module provides configuration file support with TOML format,
//! environment variable overrides, and sensible defaults.
//!
//! ```toml
//! [index]
//! max_row_count = 500000
//! max_bytes_in_memory = 268435456
//!
//! [schema]
//! rollup = true
//! query_granularity = { type = "minute" }
//! dimensions = [{ name = "city" }, { name = "port", kind = "long" }]
//!
//! [[schema.metrics]]
//! type = "count"
//! name = "count"
//!
//! [[schema.metrics]]
//! type = "longSum"
//! name = "bytes"
//! field_name = "bytes"
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::aggregation::AggregatorFactory;
use crate::error::{Error, Result, ValidationError};
use crate::granularity::Granularity;
use crate::index::accounting::DEFAULT_ENTRY_OVERHEAD_BYTES;
use crate::index::dimension::DimensionSchema;

/// Upper bound accepted for `max_row_count`
pub const MAX_ROW_COUNT_LIMIT: usize = u32::MAX as usize;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct RollupConfig {
    /// Capacity and concurrency settings
    #[serde(default)]
    pub index: IndexConfig,

    /// Metrics, dimensions and bucketing
    pub schema: IndexSchema,

    /// Logging
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Index capacity and structure settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct IndexConfig {
    /// Maximum number of facts before `add` rejects new keys
    #[serde(default = "default_max_row_count")]
    pub max_row_count: usize,

    /// Maximum estimated bytes before `add` rejects new keys (0 disables)
    #[serde(default = "default_max_bytes_in_memory")]
    pub max_bytes_in_memory: u64,

    /// Use concurrent internal structures for parallel writers
    #[serde(default = "default_true")]
    pub concurrent_event_add: bool,

    /// Keep facts in key order
    #[serde(default = "default_true")]
    pub sort_facts: bool,

    /// Per-fact bookkeeping bytes added to every row size estimate
    #[serde(default = "default_entry_overhead_bytes")]
    pub entry_overhead_bytes: u64,
}

/// What gets indexed and how it rolls up
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct IndexSchema {
    /// Metric definitions, in output order
    #[serde(default)]
    pub metrics: Vec<AggregatorFactory>,

    /// Dimension columns, in key order
    #[serde(default)]
    pub dimensions: Vec<DimensionSchema>,

    /// Timestamp bucketing
    #[serde(default)]
    pub query_granularity: Granularity,

    /// Merge rows with equal keys
    #[serde(default = "default_true")]
    pub rollup: bool,

    /// Rows with an earlier event time are rejected
    #[serde(default)]
    pub min_timestamp: Option<i64>,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Default filter directive, e.g. "info" or "kuba_rollup=debug"
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_max_row_count() -> usize { 1_000_000 }
fn default_max_bytes_in_memory() -> u64 { 512 * 1024 * 1024 }
fn default_entry_overhead_bytes() -> u64 { DEFAULT_ENTRY_OVERHEAD_BYTES }
fn default_log_level() -> String { "info".to_string() }
fn default_true() -> bool { true }

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            max_row_count: default_max_row_count(),
            max_bytes_in_memory: default_max_bytes_in_memory(),
            concurrent_event_add: true,
            sort_facts: true,
            entry_overhead_bytes: default_entry_overhead_bytes(),
        }
    }
}

impl Default for IndexSchema {
    fn default() -> Self {
        Self {
            metrics: Vec::new(),
            dimensions: Vec::new(),
            query_granularity: Granularity::None,
            rollup: true,
            min_timestamp: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl IndexConfig {
    /// Apply `ROLLUP_*` environment variable overrides
    ///
    /// Unparseable values are ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("ROLLUP_MAX_ROW_COUNT") {
            if let Ok(n) = v.parse() {
                self.max_row_count = n;
            }
        }
        if let Ok(v) = std::env::var("ROLLUP_MAX_BYTES_IN_MEMORY") {
            if let Ok(n) = v.parse() {
                self.max_bytes_in_memory = n;
            }
        }
        if let Ok(v) = std::env::var("ROLLUP_CONCURRENT_ADD") {
            if let Ok(b) = v.parse() {
                self.concurrent_event_add = b;
            }
        }
        if let Ok(v) = std::env::var("ROLLUP_SORT_FACTS") {
            if let Ok(b) = v.parse() {
                self.sort_facts = b;
            }
        }
    }

    /// Validate limits
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        if self.max_row_count == 0 || self.max_row_count > MAX_ROW_COUNT_LIMIT {
            return Err(ValidationError::OutOfRange {
                field: "index.max_row_count".to_string(),
                value: self.max_row_count.to_string(),
                min: "1".to_string(),
                max: MAX_ROW_COUNT_LIMIT.to_string(),
            });
        }
        Ok(())
    }
}

impl IndexSchema {
    /// Validate names and per-metric parameters
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        self.query_granularity.validate()?;

        let mut seen = HashSet::new();
        for metric in &self.metrics {
            metric.validate()?;
            if !seen.insert(metric.name()) {
                return Err(ValidationError::DuplicateName(metric.name().to_string()));
            }
        }

        let mut seen = HashSet::new();
        for dim in &self.dimensions {
            if dim.name.is_empty() {
                return Err(ValidationError::MissingField("dimensions.name".to_string()));
            }
            if !seen.insert(dim.name.as_str()) {
                return Err(ValidationError::DuplicateName(dim.name.clone()));
            }
        }
        Ok(())
    }

    /// Names of the metric columns, in order
    pub fn metric_names(&self) -> Vec<String> {
        self.metrics.iter().map(|m| m.name().to_string()).collect()
    }
}

impl RollupConfig {
    /// Load configuration from TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents).map_err(|e| {
            Error::Configuration(format!("Failed to parse config file {}: {}", path.display(), e))
        })
    }

    /// Load configuration with environment variable overrides
    pub fn from_file_with_env(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        self.index.apply_env_overrides();
        if let Ok(level) = std::env::var("RUST_LOG") {
            self.logging.level = level;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        self.index.validate()?;
        self.schema.validate()
    }

    /// Save configuration to TOML file
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Serialization(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = IndexConfig::default();
        assert_eq!(config.max_row_count, 1_000_000);
        assert!(config.concurrent_event_add);
        assert!(config.sort_facts);
        assert_eq!(config.entry_overhead_bytes, DEFAULT_ENTRY_OVERHEAD_BYTES);
        assert!(config.validate().is_ok());
        assert!(IndexSchema::default().rollup);
    }

    #[test]
    fn test_invalid_row_count() {
        let config = IndexConfig {
            max_row_count: 0,
            ..IndexConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_metric_names_rejected() {
        let schema = IndexSchema {
            metrics: vec![
                AggregatorFactory::count("x"),
                AggregatorFactory::long_sum("x", "x"),
            ],
            ..IndexSchema::default()
        };
        assert!(matches!(
            schema.validate(),
            Err(ValidationError::DuplicateName(name)) if name == "x"
        ));
    }

    #[test]
    fn test_duplicate_dimension_names_rejected() {
        let schema = IndexSchema {
            dimensions: vec![DimensionSchema::string("a"), DimensionSchema::long("a")],
            ..IndexSchema::default()
        };
        assert!(schema.validate().is_err());
    }

    #[test]
    fn test_parse_minimal_toml() {
        let config: RollupConfig = toml::from_str(
            r#"
            [schema]
            dimensions = [{ name = "city" }]

            [[schema.metrics]]
            type = "count"
            name = "count"
            "#,
        )
        .unwrap();
        assert!(config.schema.rollup);
        assert_eq!(config.schema.query_granularity, Granularity::None);
        assert_eq!(config.index, IndexConfig::default());
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }
}
