//! Error types for the rollup index

use thiserror::Error;

/// Main error type for the rollup index
#[derive(Error, Debug)]
pub enum Error {
    /// A genuinely new fact would breach the row or byte limit
    ///
    /// Fatal to the `add` call, not to the index. Callers are expected to
    /// persist the full index and rotate to a fresh one.
    #[error(
        "Maximum number of rows [{max_row_count}] or max size in bytes [{max_bytes_in_memory}] reached"
    )]
    CapacityExceeded {
        /// Configured row limit
        max_row_count: usize,
        /// Configured byte limit (0 when disabled)
        max_bytes_in_memory: u64,
    },

    /// Row timestamp is below the schema's minimum timestamp
    #[error("Cannot add row with timestamp {timestamp}: below the minimum timestamp {min_timestamp}")]
    TimestampOutOfRange {
        /// Event timestamp of the rejected row
        timestamp: i64,
        /// Configured minimum timestamp
        min_timestamp: i64,
    },

    /// The index has been closed
    #[error("Index is closed")]
    Closed,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Per-aggregator failure while folding a row
///
/// Never escapes `add`: the index renders it into a parse warning and keeps
/// aggregating the remaining metrics.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AggregateError {
    /// Input value could not be parsed as the aggregator's type
    #[error("Unable to parse value[{value}] for field[{field}]")]
    Unparseable {
        /// Source column
        field: String,
        /// Offending value, rendered
        value: String,
    },

    /// Input value has a shape the aggregator cannot consume
    #[error("Could not convert value [{value}] of field[{field}] to {target}")]
    Unsupported {
        /// Source column
        field: String,
        /// Offending value, rendered
        value: String,
        /// Target type name
        target: &'static str,
    },
}

/// Validation errors
///
/// Error type for configuration and schema validation
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Value is out of allowed range
    #[error("{field} value {value} is out of range [{min}, {max}]")]
    OutOfRange {
        /// Field name being validated
        field: String,
        /// The invalid value
        value: String,
        /// Minimum allowed value
        min: String,
        /// Maximum allowed value
        max: String,
    },

    /// Required field is missing
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// Two columns share a name
    #[error("Duplicate column name: {0}")]
    DuplicateName(String),

    /// Invalid format
    #[error("Invalid format for {field}: {message}")]
    InvalidFormat {
        /// Field name being validated
        field: String,
        /// Description of the format error
        message: String,
    },
}

impl From<ValidationError> for Error {
    fn from(e: ValidationError) -> Self {
        Error::Configuration(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
