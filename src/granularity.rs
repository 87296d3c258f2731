//! Query granularity: the time-bucket width used to truncate event timestamps
//!
//! Every row's timestamp is truncated to the start of its bucket before the
//! row key is built, so events inside the same bucket with the same
//! dimensions roll up into one fact.
//!
//! Fixed-width buckets are aligned to an origin:
//!
//! ```text
//! offset = (ts - origin) mod width   (Euclidean, always in [0, width))
//! bucket = ts - offset
//! ```
//!
//! # Example
//!
//! ```rust
//! use kuba_rollup::granularity::Granularity;
//!
//! assert_eq!(Granularity::Minute.truncate(61_500), 60_000);
//! assert_eq!(Granularity::None.truncate(61_500), 61_500);
//!
//! let shifted = Granularity::duration(10, 3).unwrap();
//! assert_eq!(shifted.truncate(12), 3);
//! assert_eq!(shifted.truncate(13), 13);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

const SECOND_MS: i64 = 1_000;
const MINUTE_MS: i64 = 60 * SECOND_MS;
const HOUR_MS: i64 = 60 * MINUTE_MS;
const DAY_MS: i64 = 24 * HOUR_MS;

/// Time bucketing applied to row timestamps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Granularity {
    /// Millisecond precision, no truncation
    #[default]
    None,
    /// One-second buckets
    Second,
    /// One-minute buckets
    Minute,
    /// Five-minute buckets
    FiveMinute,
    /// Fifteen-minute buckets
    FifteenMinute,
    /// Thirty-minute buckets
    ThirtyMinute,
    /// One-hour buckets
    Hour,
    /// Six-hour buckets
    SixHour,
    /// One-day buckets (UTC)
    Day,
    /// A single bucket covering all time
    All,
    /// Arbitrary fixed-width buckets aligned to `origin`
    Duration {
        /// Bucket width in milliseconds, must be positive
        millis: i64,
        /// Alignment origin in milliseconds
        #[serde(default)]
        origin: i64,
    },
}

impl Granularity {
    /// Build a validated fixed-duration granularity
    pub fn duration(millis: i64, origin: i64) -> Result<Self, ValidationError> {
        if millis <= 0 {
            return Err(ValidationError::OutOfRange {
                field: "granularity.millis".to_string(),
                value: millis.to_string(),
                min: "1".to_string(),
                max: i64::MAX.to_string(),
            });
        }
        Ok(Granularity::Duration {
            millis,
            origin: origin % millis,
        })
    }

    /// Bucket width and origin, `None` for `None`/`All`
    fn width_and_origin(&self) -> Option<(i64, i64)> {
        match *self {
            Granularity::None | Granularity::All => None,
            Granularity::Second => Some((SECOND_MS, 0)),
            Granularity::Minute => Some((MINUTE_MS, 0)),
            Granularity::FiveMinute => Some((5 * MINUTE_MS, 0)),
            Granularity::FifteenMinute => Some((15 * MINUTE_MS, 0)),
            Granularity::ThirtyMinute => Some((30 * MINUTE_MS, 0)),
            Granularity::Hour => Some((HOUR_MS, 0)),
            Granularity::SixHour => Some((6 * HOUR_MS, 0)),
            Granularity::Day => Some((DAY_MS, 0)),
            Granularity::Duration { millis, origin } => Some((millis, origin)),
        }
    }

    /// Truncate a timestamp to the start of its bucket
    pub fn truncate(&self, timestamp: i64) -> i64 {
        match *self {
            Granularity::None => timestamp,
            Granularity::All => i64::MIN,
            _ => match self.width_and_origin() {
                // Degenerate widths can only come from hand-built values; treat as identity
                Some((width, origin)) if width > 0 => {
                    let offset = (timestamp as i128 - origin as i128).rem_euclid(width as i128) as i64;
                    timestamp.saturating_sub(offset)
                },
                _ => timestamp,
            },
        }
    }

    /// Start of the bucket containing `timestamp`
    pub fn bucket_start(&self, timestamp: i64) -> i64 {
        self.truncate(timestamp)
    }

    /// Start of the bucket after the one containing `timestamp`
    pub fn bucket_end(&self, timestamp: i64) -> i64 {
        match *self {
            Granularity::None => timestamp.saturating_add(1),
            Granularity::All => i64::MAX,
            _ => match self.width_and_origin() {
                Some((width, _)) => self.truncate(timestamp).saturating_add(width),
                None => timestamp.saturating_add(1),
            },
        }
    }

    /// Validate hand-built values (serde bypasses `duration()`)
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Granularity::Duration { millis, .. } = *self {
            if millis <= 0 {
                return Err(ValidationError::OutOfRange {
                    field: "granularity.millis".to_string(),
                    value: millis.to_string(),
                    min: "1".to_string(),
                    max: i64::MAX.to_string(),
                });
            }
        }
        Ok(())
    }
}
