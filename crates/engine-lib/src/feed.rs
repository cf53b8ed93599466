//! Monitoring feed client abstraction
//!
//! The monitoring platform exposes, per device, a list of named feeds
//! (datasources), each with zero or more sub-instances, and a time-series
//! query returning parallel timestamp/value-row arrays. Feed naming and units
//! vary per resource type and are not controlled by this system; everything
//! downstream of this trait is pattern matching.

use crate::error::EngineError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub use async_trait::async_trait;

/// Loosely-typed attributes attached to a feed by the monitoring platform.
///
/// Explicit get-or-default contract: a missing or unparseable key yields the
/// caller's default, never a panic or a dynamic type error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyBag(HashMap<String, String>);

impl PropertyBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// Parse a value, falling back to `default` when missing or malformed.
    pub fn get_parsed_or<T: std::str::FromStr>(&self, key: &str, default: T) -> T {
        self.get(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }
}

/// One named monitoring feed available on a device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedInfo {
    pub feed_id: String,
    pub feed_name: String,
    #[serde(default)]
    pub properties: PropertyBag,
}

/// One sub-target of a feed (e.g. a single disk drive)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedInstance {
    pub instance_id: String,
    pub display_name: String,
    pub wild_value: String,
}

/// One time-series query response
///
/// `timestamps` and `value_rows` are parallel, positionally paired arrays.
/// `value_rows` may carry fewer populated columns than `measurement_names`
/// declares; consumers must bound column lookups by `valid_column_count`,
/// never by the name-list length.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSeriesChunk {
    pub measurement_names: Vec<String>,
    /// Epoch milliseconds
    pub timestamps: Vec<i64>,
    pub value_rows: Vec<Vec<Option<f64>>>,
    pub valid_column_count: usize,
}

impl TimeSeriesChunk {
    /// Positionally paired (timestamp, row) iterator; trailing unpaired
    /// entries on either side are discarded.
    pub fn paired_rows(&self) -> impl Iterator<Item = (i64, &[Option<f64>])> {
        self.timestamps
            .iter()
            .copied()
            .zip(self.value_rows.iter().map(Vec::as_slice))
    }
}

/// Client for the monitoring feed platform
///
/// The feed client caps the queryable span per `get_time_series` call, which
/// is why historical syncs fetch 90 days in chunks.
#[async_trait]
pub trait FeedClient: Send + Sync {
    /// Cheap connectivity/credential check, run once before a batch.
    async fn ping(&self) -> Result<(), EngineError>;

    async fn list_feeds(&self, device_id: &str) -> Result<Vec<FeedInfo>, EngineError>;

    async fn list_instances(
        &self,
        device_id: &str,
        feed_id: &str,
    ) -> Result<Vec<FeedInstance>, EngineError>;

    async fn get_time_series(
        &self,
        device_id: &str,
        feed_id: &str,
        instance_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<TimeSeriesChunk, EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_bag_get_or_default() {
        let mut bag = PropertyBag::new();
        bag.insert("poll.interval", "60");
        bag.insert("unit", "percent");

        assert_eq!(bag.get_or("unit", "ratio"), "percent");
        assert_eq!(bag.get_or("missing", "ratio"), "ratio");
        assert_eq!(bag.get_parsed_or("poll.interval", 300u64), 60);
        assert_eq!(bag.get_parsed_or("missing", 300u64), 300);
        // Unparseable falls back too
        assert_eq!(bag.get_parsed_or::<u64>("unit", 300), 300);
    }

    #[test]
    fn test_paired_rows_discards_trailing_entries() {
        let chunk = TimeSeriesChunk {
            measurement_names: vec!["CPUBusyPercent".into()],
            timestamps: vec![1000, 2000, 3000],
            value_rows: vec![vec![Some(10.0)], vec![Some(20.0)]],
            valid_column_count: 1,
        };
        let pairs: Vec<_> = chunk.paired_rows().collect();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[1].0, 2000);
    }
}
