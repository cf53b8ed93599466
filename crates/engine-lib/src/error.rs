//! Error taxonomy for the utilization engine
//!
//! Most variants are non-fatal by design: a device with no matching
//! configuration is marked Unknown, and a metric with no matching feed is
//! left undefined. Only `ExternalServiceUnavailable` aborts anything, and
//! then only the current device. Out-of-range samples and concurrent
//! aggregate upserts never become errors at all: the former trigger a
//! fallback-pattern retry inside extraction, the latter resolve
//! last-writer-wins through idempotent upserts.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// No resource type matched the device, the matched type carries no
    /// usable metric mappings, or the current tier is unknown to the
    /// catalog. The device is marked Unknown and skipped.
    #[error("no usable configuration for device {device}: {reason}")]
    ConfigurationMissing { device: String, reason: String },

    /// None of the configured feed-name patterns matched an available feed.
    /// The metric stays undefined and processing moves to the next mapping.
    #[error("no feed matched for metric {metric} (patterns tried: {patterns:?})")]
    FeedNotFound {
        metric: String,
        patterns: Vec<String>,
    },

    /// The monitoring feed service rejected or dropped a call. Fatal for the
    /// current device only; remaining mappings are skipped and the batch
    /// continues with the next device.
    #[error("monitoring feed service unavailable: {0}")]
    ExternalServiceUnavailable(String),
}

impl EngineError {
    /// Whether the error aborts processing of the current device.
    pub fn is_device_fatal(&self) -> bool {
        matches!(self, EngineError::ExternalServiceUnavailable(_))
    }
}
