//! Core data models for the utilization engine

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Resource type code used when no configured type matched a device.
pub const UNKNOWN_RESOURCE_TYPE: &str = "Unknown";

/// Health status of a single metric or a whole device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricStatus {
    Healthy,
    Warning,
    Critical,
    /// No accepted value was available for classification
    Unknown,
}

impl MetricStatus {
    /// Severity rank for worst-of rollups (Critical > Warning > Healthy > Unknown)
    pub fn severity(&self) -> u8 {
        match self {
            MetricStatus::Critical => 3,
            MetricStatus::Warning => 2,
            MetricStatus::Healthy => 1,
            MetricStatus::Unknown => 0,
        }
    }
}

/// Capacity-sizing signal derived from utilization thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizingSignal {
    RightSized,
    Oversized,
    Undersized,
    Unknown,
}

impl SizingSignal {
    /// Dominance rank for rollups (Undersized > Oversized > RightSized > Unknown)
    pub fn dominance(&self) -> u8 {
        match self {
            SizingSignal::Undersized => 3,
            SizingSignal::Oversized => 2,
            SizingSignal::RightSized => 1,
            SizingSignal::Unknown => 0,
        }
    }
}

/// Action attached to a SKU recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationAction {
    KeepCurrent,
    Downsize,
    Upsize,
}

/// How a metric value is obtained from a matched feed's time series
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum MeasurementSpec {
    /// Read one column whose measurement name contains `pattern`
    Direct { pattern: String },
    /// Derive `100 - free/total * 100` from two component columns
    Calculated {
        free_pattern: String,
        total_pattern: String,
    },
}

/// One configured metric for a resource type
///
/// Pattern lists are ordered; the resolver tries them strictly in order and
/// the first match wins, with no backtracking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricMapping {
    /// Owning resource-type code
    pub resource_type: String,
    /// Metric name, e.g. "CPU", "Memory", "Disk"
    pub metric: String,
    /// Ordered feed-name patterns (case-insensitive substrings)
    pub feed_patterns: Vec<String>,
    /// Ordered measurement specs; tried in order until one yields data
    pub measurements: Vec<MeasurementSpec>,
    pub warning_threshold: f64,
    pub critical_threshold: f64,
    /// true means lower is worse (e.g. free-space style metrics)
    pub inverted: bool,
    /// Value below this signals an oversized resource
    pub oversized_below: Option<f64>,
    /// Value above this signals an undersized resource
    pub undersized_above: Option<f64>,
    /// Query every sub-instance (e.g. one per disk drive) instead of the first
    pub multi_instance: bool,
    pub active: bool,
}

/// A configured resource type: how to detect it and which metrics it carries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceTypeDefinition {
    pub code: String,
    pub display_name: String,
    /// Ordered detection patterns matched against available feed names
    pub detection_patterns: Vec<String>,
    /// Tier family used for rightsizing recommendations, if any
    pub tier_family: Option<String>,
    pub mappings: Vec<MetricMapping>,
    pub active: bool,
    /// Ascending priority; generic catch-all types are configured to sort last
    pub sort_order: i32,
}

impl ResourceTypeDefinition {
    pub fn active_mappings(&self) -> impl Iterator<Item = &MetricMapping> {
        self.mappings.iter().filter(|m| m.active)
    }
}

/// Extracted value for one metric, immutable per sync
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricValue {
    pub avg: f64,
    pub max: f64,
    pub status: MetricStatus,
    pub sizing: SizingSignal,
}

/// Per-instance value retained for multi-instance mappings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceValue {
    pub instance_id: String,
    pub display_name: String,
    pub avg: f64,
    pub max: f64,
}

/// Per-device result of one status sync
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceMetricSnapshot {
    pub device_id: String,
    pub customer_id: String,
    /// Matched resource-type code, or [`UNKNOWN_RESOURCE_TYPE`]
    pub resource_type: String,
    /// Defined metrics only; a metric with no accepted value is absent
    pub metrics: BTreeMap<String, MetricValue>,
    /// Per-instance values for multi-instance metrics, keyed by metric name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub instance_values: BTreeMap<String, Vec<InstanceValue>>,
    pub overall_status: MetricStatus,
    pub overall_sizing: SizingSignal,
    pub available_feeds: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_tier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommended_tier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation_action: Option<RecommendationAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation_reason: Option<String>,
    /// Negative means the recommendation would increase cost
    #[serde(skip_serializing_if = "Option::is_none")]
    pub potential_monthly_savings: Option<f64>,
    pub last_synced: DateTime<Utc>,
}

/// One day of aggregated samples for a (device, metric) pair
///
/// Exactly one row exists per (device, metric, date); reprocessing the same
/// day overwrites it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyMetricAggregate {
    pub device_id: String,
    pub metric: String,
    pub date: NaiveDate,
    pub avg: f64,
    pub min: f64,
    pub max: f64,
    pub p95: f64,
    pub sample_count: usize,
}

/// Rollup over the trailing 90 days of daily aggregates
///
/// The p95 here is a percentile over the daily p95 values, not over raw
/// samples. That approximation is intentional and preserved.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WindowMetrics {
    /// Mean of the daily averages
    pub avg: f64,
    /// Maximum of the daily maxima
    pub max: f64,
    /// P95 of the daily p95 values
    pub p95: f64,
    /// Number of daily aggregates present in the window
    pub days: usize,
}

/// One capacity tier in a substitutable family
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkuTier {
    pub resource_type: String,
    pub family: String,
    pub name: String,
    /// Strictly ordered size rank within (resource_type, family); unique
    pub rank: u32,
    pub vcpus: f64,
    pub memory_gb: f64,
    pub monthly_cost: f64,
}

/// What a sync batch does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchKind {
    /// 7-day lookback snapshot refresh
    Status,
    /// 90-day history aggregation plus tier recommendation
    Rightsizing,
}

/// Lifecycle state of a sync batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    InProgress,
    Completed,
    Error,
}

/// Persisted record of one sync batch
///
/// Written before any device is processed and advanced incrementally, so a
/// status query can report "N of M done" mid-batch. Redelivery of the same
/// work is safe: every write downstream is an upsert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    pub customer_id: String,
    pub kind: BatchKind,
    pub status: JobStatus,
    /// Devices processed so far (including failed ones)
    pub processed: usize,
    pub total: usize,
    /// Bounded per-device error summary
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

/// Output of the SKU recommendation engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkuRecommendation {
    pub current_tier: String,
    pub recommended_tier: String,
    pub action: RecommendationAction,
    pub reason: String,
    /// Negative means a cost increase (upsize)
    pub estimated_monthly_savings: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_severity_ordering() {
        assert!(MetricStatus::Critical.severity() > MetricStatus::Warning.severity());
        assert!(MetricStatus::Warning.severity() > MetricStatus::Healthy.severity());
        assert!(MetricStatus::Healthy.severity() > MetricStatus::Unknown.severity());
    }

    #[test]
    fn test_sizing_dominance_ordering() {
        assert!(SizingSignal::Undersized.dominance() > SizingSignal::Oversized.dominance());
        assert!(SizingSignal::Oversized.dominance() > SizingSignal::RightSized.dominance());
        assert!(SizingSignal::RightSized.dominance() > SizingSignal::Unknown.dominance());
    }

    #[test]
    fn test_active_mappings_filter() {
        let def = ResourceTypeDefinition {
            code: "WindowsServer".into(),
            display_name: "Windows Server".into(),
            detection_patterns: vec!["WinCPU".into()],
            tier_family: None,
            mappings: vec![
                MetricMapping {
                    resource_type: "WindowsServer".into(),
                    metric: "CPU".into(),
                    feed_patterns: vec!["CPU".into()],
                    measurements: vec![MeasurementSpec::Direct {
                        pattern: "CPUBusyPercent".into(),
                    }],
                    warning_threshold: 70.0,
                    critical_threshold: 90.0,
                    inverted: false,
                    oversized_below: None,
                    undersized_above: None,
                    multi_instance: false,
                    active: true,
                },
                MetricMapping {
                    resource_type: "WindowsServer".into(),
                    metric: "Swap".into(),
                    feed_patterns: vec!["Swap".into()],
                    measurements: vec![],
                    warning_threshold: 70.0,
                    critical_threshold: 90.0,
                    inverted: false,
                    oversized_below: None,
                    undersized_above: None,
                    multi_instance: false,
                    active: false,
                },
            ],
            active: true,
            sort_order: 10,
        };

        let active: Vec<_> = def.active_mappings().collect();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].metric, "CPU");
    }
}
