//! Metric resolution: feed matching, series fetch, extraction, reduction
//!
//! For each active mapping of a device's matched resource type the resolver
//! walks the ordered feed patterns, discovers instances, fetches series for
//! the configured lookback, extracts or derives values, and reduces
//! multi-instance results to the worst instance. Every mapping also yields a
//! diagnosis describing what matched or the specific reason nothing did, so
//! pattern configuration can be tuned from data without code changes.

use crate::error::EngineError;
use crate::extract::{extract, ExtractFailure, ExtractedSeries};
use crate::feed::{FeedClient, FeedInfo, FeedInstance};
use crate::models::{InstanceValue, MetricMapping};
use crate::pattern::first_match;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Resolver timing and lookback configuration
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Lookback for routine status syncs
    pub status_lookback_days: i64,
    /// Lookback for rightsizing history syncs
    pub history_lookback_days: i64,
    /// The feed client caps the queryable span per call
    pub max_chunk_days: i64,
    /// Delay between successive instance calls (third-party rate limits)
    pub instance_call_delay: std::time::Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            status_lookback_days: 7,
            history_lookback_days: 90,
            max_chunk_days: 30,
            instance_call_delay: std::time::Duration::from_millis(250),
        }
    }
}

/// Raw resolved value for one mapping, before classification
#[derive(Debug, Clone)]
pub struct ResolvedMetric {
    /// Average of the worst instance
    pub avg: f64,
    /// Max of the worst instance
    pub max: f64,
    /// Every queried instance's value, retained individually
    pub instances: Vec<InstanceValue>,
}

/// Specific reason a mapping produced no value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolutionFailure {
    /// None of the feed-name patterns matched an available feed
    NoFeedMatched { patterns_tried: Vec<String> },
    /// The matched feed reported no sub-instances
    NoInstances { feed: String },
    /// No measurement pattern matched a populated column on any instance
    NoMeasurementMatched { feed: String, patterns_tried: Vec<String> },
    /// A column matched but every sample was missing or outside [0,100]
    NoAcceptedData { feed: String, column: String },
    /// The feed service failed mid-mapping; the device was abandoned
    ServiceError { detail: String },
}

impl std::fmt::Display for ResolutionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolutionFailure::NoFeedMatched { patterns_tried } => {
                write!(f, "no feed matched patterns {:?}", patterns_tried)
            }
            ResolutionFailure::NoInstances { feed } => {
                write!(f, "feed {} has no instances", feed)
            }
            ResolutionFailure::NoMeasurementMatched { feed, patterns_tried } => {
                write!(
                    f,
                    "no populated measurement column on {} matched {:?}",
                    feed, patterns_tried
                )
            }
            ResolutionFailure::NoAcceptedData { feed, column } => {
                write!(f, "column {} on {} had no values in [0,100]", column, feed)
            }
            ResolutionFailure::ServiceError { detail } => {
                write!(f, "feed service error: {}", detail)
            }
        }
    }
}

/// What matched (or didn't) for one mapping; the operator-facing view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricDiagnosis {
    pub metric: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_feed: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_feed_pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub instances_queried: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_column: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<ResolutionFailure>,
}

/// Resolution result for one device
pub struct DeviceResolution {
    /// Defined metrics only, keyed by metric name
    pub metrics: BTreeMap<String, ResolvedMetric>,
    pub diagnoses: Vec<MetricDiagnosis>,
    /// Set when a service error aborted the remaining mappings
    pub aborted: Option<String>,
}

pub struct Resolver {
    client: Arc<dyn FeedClient>,
    config: ResolverConfig,
}

impl Resolver {
    pub fn new(client: Arc<dyn FeedClient>, config: ResolverConfig) -> Self {
        Self { client, config }
    }

    /// Resolve every mapping for one device using the status lookback.
    ///
    /// A service error aborts the remaining mappings for this device only;
    /// metrics resolved before the failure are kept.
    pub async fn resolve_device(
        &self,
        device_id: &str,
        feeds: &[FeedInfo],
        mappings: &[&MetricMapping],
    ) -> DeviceResolution {
        let mut metrics = BTreeMap::new();
        let mut diagnoses = Vec::new();
        let mut aborted = None;

        for mapping in mappings {
            match self.resolve_mapping(device_id, feeds, mapping).await {
                Ok((Some(resolved), diagnosis)) => {
                    metrics.insert(mapping.metric.clone(), resolved);
                    diagnoses.push(diagnosis);
                }
                Ok((None, diagnosis)) => {
                    debug!(
                        device = device_id,
                        metric = %mapping.metric,
                        failure = ?diagnosis.failure,
                        "Metric left undefined"
                    );
                    diagnoses.push(diagnosis);
                }
                Err(e) => {
                    warn!(
                        device = device_id,
                        metric = %mapping.metric,
                        error = %e,
                        "Feed service failed, abandoning remaining mappings for device"
                    );
                    diagnoses.push(MetricDiagnosis {
                        metric: mapping.metric.clone(),
                        matched_feed: None,
                        matched_feed_pattern: None,
                        instances_queried: vec![],
                        matched_column: None,
                        failure: Some(ResolutionFailure::ServiceError {
                            detail: e.to_string(),
                        }),
                    });
                    aborted = Some(e.to_string());
                    break;
                }
            }
        }

        DeviceResolution {
            metrics,
            diagnoses,
            aborted,
        }
    }

    /// Resolve one mapping over the status lookback window.
    ///
    /// `Ok((None, _))` means the metric is undefined (non-fatal); `Err` means
    /// the feed service failed and the device should be abandoned.
    pub async fn resolve_mapping(
        &self,
        device_id: &str,
        feeds: &[FeedInfo],
        mapping: &MetricMapping,
    ) -> Result<(Option<ResolvedMetric>, MetricDiagnosis), EngineError> {
        let now = Utc::now();
        let start = now - Duration::days(self.config.status_lookback_days);

        let Some((feed, pattern)) = self.match_feed(feeds, mapping) else {
            return Ok((
                None,
                MetricDiagnosis {
                    metric: mapping.metric.clone(),
                    matched_feed: None,
                    matched_feed_pattern: None,
                    instances_queried: vec![],
                    matched_column: None,
                    failure: Some(ResolutionFailure::NoFeedMatched {
                        patterns_tried: mapping.feed_patterns.clone(),
                    }),
                },
            ));
        };

        let mut diagnosis = MetricDiagnosis {
            metric: mapping.metric.clone(),
            matched_feed: Some(feed.feed_name.clone()),
            matched_feed_pattern: Some(pattern.clone()),
            instances_queried: vec![],
            matched_column: None,
            failure: None,
        };

        let all_instances = self.client.list_instances(device_id, &feed.feed_id).await?;
        if all_instances.is_empty() {
            diagnosis.failure = Some(ResolutionFailure::NoInstances {
                feed: feed.feed_name.clone(),
            });
            return Ok((None, diagnosis));
        }

        let selected: Vec<&FeedInstance> = if mapping.multi_instance {
            all_instances.iter().collect()
        } else {
            all_instances.iter().take(1).collect()
        };

        let mut values: Vec<InstanceValue> = Vec::new();
        let mut last_empty: Option<ExtractFailure> = None;

        for (i, instance) in selected.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.config.instance_call_delay).await;
            }
            diagnosis.instances_queried.push(instance.display_name.clone());

            let chunk = self
                .client
                .get_time_series(device_id, &feed.feed_id, &instance.instance_id, start, now)
                .await?;

            match extract(&chunk, &mapping.measurements) {
                Ok(series) => {
                    diagnosis.matched_column.get_or_insert(series.column.clone());
                    values.push(InstanceValue {
                        instance_id: instance.instance_id.clone(),
                        display_name: instance.display_name.clone(),
                        avg: series.avg(),
                        max: series.max(),
                    });
                }
                Err(failure) => {
                    last_empty = Some(failure);
                }
            }
        }

        if values.is_empty() {
            diagnosis.failure = Some(match last_empty {
                Some(ExtractFailure::NoAcceptedData { column }) => {
                    ResolutionFailure::NoAcceptedData {
                        feed: feed.feed_name.clone(),
                        column,
                    }
                }
                _ => ResolutionFailure::NoMeasurementMatched {
                    feed: feed.feed_name.clone(),
                    patterns_tried: mapping
                        .measurements
                        .iter()
                        .map(|s| match s {
                            crate::models::MeasurementSpec::Direct { pattern } => pattern.clone(),
                            crate::models::MeasurementSpec::Calculated {
                                free_pattern,
                                total_pattern,
                            } => format!("100-{}/{}", free_pattern, total_pattern),
                        })
                        .collect(),
                },
            });
            return Ok((None, diagnosis));
        }

        // Worst (highest-utilization) instance carries the mapping's value;
        // per-instance values stay queryable.
        let worst = values
            .iter()
            .cloned()
            .max_by(|a, b| a.avg.partial_cmp(&b.avg).unwrap_or(std::cmp::Ordering::Equal))
            .unwrap_or_else(|| values[0].clone());

        Ok((
            Some(ResolvedMetric {
                avg: worst.avg,
                max: worst.max,
                instances: values,
            }),
            diagnosis,
        ))
    }

    /// Fetch the rightsizing history for one mapping: the 90-day lookback in
    /// chunks no longer than the feed client's per-call span cap. Interior
    /// chunk boundaries land on UTC midnight so every calendar day is
    /// aggregated from exactly one chunk.
    ///
    /// Single-instance mappings only; multi-instance mappings are rejected
    /// because a per-day worst-instance reduction is not defined for them.
    /// Non-fatal match failures return `FeedNotFound`; service failures
    /// propagate as-is.
    pub async fn resolve_history(
        &self,
        device_id: &str,
        feeds: &[FeedInfo],
        mapping: &MetricMapping,
        now: DateTime<Utc>,
    ) -> Result<Vec<ExtractedSeries>, EngineError> {
        if mapping.multi_instance {
            return Err(EngineError::ConfigurationMissing {
                device: device_id.to_string(),
                reason: format!(
                    "multi-instance mapping {} cannot be aggregated into history",
                    mapping.metric
                ),
            });
        }

        let Some((feed, _)) = self.match_feed(feeds, mapping) else {
            return Err(EngineError::FeedNotFound {
                metric: mapping.metric.clone(),
                patterns: mapping.feed_patterns.clone(),
            });
        };

        let instances = self.client.list_instances(device_id, &feed.feed_id).await?;
        let Some(instance) = instances.first() else {
            return Err(EngineError::FeedNotFound {
                metric: mapping.metric.clone(),
                patterns: mapping.feed_patterns.clone(),
            });
        };

        let window_start = now - Duration::days(self.config.history_lookback_days);
        let mut chunks = Vec::new();
        let mut cursor = window_start;
        let mut first = true;

        while cursor < now {
            let boundary = (cursor.date_naive() + Duration::days(self.config.max_chunk_days))
                .and_time(chrono::NaiveTime::MIN)
                .and_utc();
            let chunk_end = boundary.min(now);
            if !first {
                tokio::time::sleep(self.config.instance_call_delay).await;
            }
            first = false;

            let chunk = self
                .client
                .get_time_series(
                    device_id,
                    &feed.feed_id,
                    &instance.instance_id,
                    cursor,
                    chunk_end,
                )
                .await?;

            if let Ok(series) = extract(&chunk, &mapping.measurements) {
                chunks.push(series);
            }
            cursor = chunk_end;
        }

        Ok(chunks)
    }

    fn match_feed<'a>(
        &self,
        feeds: &'a [FeedInfo],
        mapping: &MetricMapping,
    ) -> Option<(&'a FeedInfo, String)> {
        let names: Vec<&str> = feeds.iter().map(|f| f.feed_name.as_str()).collect();
        first_match(&mapping.feed_patterns, &names).map(|m| {
            (
                &feeds[m.candidate_index],
                mapping.feed_patterns[m.pattern_index].clone(),
            )
        })
    }
}
