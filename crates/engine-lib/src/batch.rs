//! Batch sync execution
//!
//! One job covers one customer's device list and runs devices sequentially
//! within the worker, with an explicit delay between devices and between
//! successive instance calls to respect third-party rate limits. A job
//! record is persisted before any work starts and advanced per device so a
//! status query can report "N of M done". Per-device failures are caught at
//! the loop boundary and appended to a bounded error summary; only a
//! preflight failure (total service unavailability) fails the whole batch.

use crate::catalog::Catalog;
use crate::classify::{classify_sizing, classify_status, rollup_sizing, rollup_status};
use crate::error::EngineError;
use crate::feed::{FeedClient, FeedInfo};
use crate::models::{
    BatchKind, DeviceMetricSnapshot, JobRecord, JobStatus, MetricMapping, MetricValue,
    ResourceTypeDefinition, UNKNOWN_RESOURCE_TYPE,
};
use crate::observability::{EngineMetrics, StructuredLogger};
use crate::recommend::SkuEngine;
use crate::resolver::{MetricDiagnosis, Resolver};
use crate::store::{AggregateStore, JobStore, SnapshotStore};
use crate::{aggregate, matcher};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Batch runner pacing and bookkeeping configuration
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Delay inserted between devices (rate-limit throttle)
    pub device_delay: Duration,
    /// Cap on the per-job error summary
    pub max_recorded_errors: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            device_delay: Duration::from_millis(500),
            max_recorded_errors: 25,
        }
    }
}

/// One device in a sync request; the inventory layer supplies the current
/// tier for rightsizing syncs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceRef {
    pub device_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_tier: Option<String>,
}

/// Request to sync one customer's devices
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRequest {
    pub customer_id: String,
    pub kind: BatchKind,
    pub devices: Vec<DeviceRef>,
}

/// Why a sync could not be started
#[derive(Debug, Clone, PartialEq)]
pub enum StartRejection {
    /// A sync for the same (customer, kind) is already in progress
    AlreadyInProgress { job_id: String },
    /// The request listed no devices
    NoDevices,
}

/// Per-mapping diagnosis for one device, produced on demand for operators
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceDiagnosis {
    pub device_id: String,
    pub resource_type: String,
    pub available_feeds: Vec<String>,
    pub diagnoses: Vec<MetricDiagnosis>,
}

pub struct BatchRunner {
    client: Arc<dyn FeedClient>,
    catalog: Arc<dyn Catalog>,
    snapshots: Arc<dyn SnapshotStore>,
    aggregates: Arc<dyn AggregateStore>,
    jobs: Arc<dyn JobStore>,
    resolver: Resolver,
    sku_engine: SkuEngine,
    config: BatchConfig,
    metrics: EngineMetrics,
    logger: StructuredLogger,
}

impl BatchRunner {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        client: Arc<dyn FeedClient>,
        catalog: Arc<dyn Catalog>,
        snapshots: Arc<dyn SnapshotStore>,
        aggregates: Arc<dyn AggregateStore>,
        jobs: Arc<dyn JobStore>,
        resolver: Resolver,
        sku_engine: SkuEngine,
        config: BatchConfig,
    ) -> Self {
        Self {
            client,
            catalog,
            snapshots,
            aggregates,
            jobs,
            resolver,
            sku_engine,
            config,
            metrics: EngineMetrics::new(),
            logger: StructuredLogger::new("batch-runner"),
        }
    }

    pub fn job(&self, id: &str) -> Option<JobRecord> {
        self.jobs.get(id)
    }

    /// Validate the request and persist the job record.
    ///
    /// The duplicate check is check-then-act; the short race is tolerated
    /// rather than lock-protected.
    pub fn prepare(&self, request: &SyncRequest) -> Result<JobRecord, StartRejection> {
        if request.devices.is_empty() {
            return Err(StartRejection::NoDevices);
        }
        if let Some(active) = self.jobs.active_for(&request.customer_id, request.kind) {
            return Err(StartRejection::AlreadyInProgress { job_id: active.id });
        }

        let now = Utc::now();
        let job = JobRecord {
            id: format!(
                "{}-{:?}-{}",
                request.customer_id,
                request.kind,
                now.timestamp_millis()
            )
            .to_lowercase(),
            customer_id: request.customer_id.clone(),
            kind: request.kind,
            status: JobStatus::InProgress,
            processed: 0,
            total: request.devices.len(),
            errors: vec![],
            message: None,
            started_at: now,
            finished_at: None,
        };
        self.jobs.upsert(job.clone());
        Ok(job)
    }

    /// Persist a job and run it on a background task.
    pub fn start(self: &Arc<Self>, request: SyncRequest) -> Result<JobRecord, StartRejection> {
        let job = self.prepare(&request)?;
        let runner = Arc::clone(self);
        let spawned = job.clone();
        tokio::spawn(async move {
            runner.execute(spawned, request).await;
        });
        Ok(job)
    }

    /// Run a prepared job to completion. No mid-batch cancellation: the
    /// batch finishes or fails outright.
    pub async fn execute(self: Arc<Self>, mut job: JobRecord, request: SyncRequest) {
        self.metrics.batch_started();
        info!(
            job_id = %job.id,
            customer_id = %request.customer_id,
            kind = ?request.kind,
            devices = request.devices.len(),
            "Starting sync batch"
        );

        // Total service unavailability fails the batch before any device.
        if let Err(e) = self.client.ping().await {
            self.metrics.inc_feed_call_errors();
            job.status = JobStatus::Error;
            job.message = Some(format!("feed service preflight failed: {}", e));
            job.finished_at = Some(Utc::now());
            self.jobs.upsert(job.clone());
            self.metrics.batch_finished();
            warn!(job_id = %job.id, error = %e, "Batch aborted by preflight");
            return;
        }

        for (index, device) in request.devices.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(self.config.device_delay).await;
            }
            let started = std::time::Instant::now();

            let result = match request.kind {
                BatchKind::Status => self.sync_device_status(&request.customer_id, device).await,
                BatchKind::Rightsizing => {
                    self.sync_device_rightsizing(&request.customer_id, device).await
                }
            };

            self.metrics
                .observe_device_sync_latency(started.elapsed().as_secs_f64());
            self.metrics.inc_devices_processed();

            if let Err(e) = result {
                self.metrics.inc_device_errors();
                self.logger
                    .log_device_abandoned(&job.id, &device.device_id, &e.to_string());
                if job.errors.len() < self.config.max_recorded_errors {
                    job.errors.push(format!("{}: {}", device.device_id, e));
                }
            }

            job.processed = index + 1;
            self.jobs.upsert(job.clone());
        }

        job.status = JobStatus::Completed;
        job.finished_at = Some(Utc::now());
        if !job.errors.is_empty() {
            job.message = Some(format!("{} device(s) reported errors", job.errors.len()));
        }
        self.jobs.upsert(job.clone());
        self.logger.log_batch_finished(
            &job.id,
            &job.customer_id,
            job.processed,
            job.total,
            job.errors.len(),
        );
        self.metrics.batch_finished();
    }

    fn match_device<'a>(
        &self,
        feeds: &[FeedInfo],
        types: &'a [ResourceTypeDefinition],
    ) -> (Vec<String>, Option<&'a ResourceTypeDefinition>) {
        let feed_names: Vec<String> = feeds.iter().map(|f| f.feed_name.clone()).collect();
        let matched = matcher::match_resource_type(types, &feed_names);
        (feed_names, matched)
    }

    /// Refresh one device's snapshot from the 7-day status lookback.
    async fn sync_device_status(
        &self,
        customer_id: &str,
        device: &DeviceRef,
    ) -> Result<(), EngineError> {
        let feeds = self.client.list_feeds(&device.device_id).await?;
        let types = self.catalog.resource_types();
        let (feed_names, matched) = self.match_device(&feeds, &types);

        let Some(definition) = matched else {
            debug!(device = %device.device_id, "No resource type matched, marking Unknown");
            self.snapshots
                .upsert(self.unknown_snapshot(customer_id, device, feed_names));
            return Err(EngineError::ConfigurationMissing {
                device: device.device_id.clone(),
                reason: "no resource type matched the available feeds".into(),
            });
        };
        let mappings: Vec<&MetricMapping> = definition.active_mappings().collect();
        if mappings.is_empty() {
            self.snapshots
                .upsert(self.unknown_snapshot(customer_id, device, feed_names));
            return Err(EngineError::ConfigurationMissing {
                device: device.device_id.clone(),
                reason: format!(
                    "resource type {} has no active metric mappings",
                    definition.code
                ),
            });
        }

        let resolution = self
            .resolver
            .resolve_device(&device.device_id, &feeds, &mappings)
            .await;

        let mut metrics = BTreeMap::new();
        let mut instance_values = BTreeMap::new();
        for (name, resolved) in &resolution.metrics {
            let Some(mapping) = mappings.iter().find(|m| &m.metric == name) else {
                continue;
            };
            metrics.insert(
                name.clone(),
                MetricValue {
                    avg: resolved.avg,
                    max: resolved.max,
                    status: classify_status(Some(resolved.avg), mapping),
                    sizing: classify_sizing(Some(resolved.avg), mapping),
                },
            );
            if resolved.instances.len() > 1 {
                instance_values.insert(name.clone(), resolved.instances.clone());
            }
        }
        self.metrics.add_metrics_resolved(metrics.len() as u64);
        self.metrics
            .add_metrics_undefined((mappings.len() - metrics.len()) as u64);

        let previous = self.snapshots.get(&device.device_id);
        let snapshot = DeviceMetricSnapshot {
            device_id: device.device_id.clone(),
            customer_id: customer_id.to_string(),
            resource_type: definition.code.clone(),
            overall_status: rollup_status(metrics.values().map(|m| m.status)),
            overall_sizing: rollup_sizing(metrics.values().map(|m| m.sizing)),
            metrics,
            instance_values,
            available_feeds: feed_names,
            current_tier: device
                .current_tier
                .clone()
                .or_else(|| previous.as_ref().and_then(|p| p.current_tier.clone())),
            recommended_tier: previous.as_ref().and_then(|p| p.recommended_tier.clone()),
            recommendation_action: previous.as_ref().and_then(|p| p.recommendation_action),
            recommendation_reason: previous
                .as_ref()
                .and_then(|p| p.recommendation_reason.clone()),
            potential_monthly_savings: previous
                .as_ref()
                .and_then(|p| p.potential_monthly_savings),
            last_synced: Utc::now(),
        };
        self.snapshots.upsert(snapshot);

        match resolution.aborted {
            Some(detail) => Err(EngineError::ExternalServiceUnavailable(detail)),
            None => Ok(()),
        }
    }

    /// Aggregate one device's 90-day history and refresh its tier
    /// recommendation.
    async fn sync_device_rightsizing(
        &self,
        customer_id: &str,
        device: &DeviceRef,
    ) -> Result<(), EngineError> {
        let feeds = self.client.list_feeds(&device.device_id).await?;
        let types = self.catalog.resource_types();
        let (_, matched) = self.match_device(&feeds, &types);

        let Some(definition) = matched else {
            debug!(device = %device.device_id, "No resource type matched, skipping rightsizing");
            return Err(EngineError::ConfigurationMissing {
                device: device.device_id.clone(),
                reason: "no resource type matched the available feeds".into(),
            });
        };

        let now = Utc::now();
        for mapping in definition
            .active_mappings()
            .filter(|m| m.metric == "CPU" || m.metric == "Memory")
        {
            let chunks = match self
                .resolver
                .resolve_history(&device.device_id, &feeds, mapping, now)
                .await
            {
                Ok(chunks) => chunks,
                Err(e) if e.is_device_fatal() => return Err(e),
                Err(e) => {
                    debug!(
                        device = %device.device_id,
                        metric = %mapping.metric,
                        error = %e,
                        "No history available for metric"
                    );
                    continue;
                }
            };

            let mut written = 0u64;
            for series in &chunks {
                let timestamps: Vec<i64> = series.rows.iter().map(|(ts, _)| *ts).collect();
                let values: Vec<f64> = series.rows.iter().map(|(_, v)| *v).collect();
                for row in aggregate::aggregate_daily(
                    &device.device_id,
                    &mapping.metric,
                    &timestamps,
                    &values,
                ) {
                    self.aggregates.upsert(row);
                    written += 1;
                }
            }
            self.metrics.add_daily_aggregates(written);
        }

        self.refresh_recommendation(customer_id, device, definition);
        Ok(())
    }

    /// Recompute the window rollups and tier recommendation from whatever
    /// daily aggregates exist.
    fn refresh_recommendation(
        &self,
        customer_id: &str,
        device: &DeviceRef,
        definition: &ResourceTypeDefinition,
    ) {
        let Some(family_name) = &definition.tier_family else {
            return;
        };
        let current_tier_name = device.current_tier.clone().or_else(|| {
            self.snapshots
                .get(&device.device_id)
                .and_then(|s| s.current_tier)
        });
        let Some(current_tier_name) = current_tier_name else {
            debug!(device = %device.device_id, "No current tier known, skipping recommendation");
            return;
        };
        // A tier name the catalog does not know cannot be ranked against
        // the family, so no recommendation is possible.
        let Some(current_tier) = self.catalog.find_tier(&definition.code, &current_tier_name)
        else {
            warn!(
                device = %device.device_id,
                tier = %current_tier_name,
                "Current tier not in catalog, skipping recommendation"
            );
            return;
        };

        let today = Utc::now().date_naive();
        let cpu_days = self.aggregates.window(&device.device_id, "CPU", today, 90);
        let mem_days = self
            .aggregates
            .window(&device.device_id, "Memory", today, 90);
        let (Some(cpu), Some(memory)) = (
            aggregate::window_rollup(&cpu_days),
            aggregate::window_rollup(&mem_days),
        ) else {
            return;
        };

        let family = self.catalog.tier_family(&definition.code, family_name);
        let Some(recommendation) =
            self.sku_engine
                .recommend(&current_tier.name, &family, &cpu, &memory)
        else {
            return;
        };

        self.metrics.inc_recommendations_generated();
        self.logger.log_recommendation(
            &device.device_id,
            &recommendation.current_tier,
            &recommendation.recommended_tier,
            &format!("{:?}", recommendation.action),
            recommendation.estimated_monthly_savings,
        );

        let mut snapshot = self
            .snapshots
            .get(&device.device_id)
            .unwrap_or_else(|| self.unknown_snapshot(customer_id, device, vec![]));
        snapshot.resource_type = definition.code.clone();
        snapshot.current_tier = Some(current_tier_name);
        snapshot.recommended_tier = Some(recommendation.recommended_tier);
        snapshot.recommendation_action = Some(recommendation.action);
        snapshot.recommendation_reason = Some(recommendation.reason);
        snapshot.potential_monthly_savings = Some(recommendation.estimated_monthly_savings);
        snapshot.last_synced = Utc::now();
        self.snapshots.upsert(snapshot);
    }

    fn unknown_snapshot(
        &self,
        customer_id: &str,
        device: &DeviceRef,
        available_feeds: Vec<String>,
    ) -> DeviceMetricSnapshot {
        DeviceMetricSnapshot {
            device_id: device.device_id.clone(),
            customer_id: customer_id.to_string(),
            resource_type: UNKNOWN_RESOURCE_TYPE.to_string(),
            metrics: BTreeMap::new(),
            instance_values: BTreeMap::new(),
            overall_status: crate::models::MetricStatus::Unknown,
            overall_sizing: crate::models::SizingSignal::Unknown,
            available_feeds,
            current_tier: device.current_tier.clone(),
            recommended_tier: None,
            recommendation_action: None,
            recommendation_reason: None,
            potential_monthly_savings: None,
            last_synced: Utc::now(),
        }
    }

    /// On-demand pattern-matching diagnosis for one device; lets operators
    /// tune mapping configuration without code changes.
    pub async fn diagnose_device(&self, device_id: &str) -> Result<DeviceDiagnosis, EngineError> {
        let feeds = self.client.list_feeds(device_id).await?;
        let types = self.catalog.resource_types();
        let (feed_names, matched) = self.match_device(&feeds, &types);

        let Some(definition) = matched else {
            return Ok(DeviceDiagnosis {
                device_id: device_id.to_string(),
                resource_type: UNKNOWN_RESOURCE_TYPE.to_string(),
                available_feeds: feed_names,
                diagnoses: vec![],
            });
        };

        let mut diagnoses = Vec::new();
        for mapping in definition.active_mappings() {
            let (_, diagnosis) = self.resolver.resolve_mapping(device_id, &feeds, mapping).await?;
            diagnoses.push(diagnosis);
        }

        Ok(DeviceDiagnosis {
            device_id: device_id.to_string(),
            resource_type: definition.code.clone(),
            available_feeds: feed_names,
            diagnoses,
        })
    }
}
