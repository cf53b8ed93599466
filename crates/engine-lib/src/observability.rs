//! Observability infrastructure for the utilization engine
//!
//! Provides:
//! - Prometheus metrics (device sync latency, feed-call errors, resolver and
//!   recommendation counters, running-batch gauge)
//! - Structured JSON event logging with tracing

use prometheus::{
    register_histogram, register_int_counter, register_int_gauge, Histogram, IntCounter, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for per-device sync latency (in seconds); syncs make
/// several remote calls, so buckets run well past a minute.
const SYNC_LATENCY_BUCKETS: &[f64] = &[
    0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<EngineMetricsInner> = OnceLock::new();

/// Inner metrics structure that holds the actual Prometheus metrics
struct EngineMetricsInner {
    device_sync_latency_seconds: Histogram,
    devices_processed: IntCounter,
    device_errors: IntCounter,
    feed_call_errors: IntCounter,
    metrics_resolved: IntCounter,
    metrics_undefined: IntCounter,
    daily_aggregates_upserted: IntCounter,
    recommendations_generated: IntCounter,
    batches_in_progress: IntGauge,
}

impl EngineMetricsInner {
    fn new() -> Self {
        Self {
            device_sync_latency_seconds: register_histogram!(
                "rightsizer_device_sync_latency_seconds",
                "Time spent syncing one device end to end",
                SYNC_LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register device_sync_latency_seconds"),

            devices_processed: register_int_counter!(
                "rightsizer_devices_processed_total",
                "Devices processed across all batches"
            )
            .expect("Failed to register devices_processed"),

            device_errors: register_int_counter!(
                "rightsizer_device_errors_total",
                "Devices abandoned due to a feed service failure"
            )
            .expect("Failed to register device_errors"),

            feed_call_errors: register_int_counter!(
                "rightsizer_feed_call_errors_total",
                "Failed calls to the monitoring feed API"
            )
            .expect("Failed to register feed_call_errors"),

            metrics_resolved: register_int_counter!(
                "rightsizer_metrics_resolved_total",
                "Metric mappings that produced an accepted value"
            )
            .expect("Failed to register metrics_resolved"),

            metrics_undefined: register_int_counter!(
                "rightsizer_metrics_undefined_total",
                "Metric mappings left undefined (no feed, no data, or out of range)"
            )
            .expect("Failed to register metrics_undefined"),

            daily_aggregates_upserted: register_int_counter!(
                "rightsizer_daily_aggregates_upserted_total",
                "Daily aggregate rows written"
            )
            .expect("Failed to register daily_aggregates_upserted"),

            recommendations_generated: register_int_counter!(
                "rightsizer_recommendations_generated_total",
                "SKU recommendations produced"
            )
            .expect("Failed to register recommendations_generated"),

            batches_in_progress: register_int_gauge!(
                "rightsizer_batches_in_progress",
                "Sync batches currently running"
            )
            .expect("Failed to register batches_in_progress"),
        }
    }
}

/// Engine metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct EngineMetrics {
    _private: (),
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(EngineMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &EngineMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    pub fn observe_device_sync_latency(&self, duration_secs: f64) {
        self.inner().device_sync_latency_seconds.observe(duration_secs);
    }

    pub fn inc_devices_processed(&self) {
        self.inner().devices_processed.inc();
    }

    pub fn inc_device_errors(&self) {
        self.inner().device_errors.inc();
    }

    pub fn inc_feed_call_errors(&self) {
        self.inner().feed_call_errors.inc();
    }

    pub fn add_metrics_resolved(&self, count: u64) {
        self.inner().metrics_resolved.inc_by(count);
    }

    pub fn add_metrics_undefined(&self, count: u64) {
        self.inner().metrics_undefined.inc_by(count);
    }

    pub fn add_daily_aggregates(&self, count: u64) {
        self.inner().daily_aggregates_upserted.inc_by(count);
    }

    pub fn inc_recommendations_generated(&self) {
        self.inner().recommendations_generated.inc();
    }

    pub fn batch_started(&self) {
        self.inner().batches_in_progress.inc();
    }

    pub fn batch_finished(&self) {
        self.inner().batches_in_progress.dec();
    }
}

/// Structured logger for significant engine events
///
/// Keeps a consistent JSON event shape for sync lifecycle, recommendations,
/// and abandoned devices.
#[derive(Clone)]
pub struct StructuredLogger {
    worker_name: String,
}

impl StructuredLogger {
    pub fn new(worker_name: impl Into<String>) -> Self {
        Self {
            worker_name: worker_name.into(),
        }
    }

    pub fn log_startup(&self, version: &str) {
        info!(
            event = "engine_started",
            worker = %self.worker_name,
            version = %version,
            "Utilization engine started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "engine_stopped",
            worker = %self.worker_name,
            reason = %reason,
            "Utilization engine stopped"
        );
    }

    pub fn log_batch_finished(
        &self,
        job_id: &str,
        customer_id: &str,
        processed: usize,
        total: usize,
        errors: usize,
    ) {
        info!(
            event = "batch_finished",
            worker = %self.worker_name,
            job_id = %job_id,
            customer_id = %customer_id,
            processed = processed,
            total = total,
            errors = errors,
            "Sync batch finished"
        );
    }

    pub fn log_device_abandoned(&self, job_id: &str, device_id: &str, error: &str) {
        warn!(
            event = "device_abandoned",
            worker = %self.worker_name,
            job_id = %job_id,
            device_id = %device_id,
            error = %error,
            "Device abandoned after feed service failure"
        );
    }

    pub fn log_recommendation(
        &self,
        device_id: &str,
        current_tier: &str,
        recommended_tier: &str,
        action: &str,
        savings: f64,
    ) {
        info!(
            event = "recommendation_generated",
            worker = %self.worker_name,
            device_id = %device_id,
            current_tier = %current_tier,
            recommended_tier = %recommended_tier,
            action = %action,
            estimated_monthly_savings = savings,
            "Generated tier recommendation"
        );
    }
}
