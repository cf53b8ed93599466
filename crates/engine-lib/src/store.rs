//! Persistence seams for snapshots, daily aggregates, and batch jobs
//!
//! Everything is keyed uniquely per device (and metric/date where relevant),
//! so different devices never contend. Upserts are last-writer-wins by
//! design; same-device concurrent syncs must be serialized by the caller.

use crate::models::{
    BatchKind, DailyMetricAggregate, DeviceMetricSnapshot, JobRecord, JobStatus,
};
use chrono::NaiveDate;
use dashmap::DashMap;

/// Store of the latest per-device snapshot
pub trait SnapshotStore: Send + Sync {
    fn upsert(&self, snapshot: DeviceMetricSnapshot);
    fn get(&self, device_id: &str) -> Option<DeviceMetricSnapshot>;
    fn list(&self) -> Vec<DeviceMetricSnapshot>;
}

/// Store of daily aggregates with one row per (device, metric, date)
pub trait AggregateStore: Send + Sync {
    /// Insert or overwrite the row for the aggregate's key
    fn upsert(&self, row: DailyMetricAggregate);

    /// Rows for (device, metric) within the trailing window ending at `end`
    /// (inclusive), ordered by date ascending
    fn window(
        &self,
        device_id: &str,
        metric: &str,
        end: NaiveDate,
        days: u32,
    ) -> Vec<DailyMetricAggregate>;
}

/// Store of batch job records
pub trait JobStore: Send + Sync {
    fn upsert(&self, job: JobRecord);
    fn get(&self, id: &str) -> Option<JobRecord>;

    /// The in-progress job for (customer, kind), if any. Used to dedupe
    /// concurrent starts; the short check-then-act race is tolerated.
    fn active_for(&self, customer_id: &str, kind: BatchKind) -> Option<JobRecord>;
}

/// In-memory snapshot store keyed by device id
#[derive(Default)]
pub struct InMemorySnapshotStore {
    snapshots: DashMap<String, DeviceMetricSnapshot>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for InMemorySnapshotStore {
    fn upsert(&self, snapshot: DeviceMetricSnapshot) {
        self.snapshots.insert(snapshot.device_id.clone(), snapshot);
    }

    fn get(&self, device_id: &str) -> Option<DeviceMetricSnapshot> {
        self.snapshots.get(device_id).map(|s| s.clone())
    }

    fn list(&self) -> Vec<DeviceMetricSnapshot> {
        self.snapshots.iter().map(|s| s.clone()).collect()
    }
}

/// In-memory aggregate store keyed by (device, metric, date)
#[derive(Default)]
pub struct InMemoryAggregateStore {
    rows: DashMap<(String, String, NaiveDate), DailyMetricAggregate>,
}

impl InMemoryAggregateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AggregateStore for InMemoryAggregateStore {
    fn upsert(&self, row: DailyMetricAggregate) {
        let key = (row.device_id.clone(), row.metric.clone(), row.date);
        self.rows.insert(key, row);
    }

    fn window(
        &self,
        device_id: &str,
        metric: &str,
        end: NaiveDate,
        days: u32,
    ) -> Vec<DailyMetricAggregate> {
        let start = end - chrono::Duration::days(days as i64 - 1);
        let mut rows: Vec<DailyMetricAggregate> = self
            .rows
            .iter()
            .filter(|entry| {
                let (dev, met, date) = entry.key();
                dev == device_id && met == metric && *date >= start && *date <= end
            })
            .map(|entry| entry.value().clone())
            .collect();
        rows.sort_by_key(|r| r.date);
        rows
    }
}

/// In-memory job store keyed by job id
#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: DashMap<String, JobRecord>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl JobStore for InMemoryJobStore {
    fn upsert(&self, job: JobRecord) {
        self.jobs.insert(job.id.clone(), job);
    }

    fn get(&self, id: &str) -> Option<JobRecord> {
        self.jobs.get(id).map(|j| j.clone())
    }

    fn active_for(&self, customer_id: &str, kind: BatchKind) -> Option<JobRecord> {
        self.jobs
            .iter()
            .find(|j| {
                j.customer_id == customer_id
                    && j.kind == kind
                    && j.status == JobStatus::InProgress
            })
            .map(|j| j.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MetricStatus, SizingSignal};
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn snapshot(device: &str) -> DeviceMetricSnapshot {
        DeviceMetricSnapshot {
            device_id: device.into(),
            customer_id: "cust-1".into(),
            resource_type: "WindowsServer".into(),
            metrics: BTreeMap::new(),
            instance_values: BTreeMap::new(),
            overall_status: MetricStatus::Unknown,
            overall_sizing: SizingSignal::Unknown,
            available_feeds: vec![],
            current_tier: None,
            recommended_tier: None,
            recommendation_action: None,
            recommendation_reason: None,
            potential_monthly_savings: None,
            last_synced: Utc::now(),
        }
    }

    fn aggregate(device: &str, metric: &str, date: NaiveDate, avg: f64) -> DailyMetricAggregate {
        DailyMetricAggregate {
            device_id: device.into(),
            metric: metric.into(),
            date,
            avg,
            min: avg - 5.0,
            max: avg + 5.0,
            p95: avg + 4.0,
            sample_count: 24,
        }
    }

    #[test]
    fn test_snapshot_upsert_replaces() {
        let store = InMemorySnapshotStore::new();
        store.upsert(snapshot("dev-1"));

        let mut updated = snapshot("dev-1");
        updated.resource_type = "LinuxServer".into();
        store.upsert(updated);

        assert_eq!(store.list().len(), 1);
        assert_eq!(store.get("dev-1").unwrap().resource_type, "LinuxServer");
    }

    #[test]
    fn test_aggregate_upsert_is_idempotent() {
        let store = InMemoryAggregateStore::new();
        let date = NaiveDate::from_ymd_opt(2026, 8, 1).unwrap();

        store.upsert(aggregate("dev-1", "CPU", date, 50.0));
        store.upsert(aggregate("dev-1", "CPU", date, 50.0));

        let rows = store.window("dev-1", "CPU", date, 90);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].avg, 50.0);
    }

    #[test]
    fn test_aggregate_reprocessing_overwrites() {
        let store = InMemoryAggregateStore::new();
        let date = NaiveDate::from_ymd_opt(2026, 8, 1).unwrap();

        store.upsert(aggregate("dev-1", "CPU", date, 50.0));
        store.upsert(aggregate("dev-1", "CPU", date, 70.0));

        let rows = store.window("dev-1", "CPU", date, 90);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].avg, 70.0);
    }

    #[test]
    fn test_window_bounds_and_ordering() {
        let store = InMemoryAggregateStore::new();
        let end = NaiveDate::from_ymd_opt(2026, 8, 31).unwrap();

        for offset in 0..100i64 {
            let date = end - chrono::Duration::days(offset);
            store.upsert(aggregate("dev-1", "CPU", date, 40.0));
        }
        // Different metric and device must not leak in
        store.upsert(aggregate("dev-1", "Memory", end, 60.0));
        store.upsert(aggregate("dev-2", "CPU", end, 60.0));

        let rows = store.window("dev-1", "CPU", end, 90);
        assert_eq!(rows.len(), 90);
        assert!(rows.windows(2).all(|w| w[0].date < w[1].date));
        assert_eq!(rows.last().unwrap().date, end);
    }

    #[test]
    fn test_job_dedupe_by_customer_and_kind() {
        let store = InMemoryJobStore::new();
        let job = JobRecord {
            id: "job-1".into(),
            customer_id: "cust-1".into(),
            kind: BatchKind::Status,
            status: JobStatus::InProgress,
            processed: 0,
            total: 5,
            errors: vec![],
            message: None,
            started_at: Utc::now(),
            finished_at: None,
        };
        store.upsert(job.clone());

        assert!(store.active_for("cust-1", BatchKind::Status).is_some());
        assert!(store.active_for("cust-1", BatchKind::Rightsizing).is_none());
        assert!(store.active_for("cust-2", BatchKind::Status).is_none());

        let mut done = job;
        done.status = JobStatus::Completed;
        store.upsert(done);
        assert!(store.active_for("cust-1", BatchKind::Status).is_none());
    }
}
