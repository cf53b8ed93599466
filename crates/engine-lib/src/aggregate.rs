//! Historical daily aggregation and trailing-window rollup
//!
//! Raw series chunks are grouped by UTC calendar date and reduced to
//! avg/min/max/p95 per day. The 90-day window rollup computes its p95 over
//! the daily p95 values (percentile-of-percentiles) rather than over raw
//! samples; that approximation is intentional and preserved as specified.

use crate::models::{DailyMetricAggregate, WindowMetrics};
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::BTreeMap;

/// Value at the ascending rank `ceil(p * n)` (1-indexed, clamped to [1, n]).
///
/// `values` does not need to be sorted.
pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted: Vec<f64> = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = sorted.len();
    let rank = ((p * n as f64).ceil() as usize).clamp(1, n);
    Some(sorted[rank - 1])
}

fn date_of_millis(millis: i64) -> Option<NaiveDate> {
    DateTime::<Utc>::from_timestamp_millis(millis).map(|dt| dt.date_naive())
}

/// Roll one (device, metric) chunk into daily aggregates.
///
/// `timestamps` (epoch millis) and `values` are paired positionally; trailing
/// unpaired entries are discarded. Values are assumed already range-checked
/// by the resolver. Returns one row per calendar date present in the chunk.
pub fn aggregate_daily(
    device_id: &str,
    metric: &str,
    timestamps: &[i64],
    values: &[f64],
) -> Vec<DailyMetricAggregate> {
    let mut by_date: BTreeMap<NaiveDate, Vec<f64>> = BTreeMap::new();
    for (ts, value) in timestamps.iter().zip(values.iter()) {
        if let Some(date) = date_of_millis(*ts) {
            by_date.entry(date).or_default().push(*value);
        }
    }

    by_date
        .into_iter()
        .map(|(date, samples)| {
            let sum: f64 = samples.iter().sum();
            let min = samples.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = samples.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            DailyMetricAggregate {
                device_id: device_id.to_string(),
                metric: metric.to_string(),
                date,
                avg: sum / samples.len() as f64,
                min,
                max,
                // samples is non-empty here, so percentile cannot return None
                p95: percentile(&samples, 0.95).unwrap_or(max),
                sample_count: samples.len(),
            }
        })
        .collect()
}

/// Roll a set of daily aggregates into window metrics.
///
/// Returns `None` for an empty window. The caller supplies the trailing-90-day
/// slice; this function does not filter by date.
pub fn window_rollup(days: &[DailyMetricAggregate]) -> Option<WindowMetrics> {
    if days.is_empty() {
        return None;
    }

    let avg = days.iter().map(|d| d.avg).sum::<f64>() / days.len() as f64;
    let max = days
        .iter()
        .map(|d| d.max)
        .fold(f64::NEG_INFINITY, f64::max);
    let daily_p95s: Vec<f64> = days.iter().map(|d| d.p95).collect();

    Some(WindowMetrics {
        avg,
        max,
        p95: percentile(&daily_p95s, 0.95).unwrap_or(max),
        days: days.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn millis(y: i32, m: u32, d: u32, h: u32) -> i64 {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0)
            .unwrap()
            .timestamp_millis()
    }

    #[test]
    fn test_percentile_rank_formula() {
        // n=10: rank = ceil(0.95 * 10) = 10 -> the largest value
        let values: Vec<f64> = (1..=10).map(|v| v as f64).collect();
        assert_eq!(percentile(&values, 0.95), Some(10.0));

        // n=20: rank = ceil(19.0) = 19 -> second largest
        let values: Vec<f64> = (1..=20).map(|v| v as f64).collect();
        assert_eq!(percentile(&values, 0.95), Some(19.0));

        // Single sample clamps to rank 1
        assert_eq!(percentile(&[42.0], 0.95), Some(42.0));
        assert_eq!(percentile(&[], 0.95), None);
    }

    #[test]
    fn test_percentile_unsorted_input() {
        let values = vec![30.0, 10.0, 50.0, 20.0, 40.0];
        // n=5: rank = ceil(4.75) = 5 -> largest
        assert_eq!(percentile(&values, 0.95), Some(50.0));
    }

    #[test]
    fn test_daily_grouping_by_calendar_date() {
        let timestamps = vec![
            millis(2026, 8, 1, 6),
            millis(2026, 8, 1, 18),
            millis(2026, 8, 2, 6),
        ];
        let values = vec![40.0, 60.0, 80.0];

        let days = aggregate_daily("dev-1", "CPU", &timestamps, &values);
        assert_eq!(days.len(), 2);

        let day1 = &days[0];
        assert_eq!(day1.date, NaiveDate::from_ymd_opt(2026, 8, 1).unwrap());
        assert_eq!(day1.avg, 50.0);
        assert_eq!(day1.min, 40.0);
        assert_eq!(day1.max, 60.0);
        assert_eq!(day1.sample_count, 2);

        let day2 = &days[1];
        assert_eq!(day2.sample_count, 1);
        assert_eq!(day2.avg, 80.0);
        assert_eq!(day2.p95, 80.0);
    }

    #[test]
    fn test_trailing_unpaired_entries_discarded() {
        let timestamps = vec![millis(2026, 8, 1, 6), millis(2026, 8, 1, 7)];
        let values = vec![50.0]; // one fewer value than timestamps

        let days = aggregate_daily("dev-1", "CPU", &timestamps, &values);
        assert_eq!(days.len(), 1);
        assert_eq!(days[0].sample_count, 1);
    }

    #[test]
    fn test_reaggregation_is_deterministic() {
        let timestamps = vec![millis(2026, 8, 1, 1), millis(2026, 8, 1, 2)];
        let values = vec![10.0, 90.0];

        let first = aggregate_daily("dev-1", "CPU", &timestamps, &values);
        let second = aggregate_daily("dev-1", "CPU", &timestamps, &values);

        assert_eq!(first.len(), second.len());
        assert_eq!(first[0].avg, second[0].avg);
        assert_eq!(first[0].p95, second[0].p95);
        assert_eq!(first[0].min, second[0].min);
        assert_eq!(first[0].max, second[0].max);
    }

    #[test]
    fn test_window_rollup_over_daily_values() {
        let days: Vec<DailyMetricAggregate> = (1..=10)
            .map(|d| DailyMetricAggregate {
                device_id: "dev-1".into(),
                metric: "CPU".into(),
                date: NaiveDate::from_ymd_opt(2026, 8, d).unwrap(),
                avg: d as f64 * 10.0,
                min: 0.0,
                max: d as f64 * 10.0 + 5.0,
                p95: d as f64 * 10.0 + 2.0,
                sample_count: 24,
            })
            .collect();

        let window = window_rollup(&days).unwrap();
        // avg of 10..=100 step 10
        assert!((window.avg - 55.0).abs() < 1e-9);
        assert_eq!(window.max, 105.0);
        // p95 over daily p95s [12, 22, ..., 102]: rank ceil(9.5)=10 -> 102
        assert_eq!(window.p95, 102.0);
        assert_eq!(window.days, 10);
    }

    #[test]
    fn test_window_rollup_empty() {
        assert!(window_rollup(&[]).is_none());
    }
}
