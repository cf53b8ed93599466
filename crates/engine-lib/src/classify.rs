//! Status and sizing classification
//!
//! Converts an extracted utilization value plus a mapping's thresholds into a
//! health status and a sizing signal, and rolls per-metric results up to a
//! device-level status. The rollup is worst-of, in the same shape as the
//! component-health rollup elsewhere in the stack.

use crate::models::{MetricMapping, MetricStatus, SizingSignal};

/// Classify a value against the mapping's warning/critical thresholds.
///
/// `None` classifies as Unknown. For inverted mappings lower is worse.
pub fn classify_status(value: Option<f64>, mapping: &MetricMapping) -> MetricStatus {
    let Some(v) = value else {
        return MetricStatus::Unknown;
    };

    if mapping.inverted {
        if v <= mapping.critical_threshold {
            MetricStatus::Critical
        } else if v <= mapping.warning_threshold {
            MetricStatus::Warning
        } else {
            MetricStatus::Healthy
        }
    } else if v >= mapping.critical_threshold {
        MetricStatus::Critical
    } else if v >= mapping.warning_threshold {
        MetricStatus::Warning
    } else {
        MetricStatus::Healthy
    }
}

/// Classify a value into a sizing signal.
///
/// Returns Unknown when the mapping carries no sizing thresholds or no value
/// is available.
pub fn classify_sizing(value: Option<f64>, mapping: &MetricMapping) -> SizingSignal {
    let Some(v) = value else {
        return SizingSignal::Unknown;
    };
    if mapping.oversized_below.is_none() && mapping.undersized_above.is_none() {
        return SizingSignal::Unknown;
    }

    if let Some(below) = mapping.oversized_below {
        if v < below {
            return SizingSignal::Oversized;
        }
    }
    if let Some(above) = mapping.undersized_above {
        if v > above {
            return SizingSignal::Undersized;
        }
    }
    SizingSignal::RightSized
}

/// Worst-of rollup: Critical > Warning > Healthy > Unknown.
///
/// An empty iterator (no defined metrics) rolls up to Unknown.
pub fn rollup_status<I: IntoIterator<Item = MetricStatus>>(statuses: I) -> MetricStatus {
    statuses
        .into_iter()
        .max_by_key(MetricStatus::severity)
        .unwrap_or(MetricStatus::Unknown)
}

/// Sizing rollup: any undersized metric dominates, then oversized, then
/// right-sized.
pub fn rollup_sizing<I: IntoIterator<Item = SizingSignal>>(signals: I) -> SizingSignal {
    signals
        .into_iter()
        .max_by_key(SizingSignal::dominance)
        .unwrap_or(SizingSignal::Unknown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MeasurementSpec;

    fn mapping(warning: f64, critical: f64, inverted: bool) -> MetricMapping {
        MetricMapping {
            resource_type: "WindowsServer".into(),
            metric: "CPU".into(),
            feed_patterns: vec!["CPU".into()],
            measurements: vec![MeasurementSpec::Direct {
                pattern: "CPUBusyPercent".into(),
            }],
            warning_threshold: warning,
            critical_threshold: critical,
            inverted,
            oversized_below: None,
            undersized_above: None,
            multi_instance: false,
            active: true,
        }
    }

    #[test]
    fn test_non_inverted_thresholds() {
        let m = mapping(70.0, 90.0, false);
        assert_eq!(classify_status(Some(65.0), &m), MetricStatus::Healthy);
        assert_eq!(classify_status(Some(75.0), &m), MetricStatus::Warning);
        assert_eq!(classify_status(Some(95.0), &m), MetricStatus::Critical);
        assert_eq!(classify_status(Some(90.0), &m), MetricStatus::Critical);
        assert_eq!(classify_status(Some(70.0), &m), MetricStatus::Warning);
    }

    #[test]
    fn test_inverted_thresholds() {
        // e.g. free-space percent: lower is worse
        let m = mapping(20.0, 10.0, true);
        assert_eq!(classify_status(Some(50.0), &m), MetricStatus::Healthy);
        assert_eq!(classify_status(Some(15.0), &m), MetricStatus::Warning);
        assert_eq!(classify_status(Some(5.0), &m), MetricStatus::Critical);
        assert_eq!(classify_status(Some(10.0), &m), MetricStatus::Critical);
    }

    #[test]
    fn test_none_is_unknown() {
        let m = mapping(70.0, 90.0, false);
        assert_eq!(classify_status(None, &m), MetricStatus::Unknown);
        assert_eq!(classify_sizing(None, &m), SizingSignal::Unknown);
    }

    #[test]
    fn test_sizing_requires_configured_thresholds() {
        let m = mapping(70.0, 90.0, false);
        assert_eq!(classify_sizing(Some(5.0), &m), SizingSignal::Unknown);
    }

    #[test]
    fn test_sizing_bands() {
        let mut m = mapping(70.0, 90.0, false);
        m.oversized_below = Some(30.0);
        m.undersized_above = Some(85.0);

        assert_eq!(classify_sizing(Some(20.0), &m), SizingSignal::Oversized);
        assert_eq!(classify_sizing(Some(50.0), &m), SizingSignal::RightSized);
        assert_eq!(classify_sizing(Some(92.0), &m), SizingSignal::Undersized);
        // Boundary values are right-sized
        assert_eq!(classify_sizing(Some(30.0), &m), SizingSignal::RightSized);
        assert_eq!(classify_sizing(Some(85.0), &m), SizingSignal::RightSized);
    }

    #[test]
    fn test_status_rollup_worst_of() {
        assert_eq!(
            rollup_status([MetricStatus::Healthy, MetricStatus::Critical, MetricStatus::Warning]),
            MetricStatus::Critical
        );
        assert_eq!(
            rollup_status([MetricStatus::Healthy, MetricStatus::Unknown]),
            MetricStatus::Healthy
        );
        assert_eq!(rollup_status([]), MetricStatus::Unknown);
    }

    #[test]
    fn test_sizing_rollup_undersized_dominates() {
        assert_eq!(
            rollup_sizing([SizingSignal::Oversized, SizingSignal::Undersized]),
            SizingSignal::Undersized
        );
        assert_eq!(
            rollup_sizing([SizingSignal::RightSized, SizingSignal::Oversized]),
            SizingSignal::Oversized
        );
        assert_eq!(rollup_sizing([]), SizingSignal::Unknown);
    }
}
