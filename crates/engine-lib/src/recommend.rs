//! SKU recommendation engine
//!
//! Turns 90-day window percentiles and the tier catalog into an
//! up/down/keep decision. Recommendations move exactly one rank within the
//! current (resource-type, family) and never cross families.

use crate::models::{RecommendationAction, SkuRecommendation, SkuTier, WindowMetrics};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Thresholds driving the rightsizing decision; defaults match the
/// documented operating policy and are configurable per deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationThresholds {
    /// Oversized candidate when CPU p95 is below this AND memory p95 is
    /// below `mem_oversized_below`
    pub cpu_oversized_below: f64,
    pub mem_oversized_below: f64,
    /// Undersized candidate when CPU p95 is above this OR memory p95 is
    /// above `mem_undersized_above`
    pub cpu_undersized_above: f64,
    pub mem_undersized_above: f64,
    /// Minimum daily aggregates required in the window before any
    /// recommendation is produced
    pub min_window_days: usize,
}

impl Default for RecommendationThresholds {
    fn default() -> Self {
        Self {
            cpu_oversized_below: 30.0,
            mem_oversized_below: 40.0,
            cpu_undersized_above: 85.0,
            mem_undersized_above: 90.0,
            min_window_days: 8,
        }
    }
}

/// Rightsizing decision engine
pub struct SkuEngine {
    thresholds: RecommendationThresholds,
}

impl Default for SkuEngine {
    fn default() -> Self {
        Self::new(RecommendationThresholds::default())
    }
}

impl SkuEngine {
    pub fn new(thresholds: RecommendationThresholds) -> Self {
        Self { thresholds }
    }

    /// Produce a recommendation for a device on `current_tier_name`.
    ///
    /// `family` must be the ordered tier list for the current tier's
    /// (resource-type, family), ascending by rank. Returns `None` when the
    /// window is too short or the current tier is not in the family.
    pub fn recommend(
        &self,
        current_tier_name: &str,
        family: &[SkuTier],
        cpu: &WindowMetrics,
        memory: &WindowMetrics,
    ) -> Option<SkuRecommendation> {
        if cpu.days.min(memory.days) < self.thresholds.min_window_days {
            debug!(
                cpu_days = cpu.days,
                memory_days = memory.days,
                required = self.thresholds.min_window_days,
                "Window too short for recommendation"
            );
            return None;
        }

        let position = family.iter().position(|t| t.name == current_tier_name)?;
        let current = &family[position];

        if family.len() == 1 {
            return Some(keep(current, "no alternative available in tier family"));
        }

        let undersized = cpu.p95 > self.thresholds.cpu_undersized_above
            || memory.p95 > self.thresholds.mem_undersized_above;
        let oversized = cpu.p95 < self.thresholds.cpu_oversized_below
            && memory.p95 < self.thresholds.mem_oversized_below;

        // Undersized takes priority when both trigger
        if undersized {
            return Some(match family.get(position + 1) {
                None => keep(
                    current,
                    "already largest tier in family, consider a different family",
                ),
                Some(next) => SkuRecommendation {
                    current_tier: current.name.clone(),
                    recommended_tier: next.name.clone(),
                    action: RecommendationAction::Upsize,
                    reason: format!(
                        "CPU p95 {:.1}% / memory p95 {:.1}% exceed undersized thresholds",
                        cpu.p95, memory.p95
                    ),
                    estimated_monthly_savings: -(next.monthly_cost - current.monthly_cost),
                },
            });
        }

        if oversized {
            if position == 0 {
                return Some(keep(current, "already smallest tier in family"));
            }
            let previous = &family[position - 1];
            return Some(SkuRecommendation {
                current_tier: current.name.clone(),
                recommended_tier: previous.name.clone(),
                action: RecommendationAction::Downsize,
                reason: format!(
                    "CPU p95 {:.1}% and memory p95 {:.1}% below oversized thresholds",
                    cpu.p95, memory.p95
                ),
                estimated_monthly_savings: current.monthly_cost - previous.monthly_cost,
            });
        }

        Some(keep(current, "utilization is right-sized for current tier"))
    }
}

fn keep(current: &SkuTier, reason: &str) -> SkuRecommendation {
    SkuRecommendation {
        current_tier: current.name.clone(),
        recommended_tier: current.name.clone(),
        action: RecommendationAction::KeepCurrent,
        reason: reason.to_string(),
        estimated_monthly_savings: 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tier(name: &str, rank: u32, cost: f64) -> SkuTier {
        SkuTier {
            resource_type: "AzureVM".into(),
            family: "Dv4".into(),
            name: name.into(),
            rank,
            vcpus: rank as f64 * 2.0,
            memory_gb: rank as f64 * 8.0,
            monthly_cost: cost,
        }
    }

    fn d_family() -> Vec<SkuTier> {
        vec![
            tier("D2s_v4", 1, 70.0),
            tier("D4s_v4", 2, 140.0),
            tier("D8s_v4", 3, 280.0),
        ]
    }

    fn window(p95: f64, days: usize) -> WindowMetrics {
        WindowMetrics {
            avg: p95 * 0.8,
            max: (p95 * 1.1).min(100.0),
            p95,
            days,
        }
    }

    #[test]
    fn test_oversized_recommends_next_smaller() {
        let engine = SkuEngine::default();
        let rec = engine
            .recommend("D4s_v4", &d_family(), &window(25.0, 90), &window(35.0, 90))
            .unwrap();

        assert_eq!(rec.action, RecommendationAction::Downsize);
        assert_eq!(rec.recommended_tier, "D2s_v4");
        assert_eq!(rec.estimated_monthly_savings, 70.0);
        assert!(rec.estimated_monthly_savings > 0.0);
    }

    #[test]
    fn test_undersized_recommends_next_larger_with_negative_savings() {
        let engine = SkuEngine::default();
        let rec = engine
            .recommend("D4s_v4", &d_family(), &window(92.0, 90), &window(50.0, 90))
            .unwrap();

        assert_eq!(rec.action, RecommendationAction::Upsize);
        assert_eq!(rec.recommended_tier, "D8s_v4");
        assert_eq!(rec.estimated_monthly_savings, -140.0);
    }

    #[test]
    fn test_undersized_memory_alone_triggers() {
        let engine = SkuEngine::default();
        let rec = engine
            .recommend("D2s_v4", &d_family(), &window(40.0, 90), &window(95.0, 90))
            .unwrap();
        assert_eq!(rec.action, RecommendationAction::Upsize);
    }

    #[test]
    fn test_oversized_requires_both_cpu_and_memory() {
        let engine = SkuEngine::default();
        // CPU low but memory above its oversized threshold: keep
        let rec = engine
            .recommend("D4s_v4", &d_family(), &window(20.0, 90), &window(60.0, 90))
            .unwrap();
        assert_eq!(rec.action, RecommendationAction::KeepCurrent);
        assert_eq!(rec.recommended_tier, "D4s_v4");
    }

    #[test]
    fn test_undersized_beats_oversized() {
        // CPU under the oversized bound, memory over the undersized bound:
        // both conditions trigger, undersized wins.
        let engine = SkuEngine::default();
        let rec = engine
            .recommend("D4s_v4", &d_family(), &window(20.0, 90), &window(95.0, 90))
            .unwrap();
        assert_eq!(rec.action, RecommendationAction::Upsize);
    }

    #[test]
    fn test_smallest_tier_oversized_keeps_current() {
        let engine = SkuEngine::default();
        let rec = engine
            .recommend("D2s_v4", &d_family(), &window(10.0, 90), &window(15.0, 90))
            .unwrap();

        assert_eq!(rec.action, RecommendationAction::KeepCurrent);
        assert_eq!(rec.recommended_tier, "D2s_v4");
        assert!(rec.reason.contains("already smallest"));
    }

    #[test]
    fn test_largest_tier_undersized_keeps_current() {
        let engine = SkuEngine::default();
        let rec = engine
            .recommend("D8s_v4", &d_family(), &window(95.0, 90), &window(50.0, 90))
            .unwrap();

        assert_eq!(rec.action, RecommendationAction::KeepCurrent);
        assert!(rec.reason.contains("different family"));
    }

    #[test]
    fn test_single_tier_family_always_keeps() {
        let engine = SkuEngine::default();
        let family = vec![tier("D2s_v4", 1, 70.0)];
        let rec = engine
            .recommend("D2s_v4", &family, &window(5.0, 90), &window(5.0, 90))
            .unwrap();

        assert_eq!(rec.action, RecommendationAction::KeepCurrent);
        assert!(rec.reason.contains("no alternative"));
    }

    #[test]
    fn test_short_window_produces_nothing() {
        let engine = SkuEngine::default();
        assert!(engine
            .recommend("D4s_v4", &d_family(), &window(25.0, 7), &window(35.0, 90))
            .is_none());
        assert!(engine
            .recommend("D4s_v4", &d_family(), &window(25.0, 8), &window(35.0, 8))
            .is_some());
    }

    #[test]
    fn test_unknown_current_tier_produces_nothing() {
        let engine = SkuEngine::default();
        assert!(engine
            .recommend("E16s_v5", &d_family(), &window(25.0, 90), &window(35.0, 90))
            .is_none());
    }
}
