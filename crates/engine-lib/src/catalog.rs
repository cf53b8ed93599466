//! Read-only configuration catalog
//!
//! Resource-type definitions, metric mappings, and the tier catalog are
//! admin-managed data consumed here read-only. A default bundle covering the
//! common server and cloud-VM shapes is loaded at startup when no
//! customer-supplied configuration is present; it lives in the same
//! structures as customer data, never in static mutable state.

use crate::models::{MeasurementSpec, MetricMapping, ResourceTypeDefinition, SkuTier};

/// Read access to the pattern/threshold/tier configuration
pub trait Catalog: Send + Sync {
    /// Active resource-type definitions, ascending by sort order
    fn resource_types(&self) -> Vec<ResourceTypeDefinition>;

    /// Tiers of one (resource-type, family), ascending by rank
    fn tier_family(&self, resource_type: &str, family: &str) -> Vec<SkuTier>;

    /// Look a tier up by name within a resource type
    fn find_tier(&self, resource_type: &str, name: &str) -> Option<SkuTier>;
}

/// In-memory catalog, shared read-only across concurrent device processing
pub struct InMemoryCatalog {
    types: Vec<ResourceTypeDefinition>,
    tiers: Vec<SkuTier>,
}

impl InMemoryCatalog {
    pub fn new(mut types: Vec<ResourceTypeDefinition>, mut tiers: Vec<SkuTier>) -> Self {
        types.sort_by_key(|t| t.sort_order);
        tiers.sort_by_key(|t| t.rank);
        Self { types, tiers }
    }

    /// Catalog preloaded with the default pattern bundle
    pub fn with_defaults() -> Self {
        let (types, tiers) = default_bundle();
        Self::new(types, tiers)
    }
}

impl Catalog for InMemoryCatalog {
    fn resource_types(&self) -> Vec<ResourceTypeDefinition> {
        self.types.iter().filter(|t| t.active).cloned().collect()
    }

    fn tier_family(&self, resource_type: &str, family: &str) -> Vec<SkuTier> {
        self.tiers
            .iter()
            .filter(|t| t.resource_type == resource_type && t.family == family)
            .cloned()
            .collect()
    }

    fn find_tier(&self, resource_type: &str, name: &str) -> Option<SkuTier> {
        self.tiers
            .iter()
            .find(|t| t.resource_type == resource_type && t.name == name)
            .cloned()
    }
}

fn mapping(
    resource_type: &str,
    metric: &str,
    feed_patterns: &[&str],
    measurements: Vec<MeasurementSpec>,
    warning: f64,
    critical: f64,
    sizing: Option<(f64, f64)>,
    multi_instance: bool,
) -> MetricMapping {
    MetricMapping {
        resource_type: resource_type.to_string(),
        metric: metric.to_string(),
        feed_patterns: feed_patterns.iter().map(|s| s.to_string()).collect(),
        measurements,
        warning_threshold: warning,
        critical_threshold: critical,
        inverted: false,
        oversized_below: sizing.map(|(below, _)| below),
        undersized_above: sizing.map(|(_, above)| above),
        multi_instance,
        active: true,
    }
}

fn direct(pattern: &str) -> MeasurementSpec {
    MeasurementSpec::Direct {
        pattern: pattern.to_string(),
    }
}

fn calculated(free: &str, total: &str) -> MeasurementSpec {
    MeasurementSpec::Calculated {
        free_pattern: free.to_string(),
        total_pattern: total.to_string(),
    }
}

/// Fallback pattern tables used when no customer configuration exists.
///
/// Ordering matters: specific platform types sort first, the generic server
/// catch-all sorts last and only wins when nothing else matched.
pub fn default_bundle() -> (Vec<ResourceTypeDefinition>, Vec<SkuTier>) {
    let types = vec![
        ResourceTypeDefinition {
            code: "AzureVM".into(),
            display_name: "Azure Virtual Machine".into(),
            detection_patterns: vec!["Microsoft Azure".into(), "Azure VM".into()],
            tier_family: Some("Dv4".into()),
            mappings: vec![
                mapping(
                    "AzureVM",
                    "CPU",
                    &["Percentage CPU", "Azure CPU"],
                    vec![direct("PercentageCpu"), direct("CPUPercent")],
                    70.0,
                    90.0,
                    Some((30.0, 85.0)),
                    false,
                ),
                mapping(
                    "AzureVM",
                    "Memory",
                    &["Azure Memory", "Available Memory"],
                    vec![
                        calculated("AvailableMemoryBytes", "TotalMemoryBytes"),
                        direct("MemoryUsedPercent"),
                    ],
                    80.0,
                    95.0,
                    Some((40.0, 90.0)),
                    false,
                ),
                mapping(
                    "AzureVM",
                    "Disk",
                    &["OS Disk", "Data Disk"],
                    vec![direct("DiskUsedPercent"), direct("PercentUsed")],
                    80.0,
                    95.0,
                    None,
                    true,
                ),
            ],
            active: true,
            sort_order: 10,
        },
        ResourceTypeDefinition {
            code: "WindowsServer".into(),
            display_name: "Windows Server".into(),
            detection_patterns: vec!["WinCPU".into(), "WinOS".into(), "Windows System".into()],
            tier_family: None,
            mappings: vec![
                mapping(
                    "WindowsServer",
                    "CPU",
                    &["WinCPU", "CPU"],
                    vec![direct("CPUBusyPercent"), direct("PercentProcessorTime")],
                    70.0,
                    90.0,
                    Some((30.0, 85.0)),
                    false,
                ),
                mapping(
                    "WindowsServer",
                    "Memory",
                    &["WinOS", "Memory"],
                    vec![
                        calculated("FreePhysicalMemory", "TotalVisibleMemorySize"),
                        direct("MemoryUtilizationPercent"),
                    ],
                    80.0,
                    95.0,
                    Some((40.0, 90.0)),
                    false,
                ),
                mapping(
                    "WindowsServer",
                    "Disk",
                    &["LogicalDisk", "Disk Usage"],
                    vec![direct("PercentUsed"), direct("UsedPercent")],
                    80.0,
                    95.0,
                    None,
                    true,
                ),
            ],
            active: true,
            sort_order: 20,
        },
        ResourceTypeDefinition {
            code: "LinuxServer".into(),
            display_name: "Linux Server".into(),
            detection_patterns: vec!["NetSNMP".into(), "Linux CPU".into(), "snmp64".into()],
            tier_family: None,
            mappings: vec![
                mapping(
                    "LinuxServer",
                    "CPU",
                    &["Linux CPU", "NetSNMPCPU", "CPU"],
                    vec![direct("CPUPercent"), direct("CpuUtilization")],
                    70.0,
                    90.0,
                    Some((30.0, 85.0)),
                    false,
                ),
                mapping(
                    "LinuxServer",
                    "Memory",
                    &["NetSNMPMem", "Memory"],
                    vec![
                        calculated("memAvailReal", "memTotalReal"),
                        direct("MemoryUsedPercent"),
                    ],
                    80.0,
                    95.0,
                    Some((40.0, 90.0)),
                    false,
                ),
                mapping(
                    "LinuxServer",
                    "Disk",
                    &["Filesystem", "NetSNMPDisk", "Disk"],
                    vec![direct("PercentUsed"), direct("UsedPercent")],
                    80.0,
                    95.0,
                    None,
                    true,
                ),
            ],
            active: true,
            sort_order: 30,
        },
        // Catch-all: matches almost anything reporting a CPU feed, so it
        // must sort after every platform-specific type.
        ResourceTypeDefinition {
            code: "GenericServer".into(),
            display_name: "Generic Server".into(),
            detection_patterns: vec!["CPU".into()],
            tier_family: None,
            mappings: vec![mapping(
                "GenericServer",
                "CPU",
                &["CPU"],
                vec![direct("Percent"), direct("Util")],
                70.0,
                90.0,
                None,
                false,
            )],
            active: true,
            sort_order: 900,
        },
    ];

    let tiers = vec![
        azure_tier("D2s_v4", 1, 2.0, 8.0, 70.08),
        azure_tier("D4s_v4", 2, 4.0, 16.0, 140.16),
        azure_tier("D8s_v4", 3, 8.0, 32.0, 280.32),
        azure_tier("D16s_v4", 4, 16.0, 64.0, 560.64),
    ];

    (types, tiers)
}

fn azure_tier(name: &str, rank: u32, vcpus: f64, memory_gb: f64, monthly_cost: f64) -> SkuTier {
    SkuTier {
        resource_type: "AzureVM".into(),
        family: "Dv4".into(),
        name: name.into(),
        rank,
        vcpus,
        memory_gb,
        monthly_cost,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_sorted_ascending() {
        let catalog = InMemoryCatalog::with_defaults();
        let types = catalog.resource_types();
        assert!(!types.is_empty());
        assert!(types.windows(2).all(|w| w[0].sort_order <= w[1].sort_order));
        assert_eq!(types.last().unwrap().code, "GenericServer");
    }

    #[test]
    fn test_tier_family_ordered_by_rank() {
        let catalog = InMemoryCatalog::with_defaults();
        let family = catalog.tier_family("AzureVM", "Dv4");
        assert_eq!(family.len(), 4);
        assert!(family.windows(2).all(|w| w[0].rank < w[1].rank));
        assert_eq!(family[0].name, "D2s_v4");
    }

    #[test]
    fn test_find_tier_scoped_by_resource_type() {
        let catalog = InMemoryCatalog::with_defaults();
        assert!(catalog.find_tier("AzureVM", "D4s_v4").is_some());
        assert!(catalog.find_tier("WindowsServer", "D4s_v4").is_none());
        assert!(catalog.find_tier("AzureVM", "Nope").is_none());
    }

    #[test]
    fn test_inactive_types_filtered() {
        let (mut types, tiers) = default_bundle();
        types[0].active = false;
        let disabled_code = types[0].code.clone();
        let catalog = InMemoryCatalog::new(types, tiers);
        assert!(catalog
            .resource_types()
            .iter()
            .all(|t| t.code != disabled_code));
    }

    #[test]
    fn test_default_mappings_carry_ordered_patterns() {
        let catalog = InMemoryCatalog::with_defaults();
        let windows = catalog
            .resource_types()
            .into_iter()
            .find(|t| t.code == "WindowsServer")
            .unwrap();
        let cpu = windows
            .active_mappings()
            .find(|m| m.metric == "CPU")
            .unwrap();
        assert_eq!(cpu.feed_patterns[0], "WinCPU");
        assert!(cpu.feed_patterns.len() > 1);
    }
}
