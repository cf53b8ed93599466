//! Resource type detection from available feed names
//!
//! The feed names present on a device are the only detection signal. Types
//! are tried in ascending sort order and the first one with any detection
//! pattern appearing in any feed name wins; ties are broken purely by sort
//! order, so generic catch-all types must be configured to sort last.

use crate::models::ResourceTypeDefinition;
use crate::pattern::contains_ci;
use tracing::debug;

/// Pick the resource type for a device from its available feed names.
///
/// `types` must contain active definitions; they are evaluated in ascending
/// `sort_order`. Returns `None` when nothing matched (the device is reported
/// as Unknown and carries no metrics).
pub fn match_resource_type<'a>(
    types: &'a [ResourceTypeDefinition],
    feed_names: &[String],
) -> Option<&'a ResourceTypeDefinition> {
    let mut ordered: Vec<&ResourceTypeDefinition> =
        types.iter().filter(|t| t.active).collect();
    ordered.sort_by_key(|t| t.sort_order);

    for def in ordered {
        let matched = def
            .detection_patterns
            .iter()
            .any(|p| feed_names.iter().any(|f| contains_ci(f, p)));
        if matched {
            debug!(resource_type = %def.code, "Matched resource type");
            return Some(def);
        }
    }

    debug!(feeds = feed_names.len(), "No resource type matched");
    None
}
