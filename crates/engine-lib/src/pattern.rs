//! Ordered first-match-wins pattern matching
//!
//! The same tie-break semantics recur at three sites: resource-type
//! detection, feed selection, and measurement-column selection. All three go
//! through this module so pattern order always beats candidate order.

/// Case-insensitive substring test.
pub fn contains_ci(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Result of an ordered pattern match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternMatch {
    /// Index into the pattern list of the pattern that matched
    pub pattern_index: usize,
    /// Index into the candidate list of the matched candidate
    pub candidate_index: usize,
}

/// Find the first (pattern, candidate) pair where the pattern is a
/// case-insensitive substring of the candidate.
///
/// Patterns form the outer loop: an earlier pattern always wins over a later
/// one regardless of candidate order. Within one pattern, the first matching
/// candidate wins. No backtracking.
pub fn first_match<P, C>(patterns: &[P], candidates: &[C]) -> Option<PatternMatch>
where
    P: AsRef<str>,
    C: AsRef<str>,
{
    for (pi, pattern) in patterns.iter().enumerate() {
        for (ci, candidate) in candidates.iter().enumerate() {
            if contains_ci(candidate.as_ref(), pattern.as_ref()) {
                return Some(PatternMatch {
                    pattern_index: pi,
                    candidate_index: ci,
                });
            }
        }
    }
    None
}

/// Like [`first_match`] but only considers candidates with index below
/// `limit`. Used for measurement columns, where the declared name list may be
/// wider than the actually populated data.
pub fn first_match_within<P, C>(
    patterns: &[P],
    candidates: &[C],
    limit: usize,
) -> Option<PatternMatch>
where
    P: AsRef<str>,
    C: AsRef<str>,
{
    let bounded = &candidates[..limit.min(candidates.len())];
    first_match(patterns, bounded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_ci_ignores_case() {
        assert!(contains_ci("WinCPU Usage", "wincpu"));
        assert!(contains_ci("logicaldisk- C:", "LogicalDisk"));
        assert!(!contains_ci("Memory", "CPU"));
    }

    #[test]
    fn test_empty_needle_never_matches() {
        assert!(!contains_ci("anything", ""));
        let m = first_match(&[""], &["feed"]);
        assert!(m.is_none());
    }

    #[test]
    fn test_pattern_order_beats_candidate_order() {
        // The P2-matching candidate comes first in the list, but P1 wins.
        let patterns = ["P1", "P2"];
        let candidates = ["feed P2 style", "feed P1 style"];
        let m = first_match(&patterns, &candidates).unwrap();
        assert_eq!(m.pattern_index, 0);
        assert_eq!(m.candidate_index, 1);
    }

    #[test]
    fn test_first_candidate_wins_within_one_pattern() {
        let patterns = ["CPU"];
        let candidates = ["WinCPU", "LinuxCPU"];
        let m = first_match(&patterns, &candidates).unwrap();
        assert_eq!(m.candidate_index, 0);
    }

    #[test]
    fn test_no_match_returns_none() {
        assert!(first_match(&["GPU"], &["CPU", "Memory"]).is_none());
    }

    #[test]
    fn test_within_limit_ignores_phantom_columns() {
        // Declared names list three columns but only two carry data; a
        // pattern matching the third must be rejected.
        let names = ["ReadLatency", "WriteLatency", "UsedPercent"];
        assert!(first_match_within(&["UsedPercent"], &names, 2).is_none());
        let m = first_match_within(&["WriteLatency"], &names, 2).unwrap();
        assert_eq!(m.candidate_index, 1);
    }

    #[test]
    fn test_within_limit_larger_than_list() {
        let names = ["CPUBusyPercent"];
        let m = first_match_within(&["CPUBusy"], &names, 10).unwrap();
        assert_eq!(m.candidate_index, 0);
    }
}
