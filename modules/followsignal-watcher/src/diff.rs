//! Snapshot comparison. The whole discovery pipeline hangs off this one
//! set difference.

use std::collections::HashSet;

/// What changed between two following snapshots of the same account.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FollowingDelta {
    /// Handles followed now that were absent from the previous snapshot.
    pub added: Vec<String>,
    /// Handles from the previous snapshot no longer followed.
    pub removed: Vec<String>,
}

impl FollowingDelta {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Compare the stored snapshot against a freshly fetched one. Both
/// directions are reported; only additions become discovery candidates,
/// removals are counted and logged.
pub fn diff_following(previous: &HashSet<String>, current: &HashSet<String>) -> FollowingDelta {
    let mut added: Vec<String> = current.difference(previous).cloned().collect();
    let mut removed: Vec<String> = previous.difference(current).cloned().collect();
    added.sort();
    removed.sort();
    FollowingDelta { added, removed }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(handles: &[&str]) -> HashSet<String> {
        handles.iter().map(|h| h.to_string()).collect()
    }

    #[test]
    fn identical_snapshots_produce_empty_delta() {
        let snapshot = set(&["alpha", "beta"]);
        let delta = diff_following(&snapshot, &snapshot.clone());
        assert!(delta.is_empty());
    }

    #[test]
    fn new_follows_are_reported_as_added() {
        let delta = diff_following(&set(&["alpha"]), &set(&["alpha", "beta", "gamma"]));
        assert_eq!(delta.added, vec!["beta", "gamma"]);
        assert!(delta.removed.is_empty());
    }

    #[test]
    fn unfollows_are_reported_as_removed() {
        let delta = diff_following(&set(&["alpha", "beta"]), &set(&["beta"]));
        assert!(delta.added.is_empty());
        assert_eq!(delta.removed, vec!["alpha"]);
    }

    #[test]
    fn mixed_changes_report_both_directions() {
        let delta = diff_following(&set(&["alpha", "beta"]), &set(&["beta", "gamma"]));
        assert_eq!(delta.added, vec!["gamma"]);
        assert_eq!(delta.removed, vec!["alpha"]);
        assert!(!delta.is_empty());
    }

    #[test]
    fn everything_is_added_against_an_empty_snapshot() {
        let delta = diff_following(&HashSet::new(), &set(&["alpha", "beta"]));
        assert_eq!(delta.added, vec!["alpha", "beta"]);
        assert!(delta.removed.is_empty());
    }
}
