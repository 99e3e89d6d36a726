//! Selection order and candidate ordering.
//!
//! Two independent orderings: which unresolved project to work on next
//! (`select_next_root`), and in what order to try that project's candidate
//! versions (`order_candidates`). Kept separate from the backtracking loop
//! in `mod.rs` so either can be swapped without touching the search itself.

use crate::identifier::ProjectRoot;
use crate::version::Version;
use std::collections::{BTreeMap, BTreeSet};

/// Picks the next project to select a version for. Deterministic
/// lexicographic order on the import path keeps solver runs reproducible
/// run to run, which matters for a tool whose whole job is to produce the
/// same lock file given the same inputs.
pub fn select_next_root(unselected: &BTreeSet<ProjectRoot>) -> Option<ProjectRoot> {
    unselected.iter().next().cloned()
}

/// Orders `versions` best-candidate-first. In upgrade mode (the default)
/// that's descending order with non-prerelease versions preferred over
/// prereleases of the same precedence; in downgrade mode the order is
/// reversed outright, since a downgrade solve is explicitly looking for the
/// oldest version that still satisfies every constraint.
pub fn order_candidates(versions: &[Version], downgrade: bool) -> Vec<Version> {
    let mut out: Vec<Version> = versions.to_vec();
    out.sort_by(|a, b| {
        let a_pre = a.is_prerelease();
        let b_pre = b.is_prerelease();
        match a_pre.cmp(&b_pre) {
            std::cmp::Ordering::Equal => a.cmp(b),
            other => other,
        }
    });
    if !downgrade {
        out.reverse();
    }
    out
}

/// Per-root accumulated constraints, derived by intersecting every incoming
/// dependency edge that names this root, once reachability has already
/// filtered which imports count.
pub type ConstraintMap = BTreeMap<ProjectRoot, crate::version::Constraint>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_next_root_picks_lexicographically_smallest() {
        let set = BTreeSet::from([ProjectRoot::new("b"), ProjectRoot::new("a")]);
        assert_eq!(select_next_root(&set), Some(ProjectRoot::new("a")));
    }

    #[test]
    fn order_candidates_prefers_newest_stable_by_default() {
        let versions = vec![
            Version::parse_semver("1.0.0").unwrap(),
            Version::parse_semver("2.0.0").unwrap(),
            Version::parse_semver("2.1.0-alpha").unwrap(),
        ];
        let ordered = order_candidates(&versions, false);
        assert_eq!(ordered[0].to_string(), "2.0.0");
    }

    #[test]
    fn order_candidates_reverses_in_downgrade_mode() {
        let versions =
            vec![Version::parse_semver("1.0.0").unwrap(), Version::parse_semver("2.0.0").unwrap()];
        let ordered = order_candidates(&versions, true);
        assert_eq!(ordered[0].to_string(), "1.0.0");
    }
}
