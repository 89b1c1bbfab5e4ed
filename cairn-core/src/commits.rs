//! Commit-set comparison.

use crate::types::CommitRef;

/// Relationship of commit set `a` to commit set `b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitSetRelation {
    Equal,
    /// Every commit of `a` is in `b`, and `b` has more.
    ProperSubset,
    NotSubset,
}

/// Compare two commit sets by (architecture, checksum) membership.
///
/// Assumes each set holds at most one commit per architecture; release
/// indexes are checked for this when loaded.
pub fn compare(a: &[CommitRef], b: &[CommitRef]) -> CommitSetRelation {
    if a.len() > b.len() {
        return CommitSetRelation::NotSubset;
    }
    let all_found = a.iter().all(|commit| {
        b.iter().any(|other| {
            other.architecture == commit.architecture && other.checksum == commit.checksum
        })
    });
    if !all_found {
        CommitSetRelation::NotSubset
    } else if a.len() == b.len() {
        CommitSetRelation::Equal
    } else {
        CommitSetRelation::ProperSubset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(arch: &str, sum: &str) -> CommitRef {
        CommitRef::new(arch, sum)
    }

    #[test]
    fn equal_ignores_order() {
        let a = [c("x86_64", "a"), c("aarch64", "b")];
        let b = [c("aarch64", "b"), c("x86_64", "a")];
        assert_eq!(compare(&a, &b), CommitSetRelation::Equal);
    }

    #[test]
    fn smaller_contained_set_is_proper_subset() {
        let a = [c("x86_64", "a")];
        let b = [c("x86_64", "a"), c("aarch64", "b")];
        assert_eq!(compare(&a, &b), CommitSetRelation::ProperSubset);
    }

    #[test]
    fn larger_set_is_never_a_subset() {
        let a = [c("x86_64", "a"), c("aarch64", "b")];
        let b = [c("x86_64", "a")];
        assert_eq!(compare(&a, &b), CommitSetRelation::NotSubset);
    }

    #[test]
    fn checksum_disagreement_is_not_subset() {
        let a = [c("x86_64", "a")];
        let b = [c("x86_64", "z"), c("aarch64", "b")];
        assert_eq!(compare(&a, &b), CommitSetRelation::NotSubset);
    }

    #[test]
    fn empty_sets() {
        assert_eq!(compare(&[], &[]), CommitSetRelation::Equal);
        assert_eq!(compare(&[], &[c("s390x", "q")]), CommitSetRelation::ProperSubset);
    }
}
