//! Release index reconciliation.
//!
//! Decides how a candidate [`IndexRelease`] merges into a [`ReleaseIndex`]:
//!
//! 1. No entry with the same static info → append at the tail.
//! 2. Same static info on a non-tail entry → conflict.
//! 3. Same static info on the tail → compare commit sets:
//!    equal is a no-op, a strict extension replaces the tail, anything else
//!    is a conflict.
//!
//! The input index is never mutated. Callers refresh index metadata with
//! [`ReleaseIndex::refresh`] before persisting an appended/replaced index.

use crate::commits::{compare, CommitSetRelation};
use crate::error::ReleaseError;
use crate::types::{IndexRelease, ReleaseIndex};

/// Outcome of a successful reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// The candidate is already recorded as the latest release.
    NoOp,
    /// The candidate was appended as a new latest release.
    Append(ReleaseIndex),
    /// The tail was replaced by the candidate, which extends its commits.
    Replace(ReleaseIndex),
}

impl Reconciliation {
    pub fn label(&self) -> &'static str {
        match self {
            Reconciliation::NoOp => "no-op",
            Reconciliation::Append(_) => "append",
            Reconciliation::Replace(_) => "replace",
        }
    }

    /// The index to persist, if anything changed.
    pub fn into_index(self) -> Option<ReleaseIndex> {
        match self {
            Reconciliation::NoOp => None,
            Reconciliation::Append(index) | Reconciliation::Replace(index) => Some(index),
        }
    }
}

/// Merge `candidate` into `index`.
///
/// Returns [`ReleaseError::NotLatest`] or [`ReleaseError::CommitsNotSuperset`]
/// on conflict; both leave `index` untouched.
pub fn reconcile(
    index: &ReleaseIndex,
    candidate: &IndexRelease,
) -> Result<Reconciliation, ReleaseError> {
    let info = candidate.static_info();
    let total = index.releases.len();

    let Some(position) = index.releases.iter().position(|r| r.matches(&info)) else {
        tracing::debug!(version = %candidate.version, "build not in index; appending");
        let mut next = index.clone();
        next.releases.push(candidate.clone());
        return Ok(Reconciliation::Append(next));
    };

    if position + 1 != total {
        return Err(ReleaseError::NotLatest {
            version: candidate.version.clone(),
            position,
            total,
        });
    }

    let tail = &index.releases[position];
    match compare(&tail.commits, &candidate.commits) {
        CommitSetRelation::Equal => {
            tracing::debug!(version = %candidate.version, "build is already the latest release");
            Ok(Reconciliation::NoOp)
        }
        CommitSetRelation::ProperSubset => {
            tracing::debug!(
                version = %candidate.version,
                before = tail.commits.len(),
                after = candidate.commits.len(),
                "candidate extends the latest release; replacing tail"
            );
            let mut next = index.clone();
            next.releases.pop();
            next.releases.push(candidate.clone());
            Ok(Reconciliation::Replace(next))
        }
        CommitSetRelation::NotSubset => Err(ReleaseError::CommitsNotSuperset {
            version: candidate.version.clone(),
        }),
    }
}
