//! Constraints: sets of versions a dependency edge restricts its target to.
//!
//! Semver ranges lean on the `semver` crate's own `VersionReq`, which already
//! implements cargo's "a pre-release only matches a comparator that itself
//! names a pre-release on the same major.minor.patch" policy — reimplementing
//! that by hand would just be a worse copy of what the dependency already
//! gives us. The `||` compound operator
//! `VersionReq` does not support is handled by storing one `VersionReq` per
//! OR-branch and matching against each in turn.

use super::{Version, VersionError};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConstraintError {
    #[error("invalid semver range {0:?}: {1}")]
    InvalidRange(String, semver::Error),
    #[error(transparent)]
    Version(#[from] VersionError),
}

/// A semver range: one or more comma-AND'd comparator groups, OR'd together
/// (the grammar's `||`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemverRange {
    branches: Vec<semver::VersionReq>,
    raw: String,
}

impl SemverRange {
    pub fn parse(s: &str) -> Result<Self, ConstraintError> {
        let branches = s
            .split("||")
            .map(|branch| {
                let branch = branch.trim();
                semver::VersionReq::parse(branch)
                    .map_err(|e| ConstraintError::InvalidRange(branch.to_string(), e))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(SemverRange { branches, raw: s.to_string() })
    }

    pub fn matches(&self, v: &semver::Version) -> bool {
        self.branches.iter().any(|req| req.matches(v))
    }

    /// Conservative AND of two ranges: every branch of `self` combined with
    /// every branch of `other` by concatenating comparators. Used only for
    /// the solver's early-prune `intersection_is_empty` check; the solver's
    /// authoritative emptiness test is "no candidate version, drawn from the
    /// source's real version list, satisfies the accumulated constraints".
    pub fn intersect(&self, other: &SemverRange) -> SemverRange {
        let mut branches = Vec::new();
        for a in &self.branches {
            for b in &other.branches {
                let mut comparators = a.comparators.clone();
                comparators.extend(b.comparators.iter().cloned());
                branches.push(semver::VersionReq { comparators });
            }
        }
        SemverRange { branches, raw: format!("{} && {}", self.raw, other.raw) }
    }
}

impl fmt::Display for SemverRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// A set of versions a dependency edge restricts its target to.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    /// Matches every version.
    Any,
    /// Matches no version.
    None,
    /// A semver range (compound of `>=`, `<`, `=`, `^`, `~`, `,`, `||`).
    Semver(SemverRange),
    /// An exact non-semver tag.
    ExactPlain(String),
    /// An exact branch name.
    ExactBranch(String),
    /// An exact revision.
    ExactRevision(String),
}

impl Constraint {
    pub fn parse_semver(s: &str) -> Result<Constraint, ConstraintError> {
        Ok(Constraint::Semver(SemverRange::parse(s)?))
    }

    /// Does `version` satisfy this constraint?
    ///
    /// Comparing a constraint to a `Paired` version applies to the symbolic
    /// side, *unless* the constraint is `ExactRevision`, in which case it
    /// matches the paired revision instead.
    pub fn matches(&self, version: &Version) -> bool {
        match self {
            Constraint::Any => true,
            Constraint::None => false,
            Constraint::ExactRevision(rev) => version.matches_revision(rev),
            Constraint::Semver(range) => match version.symbolic() {
                Version::Semver(v) => range.matches(v),
                _ => false,
            },
            Constraint::ExactPlain(tag) => {
                matches!(version.symbolic(), Version::Plain(p) if p == tag)
            }
            Constraint::ExactBranch(name) => {
                matches!(version.symbolic(), Version::Branch(b) if b == name)
            }
        }
    }

    /// Best-effort intersection, used for early pruning before candidate
    /// versions are enumerated. Disjoint *kinds* (e.g. a semver range and an
    /// exact branch) intersect to `None`; within a kind the narrowing is
    /// exact for `Semver` and trivial (equal-or-`None`) for the exact kinds.
    pub fn intersection(&self, other: &Constraint) -> Constraint {
        match (self, other) {
            (Constraint::Any, x) | (x, Constraint::Any) => x.clone(),
            (Constraint::None, _) | (_, Constraint::None) => Constraint::None,
            (Constraint::Semver(a), Constraint::Semver(b)) => Constraint::Semver(a.intersect(b)),
            (Constraint::ExactPlain(a), Constraint::ExactPlain(b)) if a == b => {
                Constraint::ExactPlain(a.clone())
            }
            (Constraint::ExactBranch(a), Constraint::ExactBranch(b)) if a == b => {
                Constraint::ExactBranch(a.clone())
            }
            (Constraint::ExactRevision(a), Constraint::ExactRevision(b)) if a == b => {
                Constraint::ExactRevision(a.clone())
            }
            _ => Constraint::None,
        }
    }

    /// Whether this constraint can be statically proven to match nothing.
    /// `Semver` ranges are never reported empty here (their emptiness, if
    /// any, only shows up once real candidate versions fail to match); the
    /// exact variants and `None` are the only statically-empty cases.
    pub fn is_statically_empty(&self) -> bool {
        matches!(self, Constraint::None)
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::Any => write!(f, "*"),
            Constraint::None => write!(f, "<none>"),
            Constraint::Semver(r) => write!(f, "{r}"),
            Constraint::ExactPlain(s) => write!(f, "{s}"),
            Constraint::ExactBranch(s) => write!(f, "branch={s}"),
            Constraint::ExactRevision(s) => write!(f, "rev={s}"),
        }
    }
}
