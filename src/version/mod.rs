//! Version algebra: the sum type of version kinds a project can be pinned to,
//! plus the matching/ordering rules constraints apply against them.
//!
//! Parse, `Display`, and ordering via `Ord`, over five kinds: revisions,
//! non-semver tags, semver tags, branches, and symbolic-versions-paired-to-
//! a-revision.

mod constraint;

pub use constraint::{Constraint, SemverRange};

use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;

/// Errors that can occur while constructing or parsing a [`Version`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VersionError {
    #[error("revision identifier cannot be empty")]
    EmptyRevision,

    #[error("cannot pair a revision onto another revision or an already-paired version")]
    InvalidPairingBase,

    #[error("invalid semver tag: {0}")]
    InvalidSemver(String),
}

/// Dispatch tag for a [`Version`], used where callers need to branch on kind
/// without matching the full value (e.g. selection-order bucketing).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VersionType {
    IsRevision,
    IsVersion,
    IsSemver,
    IsBranch,
}

/// A version a project can be pinned to.
///
/// `Paired` is the only variant that carries both a symbolic identity and an
/// immutable one; every other variant is either purely symbolic (`Branch`,
/// `Plain`) or purely immutable (`Revision`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Version {
    /// An opaque, immutable repository revision (a commit hash).
    Revision(String),
    /// A tag that did not parse as semver.
    Plain(String),
    /// A tag parsed as semver.
    Semver(semver::Version),
    /// A mutable named head.
    Branch(String),
    /// A symbolic version (`Plain`, `Semver`, or `Branch`) bound to the
    /// revision it resolved to at solve time.
    Paired(Box<Version>, String),
}

impl Version {
    /// Construct a `Paired` version, enforcing the invariant that the
    /// underlying revision is non-empty and that only symbolic versions may
    /// be paired.
    pub fn paired(symbolic: Version, revision: impl Into<String>) -> Result<Version, VersionError> {
        if matches!(symbolic, Version::Revision(_) | Version::Paired(..)) {
            return Err(VersionError::InvalidPairingBase);
        }
        let revision = revision.into();
        if revision.is_empty() {
            return Err(VersionError::EmptyRevision);
        }
        Ok(Version::Paired(Box::new(symbolic), revision))
    }

    /// Parse a semver tag, tolerating a leading `v`.
    pub fn parse_semver(s: &str) -> Result<Version, VersionError> {
        let trimmed = s.strip_prefix('v').unwrap_or(s);
        semver::Version::parse(trimmed)
            .map(Version::Semver)
            .map_err(|_| VersionError::InvalidSemver(s.to_string()))
    }

    /// The dispatch type of this version. A `Paired` version reports the
    /// type of its symbolic side.
    pub fn version_type(&self) -> VersionType {
        match self {
            Version::Revision(_) => VersionType::IsRevision,
            Version::Plain(_) => VersionType::IsVersion,
            Version::Semver(_) => VersionType::IsSemver,
            Version::Branch(_) => VersionType::IsBranch,
            Version::Paired(sym, _) => sym.version_type(),
        }
    }

    /// The underlying revision, if this version carries one (bare
    /// `Revision` or `Paired`).
    pub fn underlying_revision(&self) -> Option<&str> {
        match self {
            Version::Revision(r) => Some(r),
            Version::Paired(_, r) => Some(r),
            _ => None,
        }
    }

    /// The symbolic side of this version: itself, unless `Paired`, in which
    /// case its wrapped symbolic version.
    pub fn symbolic(&self) -> &Version {
        match self {
            Version::Paired(sym, _) => sym,
            other => other,
        }
    }

    pub fn is_prerelease(&self) -> bool {
        matches!(self.symbolic(), Version::Semver(v) if !v.pre.is_empty())
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Version::Revision(r) => write!(f, "{r}"),
            Version::Plain(s) => write!(f, "{s}"),
            Version::Semver(v) => write!(f, "{v}"),
            Version::Branch(b) => write!(f, "{b}"),
            Version::Paired(sym, rev) => write!(f, "{sym} ({rev})"),
        }
    }
}

/// Equality for ordering purposes treats `Paired(v, r)` and `v` as distinct:
/// pairing only changes revision-equality, not symbolic identity, so we keep
/// `PartialEq`/`Eq` structural (derived) and expose this helper for matching
/// a `Constraint::ExactRevision` against a `Paired` version — see
/// [`Constraint::matches`].
impl Version {
    pub fn matches_revision(&self, rev: &str) -> bool {
        self.underlying_revision() == Some(rev)
    }
}

/// Structural ordering used for deterministic storage (sorting candidate
/// lists before display, deduplicating in `BTreeSet`s). This is distinct
/// from the solver's "best version first" preference order, which lives in
/// `solver::order` and depends on upgrade/downgrade mode.
impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        fn rank(v: &Version) -> u8 {
            match v {
                Version::Semver(_) => 0,
                Version::Plain(_) => 1,
                Version::Branch(_) => 2,
                Version::Revision(_) => 3,
                Version::Paired(sym, _) => rank(sym),
            }
        }
        match (self, other) {
            (Version::Semver(a), Version::Semver(b)) => a.cmp(b),
            (Version::Plain(a), Version::Plain(b)) => a.cmp(b),
            (Version::Branch(a), Version::Branch(b)) => a.cmp(b),
            (Version::Revision(a), Version::Revision(b)) => a.cmp(b),
            (Version::Paired(a, ra), Version::Paired(b, rb)) => a.cmp(b).then_with(|| ra.cmp(rb)),
            (Version::Paired(a, _), b) => a.as_ref().cmp(b),
            (a, Version::Paired(b, _)) => a.cmp(b.as_ref()),
            _ => rank(self).cmp(&rank(other)),
        }
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_semver_tolerates_v_prefix() {
        let v = Version::parse_semver("v1.2.3").unwrap();
        assert_eq!(v, Version::Semver(semver::Version::new(1, 2, 3)));
    }

    #[test]
    fn paired_requires_nonempty_revision() {
        let sym = Version::Branch("main".into());
        assert_eq!(
            Version::paired(sym, "").unwrap_err(),
            VersionError::EmptyRevision
        );
    }

    #[test]
    fn paired_rejects_revision_base() {
        let base = Version::Revision("abc123".into());
        assert_eq!(
            Version::paired(base, "def456").unwrap_err(),
            VersionError::InvalidPairingBase
        );
    }

    #[test]
    fn paired_reports_symbolic_type() {
        let paired = Version::paired(Version::Branch("main".into()), "abc123").unwrap();
        assert_eq!(paired.version_type(), VersionType::IsBranch);
        assert_eq!(paired.underlying_revision(), Some("abc123"));
    }

    #[test]
    fn matches_revision_ignores_mismatched_paired() {
        let paired = Version::paired(Version::Branch("main".into()), "abc123").unwrap();
        assert!(paired.matches_revision("abc123"));
        assert!(!paired.matches_revision("def456"));
        assert!(!Version::Branch("main".into()).matches_revision("abc123"));
    }

    #[test]
    fn semver_versions_order_descending_when_reversed() {
        let mut vs = vec![
            Version::parse_semver("1.0.0").unwrap(),
            Version::parse_semver("2.0.0").unwrap(),
            Version::parse_semver("1.5.0").unwrap(),
        ];
        vs.sort();
        assert_eq!(vs[0].to_string(), "1.0.0");
        assert_eq!(vs[2].to_string(), "2.0.0");
    }
}
