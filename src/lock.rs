//! Lock file parsing and assembly.
//!
//! A serde wire struct (`from_str`/`from_file`/`to_file`, a dedicated error
//! enum) stores only plain strings; `LockedProject::version` is
//! reconstructed into the richer [`crate::version::Version`] on load, the
//! same split applied in `manifest.rs`.

use crate::identifier::ProjectIdentifier;
use crate::version::{Version, VersionError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("failed to read lock file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse lock file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize lock file: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("lock entry for {0} has no branch, version, or revision")]
    EmptyVersion(String),

    #[error("lock entry for {0} is malformed: {1}")]
    Malformed(String, #[source] VersionError),

    #[error("duplicate lock entry for {0}")]
    DuplicateIdentifier(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawLockedProject {
    pub root: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub revision: Option<String>,
    #[serde(default)]
    pub subpackages: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawLock {
    #[serde(default)]
    pub memo: String,
    #[serde(default, rename = "project")]
    pub projects: Vec<RawLockedProject>,
}

/// One locked project: the identity it was resolved under, the version it
/// resolved to (symbolic side plus, where applicable, the revision it paired
/// to), and the subpackages actually reachable from the root package's
/// import closure.
#[derive(Debug, Clone, PartialEq)]
pub struct LockedProject {
    pub identifier: ProjectIdentifier,
    pub version: Version,
    pub subpackages: Vec<String>,
}

/// A resolved dependency graph: canonically ordered locked projects plus a
/// memo hash over the inputs that produced them, used to short-circuit
/// re-solving when nothing relevant changed.
#[derive(Debug, Clone)]
pub struct Lock {
    pub memo: String,
    pub projects: Vec<LockedProject>,
}

impl Lock {
    pub fn new(memo: impl Into<String>, mut projects: Vec<LockedProject>) -> Self {
        projects.sort_by(|a, b| {
            a.identifier
                .root
                .cmp(&b.identifier.root)
                .then_with(|| a.identifier.source.cmp(&b.identifier.source))
        });
        Lock { memo: memo.into(), projects }
    }

    pub fn from_file(path: &Path) -> Result<Self, LockError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    pub fn from_str(content: &str) -> Result<Self, LockError> {
        let raw: RawLock = toml::from_str(content)?;
        Self::from_raw(raw)
    }

    pub fn from_raw(raw: RawLock) -> Result<Self, LockError> {
        let mut seen = std::collections::BTreeSet::new();
        let mut projects = Vec::with_capacity(raw.projects.len());
        for entry in raw.projects {
            let identifier = match &entry.source {
                Some(src) => ProjectIdentifier::with_source(entry.root.clone(), src.clone()),
                None => ProjectIdentifier::new(entry.root.clone()),
            };
            let key = identifier.to_string();
            if !seen.insert(key) {
                return Err(LockError::DuplicateIdentifier(entry.root.clone()));
            }

            let symbolic = if let Some(branch) = &entry.branch {
                Some(Version::Branch(branch.clone()))
            } else if let Some(tag) = &entry.version {
                Some(Version::parse_semver(tag).unwrap_or_else(|_| Version::Plain(tag.clone())))
            } else {
                None
            };

            let version = match (symbolic, &entry.revision) {
                (Some(sym), Some(rev)) => Version::paired(sym, rev.clone())
                    .map_err(|e| LockError::Malformed(entry.root.clone(), e))?,
                (Some(sym), None) => sym,
                (None, Some(rev)) => Version::Revision(rev.clone()),
                (None, None) => return Err(LockError::EmptyVersion(entry.root.clone())),
            };

            let mut subpackages = entry.subpackages;
            subpackages.sort();
            subpackages.dedup();

            projects.push(LockedProject { identifier, version, subpackages });
        }
        Ok(Lock::new(raw.memo, projects))
    }

    pub fn to_file(&self, path: &Path) -> Result<(), LockError> {
        let raw = self.to_raw();
        let content = toml::to_string_pretty(&raw)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn to_raw(&self) -> RawLock {
        let projects = self
            .projects
            .iter()
            .map(|p| {
                let mut raw = RawLockedProject {
                    root: p.identifier.root.as_str().to_string(),
                    source: p.identifier.source.clone(),
                    subpackages: p.subpackages.clone(),
                    ..Default::default()
                };
                match &p.version {
                    Version::Revision(r) => raw.revision = Some(r.clone()),
                    Version::Branch(b) => raw.branch = Some(b.clone()),
                    Version::Plain(t) => raw.version = Some(t.clone()),
                    Version::Semver(v) => raw.version = Some(v.to_string()),
                    Version::Paired(sym, rev) => {
                        raw.revision = Some(rev.clone());
                        match sym.as_ref() {
                            Version::Branch(b) => raw.branch = Some(b.clone()),
                            Version::Plain(t) => raw.version = Some(t.clone()),
                            Version::Semver(v) => raw.version = Some(v.to_string()),
                            _ => {}
                        }
                    }
                }
                raw
            })
            .collect();
        RawLock { memo: self.memo.clone(), projects }
    }

    /// Lock equality as the solver's short-circuit cares about it: same
    /// locked projects in the same order, regardless of the memo hash that
    /// produced them.
    pub fn semantically_eq(&self, other: &Lock) -> bool {
        self.projects == other.projects
    }

    /// SHA-256 input hash, hex-encoded, over whatever canonical byte
    /// representation the caller feeds it (manifest contents, override
    /// table, ignored-prefix list — assembled by the solver before it
    /// decides whether a re-solve is even necessary).
    pub fn compute_memo(inputs: &[&[u8]]) -> String {
        let mut hasher = Sha256::new();
        for chunk in inputs {
            hasher.update(chunk);
        }
        hex::encode(hasher.finalize())
    }

    /// Flatten the lock into the minimal instructions an external vendor
    /// directory writer needs: where each project lives, which revision to
    /// check out, and which subpackages are actually reachable. The writer
    /// itself (walking `ExportEntry::revision` out through a `VcsClient`
    /// and laying files on disk) stays outside this crate.
    pub fn export_plan(&self) -> ExportPlan {
        let entries = self
            .projects
            .iter()
            .map(|p| ExportEntry {
                identifier: p.identifier.clone(),
                version: p.version.clone(),
                subpackages: p.subpackages.clone(),
            })
            .collect();
        ExportPlan { entries }
    }
}

/// One project's worth of vendor-export instructions.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportEntry {
    pub identifier: ProjectIdentifier,
    pub version: Version,
    pub subpackages: Vec<String>,
}

impl ExportEntry {
    /// The revision a `VcsClient::export_to` call should check out for this
    /// entry; `None` if the locked version carries no revision at all (a
    /// plain tag with no paired commit, which a real gateway would have
    /// resolved to a revision before locking, but which a hand-built lock
    /// file is free to omit).
    pub fn revision(&self) -> Option<&str> {
        self.version.underlying_revision()
    }
}

/// The output of [`Lock::export_plan`]: one [`ExportEntry`] per locked
/// project, in the lock's canonical order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportPlan {
    pub entries: Vec<ExportEntry>,
}

impl ExportPlan {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_semver_entry() {
        let toml = r#"
memo = "abc123"

[[project]]
root = "example.com/a"
version = "1.2.3"
revision = "deadbeef"
subpackages = ["sub", ""]
"#;
        let lock = Lock::from_str(toml).unwrap();
        assert_eq!(lock.projects.len(), 1);
        let p = &lock.projects[0];
        assert_eq!(p.version.underlying_revision(), Some("deadbeef"));
        assert_eq!(p.subpackages, vec!["", "sub"]);
    }

    #[test]
    fn rejects_entry_with_no_version_information() {
        let toml = r#"
[[project]]
root = "example.com/a"
"#;
        let err = Lock::from_str(toml).unwrap_err();
        assert!(matches!(err, LockError::EmptyVersion(_)));
    }

    #[test]
    fn rejects_duplicate_identifiers() {
        let toml = r#"
[[project]]
root = "example.com/a"
revision = "aaa"

[[project]]
root = "example.com/a"
revision = "bbb"
"#;
        let err = Lock::from_str(toml).unwrap_err();
        assert!(matches!(err, LockError::DuplicateIdentifier(_)));
    }

    #[test]
    fn projects_are_canonically_sorted_by_root_then_source() {
        let a = LockedProject {
            identifier: ProjectIdentifier::new("example.com/b"),
            version: Version::Revision("a".into()),
            subpackages: vec![],
        };
        let b = LockedProject {
            identifier: ProjectIdentifier::new("example.com/a"),
            version: Version::Revision("b".into()),
            subpackages: vec![],
        };
        let lock = Lock::new("memo", vec![a, b]);
        assert_eq!(lock.projects[0].identifier.root.as_str(), "example.com/a");
    }

    #[test]
    fn semantic_equality_ignores_memo() {
        let projects = vec![LockedProject {
            identifier: ProjectIdentifier::new("example.com/a"),
            version: Version::Revision("a".into()),
            subpackages: vec![],
        }];
        let lock1 = Lock::new("memo1", projects.clone());
        let lock2 = Lock::new("memo2", projects);
        assert!(lock1.semantically_eq(&lock2));
    }

    #[test]
    fn export_plan_carries_one_entry_per_locked_project_with_its_revision() {
        let toml = r#"
memo = "abc123"

[[project]]
root = "example.com/a"
version = "1.2.3"
revision = "deadbeef"
subpackages = ["sub"]

[[project]]
root = "example.com/b"
branch = "main"
revision = "cafef00d"
"#;
        let lock = Lock::from_str(toml).unwrap();
        let plan = lock.export_plan();
        assert_eq!(plan.len(), 2);
        assert!(!plan.is_empty());

        let a = plan.entries.iter().find(|e| e.identifier.root.as_str() == "example.com/a").unwrap();
        assert_eq!(a.revision(), Some("deadbeef"));
        assert_eq!(a.subpackages, vec!["sub"]);

        let b = plan.entries.iter().find(|e| e.identifier.root.as_str() == "example.com/b").unwrap();
        assert_eq!(b.revision(), Some("cafef00d"));
    }
}
