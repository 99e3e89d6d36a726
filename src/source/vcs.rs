//! The narrow VCS surface gateways need, and a static test double.
//!
//! Real gateways would shell out to `git`/`hg`/`svn` clients; that process
//! management is deliberately kept behind this trait so the coordinator,
//! deducer, and solver can all be exercised without touching the network or
//! a subprocess.

use crate::version::Version;
use async_trait::async_trait;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VcsKind {
    Git,
    Mercurial,
    Subversion,
    Bazaar,
}

impl std::fmt::Display for VcsKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            VcsKind::Git => "git",
            VcsKind::Mercurial => "hg",
            VcsKind::Subversion => "svn",
            VcsKind::Bazaar => "bzr",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Error)]
pub enum VcsError {
    #[error("repository unreachable: {0}")]
    Unreachable(String),

    #[error("revision {0} not found")]
    RevisionNotFound(String),

    #[error("unsupported version-control system: {0}")]
    Unsupported(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A symbolic version paired with the revision it names at the moment the
/// gateway queried it (branches move; this is a point-in-time snapshot).
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteVersion {
    pub version: Version,
    pub revision: String,
}

/// The operations a source coordinator's gateway performs against one
/// repository. All async: real implementations hit the network or shell out
/// to a VCS binary.
#[async_trait]
pub trait VcsClient: Send + Sync {
    async fn list_versions(&self, repo_url: &str) -> Result<Vec<RemoteVersion>, VcsError>;

    async fn revision_present_in(&self, repo_url: &str, revision: &str) -> Result<bool, VcsError>;

    /// Fetch file contents at a given revision, keyed by path relative to
    /// the repository root. Used to read the manifest/lock of a candidate
    /// version without a full checkout.
    async fn read_file_at(
        &self,
        repo_url: &str,
        revision: &str,
        path: &str,
    ) -> Result<Option<String>, VcsError>;

    /// Export the full tree at a revision into `dest`, for the vendor
    /// export plan.
    async fn export_to(&self, repo_url: &str, revision: &str, dest: &std::path::Path) -> Result<(), VcsError>;
}

/// An in-memory repository fixture: version history plus a small file
/// table per revision, enough to drive the solver and gateway in tests
/// without touching the network.
#[derive(Debug, Clone, Default)]
pub struct StaticRepo {
    pub versions: Vec<RemoteVersion>,
    pub files: BTreeMap<String, BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Default)]
pub struct StaticVcsClient {
    repos: BTreeMap<String, StaticRepo>,
}

impl StaticVcsClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_repo(mut self, repo_url: impl Into<String>, repo: StaticRepo) -> Self {
        self.repos.insert(repo_url.into(), repo);
        self
    }
}

#[async_trait]
impl VcsClient for StaticVcsClient {
    async fn list_versions(&self, repo_url: &str) -> Result<Vec<RemoteVersion>, VcsError> {
        self.repos
            .get(repo_url)
            .map(|r| r.versions.clone())
            .ok_or_else(|| VcsError::Unreachable(repo_url.to_string()))
    }

    async fn revision_present_in(&self, repo_url: &str, revision: &str) -> Result<bool, VcsError> {
        let repo = self.repos.get(repo_url).ok_or_else(|| VcsError::Unreachable(repo_url.to_string()))?;
        Ok(repo.versions.iter().any(|v| v.revision == revision) || repo.files.contains_key(revision))
    }

    async fn read_file_at(
        &self,
        repo_url: &str,
        revision: &str,
        path: &str,
    ) -> Result<Option<String>, VcsError> {
        let repo = self.repos.get(repo_url).ok_or_else(|| VcsError::Unreachable(repo_url.to_string()))?;
        Ok(repo.files.get(revision).and_then(|files| files.get(path).cloned()))
    }

    async fn export_to(&self, repo_url: &str, revision: &str, dest: &std::path::Path) -> Result<(), VcsError> {
        let repo = self.repos.get(repo_url).ok_or_else(|| VcsError::Unreachable(repo_url.to_string()))?;
        let files = repo.files.get(revision).ok_or_else(|| VcsError::RevisionNotFound(revision.to_string()))?;
        std::fs::create_dir_all(dest)?;
        for (path, contents) in files {
            let target = dest.join(path);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(target, contents)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> StaticVcsClient {
        let mut files = BTreeMap::new();
        files.insert("abc123".to_string(), BTreeMap::from([("manifest.toml".to_string(), "".to_string())]));
        let repo = StaticRepo {
            versions: vec![RemoteVersion {
                version: Version::parse_semver("1.0.0").unwrap(),
                revision: "abc123".to_string(),
            }],
            files,
        };
        StaticVcsClient::new().with_repo("example.com/a", repo)
    }

    #[tokio::test]
    async fn lists_fixture_versions() {
        let client = fixture();
        let versions = client.list_versions("example.com/a").await.unwrap();
        assert_eq!(versions.len(), 1);
    }

    #[tokio::test]
    async fn reads_file_at_known_revision() {
        let client = fixture();
        let content = client.read_file_at("example.com/a", "abc123", "manifest.toml").await.unwrap();
        assert_eq!(content, Some("".to_string()));
    }

    #[tokio::test]
    async fn unknown_repo_is_unreachable() {
        let client = fixture();
        assert!(client.list_versions("example.com/missing").await.is_err());
    }
}
