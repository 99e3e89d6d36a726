//! Per-source gateway: the single serialized entry point for every
//! operation against one repository, so two packages that both depend on
//! the same upstream never race each other's clone/fetch.

use super::vcs::{RemoteVersion, VcsClient, VcsError};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Wraps a [`VcsClient`] with a single-writer lock. Reads and writes against
/// one repository are always serialized through this gateway; the
/// coordinator is what lets *different* repositories run concurrently.
pub struct Gateway {
    repo_url: String,
    client: Arc<dyn VcsClient>,
    lock: Mutex<()>,
}

impl Gateway {
    pub fn new(repo_url: impl Into<String>, client: Arc<dyn VcsClient>) -> Self {
        Gateway { repo_url: repo_url.into(), client, lock: Mutex::new(()) }
    }

    pub fn repo_url(&self) -> &str {
        &self.repo_url
    }

    pub async fn list_versions(&self) -> Result<Vec<RemoteVersion>, VcsError> {
        let _guard = self.lock.lock().await;
        self.client.list_versions(&self.repo_url).await
    }

    pub async fn revision_present_in(&self, revision: &str) -> Result<bool, VcsError> {
        let _guard = self.lock.lock().await;
        self.client.revision_present_in(&self.repo_url, revision).await
    }

    pub async fn read_file_at(&self, revision: &str, path: &str) -> Result<Option<String>, VcsError> {
        let _guard = self.lock.lock().await;
        self.client.read_file_at(&self.repo_url, revision, path).await
    }

    pub async fn export_to(&self, revision: &str, dest: &Path) -> Result<(), VcsError> {
        let _guard = self.lock.lock().await;
        self.client.export_to(&self.repo_url, revision, dest).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::vcs::{StaticRepo, StaticVcsClient};
    use crate::version::Version;
    use std::collections::BTreeMap;

    fn gateway() -> Gateway {
        let repo = StaticRepo {
            versions: vec![RemoteVersion { version: Version::parse_semver("1.0.0").unwrap(), revision: "abc".into() }],
            files: BTreeMap::new(),
        };
        let client = StaticVcsClient::new().with_repo("example.com/a", repo);
        Gateway::new("example.com/a", Arc::new(client))
    }

    #[tokio::test]
    async fn serializes_access_and_forwards_to_client() {
        let gw = gateway();
        let versions = gw.list_versions().await.unwrap();
        assert_eq!(versions.len(), 1);
        assert!(gw.revision_present_in("abc").await.unwrap());
        assert!(!gw.revision_present_in("missing").await.unwrap());
    }
}
