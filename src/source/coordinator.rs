//! Source coordinator: owns one [`Gateway`] per normalized source and
//! folds in concurrent first-time requests for the same source, so two
//! dependency edges that resolve to the same repository never set up two
//! gateways racing each other.

use super::deducer::{DeducedSource, Deducer, DeductionError};
use super::gateway::Gateway;
use super::vcs::VcsClient;
use std::sync::Arc;
use tokio::sync::OnceCell;

pub struct SourceCoordinator {
    deducer: Deducer,
    client: Arc<dyn VcsClient>,
    gateways: dashmap::DashMap<String, Arc<OnceCell<Arc<Gateway>>>>,
}

impl SourceCoordinator {
    pub fn new(deducer: Deducer, client: Arc<dyn VcsClient>) -> Self {
        SourceCoordinator { deducer, client, gateways: dashmap::DashMap::new() }
    }

    /// Returns the gateway for `normalized_source` (an override URL or a
    /// bare import-path root — see [`crate::identifier::ProjectIdentifier::normalized_source`]),
    /// deducing and constructing it on first use. Concurrent callers
    /// requesting the same source fold into the same in-flight setup.
    pub async fn gateway_for(&self, normalized_source: &str) -> Result<Arc<Gateway>, DeductionError> {
        let cell = self
            .gateways
            .entry(normalized_source.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let gateway = cell
            .get_or_try_init(|| async {
                let deduced: DeducedSource = self.deducer.deduce(normalized_source).await?;
                Ok::<_, DeductionError>(Arc::new(Gateway::new(deduced.repo_url, self.client.clone())))
            })
            .await?;
        Ok(gateway.clone())
    }

    pub fn registered_sources(&self) -> usize {
        self.gateways.len()
    }
}
