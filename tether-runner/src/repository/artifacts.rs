//! Artifacts repository
//!
//! Lists the artifacts of a completed run and downloads their archives.

use async_trait::async_trait;
use std::sync::Arc;
use tether_client::{ProviderClient, Result};
use tether_core::domain::{Artifact, RunHandle, Scope};

/// Repository trait for artifact retrieval
#[async_trait]
pub trait ArtifactRepository: Send + Sync {
    /// Lists the artifacts a run produced
    async fn list_artifacts(&self, scope: &Scope, run: RunHandle) -> Result<Vec<Artifact>>;

    /// Downloads an artifact as an opaque blob
    async fn download(&self, scope: &Scope, artifact_id: u64) -> Result<Vec<u8>>;
}

/// HTTP implementation of ArtifactRepository
pub struct HttpArtifactRepository {
    client: Arc<ProviderClient>,
}

impl HttpArtifactRepository {
    pub fn new(client: Arc<ProviderClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ArtifactRepository for HttpArtifactRepository {
    async fn list_artifacts(&self, scope: &Scope, run: RunHandle) -> Result<Vec<Artifact>> {
        let list = self.client.list_run_artifacts(scope, run).await?;
        Ok(list.artifacts)
    }

    async fn download(&self, scope: &Scope, artifact_id: u64) -> Result<Vec<u8>> {
        self.client.download_artifact(scope, artifact_id).await
    }
}
