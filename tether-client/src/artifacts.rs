//! Artifact endpoints

use crate::ProviderClient;
use crate::error::Result;
use reqwest::Method;
use tether_core::domain::{RunHandle, Scope};
use tether_core::dto::artifact::ArtifactList;

impl ProviderClient {
    /// List the artifacts produced by a run
    pub async fn list_run_artifacts(&self, scope: &Scope, run: RunHandle) -> Result<ArtifactList> {
        let url = self.actions_url(scope, &format!("runs/{}/artifacts", run));
        let response = self.request(Method::GET, &url).send().await?;

        self.handle_response(response).await
    }

    /// Download an artifact's zip archive
    ///
    /// The provider redirects to short-lived storage; the redirect is followed
    /// and the archive bytes are returned untouched.
    pub async fn download_artifact(&self, scope: &Scope, artifact_id: u64) -> Result<Vec<u8>> {
        let url = self.actions_url(scope, &format!("artifacts/{}/zip", artifact_id));
        let response = self.request(Method::GET, &url).send().await?;

        self.handle_bytes_response(response).await
    }
}
