//! Workflow run endpoints

use crate::ProviderClient;
use crate::error::Result;
use reqwest::Method;
use tether_core::domain::{RunHandle, Scope, WorkflowRun};
use tether_core::dto::run::{AddLabelsRequest, ListRunsQuery, RunList};

impl ProviderClient {
    // =============================================================================
    // Run Lookup
    // =============================================================================

    /// List the most recent runs of a repository, newest first
    ///
    /// # Arguments
    /// * `scope` - Target repository
    /// * `query` - Branch, page size and optional label filter
    pub async fn list_runs(&self, scope: &Scope, query: &ListRunsQuery) -> Result<RunList> {
        let url = self.actions_url(scope, "runs");
        let response = self
            .request(Method::GET, &url)
            .query(query)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Get a single run
    pub async fn get_run(&self, scope: &Scope, run: RunHandle) -> Result<WorkflowRun> {
        let url = self.actions_url(scope, &format!("runs/{}", run));
        let response = self.request(Method::GET, &url).send().await?;

        self.handle_response(response).await
    }

    // =============================================================================
    // Run Labels
    // =============================================================================

    /// Attach labels to a run
    pub async fn add_labels(&self, scope: &Scope, run: RunHandle, labels: Vec<String>) -> Result<()> {
        let url = self.actions_url(scope, &format!("runs/{}/labels", run));
        let response = self
            .request(Method::POST, &url)
            .json(&AddLabelsRequest { labels })
            .send()
            .await?;

        self.handle_empty_response(response).await
    }
}
