//! Workflow dispatch endpoint

use crate::ProviderClient;
use crate::error::Result;
use reqwest::Method;
use tether_core::domain::Scope;
use tether_core::dto::dispatch::DispatchRequest;
use tracing::debug;

impl ProviderClient {
    /// Trigger a workflow run
    ///
    /// The provider answers with an empty 204 and does not return the id of
    /// the run it creates; callers correlate the run afterwards.
    ///
    /// # Arguments
    /// * `scope` - Target repository
    /// * `workflow` - Workflow file name or numeric id
    /// * `req` - Branch and workflow inputs
    pub async fn dispatch_workflow(
        &self,
        scope: &Scope,
        workflow: &str,
        req: &DispatchRequest,
    ) -> Result<()> {
        let url = self.actions_url(scope, &format!("workflows/{}/dispatches", workflow));
        debug!("Dispatching workflow {} on {} ({})", workflow, req.git_ref, scope);

        let response = self.request(Method::POST, &url).json(req).send().await?;

        self.handle_empty_response(response).await
    }
}
