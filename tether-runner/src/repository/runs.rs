//! Runs repository
//!
//! Handles the provider operations around a workflow run:
//! - Dispatching a workflow
//! - Listing recent runs
//! - Labelling a run
//! - Fetching a run's status

use async_trait::async_trait;
use std::sync::Arc;
use tether_client::{ProviderClient, Result};
use tether_core::domain::{RunHandle, RunStatus, Scope, WorkflowRun};
use tether_core::dto::dispatch::DispatchRequest;
use tether_core::dto::run::ListRunsQuery;

/// Repository trait for run-related provider operations
#[async_trait]
pub trait RunRepository: Send + Sync {
    /// Triggers a workflow run
    ///
    /// # Arguments
    /// * `scope` - Target repository
    /// * `workflow` - Workflow file name or id
    /// * `request` - Branch and inputs of the run
    async fn dispatch(&self, scope: &Scope, workflow: &str, request: &DispatchRequest)
    -> Result<()>;

    /// Lists one page of recent runs, newest first
    async fn list_runs(&self, scope: &Scope, query: &ListRunsQuery) -> Result<Vec<WorkflowRun>>;

    /// Attaches labels to a run
    async fn add_labels(&self, scope: &Scope, run: RunHandle, labels: Vec<String>) -> Result<()>;

    /// Fetches the current status of a run
    async fn get_run(&self, scope: &Scope, run: RunHandle) -> Result<RunStatus>;
}

/// HTTP implementation of RunRepository
pub struct HttpRunRepository {
    client: Arc<ProviderClient>,
}

impl HttpRunRepository {
    pub fn new(client: Arc<ProviderClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RunRepository for HttpRunRepository {
    async fn dispatch(
        &self,
        scope: &Scope,
        workflow: &str,
        request: &DispatchRequest,
    ) -> Result<()> {
        self.client.dispatch_workflow(scope, workflow, request).await
    }

    async fn list_runs(&self, scope: &Scope, query: &ListRunsQuery) -> Result<Vec<WorkflowRun>> {
        let list = self.client.list_runs(scope, query).await?;
        Ok(list.workflow_runs)
    }

    async fn add_labels(&self, scope: &Scope, run: RunHandle, labels: Vec<String>) -> Result<()> {
        self.client.add_labels(scope, run, labels).await
    }

    async fn get_run(&self, scope: &Scope, run: RunHandle) -> Result<RunStatus> {
        let run = self.client.get_run(scope, run).await?;
        Ok(run.status())
    }
}
