//! Workflow run DTOs

use serde::{Deserialize, Serialize};

use crate::domain::run::WorkflowRun;

/// Query string of the run listing endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListRunsQuery {
    pub branch: String,
    pub per_page: u32,
    /// Server-side label filter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<String>,
}

/// Run listing envelope, newest runs first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunList {
    #[serde(default)]
    pub total_count: u64,
    pub workflow_runs: Vec<WorkflowRun>,
}

/// Body of the label attachment request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddLabelsRequest {
    pub labels: Vec<String>,
}
