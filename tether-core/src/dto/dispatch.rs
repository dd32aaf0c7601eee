//! Workflow dispatch DTOs

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Body of a workflow dispatch request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchRequest {
    /// Branch or tag the workflow runs on
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub inputs: HashMap<String, String>,
}
