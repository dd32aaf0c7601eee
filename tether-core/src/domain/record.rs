//! Workflow record types
//!
//! A workflow record tracks one orchestration per correlation token for the
//! lifetime of the process. Records are never persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::run::{Conclusion, RunHandle};
use super::workflow::CorrelationToken;

/// Coarse state of an orchestration as seen by observers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordState {
    Pending,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRecord {
    pub token: CorrelationToken,
    pub state: RecordState,
    pub run_id: Option<RunHandle>,
    pub conclusion: Option<Conclusion>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowRecord {
    pub fn pending(token: CorrelationToken) -> Self {
        Self {
            token,
            state: RecordState::Pending,
            run_id: None,
            conclusion: None,
            updated_at: Utc::now(),
        }
    }
}
