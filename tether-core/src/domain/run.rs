//! Workflow run domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Provider-assigned identifier of a workflow run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunHandle(pub u64);

impl fmt::Display for RunHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state reported by the provider
///
/// Only `Completed` is terminal. Unrecognized values are kept as `Unknown`
/// and treated as still running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Requested,
    Queued,
    Pending,
    Waiting,
    InProgress,
    Completed,
    #[serde(other)]
    Unknown,
}

impl LifecycleState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// Outcome of a completed run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Conclusion {
    Success,
    Failure,
    Cancelled,
    Skipped,
    Neutral,
    TimedOut,
    ActionRequired,
    Stale,
    StartupFailure,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for Conclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Cancelled => "cancelled",
            Self::Skipped => "skipped",
            Self::Neutral => "neutral",
            Self::TimedOut => "timed_out",
            Self::ActionRequired => "action_required",
            Self::Stale => "stale",
            Self::StartupFailure => "startup_failure",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Point-in-time status of a run, superseded by every new poll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStatus {
    pub id: RunHandle,
    pub state: LifecycleState,
    pub conclusion: Option<Conclusion>,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// True only for a completed run that concluded with `success`
    pub fn succeeded(&self) -> bool {
        self.is_terminal() && self.conclusion == Some(Conclusion::Success)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadCommit {
    pub message: String,
}

/// A run as returned by the provider's run listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub id: RunHandle,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(default)]
    pub head_commit: Option<HeadCommit>,
    pub status: LifecycleState,
    #[serde(default)]
    pub conclusion: Option<Conclusion>,
    pub created_at: DateTime<Utc>,
}

impl WorkflowRun {
    pub fn has_label(&self, name: &str) -> bool {
        self.labels.iter().any(|label| label.name == name)
    }

    pub fn is_unlabeled(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn commit_message(&self) -> Option<&str> {
        self.head_commit.as_ref().map(|commit| commit.message.as_str())
    }

    pub fn status(&self) -> RunStatus {
        RunStatus {
            id: self.id,
            state: self.status,
            conclusion: self.conclusion,
        }
    }
}
