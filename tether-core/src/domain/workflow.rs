//! Workflow dispatch identity: the target scope, the caller's correlation
//! token and the strategy used to map that token back to a run.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Prefix of the label derived from a correlation token
pub const LABEL_PREFIX: &str = "unique-id-";

/// Repository a workflow is dispatched against (`owner/repo`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
    pub owner: String,
    pub repo: String,
}

impl Scope {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// Caller-generated token identifying a triggered run before the provider
/// assigns it an id.
///
/// The token is passed to the workflow as an input and comes back either as a
/// run label or inside the triggering commit message. It is the only key that
/// survives a restart of the process that dispatched the run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationToken(String);

impl CorrelationToken {
    /// Wraps an existing token, e.g. one recovered from a previous process
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Generates a fresh random token
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Label the triggered run is expected to carry (`unique-id-<token>`)
    pub fn label(&self) -> String {
        format!("{}{}", LABEL_PREFIX, self.0)
    }
}

impl fmt::Display for CorrelationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a correlation token is mapped back to the provider's run id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CorrelationStrategy {
    /// Attach the token label to the most recent unlabeled run.
    ///
    /// Two dispatches racing on the same branch can each pick the other's
    /// run. If the dispatched run is not listed yet, an older unlabeled run
    /// is claimed in its place and no retry happens. Only use this when the
    /// workflow cannot label itself.
    Label,
    /// Filter runs server-side by the token label applied by the workflow
    #[default]
    DirectLabel,
    /// Match the token verbatim inside the triggering commit message
    CommitMessage,
}

impl CorrelationStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Label => "label",
            Self::DirectLabel => "direct-label",
            Self::CommitMessage => "commit-message",
        }
    }
}

impl fmt::Display for CorrelationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CorrelationStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "label" => Ok(Self::Label),
            "direct-label" | "direct_label" => Ok(Self::DirectLabel),
            "commit-message" | "commit_message" => Ok(Self::CommitMessage),
            other => Err(format!(
                "unknown correlation strategy '{}' (expected label, direct-label or commit-message)",
                other
            )),
        }
    }
}
