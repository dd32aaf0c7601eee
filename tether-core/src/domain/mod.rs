//! Core domain types
//!
//! These types describe a dispatched workflow run from the point of view of
//! the caller: the token it generated, the identifier the provider assigned,
//! and the status snapshots observed while waiting for it.

pub mod artifact;
pub mod record;
pub mod run;
pub mod workflow;

pub use artifact::Artifact;
pub use record::{RecordState, WorkflowRecord};
pub use run::{Conclusion, HeadCommit, Label, LifecycleState, RunHandle, RunStatus, WorkflowRun};
pub use workflow::{CorrelationStrategy, CorrelationToken, Scope};
