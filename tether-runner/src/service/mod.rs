//! Service layer
//!
//! Services hold the dispatch-and-wait logic. Each one covers a single step
//! of an orchestration and talks to the provider only through repositories:
//! - `Dispatcher` triggers the workflow
//! - `Correlator` finds the run the trigger created
//! - `CompletionWaiter` polls the run until it is terminal
//! - `ArtifactFetcher` writes the run's artifact to disk
//!
//! The workflow record store is shared by every orchestration in a process.

mod artifacts;
mod correlator;
mod dispatcher;
mod record;
mod waiter;

// Re-export traits
pub use correlator::ResolutionStrategy;
pub use record::WorkflowRecordStore;

// Re-export implementations
pub use artifacts::{ArtifactDownload, ArtifactFetcher};
pub use correlator::{CommitMessageStrategy, Correlator, DirectLabelStrategy, LabelStrategy};
pub use dispatcher::Dispatcher;
pub use record::InMemoryWorkflowRecord;
pub use waiter::{CompletionWaiter, WaitPolicy};
