//! Tether Runner
//!
//! Dispatches a CI workflow, finds the run the dispatch created, waits for it
//! to finish and downloads its artifact.
//!
//! Architecture:
//! - Configuration: settings from environment or defaults
//! - Repositories: provider operations behind traits (runs, artifacts)
//! - Services: dispatch, correlation, completion polling, artifact retrieval
//!   and the per-token workflow record
//! - Scheduler: the orchestration state machine tying the services together
//!
//! Several orchestrations can share one process and one record store; each
//! owns its token and run, and waits without blocking the others.

pub mod cancel;
pub mod config;
pub mod error;
pub mod repository;
pub mod scheduler;
pub mod service;

pub use cancel::{CancelHandle, CancelSignal};
pub use config::Config;
pub use error::{OrchestrationError, Result};
pub use scheduler::{ArtifactOutcome, OrchestrationReport, OrchestrationState, Orchestrator};
pub use service::{InMemoryWorkflowRecord, WorkflowRecordStore};
