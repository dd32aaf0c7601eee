//! Scheduler layer for the runner
//!
//! This layer drives one orchestration per correlation token through
//! dispatch, correlation, polling and artifact retrieval, and keeps the
//! workflow record of each token up to date.

pub mod orchestrator;

pub use orchestrator::{ArtifactOutcome, OrchestrationReport, OrchestrationState, Orchestrator};
