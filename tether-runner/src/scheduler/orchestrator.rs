//! Orchestrator
//!
//! Ties the services together as a small state machine:
//!
//! ```text
//! Idle -> Dispatched -> Correlated -> Polling -> Completed
//!   \________\_____________\____________\______> Failed
//! ```
//!
//! Any error moves the orchestration to `Failed` and stops it. A run that
//! completes is `Completed` whatever its conclusion; the artifact download
//! that follows can fail without changing that.

use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tether_core::domain::{CorrelationToken, RunHandle, RunStatus, Scope};
use tokio::time;
use tracing::{debug, error, info, instrument, warn};

use crate::cancel::CancelSignal;
use crate::config::Config;
use crate::error::{OrchestrationError, Result};
use crate::repository::{ArtifactRepository, RunRepository};
use crate::service::{
    ArtifactDownload, ArtifactFetcher, CompletionWaiter, Correlator, Dispatcher, WaitPolicy,
    WorkflowRecordStore,
};

/// Orchestration lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestrationState {
    Idle,
    Dispatched,
    Correlated,
    Polling,
    Completed,
    Failed,
}

impl fmt::Display for OrchestrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Dispatched => "dispatched",
            Self::Correlated => "correlated",
            Self::Polling => "polling",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// What happened to the run's artifact after completion
#[derive(Debug)]
pub enum ArtifactOutcome {
    Downloaded(ArtifactDownload),
    /// No sink was requested
    Skipped,
    /// The download failed; the run's own result still stands
    Failed(OrchestrationError),
}

/// Result of an orchestration that reached `Completed`
#[derive(Debug)]
pub struct OrchestrationReport {
    pub token: CorrelationToken,
    pub run: RunHandle,
    pub status: RunStatus,
    pub state: OrchestrationState,
    pub artifact: ArtifactOutcome,
}

impl OrchestrationReport {
    /// Whether the remote run itself succeeded
    pub fn run_succeeded(&self) -> bool {
        self.status.succeeded()
    }
}

/// Drives dispatch-and-wait orchestrations for one workflow
pub struct Orchestrator {
    scope: Scope,
    workflow: String,
    dispatcher: Dispatcher,
    correlator: Correlator,
    waiter: CompletionWaiter,
    fetcher: ArtifactFetcher,
    records: Arc<dyn WorkflowRecordStore>,
    policy: WaitPolicy,
    correlation_attempts: u32,
    correlation_delay: Duration,
}

impl Orchestrator {
    /// Creates an orchestrator from configuration and injected collaborators
    pub fn new(
        config: &Config,
        runs: Arc<dyn RunRepository>,
        artifacts: Arc<dyn ArtifactRepository>,
        records: Arc<dyn WorkflowRecordStore>,
    ) -> Self {
        let dispatcher = Dispatcher::new(
            Arc::clone(&runs),
            config.reference_branch.clone(),
            config.token_input.clone(),
        )
        .with_inputs(config.workflow_inputs.clone());
        let correlator = Correlator::new(
            Arc::clone(&runs),
            config.correlation_strategy,
            config.reference_branch.clone(),
            config.lookback,
        );

        Self {
            scope: config.scope.clone(),
            workflow: config.workflow.clone(),
            dispatcher,
            correlator,
            waiter: CompletionWaiter::new(runs),
            fetcher: ArtifactFetcher::new(artifacts, config.artifact_name.clone()),
            records,
            policy: WaitPolicy {
                poll_interval: config.poll_interval,
                timeout: config.wait_timeout,
                max_consecutive_failures: config.max_poll_failures,
            },
            correlation_attempts: config.correlation_attempts.max(1),
            correlation_delay: config.correlation_delay,
        }
    }

    /// Dispatches the workflow for `token` and waits for the resulting run
    ///
    /// When `sink` is given, the run's artifact is written there once the run
    /// completes.
    #[instrument(skip(self, token, sink, cancel), fields(token = %token, scope = %self.scope))]
    pub async fn run(
        &self,
        token: CorrelationToken,
        sink: Option<&Path>,
        cancel: CancelSignal,
    ) -> Result<OrchestrationReport> {
        info!(
            workflow = %self.workflow,
            strategy = self.correlator.strategy_name(),
            "starting orchestration"
        );
        self.records.begin(&token);

        let mut state = OrchestrationState::Idle;
        if let Err(e) = self.dispatcher.dispatch(&self.scope, &self.workflow, &token).await {
            return Err(self.fail(&token, state, e));
        }
        transition(&token, &mut state, OrchestrationState::Dispatched);

        self.follow(token, state, sink, cancel).await
    }

    /// Resumes an orchestration whose dispatch happened in an earlier process
    ///
    /// The token is the only thing that survives a restart; the run is found
    /// again by correlation and then awaited as usual.
    #[instrument(skip(self, token, sink, cancel), fields(token = %token, scope = %self.scope))]
    pub async fn resume(
        &self,
        token: CorrelationToken,
        sink: Option<&Path>,
        cancel: CancelSignal,
    ) -> Result<OrchestrationReport> {
        info!(
            workflow = %self.workflow,
            strategy = self.correlator.strategy_name(),
            "resuming orchestration"
        );
        self.records.begin(&token);

        self.follow(token, OrchestrationState::Dispatched, sink, cancel)
            .await
    }

    /// Correlation, polling and artifact retrieval of a dispatched token
    async fn follow(
        &self,
        token: CorrelationToken,
        mut state: OrchestrationState,
        sink: Option<&Path>,
        mut cancel: CancelSignal,
    ) -> Result<OrchestrationReport> {
        let run = match self.correlate(&token, &mut cancel).await {
            Ok(run) => run,
            Err(e) => return Err(self.fail(&token, state, e)),
        };
        self.records.attach_run(&token, run);
        transition(&token, &mut state, OrchestrationState::Correlated);

        transition(&token, &mut state, OrchestrationState::Polling);
        let status = match self
            .waiter
            .await_completion(&self.scope, &token, run, &self.policy, &mut cancel)
            .await
        {
            Ok(status) => status,
            Err(e) => return Err(self.fail(&token, state, e)),
        };
        self.records.complete(&token, &status);
        transition(&token, &mut state, OrchestrationState::Completed);

        let artifact = match sink {
            Some(sink) => match self.fetcher.fetch(&self.scope, run, sink).await {
                Ok(download) => ArtifactOutcome::Downloaded(download),
                Err(e) => {
                    error!(%token, run_id = %run, error = %e, "artifact retrieval failed; run result unaffected");
                    ArtifactOutcome::Failed(e)
                }
            },
            None => ArtifactOutcome::Skipped,
        };

        info!(%token, run_id = %run, conclusion = ?status.conclusion, "orchestration completed");
        Ok(OrchestrationReport {
            token,
            run,
            status,
            state,
            artifact,
        })
    }

    /// Runs the correlator until the run shows up in the listing
    ///
    /// Only a miss is retried; the run may not be listed yet right after the
    /// dispatch. Any other correlation error is returned immediately.
    async fn correlate(&self, token: &CorrelationToken, cancel: &mut CancelSignal) -> Result<RunHandle> {
        let mut attempt = 0;

        loop {
            attempt += 1;
            if cancel.is_cancelled() {
                return Err(OrchestrationError::Cancelled {
                    token: token.clone(),
                });
            }

            match self.correlator.resolve_run_id(&self.scope, token).await {
                Ok(run) => return Ok(run),
                Err(e) if e.is_correlation_miss() && attempt < self.correlation_attempts => {
                    debug!(
                        %token,
                        attempt,
                        max_attempts = self.correlation_attempts,
                        "run not listed yet, retrying in {:?}",
                        self.correlation_delay
                    );
                }
                Err(e) => return Err(e),
            }

            tokio::select! {
                _ = time::sleep(self.correlation_delay) => {}
                _ = cancel.cancelled() => {
                    return Err(OrchestrationError::Cancelled {
                        token: token.clone(),
                    });
                }
            }
        }
    }

    /// Records a failure against `token` and hands the error back
    fn fail(
        &self,
        token: &CorrelationToken,
        state: OrchestrationState,
        error: OrchestrationError,
    ) -> OrchestrationError {
        if error.leaves_pending() {
            warn!(%token, %state, error = %error, "orchestration stopped, run may still complete");
        } else {
            self.records.fail(token);
            error!(%token, %state, error = %error, "orchestration failed");
        }
        error
    }
}

fn transition(token: &CorrelationToken, state: &mut OrchestrationState, next: OrchestrationState) {
    debug!(%token, from = %state, to = %next, "state transition");
    *state = next;
}
