//! Scripted in-memory provider
//!
//! Built for unit tests, and for the integration tests through the
//! `test-util` feature. Runs, failures and delays are scripted by the test;
//! every dispatch adds a new run that is then reported on like a real one.

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use tether_client::{ClientError, Result};
use tether_core::domain::{
    Artifact, Conclusion, CorrelationToken, HeadCommit, Label, LifecycleState, RunHandle,
    RunStatus, Scope, WorkflowRun,
};
use tether_core::dto::dispatch::DispatchRequest;
use tether_core::dto::run::ListRunsQuery;

use super::{ArtifactRepository, RunRepository};

pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
}

/// Builds a listed run created `offset` seconds after the test epoch
pub fn run(id: u64, offset: i64, labels: &[&str], message: &str) -> WorkflowRun {
    WorkflowRun {
        id: RunHandle(id),
        labels: labels
            .iter()
            .map(|name| Label {
                name: name.to_string(),
            })
            .collect(),
        head_commit: Some(HeadCommit {
            message: message.to_string(),
        }),
        status: LifecycleState::Queued,
        conclusion: None,
        created_at: epoch() + Duration::seconds(offset),
    }
}

#[derive(Default)]
struct State {
    runs: Vec<WorkflowRun>,
    self_labelling: bool,
    reject_dispatch: Option<u16>,
    polls_before_completion: u32,
    conclusion: Option<Conclusion>,
    poll_delay: std::time::Duration,
    failing_polls: u32,
    failing_poll_status: u16,
    failing_listings: u32,
    hidden_listings: u32,
    pending_polls: HashMap<RunHandle, u32>,
    get_calls: usize,
    dispatched: Vec<DispatchRequest>,
    labelled: Vec<(RunHandle, Vec<String>)>,
    artifacts: Vec<Artifact>,
    payloads: HashMap<u64, Vec<u8>>,
}

/// In-memory provider whose runs and failures are scripted by the test
#[derive(Default)]
pub struct FakeProvider {
    state: Mutex<State>,
}

impl FakeProvider {
    pub fn new() -> Self {
        let provider = Self::default();
        provider.state.lock().unwrap().conclusion = Some(Conclusion::Success);
        provider
    }

    pub fn with_runs(runs: Vec<WorkflowRun>) -> Self {
        let provider = Self::new();
        provider.state.lock().unwrap().runs = runs;
        provider
    }

    /// Dispatched runs carry the token label, as a workflow that labels
    /// itself would produce
    pub fn with_self_labelling(self) -> Self {
        self.state.lock().unwrap().self_labelling = true;
        self
    }

    pub fn reject_dispatch(&self, status: u16) {
        self.state.lock().unwrap().reject_dispatch = Some(status);
    }

    pub fn complete_after(&self, polls: u32, conclusion: Conclusion) {
        let mut state = self.state.lock().unwrap();
        state.polls_before_completion = polls;
        state.conclusion = Some(conclusion);
    }

    pub fn never_complete(&self) {
        self.state.lock().unwrap().polls_before_completion = u32::MAX;
    }

    /// Every status fetch takes `delay` before answering
    pub fn delay_polls(&self, delay: std::time::Duration) {
        self.state.lock().unwrap().poll_delay = delay;
    }

    pub fn fail_next_polls(&self, count: u32) {
        self.fail_next_polls_with(count, 503);
    }

    pub fn fail_next_polls_with(&self, count: u32, status: u16) {
        let mut state = self.state.lock().unwrap();
        state.failing_polls = count;
        state.failing_poll_status = status;
    }

    pub fn fail_next_listings(&self, count: u32) {
        self.state.lock().unwrap().failing_listings = count;
    }

    /// The next `count` listings come back empty, as if new runs were not
    /// indexed yet
    pub fn hide_next_listings(&self, count: u32) {
        self.state.lock().unwrap().hidden_listings = count;
    }

    pub fn add_artifact(&self, id: u64, name: &str, payload: &[u8]) {
        let mut state = self.state.lock().unwrap();
        state.artifacts.push(Artifact {
            id,
            name: name.to_string(),
            size_in_bytes: payload.len() as u64,
            expired: false,
        });
        state.payloads.insert(id, payload.to_vec());
    }

    pub fn get_calls(&self) -> usize {
        self.state.lock().unwrap().get_calls
    }

    pub fn run_count(&self) -> usize {
        self.state.lock().unwrap().runs.len()
    }

    pub fn dispatched(&self) -> Vec<DispatchRequest> {
        self.state.lock().unwrap().dispatched.clone()
    }

    pub fn labelled(&self) -> Vec<(RunHandle, Vec<String>)> {
        self.state.lock().unwrap().labelled.clone()
    }

    pub fn run_labels(&self, id: RunHandle) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state
            .runs
            .iter()
            .find(|r| r.id == id)
            .map(|r| r.labels.iter().map(|l| l.name.clone()).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl RunRepository for FakeProvider {
    async fn dispatch(
        &self,
        _scope: &Scope,
        _workflow: &str,
        request: &DispatchRequest,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(status) = state.reject_dispatch {
            return Err(ClientError::api_error(status, "dispatch rejected"));
        }

        let id = state.runs.iter().map(|r| r.id.0).max().unwrap_or(0) + 1;
        let offset = state.runs.len() as i64 + 1_000;
        let token = request
            .inputs
            .get("correlation_id")
            .cloned()
            .unwrap_or_default();
        let label = CorrelationToken::new(token.clone()).label();
        let labels = if state.self_labelling {
            vec![label.as_str()]
        } else {
            Vec::new()
        };
        let new_run = run(id, offset, &labels, &format!("ci: run {}", token));

        let polls = state.polls_before_completion;
        state.pending_polls.insert(new_run.id, polls);
        state.runs.push(new_run);
        state.dispatched.push(request.clone());
        Ok(())
    }

    async fn list_runs(&self, _scope: &Scope, query: &ListRunsQuery) -> Result<Vec<WorkflowRun>> {
        let mut state = self.state.lock().unwrap();
        if state.failing_listings > 0 {
            state.failing_listings -= 1;
            return Err(ClientError::api_error(502, "bad gateway"));
        }
        if state.hidden_listings > 0 {
            state.hidden_listings -= 1;
            return Ok(Vec::new());
        }

        let mut runs: Vec<WorkflowRun> = state
            .runs
            .iter()
            .filter(|r| query.labels.as_ref().is_none_or(|label| r.has_label(label)))
            .cloned()
            .collect();
        runs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        runs.truncate(query.per_page as usize);
        Ok(runs)
    }

    async fn add_labels(&self, _scope: &Scope, id: RunHandle, labels: Vec<String>) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let run = state
            .runs
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| ClientError::api_error(404, "run not found"))?;
        run.labels
            .extend(labels.iter().map(|name| Label { name: name.clone() }));
        state.labelled.push((id, labels));
        Ok(())
    }

    async fn get_run(&self, _scope: &Scope, id: RunHandle) -> Result<RunStatus> {
        let delay = {
            let mut state = self.state.lock().unwrap();
            state.get_calls += 1;
            state.poll_delay
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().unwrap();
        if state.failing_polls > 0 {
            state.failing_polls -= 1;
            let status = state.failing_poll_status;
            return Err(ClientError::api_error(status, "status unavailable"));
        }

        let default_polls = state.polls_before_completion;
        let conclusion = state.conclusion;
        let remaining = state.pending_polls.entry(id).or_insert(default_polls);
        let finished = *remaining == 0;
        if !finished {
            *remaining -= 1;
        }

        let run = state
            .runs
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| ClientError::api_error(404, "run not found"))?;
        if finished {
            run.status = LifecycleState::Completed;
            run.conclusion = conclusion;
        } else {
            run.status = LifecycleState::InProgress;
        }
        Ok(run.status())
    }
}

#[async_trait]
impl ArtifactRepository for FakeProvider {
    async fn list_artifacts(&self, _scope: &Scope, _run: RunHandle) -> Result<Vec<Artifact>> {
        Ok(self.state.lock().unwrap().artifacts.clone())
    }

    async fn download(&self, _scope: &Scope, artifact_id: u64) -> Result<Vec<u8>> {
        self.state
            .lock()
            .unwrap()
            .payloads
            .get(&artifact_id)
            .cloned()
            .ok_or_else(|| ClientError::api_error(410, "artifact expired"))
    }
}
