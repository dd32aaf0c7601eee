//! Correlator service
//!
//! The provider's dispatch endpoint does not return the id of the run it
//! creates, so the run has to be found again in the run listing. Three
//! strategies are supported, depending on how the workflow re-emits the
//! correlation token:
//! - `DirectLabelStrategy`: the workflow labels its own run
//!   `unique-id-<token>`; runs are filtered by that label server-side
//! - `CommitMessageStrategy`: the token appears verbatim in the triggering
//!   commit message
//! - `LabelStrategy`: the newest unlabeled run is labelled by us. Two
//!   dispatches racing on the same branch can swap runs. When the new run is
//!   not listed yet, an older unlabeled run is claimed instead; that is not a
//!   miss, so the orchestrator's correlation retry never kicks in. This
//!   strategy is a fallback for workflows that cannot do either of the above.
//!
//! Every strategy inspects a single listing page (the lookback window). When
//! several runs match, the most recently created one wins. The correlator
//! never retries; with the two token-matching strategies a run that is not
//! listed yet is reported as not found.

use async_trait::async_trait;
use std::sync::Arc;
use tether_core::domain::{CorrelationStrategy, CorrelationToken, RunHandle, Scope, WorkflowRun};
use tether_core::dto::run::ListRunsQuery;
use tracing::{debug, info, warn};

use crate::error::{OrchestrationError, Result};
use crate::repository::RunRepository;

/// Maps a correlation token to the run it triggered
#[async_trait]
pub trait ResolutionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Resolves `token` using one listing of `query`
    async fn resolve(
        &self,
        runs: &dyn RunRepository,
        scope: &Scope,
        token: &CorrelationToken,
        query: ListRunsQuery,
    ) -> Result<RunHandle>;
}

/// Resolves tokens to run handles with a configured strategy
pub struct Correlator {
    runs: Arc<dyn RunRepository>,
    strategy: Box<dyn ResolutionStrategy>,
    branch: String,
    lookback: u32,
}

impl Correlator {
    /// # Arguments
    /// * `runs` - Provider run repository
    /// * `strategy` - How the token is matched
    /// * `branch` - Reference branch runs are listed from
    /// * `lookback` - Number of most recent runs inspected
    pub fn new(
        runs: Arc<dyn RunRepository>,
        strategy: CorrelationStrategy,
        branch: impl Into<String>,
        lookback: u32,
    ) -> Self {
        let strategy: Box<dyn ResolutionStrategy> = match strategy {
            CorrelationStrategy::Label => {
                warn!(
                    "label correlation picks the newest unlabeled run; concurrent dispatches on the same branch, or a run not listed yet, can lead to the wrong run"
                );
                Box::new(LabelStrategy)
            }
            CorrelationStrategy::DirectLabel => Box::new(DirectLabelStrategy),
            CorrelationStrategy::CommitMessage => Box::new(CommitMessageStrategy),
        };
        Self::with_strategy(runs, strategy, branch, lookback)
    }

    /// Creates a correlator with a custom resolution strategy
    pub fn with_strategy(
        runs: Arc<dyn RunRepository>,
        strategy: Box<dyn ResolutionStrategy>,
        branch: impl Into<String>,
        lookback: u32,
    ) -> Self {
        Self {
            runs,
            strategy,
            branch: branch.into(),
            lookback,
        }
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Resolves `token` to the provider's run id
    pub async fn resolve_run_id(&self, scope: &Scope, token: &CorrelationToken) -> Result<RunHandle> {
        let query = ListRunsQuery {
            branch: self.branch.clone(),
            per_page: self.lookback,
            labels: None,
        };

        debug!(%token, strategy = self.strategy.name(), lookback = self.lookback, "resolving run id");
        let run = self
            .strategy
            .resolve(self.runs.as_ref(), scope, token, query)
            .await?;
        info!(%token, run_id = %run, strategy = self.strategy.name(), "run correlated");
        Ok(run)
    }
}

/// Lists one page of runs, mapping provider failures to correlation errors
async fn list(
    runs: &dyn RunRepository,
    scope: &Scope,
    token: &CorrelationToken,
    query: &ListRunsQuery,
) -> Result<Vec<WorkflowRun>> {
    runs.list_runs(scope, query)
        .await
        .map_err(|source| OrchestrationError::Correlation {
            token: token.clone(),
            source,
        })
}

/// Picks the most recently created run among `matches`
///
/// Runs sharing the newest creation timestamp cannot be ordered and make the
/// match ambiguous.
fn select_latest(
    token: &CorrelationToken,
    window: u32,
    mut matches: Vec<&WorkflowRun>,
) -> Result<RunHandle> {
    matches.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    matches.dedup_by_key(|run| run.id);

    let Some(newest) = matches.first() else {
        return Err(OrchestrationError::CorrelationNotFound {
            token: token.clone(),
            window,
        });
    };

    let tied: Vec<RunHandle> = matches
        .iter()
        .take_while(|run| run.created_at == newest.created_at)
        .map(|run| run.id)
        .collect();
    if tied.len() > 1 {
        return Err(OrchestrationError::CorrelationAmbiguous {
            token: token.clone(),
            candidates: tied,
        });
    }

    if matches.len() > 1 {
        let others: Vec<String> = matches[1..].iter().map(|run| run.id.to_string()).collect();
        warn!(%token, run_id = %newest.id, others = %others.join(", "), "several runs match token, using the newest");
    }

    Ok(newest.id)
}

/// Matches runs the workflow labelled itself with `unique-id-<token>`
pub struct DirectLabelStrategy;

#[async_trait]
impl ResolutionStrategy for DirectLabelStrategy {
    fn name(&self) -> &'static str {
        "direct-label"
    }

    async fn resolve(
        &self,
        runs: &dyn RunRepository,
        scope: &Scope,
        token: &CorrelationToken,
        mut query: ListRunsQuery,
    ) -> Result<RunHandle> {
        let label = token.label();
        query.labels = Some(label.clone());

        let listed = list(runs, scope, token, &query).await?;
        let matches = listed.iter().filter(|run| run.has_label(&label)).collect();
        select_latest(token, query.per_page, matches)
    }
}

/// Matches runs whose triggering commit message contains the token
pub struct CommitMessageStrategy;

#[async_trait]
impl ResolutionStrategy for CommitMessageStrategy {
    fn name(&self) -> &'static str {
        "commit-message"
    }

    async fn resolve(
        &self,
        runs: &dyn RunRepository,
        scope: &Scope,
        token: &CorrelationToken,
        query: ListRunsQuery,
    ) -> Result<RunHandle> {
        let listed = list(runs, scope, token, &query).await?;
        let matches = listed
            .iter()
            .filter(|run| {
                run.commit_message()
                    .is_some_and(|message| message.contains(token.as_str()))
            })
            .collect();
        select_latest(token, query.per_page, matches)
    }
}

/// Labels the newest unlabeled run with the token label
///
/// A run already carrying the token label is returned as-is, so resolving the
/// same token twice does not claim a second run.
pub struct LabelStrategy;

#[async_trait]
impl ResolutionStrategy for LabelStrategy {
    fn name(&self) -> &'static str {
        "label"
    }

    async fn resolve(
        &self,
        runs: &dyn RunRepository,
        scope: &Scope,
        token: &CorrelationToken,
        query: ListRunsQuery,
    ) -> Result<RunHandle> {
        let label = token.label();
        let listed = list(runs, scope, token, &query).await?;

        let claimed: Vec<&WorkflowRun> = listed.iter().filter(|run| run.has_label(&label)).collect();
        if !claimed.is_empty() {
            return select_latest(token, query.per_page, claimed);
        }

        let unlabeled = listed.iter().filter(|run| run.is_unlabeled()).collect();
        let run = select_latest(token, query.per_page, unlabeled)?;

        runs.add_labels(scope, run, vec![label])
            .await
            .map_err(|source| OrchestrationError::Correlation {
                token: token.clone(),
                source,
            })?;
        debug!(%token, run_id = %run, "labelled newest unlabeled run");
        Ok(run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fake::{FakeProvider, run};

    fn scope() -> Scope {
        Scope::new("octo", "demo")
    }

    fn correlator(provider: Arc<FakeProvider>, strategy: CorrelationStrategy) -> Correlator {
        Correlator::new(provider, strategy, "main", 100)
    }

    #[tokio::test]
    async fn test_direct_label_returns_labelled_run() {
        let provider = Arc::new(FakeProvider::with_runs(vec![
            run(1, 0, &["unique-id-other"], "ci"),
            run(2, 1, &["unique-id-abc"], "ci"),
            run(3, 2, &[], "ci"),
        ]));

        let resolved = correlator(provider.clone(), CorrelationStrategy::DirectLabel)
            .resolve_run_id(&scope(), &CorrelationToken::new("abc"))
            .await
            .unwrap();

        assert_eq!(resolved, RunHandle(2));
        assert_eq!(provider.run_labels(resolved), vec!["unique-id-abc"]);
        assert!(provider.labelled().is_empty());
    }

    #[tokio::test]
    async fn test_tie_break_prefers_latest_created() {
        let provider = Arc::new(FakeProvider::with_runs(vec![
            run(1, 0, &["unique-id-X"], "ci"),
            run(2, 1, &["unique-id-X"], "ci"),
        ]));

        let resolved = correlator(provider, CorrelationStrategy::DirectLabel)
            .resolve_run_id(&scope(), &CorrelationToken::new("X"))
            .await
            .unwrap();

        assert_eq!(resolved, RunHandle(2));
    }

    #[tokio::test]
    async fn test_identical_timestamps_are_ambiguous() {
        let provider = Arc::new(FakeProvider::with_runs(vec![
            run(1, 5, &["unique-id-X"], "ci"),
            run(2, 5, &["unique-id-X"], "ci"),
            run(3, 0, &["unique-id-X"], "ci"),
        ]));

        let err = correlator(provider, CorrelationStrategy::DirectLabel)
            .resolve_run_id(&scope(), &CorrelationToken::new("X"))
            .await
            .unwrap_err();

        match err {
            OrchestrationError::CorrelationAmbiguous { candidates, .. } => {
                assert_eq!(candidates, vec![RunHandle(2), RunHandle(1)]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_no_match_within_window_is_not_found() {
        let mut runs = vec![run(1, 0, &[], "ci: run abc")];
        runs.extend((2..=101).map(|id| run(id, id as i64, &[], "ci")));
        let provider = Arc::new(FakeProvider::with_runs(runs));

        // The matching run is older than the 100 newest runs on the branch.
        let err = correlator(provider, CorrelationStrategy::CommitMessage)
            .resolve_run_id(&scope(), &CorrelationToken::new("abc"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            OrchestrationError::CorrelationNotFound { window: 100, .. }
        ));
    }

    #[tokio::test]
    async fn test_commit_message_match() {
        let provider = Arc::new(FakeProvider::with_runs(vec![
            run(1, 0, &[], "ci: run abc"),
            run(2, 1, &[], "ci: run def"),
        ]));

        let resolved = correlator(provider, CorrelationStrategy::CommitMessage)
            .resolve_run_id(&scope(), &CorrelationToken::new("abc"))
            .await
            .unwrap();

        assert_eq!(resolved, RunHandle(1));
    }

    #[tokio::test]
    async fn test_label_strategy_claims_newest_unlabeled_run() {
        let provider = Arc::new(FakeProvider::with_runs(vec![
            run(1, 0, &[], "ci"),
            run(2, 1, &[], "ci"),
            run(3, 2, &["unique-id-other"], "ci"),
        ]));
        let correlator = correlator(provider.clone(), CorrelationStrategy::Label);
        let token = CorrelationToken::new("abc");

        let resolved = correlator.resolve_run_id(&scope(), &token).await.unwrap();
        assert_eq!(resolved, RunHandle(2));
        assert_eq!(provider.run_labels(RunHandle(2)), vec!["unique-id-abc"]);

        // Resolving again finds the claimed run instead of claiming run 1.
        let again = correlator.resolve_run_id(&scope(), &token).await.unwrap();
        assert_eq!(again, RunHandle(2));
        assert_eq!(provider.labelled().len(), 1);
    }

    #[tokio::test]
    async fn test_label_strategy_claims_stale_run_when_new_one_is_unlisted() {
        // An older unlabeled run is listed; the freshly dispatched one is not yet.
        let provider = Arc::new(FakeProvider::with_runs(vec![run(1, 0, &[], "ci")]));

        let resolved = correlator(provider.clone(), CorrelationStrategy::Label)
            .resolve_run_id(&scope(), &CorrelationToken::new("abc"))
            .await
            .unwrap();

        assert_eq!(resolved, RunHandle(1));
        assert_eq!(provider.run_labels(RunHandle(1)), vec!["unique-id-abc"]);
    }

    #[tokio::test]
    async fn test_listing_failure_is_a_correlation_error() {
        let provider = Arc::new(FakeProvider::with_runs(vec![run(1, 0, &["unique-id-abc"], "ci")]));
        provider.fail_next_listings(1);

        let err = correlator(provider, CorrelationStrategy::DirectLabel)
            .resolve_run_id(&scope(), &CorrelationToken::new("abc"))
            .await
            .unwrap_err();

        assert!(matches!(err, OrchestrationError::Correlation { .. }));
    }
}
