//! Completion waiter service
//!
//! Polls a run until the provider reports it `completed`. Any conclusion is
//! accepted; judging success is up to the caller. A failed fetch does not end
//! the wait unless too many fail in a row, and the whole wait is bounded by a
//! timeout. Sleeping between polls suspends only the current task.

use std::sync::Arc;
use std::time::Duration;
use tether_core::domain::{CorrelationToken, RunHandle, RunStatus, Scope};
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use crate::cancel::CancelSignal;
use crate::error::{OrchestrationError, Result};
use crate::repository::RunRepository;

/// Polling parameters of a wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    /// Delay between two polls
    pub poll_interval: Duration,
    /// Upper bound on the total wait
    pub timeout: Duration,
    /// Consecutive fetch failures tolerated; one more fails the wait
    pub max_consecutive_failures: u32,
}

pub struct CompletionWaiter {
    runs: Arc<dyn RunRepository>,
}

impl CompletionWaiter {
    pub fn new(runs: Arc<dyn RunRepository>) -> Self {
        Self { runs }
    }

    /// Waits until `run` reaches a terminal state
    ///
    /// Never outlasts `timeout`: the last sleep is cut short at the deadline,
    /// and a status fetch still in flight when the deadline passes is
    /// abandoned.
    ///
    /// # Errors
    /// - `WaitTimeout` when the deadline passes first
    /// - `StatusFetch` when more than `max_consecutive_failures` fetches fail
    ///   in a row, or at once when the failure is not transient
    /// - `Cancelled` when `cancel` fires
    pub async fn await_completion(
        &self,
        scope: &Scope,
        token: &CorrelationToken,
        run: RunHandle,
        policy: &WaitPolicy,
        cancel: &mut CancelSignal,
    ) -> Result<RunStatus> {
        let deadline = Instant::now() + policy.timeout;
        let mut failures = 0u32;
        let mut polls = 0u32;

        loop {
            if cancel.is_cancelled() {
                return Err(OrchestrationError::Cancelled {
                    token: token.clone(),
                });
            }

            polls += 1;
            let fetched = tokio::select! {
                fetched = time::timeout_at(deadline, self.runs.get_run(scope, run)) => fetched,
                _ = cancel.cancelled() => {
                    return Err(OrchestrationError::Cancelled {
                        token: token.clone(),
                    });
                }
            };
            let Ok(fetched) = fetched else {
                warn!(%token, run_id = %run, polls, "status fetch still pending at deadline");
                return Err(OrchestrationError::WaitTimeout {
                    run,
                    timeout: policy.timeout,
                });
            };

            match fetched {
                Ok(status) if status.is_terminal() => {
                    info!(%token, run_id = %run, polls, conclusion = ?status.conclusion, "run completed");
                    return Ok(status);
                }
                Ok(status) => {
                    failures = 0;
                    debug!(%token, run_id = %run, state = ?status.state, "run still in progress");
                }
                Err(source) => {
                    failures += 1;
                    if !source.is_transient() || failures > policy.max_consecutive_failures {
                        return Err(OrchestrationError::StatusFetch {
                            run,
                            failures,
                            source,
                        });
                    }
                    warn!(
                        %token,
                        run_id = %run,
                        failures,
                        max = policy.max_consecutive_failures,
                        error = %source,
                        "failed to fetch run status, retrying"
                    );
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(OrchestrationError::WaitTimeout {
                    run,
                    timeout: policy.timeout,
                });
            }

            let pause = policy.poll_interval.min(deadline - now);
            tokio::select! {
                _ = time::sleep(pause) => {}
                _ = cancel.cancelled() => {
                    return Err(OrchestrationError::Cancelled {
                        token: token.clone(),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fake::{FakeProvider, run};
    use tether_core::domain::Conclusion;

    fn scope() -> Scope {
        Scope::new("octo", "demo")
    }

    fn policy(max_consecutive_failures: u32) -> WaitPolicy {
        WaitPolicy {
            poll_interval: Duration::from_secs(5),
            timeout: Duration::from_secs(60),
            max_consecutive_failures,
        }
    }

    fn provider() -> Arc<FakeProvider> {
        Arc::new(FakeProvider::with_runs(vec![run(7, 0, &[], "ci")]))
    }

    #[tokio::test]
    async fn test_returns_on_completion_regardless_of_conclusion() {
        tokio::time::pause();
        let provider = provider();
        provider.complete_after(2, Conclusion::Failure);
        let waiter = CompletionWaiter::new(provider.clone());

        let status = waiter
            .await_completion(
                &scope(),
                &CorrelationToken::new("abc"),
                RunHandle(7),
                &policy(3),
                &mut CancelSignal::never(),
            )
            .await
            .unwrap();

        assert!(status.is_terminal());
        assert_eq!(status.conclusion, Some(Conclusion::Failure));
        assert_eq!(provider.get_calls(), 3);
    }

    #[tokio::test]
    async fn test_repeated_wait_after_completion_is_idempotent() {
        tokio::time::pause();
        let provider = provider();
        let waiter = CompletionWaiter::new(provider.clone());
        let token = CorrelationToken::new("abc");

        let first = waiter
            .await_completion(&scope(), &token, RunHandle(7), &policy(3), &mut CancelSignal::never())
            .await
            .unwrap();
        let calls = provider.get_calls();
        let second = waiter
            .await_completion(&scope(), &token, RunHandle(7), &policy(3), &mut CancelSignal::never())
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(provider.get_calls(), calls + 1);
    }

    #[tokio::test]
    async fn test_transient_failures_within_bound_are_tolerated() {
        tokio::time::pause();
        let provider = provider();
        provider.fail_next_polls(3);
        let waiter = CompletionWaiter::new(provider.clone());

        let status = waiter
            .await_completion(
                &scope(),
                &CorrelationToken::new("abc"),
                RunHandle(7),
                &policy(3),
                &mut CancelSignal::never(),
            )
            .await
            .unwrap();

        assert_eq!(status.conclusion, Some(Conclusion::Success));
        assert_eq!(provider.get_calls(), 4);
    }

    #[tokio::test]
    async fn test_too_many_consecutive_failures_fail_the_wait() {
        tokio::time::pause();
        let provider = provider();
        provider.fail_next_polls(3);
        let waiter = CompletionWaiter::new(provider.clone());

        let err = waiter
            .await_completion(
                &scope(),
                &CorrelationToken::new("abc"),
                RunHandle(7),
                &policy(2),
                &mut CancelSignal::never(),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            OrchestrationError::StatusFetch { failures: 3, .. }
        ));
    }

    #[tokio::test]
    async fn test_times_out_within_timeout_plus_interval() {
        tokio::time::pause();
        let provider = provider();
        provider.never_complete();
        let waiter = CompletionWaiter::new(provider.clone());
        let policy = WaitPolicy {
            poll_interval: Duration::from_secs(7),
            timeout: Duration::from_secs(30),
            max_consecutive_failures: 3,
        };

        let started = Instant::now();
        let err = waiter
            .await_completion(
                &scope(),
                &CorrelationToken::new("abc"),
                RunHandle(7),
                &policy,
                &mut CancelSignal::never(),
            )
            .await
            .unwrap_err();

        let elapsed = started.elapsed();
        assert!(matches!(err, OrchestrationError::WaitTimeout { .. }));
        assert!(elapsed >= policy.timeout);
        assert!(elapsed <= policy.timeout + policy.poll_interval);
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_sleep() {
        tokio::time::pause();
        let provider = provider();
        provider.never_complete();
        let waiter = CompletionWaiter::new(provider.clone());
        let (handle, mut signal) = CancelSignal::channel();
        let policy = WaitPolicy {
            poll_interval: Duration::from_secs(600),
            timeout: Duration::from_secs(3600),
            max_consecutive_failures: 3,
        };

        let started = Instant::now();
        let canceller = tokio::spawn(async move {
            time::sleep(Duration::from_secs(1)).await;
            handle.cancel();
        });
        let err = waiter
            .await_completion(
                &scope(),
                &CorrelationToken::new("abc"),
                RunHandle(7),
                &policy,
                &mut signal,
            )
            .await
            .unwrap_err();
        canceller.await.unwrap();

        assert!(matches!(err, OrchestrationError::Cancelled { .. }));
        assert!(started.elapsed() < policy.poll_interval);
        assert_eq!(provider.get_calls(), 1);
    }

    #[tokio::test]
    async fn test_slow_status_fetch_is_cut_at_deadline() {
        tokio::time::pause();
        let provider = provider();
        provider.never_complete();
        provider.delay_polls(Duration::from_secs(20));
        let waiter = CompletionWaiter::new(provider.clone());
        let policy = WaitPolicy {
            poll_interval: Duration::from_secs(5),
            timeout: Duration::from_secs(30),
            max_consecutive_failures: 3,
        };

        let started = Instant::now();
        let err = waiter
            .await_completion(
                &scope(),
                &CorrelationToken::new("abc"),
                RunHandle(7),
                &policy,
                &mut CancelSignal::never(),
            )
            .await
            .unwrap_err();

        let elapsed = started.elapsed();
        assert!(matches!(err, OrchestrationError::WaitTimeout { .. }));
        assert!(elapsed >= policy.timeout);
        assert!(elapsed <= policy.timeout + policy.poll_interval);
        // First fetch answers at 20s, the second starts at 25s and is abandoned.
        assert_eq!(provider.get_calls(), 2);
    }

    #[tokio::test]
    async fn test_non_transient_failure_ends_the_wait() {
        tokio::time::pause();
        let provider = provider();
        provider.fail_next_polls_with(1, 404);
        let waiter = CompletionWaiter::new(provider.clone());

        let err = waiter
            .await_completion(
                &scope(),
                &CorrelationToken::new("abc"),
                RunHandle(7),
                &policy(3),
                &mut CancelSignal::never(),
            )
            .await
            .unwrap_err();

        match err {
            OrchestrationError::StatusFetch { failures, source, .. } => {
                assert_eq!(failures, 1);
                assert!(!source.is_transient());
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(provider.get_calls(), 1);
    }
}
