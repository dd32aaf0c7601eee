//! Orchestration error taxonomy
//!
//! Every variant names the token or run it concerns so failures can be
//! traced back to the dispatch that caused them.

use std::time::Duration;
use tether_client::ClientError;
use tether_core::domain::{CorrelationToken, RunHandle};
use thiserror::Error;

/// Result type alias for orchestration operations
pub type Result<T> = std::result::Result<T, OrchestrationError>;

#[derive(Debug, Error)]
pub enum OrchestrationError {
    /// The provider rejected the trigger request
    #[error("workflow dispatch for token {token} was rejected: {source}")]
    Dispatch {
        token: CorrelationToken,
        source: ClientError,
    },

    /// No run in the lookback window matched the token
    #[error("no run matching token {token} among the {window} most recent runs")]
    CorrelationNotFound { token: CorrelationToken, window: u32 },

    /// Several runs matched the token and none of them is the newest
    #[error("token {token} matches runs created at the same instant: {candidates:?}")]
    CorrelationAmbiguous {
        token: CorrelationToken,
        candidates: Vec<RunHandle>,
    },

    /// Listing or labelling runs failed while correlating
    #[error("correlating token {token} failed: {source}")]
    Correlation {
        token: CorrelationToken,
        source: ClientError,
    },

    /// Too many consecutive status fetches failed
    #[error("status of run {run} unavailable ({failures} consecutive failures): {source}")]
    StatusFetch {
        run: RunHandle,
        failures: u32,
        source: ClientError,
    },

    /// The run did not reach a terminal state in time
    #[error("run {run} did not complete within {timeout:?}")]
    WaitTimeout { run: RunHandle, timeout: Duration },

    /// An external cancellation signal interrupted the orchestration
    #[error("orchestration for token {token} was cancelled")]
    Cancelled { token: CorrelationToken },

    /// The run completed but its artifact could not be retrieved
    #[error("artifact download for run {run} failed: {message}")]
    ArtifactDownload { run: RunHandle, message: String },
}

impl OrchestrationError {
    /// Whether the remote run may still be in flight and its record should
    /// stay `pending` for a later re-query
    pub fn leaves_pending(&self) -> bool {
        matches!(self, Self::WaitTimeout { .. })
    }

    /// Whether correlation may succeed on a later attempt
    pub fn is_correlation_miss(&self) -> bool {
        matches!(self, Self::CorrelationNotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_timeouts_leave_records_pending() {
        let timeout = OrchestrationError::WaitTimeout {
            run: RunHandle(1),
            timeout: Duration::from_secs(30),
        };
        assert!(timeout.leaves_pending());

        let not_found = OrchestrationError::CorrelationNotFound {
            token: CorrelationToken::new("abc"),
            window: 100,
        };
        assert!(!not_found.leaves_pending());
        assert!(not_found.is_correlation_miss());
        assert_eq!(
            not_found.to_string(),
            "no run matching token abc among the 100 most recent runs"
        );
    }
}
