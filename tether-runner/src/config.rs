//! Runner configuration
//!
//! Defines every tunable of a dispatch-and-wait orchestration: the provider
//! connection, the dispatched workflow, how the resulting run is correlated
//! and how long and how often it is polled.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tether_core::domain::{CorrelationStrategy, CorrelationToken, Scope};

/// Largest page the provider's run listing accepts
pub const MAX_LOOKBACK: u32 = 100;

/// Runner configuration
///
/// Intervals and limits are configurable so the same binary can wait on a
/// two-minute lint job or a two-hour release build.
#[derive(Debug, Clone)]
pub struct Config {
    /// Provider API base URL (e.g., "https://api.github.com")
    pub provider_url: String,

    /// API credential, sent as `Authorization: token <...>`
    pub api_token: Option<String>,

    /// Repository the workflow belongs to
    pub scope: Scope,

    /// Workflow file name or id
    pub workflow: String,

    /// Branch runs are dispatched on and listed from
    pub reference_branch: String,

    /// Delay between two status polls
    pub poll_interval: Duration,

    /// Upper bound on the total time spent waiting for completion
    pub wait_timeout: Duration,

    /// How the dispatched run is found again
    pub correlation_strategy: CorrelationStrategy,

    /// Consecutive failed status fetches tolerated before giving up
    pub max_poll_failures: u32,

    /// Number of most recent runs inspected when correlating
    pub lookback: u32,

    /// How many times correlation is attempted before giving up
    pub correlation_attempts: u32,

    /// Delay between correlation attempts
    pub correlation_delay: Duration,

    /// Workflow input carrying the correlation token
    pub token_input: String,

    /// Extra workflow inputs forwarded with the dispatch
    pub workflow_inputs: HashMap<String, String>,

    /// Artifact to download; the first one listed when unset
    pub artifact_name: Option<String>,

    /// Where the downloaded artifact is written
    pub artifact_path: PathBuf,

    /// Token of a run dispatched by an earlier process to resume waiting on
    pub resume_token: Option<CorrelationToken>,
}

impl Config {
    /// Creates a new configuration with defaults
    pub fn new(scope: Scope, workflow: impl Into<String>) -> Self {
        Self {
            provider_url: "https://api.github.com".to_string(),
            api_token: None,
            scope,
            workflow: workflow.into(),
            reference_branch: "main".to_string(),
            poll_interval: Duration::from_secs(5),
            wait_timeout: Duration::from_secs(1800), // 30 minutes
            correlation_strategy: CorrelationStrategy::default(),
            max_poll_failures: 3,
            lookback: MAX_LOOKBACK,
            correlation_attempts: 6,
            correlation_delay: Duration::from_secs(5),
            token_input: "correlation_id".to_string(),
            workflow_inputs: HashMap::new(),
            artifact_name: None,
            artifact_path: PathBuf::from("artifact.zip"),
            resume_token: None,
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - REPO_OWNER, REPO_NAME, WORKFLOW_ID (required)
    /// - PROVIDER_URL (optional, default: https://api.github.com)
    /// - GITHUB_TOKEN (optional)
    /// - REFERENCE_BRANCH (optional, default: main)
    /// - POLL_INTERVAL (optional, seconds, default: 5)
    /// - WAIT_TIMEOUT (optional, seconds, default: 1800)
    /// - CORRELATION_STRATEGY (optional, label | direct-label | commit-message)
    /// - MAX_POLL_FAILURES (optional, default: 3)
    /// - LOOKBACK (optional, default: 100)
    /// - CORRELATION_ATTEMPTS (optional, default: 6)
    /// - CORRELATION_DELAY (optional, seconds, default: 5)
    /// - TOKEN_INPUT (optional, default: correlation_id)
    /// - WORKFLOW_INPUTS (optional, JSON object of string inputs)
    /// - ARTIFACT_NAME, ARTIFACT_PATH (optional)
    /// - RESUME_TOKEN (optional)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key).ok_or_else(|| anyhow::anyhow!("{} environment variable not set", key))
        };
        let seconds = |key: &str| {
            lookup(key)
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_secs)
        };
        let number = |key: &str| lookup(key).and_then(|s| s.parse::<u32>().ok());

        let scope = Scope::new(required("REPO_OWNER")?, required("REPO_NAME")?);
        let mut config = Self::new(scope, required("WORKFLOW_ID")?);

        if let Some(url) = lookup("PROVIDER_URL") {
            config.provider_url = url;
        }
        config.api_token = lookup("GITHUB_TOKEN").filter(|t| !t.is_empty());
        if let Some(branch) = lookup("REFERENCE_BRANCH") {
            config.reference_branch = branch;
        }
        if let Some(interval) = seconds("POLL_INTERVAL") {
            config.poll_interval = interval;
        }
        if let Some(timeout) = seconds("WAIT_TIMEOUT") {
            config.wait_timeout = timeout;
        }
        if let Some(strategy) = lookup("CORRELATION_STRATEGY") {
            config.correlation_strategy = strategy
                .parse()
                .map_err(|e: String| anyhow::anyhow!(e))
                .context("Invalid CORRELATION_STRATEGY")?;
        }
        if let Some(failures) = number("MAX_POLL_FAILURES") {
            config.max_poll_failures = failures;
        }
        if let Some(lookback) = number("LOOKBACK") {
            config.lookback = lookback;
        }
        if let Some(attempts) = number("CORRELATION_ATTEMPTS") {
            config.correlation_attempts = attempts;
        }
        if let Some(delay) = seconds("CORRELATION_DELAY") {
            config.correlation_delay = delay;
        }
        if let Some(input) = lookup("TOKEN_INPUT") {
            config.token_input = input;
        }
        if let Some(inputs) = lookup("WORKFLOW_INPUTS") {
            config.workflow_inputs = serde_json::from_str(&inputs)
                .context("WORKFLOW_INPUTS must be a JSON object of string values")?;
        }
        config.artifact_name = lookup("ARTIFACT_NAME").filter(|n| !n.is_empty());
        if let Some(path) = lookup("ARTIFACT_PATH") {
            config.artifact_path = PathBuf::from(path);
        }
        config.resume_token = lookup("RESUME_TOKEN")
            .filter(|t| !t.is_empty())
            .map(CorrelationToken::new);

        Ok(config)
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        if self.scope.owner.is_empty() || self.scope.repo.is_empty() {
            anyhow::bail!("repository owner and name cannot be empty");
        }

        if self.workflow.is_empty() {
            anyhow::bail!("workflow cannot be empty");
        }

        if self.reference_branch.is_empty() {
            anyhow::bail!("reference_branch cannot be empty");
        }

        if !self.provider_url.starts_with("http://") && !self.provider_url.starts_with("https://")
        {
            anyhow::bail!("provider_url must start with http:// or https://");
        }

        if self.poll_interval.is_zero() {
            anyhow::bail!("poll_interval must be greater than 0");
        }

        if self.wait_timeout.is_zero() {
            anyhow::bail!("wait_timeout must be greater than 0");
        }

        if self.lookback == 0 || self.lookback > MAX_LOOKBACK {
            anyhow::bail!("lookback must be between 1 and {}", MAX_LOOKBACK);
        }

        if self.correlation_attempts == 0 {
            anyhow::bail!("correlation_attempts must be greater than 0");
        }

        if self.token_input.is_empty() {
            anyhow::bail!("token_input cannot be empty");
        }

        if self.workflow_inputs.contains_key(&self.token_input) {
            anyhow::bail!(
                "workflow input '{}' is reserved for the correlation token",
                self.token_input
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("REPO_OWNER", "octo"),
        ("REPO_NAME", "demo"),
        ("WORKFLOW_ID", "build.yml"),
    ];

    #[test]
    fn test_default_config() {
        let config = Config::new(Scope::new("octo", "demo"), "build.yml");
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.reference_branch, "main");
        assert_eq!(config.correlation_strategy, CorrelationStrategy::DirectLabel);
        assert_eq!(config.lookback, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_lookup_requires_scope_and_workflow() {
        let err = Config::from_lookup(lookup_from(&[("REPO_OWNER", "octo")])).unwrap_err();
        assert!(err.to_string().contains("REPO_NAME"));
    }

    #[test]
    fn test_from_lookup_overrides() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("REFERENCE_BRANCH", "release"),
            ("POLL_INTERVAL", "2"),
            ("WAIT_TIMEOUT", "60"),
            ("CORRELATION_STRATEGY", "commit-message"),
            ("MAX_POLL_FAILURES", "5"),
            ("WORKFLOW_INPUTS", r#"{"target": "staging"}"#),
            ("ARTIFACT_NAME", "bundle"),
            ("RESUME_TOKEN", "abc"),
            ("GITHUB_TOKEN", ""),
        ]);

        let config = Config::from_lookup(lookup_from(&pairs)).unwrap();
        assert_eq!(config.scope, Scope::new("octo", "demo"));
        assert_eq!(config.reference_branch, "release");
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.wait_timeout, Duration::from_secs(60));
        assert_eq!(config.correlation_strategy, CorrelationStrategy::CommitMessage);
        assert_eq!(config.max_poll_failures, 5);
        assert_eq!(config.workflow_inputs.get("target"), Some(&"staging".to_string()));
        assert_eq!(config.artifact_name.as_deref(), Some("bundle"));
        assert_eq!(config.resume_token, Some(CorrelationToken::new("abc")));
        assert_eq!(config.api_token, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_strategy_is_rejected() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("CORRELATION_STRATEGY", "newest"));
        assert!(Config::from_lookup(lookup_from(&pairs)).is_err());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::new(Scope::new("octo", "demo"), "build.yml");
        assert!(config.validate().is_ok());

        config.provider_url = "not-a-url".to_string();
        assert!(config.validate().is_err());
        config.provider_url = "http://localhost:9000".to_string();

        config.lookback = 0;
        assert!(config.validate().is_err());
        config.lookback = 101;
        assert!(config.validate().is_err());
        config.lookback = 50;

        config.poll_interval = Duration::ZERO;
        assert!(config.validate().is_err());
        config.poll_interval = Duration::from_secs(1);

        config
            .workflow_inputs
            .insert("correlation_id".to_string(), "x".to_string());
        assert!(config.validate().is_err());
        config.workflow_inputs.clear();

        assert!(config.validate().is_ok());
    }
}
