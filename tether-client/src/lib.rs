//! Tether Provider Client
//!
//! A small, type-safe HTTP client for the CI provider's workflow REST API.
//!
//! The client covers the five operations the runner needs: dispatching a
//! workflow, listing runs, labelling a run, fetching a single run, and
//! listing/downloading a run's artifacts.
//!
//! # Example
//!
//! ```no_run
//! use std::collections::HashMap;
//! use tether_client::ProviderClient;
//! use tether_core::domain::Scope;
//! use tether_core::dto::dispatch::DispatchRequest;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = ProviderClient::new("https://api.github.com").with_token("ghp_example");
//!     let scope = Scope::new("octo", "demo");
//!
//!     client
//!         .dispatch_workflow(&scope, "build.yml", &DispatchRequest {
//!             git_ref: "main".to_string(),
//!             inputs: HashMap::from([("correlation_id".to_string(), "abc".to_string())]),
//!         })
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod error;
mod artifacts;
mod dispatch;
mod runs;

// Re-export commonly used types
pub use error::{ClientError, Result};

use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use tether_core::domain::Scope;

const ACCEPT_VALUE: &str = "application/vnd.github.v3+json";
const USER_AGENT_VALUE: &str = concat!("tether/", env!("CARGO_PKG_VERSION"));

/// HTTP client for the CI provider's workflow API
///
/// Endpoints are grouped by concern:
/// - Workflow dispatch
/// - Run listing, lookup and labelling
/// - Artifact listing and download
#[derive(Debug, Clone)]
pub struct ProviderClient {
    /// Base URL of the provider API (e.g., "https://api.github.com")
    base_url: String,
    /// Credential sent as `Authorization: token <...>`
    token: Option<String>,
    /// HTTP client instance
    client: Client,
}

impl ProviderClient {
    /// Create a new provider client without credentials
    ///
    /// # Example
    /// ```
    /// use tether_client::ProviderClient;
    ///
    /// let client = ProviderClient::new("https://api.github.com");
    /// ```
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new provider client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
            client,
        }
    }

    /// Attach an API credential to every request
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Get the base URL of the provider
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL of an actions endpoint inside a repository
    fn actions_url(&self, scope: &Scope, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/actions/{}",
            self.base_url, scope.owner, scope.repo, path
        )
    }

    /// Start a request with the provider's standard headers
    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, url)
            .header(ACCEPT, ACCEPT_VALUE)
            .header(USER_AGENT, USER_AGENT_VALUE);

        match &self.token {
            Some(token) => builder.header(AUTHORIZATION, format!("token {}", token)),
            None => builder,
        }
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Handle an API response and deserialize JSON
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let response = Self::check_status(response).await?;

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }

    /// Handle an API response that returns no content (e.g., 204 on dispatch)
    async fn handle_empty_response(&self, response: reqwest::Response) -> Result<()> {
        Self::check_status(response).await?;
        Ok(())
    }

    /// Handle an API response carrying a binary payload
    async fn handle_bytes_response(&self, response: reqwest::Response) -> Result<Vec<u8>> {
        let response = Self::check_status(response).await?;
        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = ProviderClient::new("https://api.github.com");
        assert_eq!(client.base_url(), "https://api.github.com");
        assert!(client.token.is_none());
    }

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = ProviderClient::new("https://api.github.com/");
        assert_eq!(client.base_url(), "https://api.github.com");
    }

    #[test]
    fn test_client_with_custom_client_and_token() {
        let client = ProviderClient::with_client("http://localhost:9000", Client::new())
            .with_token("secret");
        assert_eq!(client.base_url(), "http://localhost:9000");
        assert_eq!(client.token.as_deref(), Some("secret"));
    }

    #[test]
    fn test_actions_url() {
        let client = ProviderClient::new("https://api.github.com");
        let scope = Scope::new("octo", "demo");
        assert_eq!(
            client.actions_url(&scope, "runs/42"),
            "https://api.github.com/repos/octo/demo/actions/runs/42"
        );
    }

    #[test]
    fn test_request_headers() {
        let client = ProviderClient::new("https://api.github.com").with_token("secret");
        let request = client
            .request(Method::GET, "https://api.github.com/repos/octo/demo/actions/runs")
            .build()
            .unwrap();

        let headers = request.headers();
        assert_eq!(headers[ACCEPT], ACCEPT_VALUE);
        assert_eq!(headers[AUTHORIZATION], "token secret");
        assert!(headers[USER_AGENT].to_str().unwrap().starts_with("tether/"));
    }
}
