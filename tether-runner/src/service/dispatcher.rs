//! Dispatcher service
//!
//! Triggers a workflow run carrying the caller's correlation token as an
//! input. One attempt only; retrying is left to the caller.

use std::collections::HashMap;
use std::sync::Arc;
use tether_core::domain::{CorrelationToken, Scope};
use tether_core::dto::dispatch::DispatchRequest;
use tracing::{error, info};

use crate::error::{OrchestrationError, Result};
use crate::repository::RunRepository;

pub struct Dispatcher {
    runs: Arc<dyn RunRepository>,
    git_ref: String,
    token_input: String,
    extra_inputs: HashMap<String, String>,
}

impl Dispatcher {
    /// # Arguments
    /// * `runs` - Provider run repository
    /// * `git_ref` - Reference branch every dispatch targets
    /// * `token_input` - Name of the workflow input carrying the token
    pub fn new(
        runs: Arc<dyn RunRepository>,
        git_ref: impl Into<String>,
        token_input: impl Into<String>,
    ) -> Self {
        Self {
            runs,
            git_ref: git_ref.into(),
            token_input: token_input.into(),
            extra_inputs: HashMap::new(),
        }
    }

    /// Adds inputs forwarded unchanged with every dispatch
    pub fn with_inputs(mut self, inputs: HashMap<String, String>) -> Self {
        self.extra_inputs = inputs;
        self
    }

    fn request(&self, token: &CorrelationToken) -> DispatchRequest {
        let mut inputs = self.extra_inputs.clone();
        inputs.insert(self.token_input.clone(), token.to_string());
        DispatchRequest {
            git_ref: self.git_ref.clone(),
            inputs,
        }
    }

    /// Triggers `workflow` in `scope` for `token`
    pub async fn dispatch(
        &self,
        scope: &Scope,
        workflow: &str,
        token: &CorrelationToken,
    ) -> Result<()> {
        let request = self.request(token);

        match self.runs.dispatch(scope, workflow, &request).await {
            Ok(()) => {
                info!(%token, %scope, workflow, git_ref = %self.git_ref, "workflow dispatched");
                Ok(())
            }
            Err(source) => {
                error!(%token, %scope, workflow, error = %source, "workflow dispatch rejected");
                Err(OrchestrationError::Dispatch {
                    token: token.clone(),
                    source,
                })
            }
        }
    }
}
