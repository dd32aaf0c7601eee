//! Tether Runner binary
//!
//! Runs a single orchestration configured from the environment (and an
//! optional `.env` file): dispatch the workflow, wait for its run and write
//! the artifact to `ARTIFACT_PATH`. With `RESUME_TOKEN` set, the dispatch is
//! skipped and the run of that token is awaited instead.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tether_client::ProviderClient;
use tether_core::domain::CorrelationToken;
use tether_runner::repository::{HttpArtifactRepository, HttpRunRepository};
use tether_runner::{
    ArtifactOutcome, CancelSignal, Config, InMemoryWorkflowRecord, Orchestrator,
    WorkflowRecordStore,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tether_runner=info,tether_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate()?;
    info!(
        "Loaded configuration: scope={}, workflow={}, branch={}, strategy={}",
        config.scope, config.workflow, config.reference_branch, config.correlation_strategy
    );

    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .context("Failed to build HTTP client")?;
    let mut client = ProviderClient::with_client(config.provider_url.clone(), http_client);
    if let Some(token) = &config.api_token {
        client = client.with_token(token.clone());
    } else {
        warn!("GITHUB_TOKEN not set, sending unauthenticated requests");
    }
    let client = Arc::new(client);

    let records = Arc::new(InMemoryWorkflowRecord::new());
    let orchestrator = Orchestrator::new(
        &config,
        Arc::new(HttpRunRepository::new(Arc::clone(&client))),
        Arc::new(HttpArtifactRepository::new(Arc::clone(&client))),
        records.clone(),
    );

    let (cancel_handle, cancel) = CancelSignal::channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling orchestration");
            cancel_handle.cancel();
        }
    });

    let sink = Some(config.artifact_path.as_path());
    let outcome = match config.resume_token.clone() {
        Some(token) => {
            info!("Resuming orchestration for token {}", token);
            orchestrator.resume(token, sink, cancel).await
        }
        None => {
            let token = CorrelationToken::generate();
            info!("Dispatching with correlation token {}", token);
            orchestrator.run(token, sink, cancel).await
        }
    };

    for record in records.entries() {
        info!(
            "Workflow record: token={} state={:?} run={:?}",
            record.token, record.state, record.run_id
        );
    }

    let report = match outcome {
        Ok(report) => report,
        Err(e) => {
            error!("Orchestration failed: {}", e);
            return Err(e.into());
        }
    };

    match &report.artifact {
        ArtifactOutcome::Downloaded(download) => info!(
            "Artifact '{}' ({} bytes) written to {}",
            download.name,
            download.bytes,
            download.path.display()
        ),
        ArtifactOutcome::Failed(e) => warn!("Run completed but artifact was not retrieved: {}", e),
        ArtifactOutcome::Skipped => {}
    }

    if !report.run_succeeded() {
        anyhow::bail!(
            "Run {} completed with conclusion {}",
            report.run,
            report
                .status
                .conclusion
                .map(|c| c.to_string())
                .unwrap_or_else(|| "none".to_string())
        );
    }

    info!("Run {} succeeded", report.run);
    Ok(())
}
