//! Artifact fetcher service
//!
//! Downloads the artifact of a completed run and writes its bytes to a sink
//! path. The archive is treated as an opaque blob.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tether_core::domain::{Artifact, RunHandle, Scope};
use tracing::{info, warn};

use crate::error::{OrchestrationError, Result};
use crate::repository::ArtifactRepository;

/// An artifact written to disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactDownload {
    pub artifact_id: u64,
    pub name: String,
    pub path: PathBuf,
    pub bytes: usize,
}

pub struct ArtifactFetcher {
    artifacts: Arc<dyn ArtifactRepository>,
    name: Option<String>,
}

impl ArtifactFetcher {
    /// # Arguments
    /// * `artifacts` - Provider artifact repository
    /// * `name` - Artifact to pick; the first one listed when `None`
    pub fn new(artifacts: Arc<dyn ArtifactRepository>, name: Option<String>) -> Self {
        Self { artifacts, name }
    }

    fn select<'a>(&self, listed: &'a [Artifact]) -> Option<&'a Artifact> {
        match &self.name {
            Some(name) => listed.iter().find(|artifact| &artifact.name == name),
            None => listed.first(),
        }
    }

    /// Downloads the selected artifact of `run` into `sink`
    pub async fn fetch(&self, scope: &Scope, run: RunHandle, sink: &Path) -> Result<ArtifactDownload> {
        let failed = |message: String| OrchestrationError::ArtifactDownload { run, message };

        let listed = self
            .artifacts
            .list_artifacts(scope, run)
            .await
            .map_err(|e| failed(format!("failed to list artifacts: {}", e)))?;

        let artifact = self.select(&listed).ok_or_else(|| {
            failed(match &self.name {
                Some(name) => format!("no artifact named '{}'", name),
                None => "run produced no artifacts".to_string(),
            })
        })?;
        if artifact.expired {
            warn!(run_id = %run, artifact = %artifact.name, "artifact is marked expired, trying anyway");
        }

        let payload = self
            .artifacts
            .download(scope, artifact.id)
            .await
            .map_err(|e| failed(format!("failed to download '{}': {}", artifact.name, e)))?;

        if let Some(parent) = sink.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| failed(format!("failed to create {}: {}", parent.display(), e)))?;
        }
        tokio::fs::write(sink, &payload)
            .await
            .map_err(|e| failed(format!("failed to write {}: {}", sink.display(), e)))?;

        info!(
            run_id = %run,
            artifact = %artifact.name,
            bytes = payload.len(),
            path = %sink.display(),
            "artifact downloaded"
        );

        Ok(ArtifactDownload {
            artifact_id: artifact.id,
            name: artifact.name.clone(),
            path: sink.to_path_buf(),
            bytes: payload.len(),
        })
    }
}
