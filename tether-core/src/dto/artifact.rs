//! Artifact DTOs

use serde::{Deserialize, Serialize};

use crate::domain::artifact::Artifact;

/// Artifact listing envelope of a single run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactList {
    #[serde(default)]
    pub total_count: u64,
    pub artifacts: Vec<Artifact>,
}
