//! Per-city failure taxonomy surfaced in pipeline run reports.

use thiserror::Error;

use crate::store::ArtifactKind;

/// Reasons a city's pipeline run did not complete.
///
/// None of these abort a run; the coordinator records them per city and
/// moves on.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no processed artifact found for {city}")]
    MissingArtifact { city: String },

    #[error("failed to list artifacts for {city}")]
    Store {
        city: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("artifact {key} could not be read")]
    UnreadableArtifact {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to persist {kind} artifact for {city}")]
    Persistence {
        city: String,
        kind: ArtifactKind,
        #[source]
        source: anyhow::Error,
    },
}

impl PipelineError {
    /// Whether the city was skipped rather than failed.
    pub fn is_skip(&self) -> bool {
        matches!(self, PipelineError::MissingArtifact { .. })
    }
}
