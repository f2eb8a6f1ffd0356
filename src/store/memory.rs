use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Mutex;

use super::{Artifact, ArtifactKind, ArtifactStore, artifact_key, city_prefix, sort_artifacts};

/// In-process store keyed by artifact key.
#[derive(Default)]
pub struct MemoryStore {
    artifacts: Mutex<BTreeMap<String, (Artifact, Vec<u8>)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().map(|a| a.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, (Artifact, Vec<u8>)>>> {
        self.artifacts
            .lock()
            .map_err(|_| anyhow!("memory store lock poisoned"))
    }
}

#[async_trait]
impl ArtifactStore for MemoryStore {
    async fn list_artifacts(&self, city: &str, kind: ArtifactKind) -> Result<Vec<Artifact>> {
        let prefix = city_prefix(city);
        let mut artifacts: Vec<Artifact> = self
            .lock()?
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .filter(|(_, (a, _))| a.kind == kind)
            .map(|(_, (a, _))| a.clone())
            .collect();

        sort_artifacts(&mut artifacts);
        Ok(artifacts)
    }

    async fn read(&self, artifact: &Artifact) -> Result<Vec<u8>> {
        self.lock()?
            .get(&artifact.key)
            .map(|(_, body)| body.clone())
            .ok_or_else(|| anyhow!("artifact {} not found", artifact.key))
    }

    async fn write(
        &self,
        city: &str,
        kind: ArtifactKind,
        generated_at: DateTime<Utc>,
        payload: &[u8],
    ) -> Result<Artifact> {
        let key = artifact_key(city, kind, generated_at);
        let artifact = super::parse_artifact_key(&key)
            .ok_or_else(|| anyhow!("invalid artifact key {key}"))?;

        self.lock()?
            .insert(key, (artifact.clone(), payload.to_vec()));
        Ok(artifact)
    }
}
