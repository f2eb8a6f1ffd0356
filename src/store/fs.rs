use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use tracing::{debug, warn};

use super::{
    Artifact, ArtifactKind, ArtifactStore, artifact_key, city_prefix, parse_artifact_key,
    sort_artifacts,
};

/// Stores artifacts as files under a root data directory.
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

#[async_trait]
impl ArtifactStore for FsStore {
    async fn list_artifacts(&self, city: &str, kind: ArtifactKind) -> Result<Vec<Artifact>> {
        let prefix = city_prefix(city);
        let dir = self.path_for(&prefix);

        if !dir.is_dir() {
            debug!(dir = %dir.display(), "No artifact directory for city");
            return Ok(Vec::new());
        }

        let mut artifacts = Vec::new();
        let entries = std::fs::read_dir(&dir)
            .with_context(|| format!("failed to list {}", dir.display()))?;
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };

            match parse_artifact_key(&format!("{prefix}{name}")) {
                Some(artifact) if artifact.kind == kind => artifacts.push(artifact),
                Some(_) => {}
                None => warn!(file = %entry.path().display(), "Ignoring unrecognized file"),
            }
        }

        sort_artifacts(&mut artifacts);
        Ok(artifacts)
    }

    async fn read(&self, artifact: &Artifact) -> Result<Vec<u8>> {
        let path = self.path_for(&artifact.key);
        std::fs::read(&path).with_context(|| format!("failed to read {}", path.display()))
    }

    async fn write(
        &self,
        city: &str,
        kind: ArtifactKind,
        generated_at: DateTime<Utc>,
        payload: &[u8],
    ) -> Result<Artifact> {
        let key = artifact_key(city, kind, generated_at);
        let path = self.path_for(&key);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        std::fs::write(&path, payload)
            .with_context(|| format!("failed to write {}", path.display()))?;
        debug!(path = %path.display(), bytes = payload.len(), "Artifact written");

        parse_artifact_key(&key).with_context(|| format!("invalid artifact key {key}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[tokio::test]
    async fn test_missing_city_lists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());

        let listed = store.list_artifacts("Chennai", ArtifactKind::Processed).await.unwrap();
        assert!(listed.is_empty());
        assert!(store.latest("Chennai", ArtifactKind::Processed).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_latest_picks_newest_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());
        let old = Utc.with_ymd_and_hms(2024, 5, 1, 6, 0, 0).unwrap();
        let new = Utc.with_ymd_and_hms(2024, 5, 2, 6, 0, 0).unwrap();

        store.write("New York", ArtifactKind::Processed, new, b"pm10\n0.5\n").await.unwrap();
        store.write("New York", ArtifactKind::Processed, old, b"pm10\n0.1\n").await.unwrap();
        store.write("New York", ArtifactKind::Scenario, new, b"{}").await.unwrap();
        std::fs::write(dir.path().join("city=New York/README.txt"), "notes").unwrap();

        let listed = store.list_artifacts("New York", ArtifactKind::Processed).await.unwrap();
        assert_eq!(listed.len(), 2);

        let latest = store.latest("New York", ArtifactKind::Processed).await.unwrap().unwrap();
        assert_eq!(latest.generated_at, new);
        assert_eq!(store.read(&latest).await.unwrap(), b"pm10\n0.5\n");
        assert!(dir.path().join("city=New York/processed_20240502T060000Z.csv").exists());
    }
}
