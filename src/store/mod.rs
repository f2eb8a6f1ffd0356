//! Artifact persistence.
//!
//! [`ArtifactStore`] is the async trait the pipeline reads series from and
//! writes results to. [`MemoryStore`] backs tests, [`FsStore`] a local data
//! directory and [`S3Store`] an S3 bucket. All backings share the key layout
//! `city={city}/{kind}_{YYYYmmddTHHMMSSZ}.{ext}`.

mod fs;
mod memory;
mod s3;

pub use fs::FsStore;
pub use memory::MemoryStore;
pub use s3::S3Store;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use std::fmt;

use crate::error::PipelineError;
use crate::parser::parse_series;
use crate::series::Series;

/// Timestamp layout used in artifact keys.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// What an artifact holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Raw,
    Processed,
    Insights,
    Forecast,
    Scenario,
    Report,
}

impl ArtifactKind {
    const ALL: [ArtifactKind; 6] = [
        ArtifactKind::Raw,
        ArtifactKind::Processed,
        ArtifactKind::Insights,
        ArtifactKind::Forecast,
        ArtifactKind::Scenario,
        ArtifactKind::Report,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactKind::Raw => "raw",
            ArtifactKind::Processed => "processed",
            ArtifactKind::Insights => "insights",
            ArtifactKind::Forecast => "forecast",
            ArtifactKind::Scenario => "scenario",
            ArtifactKind::Report => "report",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ArtifactKind::Raw | ArtifactKind::Processed => "csv",
            ArtifactKind::Insights | ArtifactKind::Forecast | ArtifactKind::Scenario => "json",
            ArtifactKind::Report => "md",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self.extension() {
            "csv" => "text/csv",
            "json" => "application/json",
            _ => "text/markdown",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle to a stored artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub city: String,
    pub kind: ArtifactKind,
    pub generated_at: DateTime<Utc>,
    pub key: String,
}

pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Directory (or key prefix) holding every artifact of `city`.
pub fn city_prefix(city: &str) -> String {
    format!("city={city}/")
}

pub fn artifact_key(city: &str, kind: ArtifactKind, generated_at: DateTime<Utc>) -> String {
    format!(
        "{}{}_{}.{}",
        city_prefix(city),
        kind,
        format_timestamp(generated_at),
        kind.extension()
    )
}

/// Splits a key built by [`artifact_key`] back into its parts.
pub fn parse_artifact_key(key: &str) -> Option<Artifact> {
    let (dir, file) = key.rsplit_once('/')?;
    let city = dir.rsplit('/').next()?.strip_prefix("city=")?;
    let (stem, ext) = file.rsplit_once('.')?;
    let (kind, ts) = stem.split_once('_')?;
    let kind = ArtifactKind::parse(kind)?;
    if kind.extension() != ext {
        return None;
    }

    Some(Artifact {
        city: city.to_string(),
        kind,
        generated_at: parse_timestamp(ts)?,
        key: key.to_string(),
    })
}

/// Orders artifacts oldest first; equal timestamps are ordered by key.
pub fn sort_artifacts(artifacts: &mut [Artifact]) {
    artifacts.sort_by(|a, b| {
        a.generated_at
            .cmp(&b.generated_at)
            .then_with(|| a.key.cmp(&b.key))
    });
}

/// Picks the most recent artifact. Ties on timestamp go to the greatest key,
/// so the choice is stable for a given set.
pub fn select_latest(artifacts: &[Artifact]) -> Option<&Artifact> {
    artifacts.iter().max_by(|a, b| {
        a.generated_at
            .cmp(&b.generated_at)
            .then_with(|| a.key.cmp(&b.key))
    })
}

/// Storage backing for series and pipeline outputs.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// All artifacts of `kind` for `city`, oldest first.
    async fn list_artifacts(&self, city: &str, kind: ArtifactKind) -> Result<Vec<Artifact>>;

    async fn read(&self, artifact: &Artifact) -> Result<Vec<u8>>;

    /// Stores `payload`, replacing any artifact with the same key.
    async fn write(
        &self,
        city: &str,
        kind: ArtifactKind,
        generated_at: DateTime<Utc>,
        payload: &[u8],
    ) -> Result<Artifact>;

    async fn latest(&self, city: &str, kind: ArtifactKind) -> Result<Option<Artifact>> {
        let artifacts = self.list_artifacts(city, kind).await?;
        Ok(select_latest(&artifacts).cloned())
    }
}

/// Serializes `value` as JSON and writes it as an artifact.
pub async fn write_json<S: ArtifactStore + ?Sized>(
    store: &S,
    city: &str,
    kind: ArtifactKind,
    generated_at: DateTime<Utc>,
    value: &impl Serialize,
) -> Result<Artifact> {
    let body = serde_json::to_vec_pretty(value)?;
    store.write(city, kind, generated_at, &body).await
}

/// Loads the latest processed series for `city`.
pub async fn latest_series<S: ArtifactStore + ?Sized>(
    store: &S,
    city: &str,
) -> Result<(Artifact, Series), PipelineError> {
    let artifact = store
        .latest(city, ArtifactKind::Processed)
        .await
        .map_err(|source| PipelineError::Store {
            city: city.to_string(),
            source,
        })?
        .ok_or_else(|| PipelineError::MissingArtifact {
            city: city.to_string(),
        })?;

    let series = read_series(store, &artifact)
        .await
        .map_err(|source| PipelineError::UnreadableArtifact {
            key: artifact.key.clone(),
            source,
        })?;

    Ok((artifact, series))
}

/// Reads and parses a CSV series artifact.
pub async fn read_series<S: ArtifactStore + ?Sized>(
    store: &S,
    artifact: &Artifact,
) -> Result<Series> {
    let bytes = store.read(artifact).await?;
    parse_series(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, h, 0, 0).unwrap()
    }

    fn artifact(key: &str, h: u32) -> Artifact {
        Artifact {
            city: "London".into(),
            kind: ArtifactKind::Processed,
            generated_at: ts(h),
            key: key.into(),
        }
    }

    #[test]
    fn test_key_round_trip() {
        let key = artifact_key("New York", ArtifactKind::Forecast, ts(13));
        assert_eq!(key, "city=New York/forecast_20240501T130000Z.json");

        let parsed = parse_artifact_key(&key).unwrap();
        assert_eq!(parsed.city, "New York");
        assert_eq!(parsed.kind, ArtifactKind::Forecast);
        assert_eq!(parsed.generated_at, ts(13));
    }

    #[test]
    fn test_parse_key_with_root_prefix() {
        let parsed = parse_artifact_key("twin/city=Paris/processed_20240501T010000Z.csv").unwrap();
        assert_eq!(parsed.city, "Paris");
        assert_eq!(parsed.kind, ArtifactKind::Processed);
    }

    #[test]
    fn test_parse_key_rejects_foreign_files() {
        assert!(parse_artifact_key("city=Paris/notes.txt").is_none());
        assert!(parse_artifact_key("city=Paris/processed_yesterday.csv").is_none());
        assert!(parse_artifact_key("city=Paris/processed_20240501T010000Z.json").is_none());
        assert!(parse_artifact_key("Paris/processed_20240501T010000Z.csv").is_none());
    }

    #[test]
    fn test_select_latest_by_time() {
        let artifacts = vec![artifact("b", 3), artifact("a", 9), artifact("c", 1)];
        assert_eq!(select_latest(&artifacts).unwrap().key, "a");
        assert!(select_latest(&[]).is_none());
    }

    #[test]
    fn test_select_latest_tie_is_deterministic() {
        let forward = vec![artifact("x1", 5), artifact("x2", 5)];
        let reversed = vec![artifact("x2", 5), artifact("x1", 5)];
        assert_eq!(select_latest(&forward).unwrap().key, "x2");
        assert_eq!(select_latest(&reversed).unwrap().key, "x2");
    }

    #[test]
    fn test_sort_artifacts_oldest_first() {
        let mut artifacts = vec![artifact("b", 3), artifact("a", 9), artifact("c", 3)];
        sort_artifacts(&mut artifacts);
        let keys: Vec<_> = artifacts.iter().map(|a| a.key.as_str()).collect();
        assert_eq!(keys, vec!["b", "c", "a"]);
    }

    #[tokio::test]
    async fn test_latest_series_missing_city() {
        let store = MemoryStore::new();
        let err = latest_series(&store, "Atlantis").await.unwrap_err();
        assert!(err.is_skip());
    }
}
