use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use chrono::{DateTime, Utc};
use tracing::debug;

use super::{
    Artifact, ArtifactKind, ArtifactStore, artifact_key, city_prefix, parse_artifact_key,
    sort_artifacts,
};

/// Stores artifacts as objects in an S3 bucket, optionally under a key prefix.
pub struct S3Store {
    client: aws_sdk_s3::Client,
    bucket: String,
    prefix: String,
}

impl S3Store {
    /// Creates a store using the ambient AWS configuration already loaded by
    /// `aws_config::load_from_env`.
    pub fn new(config: &aws_config::SdkConfig, bucket: &str, prefix: Option<&str>) -> Self {
        let prefix = match prefix.map(str::trim).filter(|p| !p.is_empty()) {
            Some(p) if p.ends_with('/') => p.to_string(),
            Some(p) => format!("{p}/"),
            None => String::new(),
        };

        Self {
            client: aws_sdk_s3::Client::new(config),
            bucket: bucket.to_string(),
            prefix,
        }
    }
}

#[async_trait]
impl ArtifactStore for S3Store {
    async fn list_artifacts(&self, city: &str, kind: ArtifactKind) -> Result<Vec<Artifact>> {
        let prefix = format!("{}{}{}_", self.prefix, city_prefix(city), kind);
        let mut artifacts = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let resp = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&prefix)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .with_context(|| {
                    format!("S3 ListObjectsV2 failed for s3://{}/{prefix}", self.bucket)
                })?;

            artifacts.extend(
                resp.contents()
                    .iter()
                    .filter_map(|object| object.key())
                    .filter_map(parse_artifact_key)
                    .filter(|a| a.kind == kind),
            );

            match resp.next_continuation_token() {
                Some(token) => continuation = Some(token.to_string()),
                None => break,
            }
        }

        debug!(bucket = %self.bucket, %prefix, count = artifacts.len(), "Listed S3 artifacts");
        sort_artifacts(&mut artifacts);
        Ok(artifacts)
    }

    async fn read(&self, artifact: &Artifact) -> Result<Vec<u8>> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&artifact.key)
            .send()
            .await
            .with_context(|| format!("S3 GetObject failed for '{}'", artifact.key))?;

        let body = resp.body.collect().await?;
        Ok(body.into_bytes().to_vec())
    }

    async fn write(
        &self,
        city: &str,
        kind: ArtifactKind,
        generated_at: DateTime<Utc>,
        payload: &[u8],
    ) -> Result<Artifact> {
        let key = format!("{}{}", self.prefix, artifact_key(city, kind, generated_at));

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(payload.to_vec()))
            .content_type(kind.content_type())
            .send()
            .await
            .with_context(|| format!("S3 PutObject failed for '{key}'"))?;

        parse_artifact_key(&key).with_context(|| format!("invalid artifact key {key}"))
    }
}
