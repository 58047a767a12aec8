//! Remote object storage: single-object uploads and presigned GET URLs.

use crate::services::{prober::AspectRatio, stager::VIDEO_EXTENSION};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, meta::region::RegionProviderChain, retry::RetryConfig};
use aws_sdk_s3::{Client, presigning::PresigningConfig, primitives::ByteStream};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::fs::File;

/// Number of random bytes behind every object key.
pub const KEY_RANDOM_BYTES: usize = 32;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("upload of `{key}` to `{bucket}` failed: {reason}")]
    Upload {
        bucket: String,
        key: String,
        reason: String,
    },
    #[error("presign of `{key}` in `{bucket}` failed: {reason}")]
    Presign {
        bucket: String,
        key: String,
        reason: String,
    },
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload `body`, read from its current position, as one object tagged
    /// with `content_type`.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: File,
        content_length: u64,
        content_type: &str,
    ) -> Result<(), StoreError>;

    /// Mint a GET URL for exactly `bucket`/`key` that expires after `expires_in`.
    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> Result<String, StoreError>;
}

/// Build `{prefix}{43-char base64url}.mp4` from fresh randomness. Keys never
/// carry the uploader's identity or original filename.
pub fn generate_object_key(aspect: AspectRatio) -> String {
    let random: [u8; KEY_RANDOM_BYTES] = rand::random();
    format!(
        "{}{}.{}",
        aspect.key_prefix(),
        URL_SAFE_NO_PAD.encode(random),
        VIDEO_EXTENSION
    )
}

/// S3 (or S3-compatible) backend.
#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    /// Build a client for `region`. `endpoint_url` targets S3-compatible
    /// providers (MinIO, Spaces) and switches to path-style addressing.
    /// SDK retries are disabled; a failed call is reported as-is.
    pub async fn new(region: String, endpoint_url: Option<String>) -> Self {
        let region_provider = RegionProviderChain::first_try(aws_config::Region::new(region));

        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(region_provider)
            .retry_config(RetryConfig::disabled())
            .load()
            .await;

        let client = match endpoint_url {
            Some(endpoint) => {
                let s3_config = aws_sdk_s3::config::Builder::from(&config)
                    .endpoint_url(endpoint)
                    .force_path_style(true)
                    .build();
                Client::from_conf(s3_config)
            }
            None => Client::new(&config),
        };

        Self { client }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: File,
        content_length: u64,
        content_type: &str,
    ) -> Result<(), StoreError> {
        let start = Instant::now();
        let upload_err = |reason: String| StoreError::Upload {
            bucket: bucket.to_string(),
            key: key.to_string(),
            reason,
        };

        let stream = ByteStream::read_from()
            .file(body)
            .build()
            .await
            .map_err(|e| upload_err(e.to_string()))?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(stream)
            .content_length(content_length as i64)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %bucket,
                    key = %key,
                    size_bytes = content_length,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 upload failed"
                );
                upload_err(e.to_string())
            })?;

        tracing::info!(
            bucket = %bucket,
            key = %key,
            size_bytes = content_length,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
        );
        Ok(())
    }

    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> Result<String, StoreError> {
        let presign_err = |reason: String| StoreError::Presign {
            bucket: bucket.to_string(),
            key: key.to_string(),
            reason,
        };

        let presigning_config =
            PresigningConfig::expires_in(expires_in).map_err(|e| presign_err(e.to_string()))?;

        let presigned = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(presigning_config)
            .await
            .map_err(|e| presign_err(e.to_string()))?;

        Ok(presigned.uri().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn key_layout() {
        let key = generate_object_key(AspectRatio::Landscape);
        let rest = key.strip_prefix("landscape/").unwrap();
        let token = rest.strip_suffix(".mp4").unwrap();
        assert_eq!(token.len(), 43);
        assert!(!token.contains('='));
        assert!(
            token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
        assert_eq!(URL_SAFE_NO_PAD.decode(token).unwrap().len(), KEY_RANDOM_BYTES);
    }

    #[test]
    fn prefix_follows_classification() {
        assert!(generate_object_key(AspectRatio::Portrait).starts_with("portrait/"));
        assert!(generate_object_key(AspectRatio::Other).starts_with("other/"));
    }

    #[test]
    fn keys_do_not_repeat() {
        let keys: HashSet<String> = (0..1000)
            .map(|_| generate_object_key(AspectRatio::Other))
            .collect();
        assert_eq!(keys.len(), 1000);
    }

    #[tokio::test]
    async fn presigned_url_is_scoped_and_expiring() {
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new("us-east-1"))
            .credentials_provider(aws_sdk_s3::config::Credentials::new(
                "AKIDEXAMPLE",
                "secret",
                None,
                None,
                "test",
            ))
            .build();
        let store = S3ObjectStore {
            client: Client::from_conf(config),
        };

        let url = store
            .presign_get("bucket1", "landscape/key1.mp4", Duration::from_secs(3600))
            .await
            .unwrap();
        assert!(url.contains("bucket1"));
        assert!(url.contains("landscape/key1.mp4"));
        assert!(url.contains("X-Amz-Expires=3600"));
        assert!(url.contains("X-Amz-Signature="));
    }
}
