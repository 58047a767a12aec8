//! Reference resolution: turn a persisted `bucket,key` locator into a
//! presigned URL on an in-memory copy of the record.

use crate::{
    models::video::{Video, VideoReference},
    services::{
        error::{UploadError, UploadResult},
        object_store::ObjectStore,
    },
};
use std::{sync::Arc, time::Duration};
use tracing::warn;

/// Default lifetime of a signed URL.
pub const DEFAULT_SIGNED_URL_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Clone)]
pub struct ReferenceResolver {
    store: Arc<dyn ObjectStore>,
    ttl: Duration,
}

impl ReferenceResolver {
    pub fn new(store: Arc<dyn ObjectStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Return `video` with its reference replaced by a presigned URL.
    ///
    /// Records without a reference, or already holding a URL, come back
    /// unchanged. So do malformed references: they are logged and left
    /// alone so one corrupt record never breaks a listing. Only a failure of
    /// the store to sign is an error. Nothing is persisted.
    pub async fn resolve(&self, mut video: Video) -> UploadResult<Video> {
        let Some(raw) = video.video_url.as_deref() else {
            return Ok(video);
        };

        let (bucket, key) = match VideoReference::parse(raw) {
            Some(VideoReference::Url(_)) => return Ok(video),
            Some(VideoReference::Locator { bucket, key }) => (bucket, key),
            None => {
                let err = UploadError::MalformedReference(raw.to_string());
                warn!(video_id = %video.id, error = %err, "leaving reference unresolved");
                return Ok(video);
            }
        };

        let signed = self
            .store
            .presign_get(bucket, key, self.ttl)
            .await
            .map_err(|e| UploadError::SigningFailure(e.to_string()))?;

        video.video_url = Some(signed);
        Ok(video)
    }

    pub async fn resolve_all(&self, videos: Vec<Video>) -> UploadResult<Vec<Video>> {
        let mut resolved = Vec::with_capacity(videos.len());
        for video in videos {
            resolved.push(self.resolve(video).await?);
        }
        Ok(resolved)
    }
}
