//! UploadPipeline: sequences one video upload end to end:
//!
//! `validating → staged → probed → remuxed → published → committed`
//!
//! The first error aborts the run. Scratch files are owned by the run and
//! are removed on every exit path (remuxed output first, then the staged
//! upload). A publish that succeeds followed by a failed commit leaves the
//! stored object orphaned and the record on its previous reference; that
//! failure is reported, not compensated.

use crate::{
    config::PipelineConfig,
    models::video::{Video, VideoReference},
    services::{
        error::{UploadError, UploadResult},
        media::MediaToolkit,
        object_store::{ObjectStore, generate_object_key},
        prober::probe_geometry,
        remuxer::remux_for_fast_start,
        stager::{self, ScratchFile},
        video_store::{VideoStore, parse_video_id},
    },
};
use bytes::Bytes;
use chrono::Utc;
use futures::Stream;
use std::{fmt, io, sync::Arc};
use tracing::{info, warn};
use uuid::Uuid;

/// Last state a pipeline run reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Validating,
    Staged,
    Probed,
    Remuxed,
    Published,
    Committed,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Validating => "validating",
            Self::Staged => "staged",
            Self::Probed => "probed",
            Self::Remuxed => "remuxed",
            Self::Published => "published",
            Self::Committed => "committed",
        };
        f.write_str(name)
    }
}

#[derive(Clone)]
pub struct UploadPipeline {
    config: PipelineConfig,
    videos: VideoStore,
    tools: Arc<dyn MediaToolkit>,
    store: Arc<dyn ObjectStore>,
}

impl UploadPipeline {
    pub fn new(
        config: PipelineConfig,
        videos: VideoStore,
        tools: Arc<dyn MediaToolkit>,
        store: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            config,
            videos,
            tools,
            store,
        }
    }

    /// Validate the target id and check the caller owns it. Runs before any
    /// body is read, so a rejected caller never stages anything.
    pub async fn authorize(&self, raw_video_id: &str, user_id: Uuid) -> UploadResult<Video> {
        let video_id = parse_video_id(raw_video_id)?;
        let video = self.videos.get_owned_video(video_id, user_id).await?;
        info!(video_id = %video.id, user_id = %user_id, stage = %PipelineStage::Validating, "upload authorized");
        Ok(video)
    }

    /// Run the remaining stages for an authorized `video` and return the
    /// committed record (reference in `bucket,key` form). Only the reference
    /// and timestamp are written, so the record as read at `authorize` may be
    /// stale by the time the upload has streamed in.
    pub async fn ingest<S>(&self, video: Video, declared_type: &str, body: S) -> UploadResult<Video>
    where
        S: Stream<Item = io::Result<Bytes>> + Send,
    {
        let video_id = video.id;
        let mut reached = PipelineStage::Validating;

        let result = self.run(video, declared_type, body, &mut reached).await;
        if let Err(err) = &result {
            warn!(
                video_id = %video_id,
                stage = %reached,
                kind = err.kind(),
                error = %err,
                "upload aborted"
            );
        }
        result
    }

    async fn run<S>(
        &self,
        video: Video,
        declared_type: &str,
        body: S,
        reached: &mut PipelineStage,
    ) -> UploadResult<Video>
    where
        S: Stream<Item = io::Result<Bytes>> + Send,
    {
        let staged = stager::stage(
            body,
            declared_type,
            &self.config.scratch_dir,
            self.config.max_upload_bytes,
        )
        .await?;
        *reached = PipelineStage::Staged;
        info!(video_id = %video.id, stage = %reached, "upload staged");

        let geometry = probe_geometry(self.tools.as_ref(), staged.path()).await?;
        let aspect = geometry.aspect_ratio();
        *reached = PipelineStage::Probed;
        info!(
            video_id = %video.id,
            stage = %reached,
            width = geometry.width,
            height = geometry.height,
            aspect = %aspect,
            "video probed"
        );

        let mut remuxed = remux_for_fast_start(self.tools.as_ref(), &staged).await?;
        *reached = PipelineStage::Remuxed;
        info!(video_id = %video.id, stage = %reached, "video remuxed");

        let key = generate_object_key(aspect);
        let published = self.publish(&mut remuxed, &key).await;
        drop(remuxed);
        drop(staged);
        published?;
        *reached = PipelineStage::Published;
        info!(video_id = %video.id, stage = %reached, bucket = %self.config.bucket, key = %key, "video published");

        let locator = VideoReference::encode_locator(&self.config.bucket, &key);
        let committed = self
            .videos
            .update_video_reference(video.id, &locator, Utc::now())
            .await?;
        *reached = PipelineStage::Committed;
        info!(video_id = %video.id, stage = %reached, "video record committed");

        Ok(committed)
    }

    /// Upload `artifact` from its first byte, bounded by the publish timeout.
    async fn publish(&self, artifact: &mut ScratchFile, key: &str) -> UploadResult<()> {
        artifact.rewind().await?;
        let length = artifact.size_bytes().await?;
        let body = artifact.reader().await?;

        let put = self.store.put_object(
            &self.config.bucket,
            key,
            body,
            length,
            artifact.content_type(),
        );

        match tokio::time::timeout(self.config.publish_timeout, put).await {
            Ok(result) => result.map_err(|e| UploadError::PublishFailure(e.to_string())),
            Err(_) => Err(UploadError::PublishFailure(format!(
                "upload of `{}` did not finish within {}s",
                key,
                self.config.publish_timeout.as_secs()
            ))),
        }
    }
}
