//! Shared application state handed to every handler.

use crate::{
    config::PipelineConfig,
    services::{
        auth::JwtVerifier, media::MediaToolkit, object_store::ObjectStore,
        resolver::ReferenceResolver, thumbnail::ThumbnailService, upload_pipeline::UploadPipeline,
        video_store::VideoStore,
    },
};
use sqlx::SqlitePool;
use std::{path::PathBuf, sync::Arc};

#[derive(Clone)]
pub struct AppState {
    pub auth: JwtVerifier,
    pub videos: VideoStore,
    pub pipeline: UploadPipeline,
    pub resolver: ReferenceResolver,
    pub thumbnails: ThumbnailService,
    pub scratch_dir: Arc<PathBuf>,
    pub max_upload_bytes: u64,
}

impl AppState {
    /// Wire the services around one pool, one toolkit and one object store.
    pub fn new(
        db: Arc<SqlitePool>,
        jwt_secret: &str,
        pipeline: PipelineConfig,
        assets_dir: PathBuf,
        public_base_url: &str,
        tools: Arc<dyn MediaToolkit>,
        store: Arc<dyn ObjectStore>,
    ) -> Self {
        let videos = VideoStore::new(db);
        Self {
            auth: JwtVerifier::new(jwt_secret),
            resolver: ReferenceResolver::new(store.clone(), pipeline.signed_url_ttl),
            thumbnails: ThumbnailService::new(videos.clone(), assets_dir, public_base_url),
            scratch_dir: Arc::new(pipeline.scratch_dir.clone()),
            max_upload_bytes: pipeline.max_upload_bytes,
            pipeline: UploadPipeline::new(pipeline, videos.clone(), tools, store),
            videos,
        }
    }
}
