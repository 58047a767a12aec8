//! Defines the HTTP surface of the video API.
//!
//! ## Structure
//! - **Records**
//!   - `POST /api/videos`: create a draft record
//!   - `GET  /api/videos`: list the caller's records
//!   - `GET  /api/videos/{videoID}`: fetch one record
//!
//! - **Uploads**
//!   - `POST /api/video_upload/{videoID}`: ingest an MP4 (multipart `video`)
//!   - `POST /api/thumbnail_upload/{videoID}`: store a thumbnail (multipart `thumbnail`)
//!
//! - **Assets**
//!   - `GET /assets/{*file}`: stream a stored thumbnail

use crate::{
    handlers::{
        asset_handlers::get_asset,
        health_handlers::{healthz, readyz},
        video_handlers::{create_video, get_video, list_videos, upload_thumbnail, upload_video},
    },
    services::thumbnail::MAX_THUMBNAIL_BYTES,
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

/// Room for multipart boundaries and part headers on top of the file itself,
/// so the pipeline's own size check is the one that fires.
const MULTIPART_OVERHEAD_BYTES: u64 = 64 * 1024;

/// Build the router. `max_upload_bytes` bounds the video upload route.
pub fn routes(max_upload_bytes: u64) -> Router<AppState> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/api/videos", post(create_video).get(list_videos))
        .route("/api/videos/{video_id}", get(get_video))
        .route(
            "/api/video_upload/{video_id}",
            post(upload_video).layer(DefaultBodyLimit::max(body_limit(max_upload_bytes))),
        )
        .route(
            "/api/thumbnail_upload/{video_id}",
            post(upload_thumbnail).layer(DefaultBodyLimit::max(body_limit(MAX_THUMBNAIL_BYTES))),
        )
        .route("/assets/{*file}", get(get_asset))
}

fn body_limit(payload_bytes: u64) -> usize {
    usize::try_from(payload_bytes.saturating_add(MULTIPART_OVERHEAD_BYTES)).unwrap_or(usize::MAX)
}
