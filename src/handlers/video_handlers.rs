//! HTTP handlers for video records and video/thumbnail uploads.
//!
//! Every handler authenticates first. Upload handlers then check ownership
//! before reading any of the multipart body.

use crate::{
    errors::AppError,
    models::video::{CreateVideoReq, Video},
    services::{error::UploadError, video_store::parse_video_id},
    state::AppState,
};
use axum::{
    Json,
    extract::{
        Multipart, Path, State,
        multipart::{Field, MultipartRejection},
        rejection::JsonRejection,
    },
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::io;

/// Form field carrying the video in `POST /api/video_upload/{videoID}`.
pub const VIDEO_FIELD: &str = "video";

/// Form field carrying the image in `POST /api/thumbnail_upload/{videoID}`.
pub const THUMBNAIL_FIELD: &str = "thumbnail";

/// `POST /api/videos`: create a draft record owned by the caller.
pub async fn create_video(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<CreateVideoReq>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = state.auth.authenticate(&headers)?;
    let Json(req) = payload.map_err(|e| UploadError::InvalidRequest(e.body_text()))?;
    if req.title.trim().is_empty() {
        return Err(UploadError::InvalidRequest("title must not be empty".into()).into());
    }

    let video = state
        .videos
        .create_video(user_id, req.title.trim(), &req.description)
        .await?;
    Ok((StatusCode::CREATED, Json(video)))
}

/// `GET /api/videos`: the caller's records, newest first, with playable URLs.
pub async fn list_videos(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Video>>, AppError> {
    let user_id = state.auth.authenticate(&headers)?;
    let videos = state.videos.list_videos(user_id).await?;
    Ok(Json(state.resolver.resolve_all(videos).await?))
}

/// `GET /api/videos/{videoID}`: one record owned by the caller.
pub async fn get_video(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Video>, AppError> {
    let user_id = state.auth.authenticate(&headers)?;
    let video_id = parse_video_id(&video_id)?;
    let video = state.videos.get_owned_video(video_id, user_id).await?;
    Ok(Json(state.resolver.resolve(video).await?))
}

/// `POST /api/video_upload/{videoID}`: run the ingestion pipeline.
///
/// The response carries the committed record with its reference resolved
/// for display; the stored record keeps the `bucket,key` locator.
pub async fn upload_video(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Video>, AppError> {
    let user_id = state.auth.authenticate(&headers)?;
    let video = state.pipeline.authorize(&video_id, user_id).await?;
    let mut multipart = multipart.map_err(|e| UploadError::InvalidRequest(e.body_text()))?;

    while let Some(field) = multipart.next_field().await.map_err(invalid_form)? {
        if field.name() != Some(VIDEO_FIELD) {
            continue;
        }
        let declared_type = field.content_type().unwrap_or_default().to_string();
        let committed = state
            .pipeline
            .ingest(video, &declared_type, field_stream(field))
            .await?;
        return Ok(Json(state.resolver.resolve(committed).await?));
    }

    Err(missing_field(VIDEO_FIELD))
}

/// `POST /api/thumbnail_upload/{videoID}`: store a PNG/JPEG thumbnail.
pub async fn upload_thumbnail(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Video>, AppError> {
    let user_id = state.auth.authenticate(&headers)?;
    let video_id = parse_video_id(&video_id)?;
    let video = state.videos.get_owned_video(video_id, user_id).await?;
    let mut multipart = multipart.map_err(|e| UploadError::InvalidRequest(e.body_text()))?;

    while let Some(field) = multipart.next_field().await.map_err(invalid_form)? {
        if field.name() != Some(THUMBNAIL_FIELD) {
            continue;
        }
        let declared_type = field.content_type().unwrap_or_default().to_string();
        let updated = state
            .thumbnails
            .save(video, &declared_type, field_stream(field))
            .await?;
        return Ok(Json(state.resolver.resolve(updated).await?));
    }

    Err(missing_field(THUMBNAIL_FIELD))
}

fn field_stream(field: Field<'_>) -> impl Stream<Item = io::Result<Bytes>> + Send + '_ {
    field.map(|chunk| chunk.map_err(io::Error::other))
}

fn invalid_form(err: axum::extract::multipart::MultipartError) -> AppError {
    UploadError::InvalidRequest(err.body_text()).into()
}

fn missing_field(name: &str) -> AppError {
    UploadError::InvalidRequest(format!("missing form field `{}`", name)).into()
}
