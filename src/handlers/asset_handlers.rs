//! Serves stored thumbnails. Bodies are streamed from disk, never buffered.

use crate::{errors::AppError, services::thumbnail::AssetMeta, state::AppState};
use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::Response,
};
use tokio_util::io::ReaderStream;

/// `GET /assets/{*file}`
pub async fn get_asset(
    State(state): State<AppState>,
    Path(file): Path<String>,
) -> Result<Response, AppError> {
    let (meta, reader) = state.thumbnails.open_asset(&file).await?;
    let body = Body::from_stream(ReaderStream::new(reader));

    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::OK;
    set_asset_headers(response.headers_mut(), &meta);
    Ok(response)
}

fn set_asset_headers(headers: &mut HeaderMap, meta: &AssetMeta) {
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(meta.content_type),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(meta.size_bytes));

    let last_modified = meta
        .last_modified
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string();
    if let Ok(value) = HeaderValue::from_str(&last_modified) {
        headers.insert(header::LAST_MODIFIED, value);
    }
}
