//! Video ingestion API: authenticated MP4 uploads are staged, probed,
//! remuxed for fast start and published to object storage.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use axum::Router;
use state::AppState;

/// Build the full application router over `state`.
pub fn app(state: AppState) -> Router {
    let max_upload_bytes = state.max_upload_bytes;
    routes::routes::routes(max_upload_bytes).with_state(state)
}
