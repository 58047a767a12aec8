#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, Response, header},
};
use http_body_util::BodyExt;
use serde_json::Value;
use sqlx::sqlite::SqlitePoolOptions;
use std::{
    path::Path,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};
use tempfile::TempDir;
use tokio::{fs::File, io::AsyncReadExt};
use tower::ServiceExt;
use tubely::{
    config::PipelineConfig,
    services::{
        media::{MediaToolkit, ToolError},
        object_store::{ObjectStore, StoreError},
        video_store::run_migrations,
    },
    state::AppState,
};
use uuid::Uuid;

pub const SECRET: &str = "integration-secret";
pub const BUCKET: &str = "tubely-test";
pub const BOUNDARY: &str = "tubely-test-boundary";

/// Canned ffprobe output for a 1920x1080 stream.
pub const LANDSCAPE_PROBE: &str =
    r#"{"streams":[{"index":0,"codec_type":"video","width":1920,"height":1080}]}"#;

/// Returns canned probe JSON and copies the input on remux.
pub struct FakeToolkit {
    pub probe_json: Mutex<String>,
    pub calls: AtomicUsize,
}

impl FakeToolkit {
    pub fn new(probe_json: &str) -> Self {
        Self {
            probe_json: Mutex::new(probe_json.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaToolkit for FakeToolkit {
    async fn probe_streams(&self, _path: &Path) -> Result<Vec<u8>, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.probe_json.lock().unwrap().as_bytes().to_vec())
    }

    async fn remux_fast_start(&self, input: &Path, output: &Path) -> Result<(), ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::fs::copy(input, output).await.unwrap();
        Ok(())
    }
}

/// Keeps uploaded objects in memory and signs with a fake URL.
#[derive(Default)]
pub struct FakeStore {
    pub objects: Mutex<Vec<(String, String, Vec<u8>)>>,
}

#[async_trait]
impl ObjectStore for FakeStore {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        mut body: File,
        _content_length: u64,
        _content_type: &str,
    ) -> Result<(), StoreError> {
        let mut data = Vec::new();
        body.read_to_end(&mut data).await.unwrap();
        self.objects
            .lock()
            .unwrap()
            .push((bucket.to_string(), key.to_string(), data));
        Ok(())
    }

    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> Result<String, StoreError> {
        Ok(format!(
            "https://{bucket}.s3.test/{key}?X-Amz-Expires={}",
            expires_in.as_secs()
        ))
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub tools: Arc<FakeToolkit>,
    pub store: Arc<FakeStore>,
    pub scratch: TempDir,
    pub assets: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_limit(1024 * 1024).await
    }

    pub async fn with_limit(max_upload_bytes: u64) -> Self {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        run_migrations(&pool).await.unwrap();

        let scratch = tempfile::tempdir().unwrap();
        let assets = tempfile::tempdir().unwrap();
        let tools = Arc::new(FakeToolkit::new(LANDSCAPE_PROBE));
        let store = Arc::new(FakeStore::default());

        let state = AppState::new(
            Arc::new(pool),
            SECRET,
            PipelineConfig {
                bucket: BUCKET.to_string(),
                scratch_dir: scratch.path().to_path_buf(),
                max_upload_bytes,
                publish_timeout: Duration::from_secs(5),
                signed_url_ttl: Duration::from_secs(3600),
            },
            assets.path().to_path_buf(),
            "http://localhost:8091",
            tools.clone(),
            store.clone(),
        );

        Self {
            router: tubely::app(state.clone()),
            state,
            tools,
            store,
            scratch,
            assets,
        }
    }

    pub fn token_for(&self, user_id: Uuid) -> String {
        self.state
            .auth
            .issue_token(user_id, Duration::from_secs(300))
            .unwrap()
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub fn scratch_is_empty(&self) -> bool {
        std::fs::read_dir(self.scratch.path())
            .unwrap()
            .next()
            .is_none()
    }
}

/// Build a single-part multipart body.
pub fn multipart_body(field: &str, filename: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn upload_request(uri: &str, token: Option<&str>, body: Vec<u8>) -> Request<Body> {
    let mut builder = Request::post(uri).header(
        header::CONTENT_TYPE,
        format!("multipart/form-data; boundary={BOUNDARY}"),
    );
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body)).unwrap()
}

pub fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::get(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

pub fn json_request(uri: &str, token: &str, json: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json.to_string()))
        .unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
