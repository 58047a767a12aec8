use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::{io::ErrorKind, path::Path, str::FromStr, sync::Arc};
use tokio::{fs, net::TcpListener};
use tracing_subscriber::EnvFilter;
use tubely::{
    config::AppConfig,
    services::{
        media::{FfmpegConfig, FfmpegToolkit},
        object_store::S3ObjectStore,
        video_store::run_migrations,
    },
    state::AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config + migrate flag ---
    let (cfg, migrate) = AppConfig::from_env_and_args()?;

    tracing::info!(
        host = %cfg.host,
        port = cfg.port,
        bucket = %cfg.s3_bucket,
        region = %cfg.s3_region,
        scratch_dir = %cfg.scratch_dir.display(),
        "Starting tubely"
    );

    // --- Ensure local directories exist ---
    for dir in [&cfg.scratch_dir, &cfg.assets_dir] {
        if !dir.exists() {
            fs::create_dir_all(dir).await?;
            tracing::info!("Created directory {}", dir.display());
        }
    }

    // --- Initialize SQLite connection ---
    let db_path = cfg
        .database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .trim_start_matches("file:");
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).await?;
            tracing::info!("Created missing directory {:?}", parent);
        }
    }

    let connect_options = SqliteConnectOptions::from_str(&cfg.database_url)?.create_if_missing(true);
    let db = Arc::new(
        SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?,
    );

    // --- Handle migration mode ---
    if migrate {
        run_migrations(&db).await?;
        tracing::info!("Database migration complete.");
        return Ok(());
    }

    // --- Initialize collaborators ---
    let tools = Arc::new(FfmpegToolkit::new(FfmpegConfig {
        ffprobe_path: cfg.ffprobe_path.clone(),
        ffmpeg_path: cfg.ffmpeg_path.clone(),
        probe_timeout: cfg.probe_timeout,
        remux_timeout: cfg.remux_timeout,
    }));
    let store = Arc::new(S3ObjectStore::new(cfg.s3_region.clone(), cfg.s3_endpoint.clone()).await);

    let state = AppState::new(
        db,
        &cfg.jwt_secret,
        cfg.pipeline(),
        cfg.assets_dir.clone(),
        &cfg.public_base_url,
        tools,
        store,
    );
    let app = tubely::app(state);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
