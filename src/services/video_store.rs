//! VideoStore: persistence of `Video` records in SQLite.
//!
//! The upload pipeline only reads a record (ownership, current reference) and
//! writes back the reference field and timestamp; record creation and listing
//! back the HTTP API.

use crate::{
    models::video::Video,
    services::error::{UploadError, UploadResult},
};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

const MIGRATION_SQL: &str = include_str!("../../migrations/0001_init.sql");

const VIDEO_COLUMNS: &str =
    "id, created_at, updated_at, title, description, user_id, thumbnail_url, video_url";

#[derive(Clone)]
pub struct VideoStore {
    /// Shared SQLite connection pool.
    pub db: Arc<SqlitePool>,
}

impl VideoStore {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Create a new draft record owned by `user_id`, with no media attached.
    pub async fn create_video(
        &self,
        user_id: Uuid,
        title: &str,
        description: &str,
    ) -> UploadResult<Video> {
        let now = Utc::now();
        let video = Video {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            title: title.to_string(),
            description: description.to_string(),
            user_id,
            thumbnail_url: None,
            video_url: None,
        };

        sqlx::query(
            "INSERT INTO videos (id, created_at, updated_at, title, description, user_id,
                                 thumbnail_url, video_url)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(video.id)
        .bind(video.created_at)
        .bind(video.updated_at)
        .bind(&video.title)
        .bind(&video.description)
        .bind(video.user_id)
        .bind(&video.thumbnail_url)
        .bind(&video.video_url)
        .execute(&*self.db)
        .await?;

        debug!(video_id = %video.id, "created video record");
        Ok(video)
    }

    /// Fetch a record by id. Returns NotFound if missing.
    pub async fn get_video(&self, id: Uuid) -> UploadResult<Video> {
        sqlx::query_as::<_, Video>(&format!("SELECT {VIDEO_COLUMNS} FROM videos WHERE id = ?"))
            .bind(id)
            .fetch_optional(&*self.db)
            .await?
            .ok_or_else(|| UploadError::NotFound(id.to_string()))
    }

    /// Fetch a record and check that `user_id` owns it.
    pub async fn get_owned_video(&self, id: Uuid, user_id: Uuid) -> UploadResult<Video> {
        let video = self.get_video(id).await?;
        if video.user_id != user_id {
            return Err(UploadError::Forbidden(id.to_string()));
        }
        Ok(video)
    }

    /// All records owned by `user_id`, newest first.
    pub async fn list_videos(&self, user_id: Uuid) -> UploadResult<Vec<Video>> {
        let rows = sqlx::query_as::<_, Video>(&format!(
            "SELECT {VIDEO_COLUMNS} FROM videos WHERE user_id = ? ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&*self.db)
        .await?;
        Ok(rows)
    }

    /// Point a record at a newly published video. Only the reference and
    /// timestamp columns are written; returns the record as now stored.
    pub async fn update_video_reference(
        &self,
        id: Uuid,
        video_url: &str,
        updated_at: DateTime<Utc>,
    ) -> UploadResult<Video> {
        let result = sqlx::query("UPDATE videos SET video_url = ?, updated_at = ? WHERE id = ?")
            .bind(video_url)
            .bind(updated_at)
            .bind(id)
            .execute(&*self.db)
            .await?;
        self.reload_updated(id, result.rows_affected()).await
    }

    /// Point a record at a newly stored thumbnail. Only the thumbnail and
    /// timestamp columns are written; returns the record as now stored.
    pub async fn update_thumbnail(
        &self,
        id: Uuid,
        thumbnail_url: &str,
        updated_at: DateTime<Utc>,
    ) -> UploadResult<Video> {
        let result =
            sqlx::query("UPDATE videos SET thumbnail_url = ?, updated_at = ? WHERE id = ?")
                .bind(thumbnail_url)
                .bind(updated_at)
                .bind(id)
                .execute(&*self.db)
                .await?;
        self.reload_updated(id, result.rows_affected()).await
    }

    async fn reload_updated(&self, id: Uuid, rows_affected: u64) -> UploadResult<Video> {
        if rows_affected == 0 {
            return Err(UploadError::PersistFailure(sqlx::Error::RowNotFound));
        }
        debug!(video_id = %id, "updated video record");
        self.get_video(id).await
    }
}

/// Parse a path-supplied video id.
pub fn parse_video_id(raw: &str) -> UploadResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| UploadError::InvalidIdentifier(raw.to_string()))
}

/// Run the embedded schema migration statement by statement.
pub async fn run_migrations(db: &SqlitePool) -> Result<(), sqlx::Error> {
    let statements = MIGRATION_SQL
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>();

    tracing::info!("Running {} migration statements...", statements.len());

    for stmt in statements {
        debug!("Executing migration SQL: {}", stmt);
        sqlx::query(stmt).execute(db).await?;
    }

    Ok(())
}

#[cfg(test)]
pub(crate) async fn memory_store() -> VideoStore {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    run_migrations(&pool).await.unwrap();
    VideoStore::new(Arc::new(pool))
}
