//! Represents a video record and its stored-object reference.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A video owned by a single user.
///
/// `video_url` holds either a `bucket,key` locator pair (what the upload
/// pipeline persists) or a fully-qualified URL. See [`VideoReference`].
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq)]
pub struct Video {
    /// Opaque unique identifier.
    pub id: Uuid,

    /// When the record was created.
    pub created_at: DateTime<Utc>,

    /// Last modification, bumped whenever a reference changes.
    pub updated_at: DateTime<Utc>,

    pub title: String,

    pub description: String,

    /// Owner of the record; only this user may upload to it.
    pub user_id: Uuid,

    pub thumbnail_url: Option<String>,

    pub video_url: Option<String>,
}

/// Body of `POST /api/videos`.
#[derive(Deserialize, Debug)]
pub struct CreateVideoReq {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

/// Decoded form of a persisted reference field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoReference<'a> {
    /// Already presentable to clients.
    Url(&'a str),
    /// Stored object that still needs a signed URL.
    Locator { bucket: &'a str, key: &'a str },
}

impl<'a> VideoReference<'a> {
    /// Build the persisted locator form for a stored object.
    pub fn encode_locator(bucket: &str, key: &str) -> String {
        format!("{},{}", bucket, key)
    }

    /// Decode a persisted reference. Returns `None` for data that is neither a
    /// URL nor a `bucket,key` pair with both halves present.
    pub fn parse(raw: &'a str) -> Option<Self> {
        if raw.starts_with("https://") || raw.starts_with("http://") {
            return Some(Self::Url(raw));
        }
        let (bucket, key) = raw.split_once(',')?;
        if bucket.is_empty() || key.is_empty() {
            return None;
        }
        Some(Self::Locator { bucket, key })
    }
}
