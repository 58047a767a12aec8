//! ThumbnailService: the single-file sibling of the upload pipeline.
//!
//! Thumbnails are small images written straight into the assets directory
//! and served back by the API itself. No probing or remuxing happens here.

use crate::{
    models::video::Video,
    services::{
        error::{UploadError, UploadResult},
        stager::media_type,
        video_store::VideoStore,
    },
};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt, pin_mut};
use std::{
    io,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::{debug, info};
use uuid::Uuid;

/// Largest thumbnail accepted (10 MiB).
pub const MAX_THUMBNAIL_BYTES: u64 = 10 << 20;

const MAX_ASSET_NAME_LEN: usize = 255;

/// Metadata of a stored asset, used to build response headers.
#[derive(Debug, Clone)]
pub struct AssetMeta {
    pub content_type: &'static str,
    pub size_bytes: u64,
    pub last_modified: DateTime<Utc>,
}

#[derive(Clone)]
pub struct ThumbnailService {
    videos: VideoStore,
    assets_dir: Arc<PathBuf>,
    public_base_url: Arc<str>,
}

impl ThumbnailService {
    pub fn new(videos: VideoStore, assets_dir: PathBuf, public_base_url: &str) -> Self {
        Self {
            videos,
            assets_dir: Arc::new(assets_dir),
            public_base_url: Arc::from(public_base_url.trim_end_matches('/')),
        }
    }

    /// Store an image for `video` and point its `thumbnail_url` at it.
    ///
    /// - Only PNG and JPEG are accepted.
    /// - Bytes are written to a temporary file and renamed into place.
    /// - The written asset is removed again if the record update fails.
    pub async fn save<S>(
        &self,
        video: Video,
        declared_type: &str,
        stream: S,
    ) -> UploadResult<Video>
    where
        S: Stream<Item = io::Result<Bytes>> + Send,
    {
        let extension = image_extension(declared_type)?;
        let random: [u8; 32] = rand::random();
        let file_name = format!("{}.{}", URL_SAFE_NO_PAD.encode(random), extension);
        let final_path = self.assets_dir.join(&file_name);

        let tmp_path = self.assets_dir.join(format!(".tmp-{}", Uuid::new_v4()));
        if let Err(err) = write_bounded(&tmp_path, stream, MAX_THUMBNAIL_BYTES).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(err);
        }
        if let Err(err) = fs::rename(&tmp_path, &final_path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(err.into());
        }

        let thumbnail_url = format!("{}/assets/{}", self.public_base_url, file_name);
        let updated = match self
            .videos
            .update_thumbnail(video.id, &thumbnail_url, Utc::now())
            .await
        {
            Ok(updated) => updated,
            Err(err) => {
                let _ = fs::remove_file(&final_path).await;
                return Err(err);
            }
        };

        info!(video_id = %updated.id, file = %file_name, "thumbnail stored");
        Ok(updated)
    }

    /// Open a stored asset by file name for streaming.
    pub async fn open_asset(&self, name: &str) -> UploadResult<(AssetMeta, File)> {
        ensure_asset_name_safe(name)?;
        let path = self.assets_dir.join(name);

        let file = File::open(&path).await.map_err(|err| {
            if err.kind() == io::ErrorKind::NotFound {
                UploadError::NotFound(name.to_string())
            } else {
                UploadError::IoFailure(err)
            }
        })?;
        let metadata = file.metadata().await?;
        if !metadata.is_file() {
            return Err(UploadError::NotFound(name.to_string()));
        }

        let last_modified = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        Ok((
            AssetMeta {
                content_type: content_type_for(name),
                size_bytes: metadata.len(),
                last_modified,
            },
            file,
        ))
    }
}

fn image_extension(declared: &str) -> UploadResult<&'static str> {
    match media_type(declared).as_str() {
        "image/png" => Ok("png"),
        "image/jpeg" => Ok("jpg"),
        _ => Err(UploadError::UnsupportedMediaType(declared.to_string())),
    }
}

fn content_type_for(name: &str) -> &'static str {
    match name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase()) {
        Some(ext) if ext == "png" => "image/png",
        Some(ext) if ext == "jpg" || ext == "jpeg" => "image/jpeg",
        _ => "application/octet-stream",
    }
}

/// Asset names are flat file names: no separators, no parent references,
/// no hidden files.
fn ensure_asset_name_safe(name: &str) -> UploadResult<()> {
    let unsafe_name = name.is_empty()
        || name.len() > MAX_ASSET_NAME_LEN
        || name.starts_with('.')
        || name.contains("..")
        || name
            .bytes()
            .any(|b| b.is_ascii_control() || b == b'/' || b == b'\\');
    if unsafe_name {
        return Err(UploadError::InvalidRequest(format!(
            "invalid asset name `{}`",
            name
        )));
    }
    Ok(())
}

async fn write_bounded<S>(path: &Path, stream: S, max_bytes: u64) -> UploadResult<()>
where
    S: Stream<Item = io::Result<Bytes>>,
{
    let mut file = File::create(path).await?;
    let mut size_bytes: u64 = 0;
    pin_mut!(stream);
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        size_bytes += chunk.len() as u64;
        if size_bytes > max_bytes {
            return Err(UploadError::PayloadTooLarge { limit: max_bytes });
        }
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    file.sync_all().await?;
    debug!(path = %path.display(), size_bytes, "wrote thumbnail");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::video_store::memory_store;
    use futures::stream;

    fn png(data: &'static [u8]) -> impl Stream<Item = io::Result<Bytes>> + Send + use<> {
        stream::iter(vec![Ok(Bytes::from_static(data))])
    }

    async fn service() -> (ThumbnailService, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let svc = ThumbnailService::new(
            memory_store().await,
            dir.path().to_path_buf(),
            "http://localhost:8091/",
        );
        (svc, dir)
    }

    #[tokio::test]
    async fn png_is_stored_and_linked() {
        let (svc, dir) = service().await;
        let video = svc.videos.create_video(Uuid::new_v4(), "t", "").await.unwrap();

        let updated = svc.save(video, "image/png", png(b"\x89PNG")).await.unwrap();
        let url = updated.thumbnail_url.unwrap();
        let name = url.strip_prefix("http://localhost:8091/assets/").unwrap();
        assert!(name.ends_with(".png"));

        let (meta, _file) = svc.open_asset(name).await.unwrap();
        assert_eq!(meta.content_type, "image/png");
        assert_eq!(meta.size_bytes, 4);

        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn gif_is_rejected_without_writing() {
        let (svc, dir) = service().await;
        let video = svc.videos.create_video(Uuid::new_v4(), "t", "").await.unwrap();
        let err = svc.save(video, "image/gif", png(b"GIF8")).await.unwrap_err();
        assert!(matches!(err, UploadError::UnsupportedMediaType(_)));
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn failed_record_update_removes_asset() {
        let (svc, dir) = service().await;
        let now = Utc::now();
        let ghost = Video {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            title: String::new(),
            description: String::new(),
            user_id: Uuid::new_v4(),
            thumbnail_url: None,
            video_url: None,
        };
        let err = svc.save(ghost, "image/jpeg", png(b"jpeg")).await.unwrap_err();
        assert!(matches!(err, UploadError::PersistFailure(_)));
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn thumbnail_save_keeps_published_video_reference() {
        let (svc, _dir) = service().await;
        let video = svc.videos.create_video(Uuid::new_v4(), "t", "").await.unwrap();

        svc.videos
            .update_video_reference(video.id, "tubely,landscape/k.mp4", Utc::now())
            .await
            .unwrap();

        let updated = svc.save(video.clone(), "image/png", png(b"\x89PNG")).await.unwrap();
        assert_eq!(updated.video_url.as_deref(), Some("tubely,landscape/k.mp4"));
        assert_eq!(
            svc.videos.get_video(video.id).await.unwrap().video_url.as_deref(),
            Some("tubely,landscape/k.mp4")
        );
    }

    #[tokio::test]
    async fn traversal_names_are_rejected() {
        let (svc, _dir) = service().await;
        for name in ["../secret", "a/b.png", ".hidden", "..", ""] {
            assert!(matches!(
                svc.open_asset(name).await,
                Err(UploadError::InvalidRequest(_))
            ));
        }
        assert!(matches!(
            svc.open_asset("missing.png").await,
            Err(UploadError::NotFound(_))
        ));
    }
}
