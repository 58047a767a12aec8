//! Media staging: copy an inbound upload to a local scratch file.
//!
//! A `ScratchFile` owns both the open handle and the path; dropping it closes
//! the handle and removes the file, so every exit path of a request releases
//! what it staged. Scratch names are unique per call.

use crate::services::error::{UploadError, UploadResult};
use bytes::Bytes;
use futures::{Stream, StreamExt, pin_mut};
use std::{
    io,
    path::{Path, PathBuf},
};
use tempfile::TempPath;
use tokio::{
    fs::File,
    io::{AsyncSeekExt, AsyncWriteExt},
};
use tracing::debug;

/// The only container type the ingestion pipeline accepts.
pub const ACCEPTED_VIDEO_TYPE: &str = "video/mp4";

/// Extension given to staged files and object keys.
pub const VIDEO_EXTENSION: &str = "mp4";

/// A local file exclusively owned by one pipeline run.
#[derive(Debug)]
pub struct ScratchFile {
    file: File,
    path: TempPath,
    content_type: String,
}

impl ScratchFile {
    /// Open an existing file at `path`, taking ownership of its removal.
    pub async fn open(path: TempPath, content_type: impl Into<String>) -> UploadResult<Self> {
        let file = File::open(&path).await?;
        Ok(Self {
            file,
            path,
            content_type: content_type.into(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Move the cursor back to the start. Writes leave it at the end.
    pub async fn rewind(&mut self) -> io::Result<()> {
        self.file.rewind().await.map(|_| ())
    }

    pub async fn size_bytes(&self) -> io::Result<u64> {
        Ok(self.file.metadata().await?.len())
    }

    /// A second handle sharing this file's cursor, for handing to a reader
    /// that wants ownership. The scratch file still controls removal.
    pub async fn reader(&self) -> io::Result<File> {
        self.file.try_clone().await
    }

    /// Path a derived artifact of this file should be written to.
    pub fn sibling_path(&self, suffix: &str) -> PathBuf {
        let mut raw = self.path.as_os_str().to_owned();
        raw.push(suffix);
        PathBuf::from(raw)
    }
}

/// Reduce a Content-Type header value to its lowercase `type/subtype`.
pub fn media_type(declared: &str) -> String {
    declared
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Reject anything but the accepted video container type.
pub fn ensure_accepted(declared: &str) -> UploadResult<()> {
    if media_type(declared) == ACCEPTED_VIDEO_TYPE {
        Ok(())
    } else {
        Err(UploadError::UnsupportedMediaType(declared.to_string()))
    }
}

/// Stream an upload into a fresh file under `scratch_dir`.
///
/// - Rejects undeclared or non-MP4 content before touching the disk.
/// - Fails with PayloadTooLarge once more than `max_bytes` arrive.
/// - Removes the partial file on any error.
///
/// The returned handle is rewound to the start.
pub async fn stage<S>(
    stream: S,
    declared_type: &str,
    scratch_dir: &Path,
    max_bytes: u64,
) -> UploadResult<ScratchFile>
where
    S: Stream<Item = io::Result<Bytes>>,
{
    ensure_accepted(declared_type)?;

    let named = tempfile::Builder::new()
        .prefix("tubely-upload-")
        .suffix(&format!(".{}", VIDEO_EXTENSION))
        .tempfile_in(scratch_dir)?;
    let (std_file, path) = named.into_parts();
    let mut file = File::from_std(std_file);

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
    file.rewind().await?;

    debug!(path = %path.display(), size_bytes, "staged upload");

    Ok(ScratchFile {
        file,
        path,
        content_type: media_type(declared_type),
    })
}
