//! Fast-start remux: rewrite the container so playback metadata precedes the
//! media payload. Streams are copied, never re-encoded.

use crate::services::{
    error::{UploadError, UploadResult},
    media::MediaToolkit,
    stager::ScratchFile,
};
use tempfile::TempPath;
use tracing::debug;

/// Suffix appended to the source path to name the remuxed output.
pub const PROCESSING_SUFFIX: &str = ".processing";

/// Remux `source` into a new scratch file next to it. The source file is
/// left untouched; any partial output is removed if the tool fails.
pub async fn remux_for_fast_start(
    tools: &dyn MediaToolkit,
    source: &ScratchFile,
) -> UploadResult<ScratchFile> {
    let output = TempPath::try_from_path(source.sibling_path(PROCESSING_SUFFIX))?;

    tools
        .remux_fast_start(source.path(), &output)
        .await
        .map_err(|e| UploadError::RemuxFailure(e.to_string()))?;

    debug!(output = %output.display(), "remuxed for fast start");
    ScratchFile::open(output, source.content_type()).await
}
