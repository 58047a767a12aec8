//! Geometry probing: read the first video stream's dimensions from the
//! analysis tool's JSON and classify the aspect ratio.

use crate::services::{
    error::{UploadError, UploadResult},
    media::MediaToolkit,
};
use serde::Deserialize;
use std::{fmt, path::Path};

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

/// Orientation bucket used as the object key prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AspectRatio {
    /// 16:9
    Landscape,
    /// 9:16
    Portrait,
    Other,
}

impl AspectRatio {
    /// Classify with integer arithmetic, landscape checked first.
    pub fn classify(width: u32, height: u32) -> Self {
        let (w, h) = (u64::from(width), u64::from(height));
        if w == 16 * h / 9 {
            Self::Landscape
        } else if h == 16 * w / 9 {
            Self::Portrait
        } else {
            Self::Other
        }
    }

    /// Key prefix, including the trailing slash.
    pub fn key_prefix(self) -> &'static str {
        match self {
            Self::Landscape => "landscape/",
            Self::Portrait => "portrait/",
            Self::Other => "other/",
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Landscape => write!(f, "16:9"),
            Self::Portrait => write!(f, "9:16"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Pixel size of the first video stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub width: u32,
    pub height: u32,
}

impl Geometry {
    pub fn aspect_ratio(&self) -> AspectRatio {
        AspectRatio::classify(self.width, self.height)
    }
}

/// Probe `path` and return the geometry of its first video stream.
pub async fn probe_geometry(tools: &dyn MediaToolkit, path: &Path) -> UploadResult<Geometry> {
    let stdout = tools
        .probe_streams(path)
        .await
        .map_err(|e| UploadError::ProbeFailure(e.to_string()))?;
    parse_geometry(&stdout)
}

/// Parse the probe tool's JSON. Streams without a `codec_type` are
/// considered video when they carry dimensions.
pub fn parse_geometry(stdout: &[u8]) -> UploadResult<Geometry> {
    if stdout.iter().all(u8::is_ascii_whitespace) {
        return Err(UploadError::ProbeFailure("empty probe output".into()));
    }

    let output: ProbeOutput = serde_json::from_slice(stdout)
        .map_err(|e| UploadError::ProbeFailure(format!("malformed probe output: {}", e)))?;

    let stream = output
        .streams
        .iter()
        .find(|s| match s.codec_type.as_deref() {
            Some(kind) => kind == "video",
            None => s.width.is_some() && s.height.is_some(),
        })
        .ok_or_else(|| UploadError::ProbeFailure("no video stream found".into()))?;

    match (stream.width, stream.height) {
        (Some(width), Some(height)) if width > 0 && height > 0 => Ok(Geometry { width, height }),
        _ => Err(UploadError::ProbeFailure(
            "video stream has no usable dimensions".into(),
        )),
    }
}
