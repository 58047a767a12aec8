//! External media tool invocation.
//!
//! `MediaToolkit` is the seam between pipeline logic and the ffprobe/ffmpeg
//! binaries. `FfmpegToolkit` spawns them with `tokio::process`; every call is
//! bounded by a timeout and the child is killed when the wait is abandoned.

use async_trait::async_trait;
use std::{path::Path, process::Output, time::Duration};
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("{tool} could not be started: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{tool} exited with {status}: {stderr}")]
    Failed {
        tool: String,
        status: String,
        stderr: String,
    },
    #[error("{tool} did not finish within {}s", .timeout.as_secs())]
    TimedOut { tool: String, timeout: Duration },
}

#[async_trait]
pub trait MediaToolkit: Send + Sync {
    /// Run a read-only stream analysis of `path` and return the tool's
    /// JSON document from standard output.
    async fn probe_streams(&self, path: &Path) -> Result<Vec<u8>, ToolError>;

    /// Copy every stream of `input` into a new MP4 at `output` with the
    /// `moov` atom placed before the media payload.
    async fn remux_fast_start(&self, input: &Path, output: &Path) -> Result<(), ToolError>;
}

#[derive(Debug, Clone)]
pub struct FfmpegConfig {
    pub ffprobe_path: String,
    pub ffmpeg_path: String,
    pub probe_timeout: Duration,
    pub remux_timeout: Duration,
}

pub struct FfmpegToolkit {
    config: FfmpegConfig,
}

impl FfmpegToolkit {
    pub fn new(config: FfmpegConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl MediaToolkit for FfmpegToolkit {
    async fn probe_streams(&self, path: &Path) -> Result<Vec<u8>, ToolError> {
        let mut cmd = Command::new(&self.config.ffprobe_path);
        cmd.args(["-v", "error", "-print_format", "json", "-show_streams"])
            .arg(path);

        let output = run_bounded(&self.config.ffprobe_path, cmd, self.config.probe_timeout).await?;
        Ok(output.stdout)
    }

    async fn remux_fast_start(&self, input: &Path, output: &Path) -> Result<(), ToolError> {
        let mut cmd = Command::new(&self.config.ffmpeg_path);
        cmd.arg("-y")
            .arg("-i")
            .arg(input)
            .args(["-c", "copy", "-movflags", "faststart", "-f", "mp4"])
            .arg(output);

        run_bounded(&self.config.ffmpeg_path, cmd, self.config.remux_timeout).await?;
        Ok(())
    }
}

/// Run `cmd` to completion, capturing output. A non-zero exit is an error
/// carrying stderr.
async fn run_bounded(tool: &str, mut cmd: Command, timeout: Duration) -> Result<Output, ToolError> {
    cmd.stdin(std::process::Stdio::null()).kill_on_drop(true);
    debug!("Executing {:?}", cmd);

    let output = match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(source)) => {
            return Err(ToolError::Spawn {
                tool: tool.to_string(),
                source,
            });
        }
        Err(_) => {
            return Err(ToolError::TimedOut {
                tool: tool.to_string(),
                timeout,
            });
        }
    };

    if !output.status.success() {
        return Err(ToolError::Failed {
            tool: tool.to_string(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(output)
}
