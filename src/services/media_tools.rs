//! Container probing and fast-start remuxing.
//!
//! Both operations shell out to the ffmpeg toolchain. They sit behind the
//! `MediaTools` trait so the upload pipeline can run against fakes in tests.

use async_trait::async_trait;
use serde::Deserialize;
use std::{
    path::{Path, PathBuf},
    process::Stdio,
};
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("probe tool unavailable: {0}")]
    ProbeUnavailable(String),
    #[error("could not interpret probe output: {0}")]
    ProbeParseError(String),
    #[error("container declares no video stream")]
    NoStreamsFound,
    #[error("fast-start remux failed: {0}")]
    NormalizationFailed(String),
}

pub type MediaResult<T> = Result<T, MediaError>;

#[async_trait]
pub trait MediaTools: Send + Sync {
    /// Pixel width and height of the primary stream of a local media file.
    async fn probe_dimensions(&self, path: &Path) -> MediaResult<(u32, u32)>;

    /// Write a copy of `path` with its index moved ahead of the payload and
    /// return the new path. The input is left untouched; the caller owns the
    /// output.
    async fn remux_fast_start(&self, path: &Path) -> MediaResult<PathBuf>;
}

/// Where `remux_fast_start` writes its output for a given input.
///
/// Exposed so callers can claim the path for cleanup before the remux runs
/// and still remove a partially written file if it fails.
pub fn fast_start_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("upload");
    input.with_file_name(format!("{stem}.faststart.mp4"))
}

/// Subset of `ffprobe -print_format json -show_streams` output.
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

/// Parse ffprobe's JSON and return the dimensions of the first video stream.
/// Audio, subtitle and data streams are skipped wherever they appear.
fn parse_probe_output(stdout: &[u8]) -> MediaResult<(u32, u32)> {
    let output: ProbeOutput = serde_json::from_slice(stdout)
        .map_err(|err| MediaError::ProbeParseError(err.to_string()))?;
    let stream = output
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or(MediaError::NoStreamsFound)?;
    match (stream.width, stream.height) {
        (Some(width), Some(height)) => Ok((width, height)),
        _ => Err(MediaError::ProbeParseError(
            "video stream has no dimensions".into(),
        )),
    }
}

/// `MediaTools` backed by the `ffprobe` and `ffmpeg` binaries.
#[derive(Debug, Clone)]
pub struct FfmpegTools {
    ffprobe_bin: String,
    ffmpeg_bin: String,
}

impl FfmpegTools {
    pub fn new(ffprobe_bin: impl Into<String>, ffmpeg_bin: impl Into<String>) -> Self {
        Self {
            ffprobe_bin: ffprobe_bin.into(),
            ffmpeg_bin: ffmpeg_bin.into(),
        }
    }
}

#[async_trait]
impl MediaTools for FfmpegTools {
    async fn probe_dimensions(&self, path: &Path) -> MediaResult<(u32, u32)> {
        debug!("probing {}", path.display());
        let output = Command::new(&self.ffprobe_bin)
            .args(["-v", "error", "-print_format", "json", "-show_streams"])
            .arg(path)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|err| {
                MediaError::ProbeUnavailable(format!("spawning {}: {}", self.ffprobe_bin, err))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(status = %output.status, stderr = %stderr.trim(), "ffprobe failed");
            return Err(MediaError::ProbeUnavailable(format!(
                "{} exited with {}",
                self.ffprobe_bin, output.status
            )));
        }

        parse_probe_output(&output.stdout)
    }

    async fn remux_fast_start(&self, path: &Path) -> MediaResult<PathBuf> {
        let out_path = fast_start_path(path);
        debug!("remuxing {} -> {}", path.display(), out_path.display());

        let output = Command::new(&self.ffmpeg_bin)
            .arg("-y")
            .arg("-i")
            .arg(path)
            .args(["-c", "copy", "-movflags", "faststart", "-f", "mp4"])
            .arg(&out_path)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|err| {
                MediaError::NormalizationFailed(format!("spawning {}: {}", self.ffmpeg_bin, err))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(status = %output.status, stderr = %stderr.trim(), "ffmpeg remux failed");
            return Err(MediaError::NormalizationFailed(format!(
                "{} exited with {}",
                self.ffmpeg_bin, output.status
            )));
        }

        Ok(out_path)
    }
}
