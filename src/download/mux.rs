//! Merging separately-downloaded video and audio streams with ffmpeg.
//!
//! Streams are copied, never re-encoded. The intermediate stream files
//! are removed after a successful merge.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::AcquireError;
use crate::Result;

/// Merges elementary streams into a single container via ffmpeg
pub struct Muxer {
    ffmpeg_path: PathBuf,
    timeout: std::time::Duration,
}

impl Muxer {
    pub fn new(ffmpeg_path: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            timeout: std::time::Duration::from_secs(120),
        }
    }

    pub fn with_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Merge `video` and `audio` into `output` with stream copy.
    pub async fn merge(&self, video: &Path, audio: &Path, output: &Path) -> Result<()> {
        let args = merge_args(video, audio, output);
        debug!("Running {} with {} args", self.ffmpeg_path.display(), args.len());

        let result = tokio::time::timeout(
            self.timeout,
            Command::new(&self.ffmpeg_path).args(&args).output(),
        )
        .await
        .map_err(|_| AcquireError::MuxFailed(format!("ffmpeg exceeded {:?}", self.timeout)))?
        .map_err(|e| {
            AcquireError::MuxFailed(format!(
                "failed to run {}: {e}",
                self.ffmpeg_path.display()
            ))
        })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            let tail: String = stderr
                .lines()
                .rev()
                .take(5)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect::<Vec<_>>()
                .join("\n");
            return Err(AcquireError::MuxFailed(format!(
                "ffmpeg exited with {}: {tail}",
                result.status
            )));
        }

        info!("Muxed {} into {}", video.display(), output.display());
        Ok(())
    }
}

/// ffmpeg argument list for a copy-mode merge
fn merge_args(video: &Path, audio: &Path, output: &Path) -> Vec<OsString> {
    vec![
        OsString::from("-y"),
        OsString::from("-i"),
        video.as_os_str().to_os_string(),
        OsString::from("-i"),
        audio.as_os_str().to_os_string(),
        OsString::from("-c"),
        OsString::from("copy"),
        OsString::from("-loglevel"),
        OsString::from("error"),
        output.as_os_str().to_os_string(),
    ]
}

/// Remove leftover intermediate stream files for `stem` in `dir`.
///
/// Intermediates are named `{stem}_video.{ext}` and `{stem}_audio.{ext}`;
/// the extension varies with what the CDN served.
pub async fn cleanup_intermediates(dir: &Path, stem: &str) {
    let video_prefix = format!("{stem}_video.");
    let audio_prefix = format!("{stem}_audio.");

    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Could not scan {} for intermediates: {}", dir.display(), e);
            return;
        }
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with(&video_prefix) || name.starts_with(&audio_prefix) {
            debug!("Removing intermediate {}", name);
            if let Err(e) = tokio::fs::remove_file(entry.path()).await {
                warn!("Could not remove intermediate {}: {}", name, e);
            }
        }
    }
}
