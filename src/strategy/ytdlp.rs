//! Acquisition through the external `yt-dlp` binary.
//!
//! Cheapest strategy, tried first. Runs a small format waterfall per
//! URL: the progressive itag 18 for YouTube, then a merged
//! bestvideo+bestaudio, then plain best. Falls back from the received
//! URL to the canonical watch URL when the first form fails.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::core::{AcquisitionRequest, OutputTarget, Platform};
use crate::download::MIN_VALID_SIZE;
use crate::error::AcquireError;
use crate::strategy::Strategy;
use crate::utils::watch_url;
use crate::Result;

/// Containers yt-dlp may leave behind when mp4 was not available
const ALTERNATE_EXTENSIONS: &[&str] = &["webm", "mkv", "m4a", "mov"];

pub struct YtdlpStrategy {
    binary: PathBuf,
    cookie_file: Option<PathBuf>,
    timeout: Duration,
}

impl YtdlpStrategy {
    pub fn new(binary: PathBuf, cookie_file: Option<PathBuf>, timeout: Duration) -> Self {
        Self {
            binary,
            cookie_file,
            timeout,
        }
    }

    /// Format selectors tried in order for one URL
    fn format_waterfall(platform: Platform) -> Vec<Vec<&'static str>> {
        let mut formats = Vec::new();
        if platform == Platform::YouTube {
            formats.push(vec!["-f", "18"]);
        }
        formats.push(vec![
            "-f",
            "bestvideo+bestaudio",
            "--merge-output-format",
            "mp4",
        ]);
        formats.push(vec!["-f", "best"]);
        formats
    }

    async fn run_once(
        &self,
        url: &str,
        format_args: &[&str],
        request: &AcquisitionRequest,
        target: &OutputTarget,
    ) -> Result<PathBuf> {
        let template = target.dir.join(format!("{}.%(ext)s", target.stem()));
        let referer = match request.platform {
            Platform::YouTube => "https://www.youtube.com/",
            Platform::TikTok => "https://www.tiktok.com/",
        };

        let mut command = Command::new(&self.binary);
        command
            .arg(url)
            .args(format_args)
            .arg("--no-playlist")
            .arg("--no-warnings")
            .arg("--referer")
            .arg(referer)
            .arg("-o")
            .arg(&template);
        if request.platform == Platform::YouTube {
            command
                .arg("--extractor-args")
                .arg("youtube:player_client=android,web");
        }
        if let Some(cookies) = &self.cookie_file {
            if cookies.is_file() {
                command.arg("--cookies").arg(cookies);
            }
        }

        debug!("yt-dlp {} with format {:?}", url, format_args);
        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| AcquireError::Timeout(format!("yt-dlp exceeded {:?}", self.timeout)))?
            .map_err(|e| AcquireError::DownloadFailed(format!("cannot run yt-dlp: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail = stderr.lines().last().unwrap_or("no output").to_string();
            return Err(AcquireError::DownloadFailed(format!(
                "yt-dlp exited with {}: {tail}",
                output.status
            )));
        }

        self.claim_output(target).await
    }

    /// Find what yt-dlp actually wrote and settle it at the target path
    async fn claim_output(&self, target: &OutputTarget) -> Result<PathBuf> {
        let final_path = target.path();
        if valid_file(&final_path).await {
            return Ok(final_path);
        }
        for ext in ALTERNATE_EXTENSIONS {
            let alternate = target.dir.join(format!("{}.{ext}", target.stem()));
            if valid_file(&alternate).await {
                debug!(
                    "Renaming alternate container {} to {}",
                    alternate.display(),
                    final_path.display()
                );
                tokio::fs::rename(&alternate, &final_path).await?;
                return Ok(final_path);
            }
        }
        Err(AcquireError::DownloadFailed(
            "yt-dlp reported success but produced no valid file".to_string(),
        ))
    }
}

async fn valid_file(path: &Path) -> bool {
    matches!(tokio::fs::metadata(path).await, Ok(meta) if meta.is_file() && meta.len() > MIN_VALID_SIZE)
}

#[async_trait]
impl Strategy for YtdlpStrategy {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn run(&self, request: &AcquisitionRequest, target: &OutputTarget) -> Result<PathBuf> {
        let canonical = watch_url(request.platform, &request.external_id);
        let mut urls = vec![request.source_url.as_str()];
        if canonical != request.source_url {
            urls.push(canonical.as_str());
        }

        let mut last_error = None;
        for url in urls {
            for format_args in Self::format_waterfall(request.platform) {
                match self.run_once(url, &format_args, request, target).await {
                    Ok(path) => {
                        info!("yt-dlp acquired {}", path.display());
                        return Ok(path);
                    }
                    Err(e) => {
                        warn!("yt-dlp attempt failed ({:?} on {}): {}", format_args, url, e);
                        last_error = Some(e);
                    }
                }
            }
        }
        Err(last_error.unwrap_or_else(|| {
            AcquireError::DownloadFailed("yt-dlp made no attempts".to_string())
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_waterfall_youtube_starts_progressive() {
        let formats = YtdlpStrategy::format_waterfall(Platform::YouTube);
        assert_eq!(formats[0], vec!["-f", "18"]);
        assert_eq!(formats.last().unwrap(), &vec!["-f", "best"]);
        assert_eq!(formats.len(), 3);
    }

    #[test]
    fn test_format_waterfall_tiktok_skips_itag() {
        let formats = YtdlpStrategy::format_waterfall(Platform::TikTok);
        assert_eq!(formats.len(), 2);
        assert!(formats.iter().all(|f| !f.contains(&"18")));
    }

    #[tokio::test]
    async fn test_missing_binary_surfaces_as_download_failed() {
        let dir = tempfile::tempdir().unwrap();
        let strategy = YtdlpStrategy::new(
            PathBuf::from("/nonexistent/yt-dlp"),
            None,
            Duration::from_secs(5),
        );
        let request = AcquisitionRequest::new(
            "https://www.youtube.com/watch?v=abc",
            Platform::YouTube,
            "abc",
        );
        let target = OutputTarget::resolve(dir.path(), &request);
        std::fs::create_dir_all(&target.dir).unwrap();
        let result = strategy.run(&request, &target).await;
        assert!(matches!(result, Err(AcquireError::DownloadFailed(_))));
    }

    #[tokio::test]
    async fn test_claim_output_renames_alternate_container() {
        let dir = tempfile::tempdir().unwrap();
        let request = AcquisitionRequest::new(
            "https://www.youtube.com/watch?v=abc",
            Platform::YouTube,
            "abc",
        );
        let target = OutputTarget::resolve(dir.path(), &request);
        std::fs::create_dir_all(&target.dir).unwrap();
        let webm = target.dir.join("abc.webm");
        std::fs::write(&webm, vec![0u8; 4096]).unwrap();

        let strategy =
            YtdlpStrategy::new(PathBuf::from("yt-dlp"), None, Duration::from_secs(5));
        let claimed = strategy.claim_output(&target).await.unwrap();
        assert_eq!(claimed, target.path());
        assert!(target.path().exists());
        assert!(!webm.exists());
    }

    #[tokio::test]
    async fn test_claim_output_rejects_tiny_file() {
        let dir = tempfile::tempdir().unwrap();
        let request = AcquisitionRequest::new(
            "https://www.youtube.com/watch?v=abc",
            Platform::YouTube,
            "abc",
        );
        let target = OutputTarget::resolve(dir.path(), &request);
        std::fs::create_dir_all(&target.dir).unwrap();
        std::fs::write(target.path(), b"stub").unwrap();

        let strategy =
            YtdlpStrategy::new(PathBuf::from("yt-dlp"), None, Duration::from_secs(5));
        assert!(strategy.claim_output(&target).await.is_err());
    }
}
