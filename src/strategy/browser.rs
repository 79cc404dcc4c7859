//! Acquisition through a real browser session.
//!
//! Pipeline: CDP session captures network traffic, DOM, and cookies;
//! the extractor reconstructs direct CDN stream candidates; the
//! downloader replays the session identity against each candidate.
//! Muxed candidates land directly at the target; video-only candidates
//! are paired with the best audio candidate and merged with ffmpeg.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::browser::{BrowserSession, SessionConfig};
use crate::cookies::{CookieJar, CookieStore};
use crate::core::{AcquisitionRequest, OutputTarget, Platform};
use crate::download::{cleanup_intermediates, DownloadConfig, Muxer, StreamDownloader};
use crate::error::AcquireError;
use crate::extract::{extract_candidates, CdnProfile, StreamCandidate, StreamKind};
use crate::strategy::Strategy;
use crate::Result;

pub struct BrowserStrategy {
    session_config: SessionConfig,
    download_config: DownloadConfig,
    cookie_file: Option<PathBuf>,
    ffmpeg: Option<PathBuf>,
}

impl BrowserStrategy {
    pub fn new(
        session_config: SessionConfig,
        download_config: DownloadConfig,
        cookie_file: Option<PathBuf>,
        ffmpeg: Option<PathBuf>,
    ) -> Self {
        Self {
            session_config,
            download_config,
            cookie_file,
            ffmpeg,
        }
    }

    fn profile(platform: Platform) -> CdnProfile {
        match platform {
            Platform::YouTube => CdnProfile::youtube(),
            Platform::TikTok => CdnProfile::tiktok(),
        }
    }

    fn seed_jar(&self) -> CookieJar {
        let Some(path) = &self.cookie_file else {
            return CookieJar::new();
        };
        match CookieStore::new(path).load() {
            Ok(jar) => jar,
            Err(e) => {
                warn!("Could not load cookie file {}: {}", path.display(), e);
                CookieJar::new()
            }
        }
    }

    /// Walk the candidate list in order until one lands on disk.
    /// Audio-only candidates are mux inputs, not outputs, so they are
    /// skipped; a muxed candidate still gets its turn even when every
    /// split-stream pair before it failed.
    async fn acquire_from_candidates(
        &self,
        candidates: &[StreamCandidate],
        jar: &CookieJar,
        profile: &CdnProfile,
        target: &OutputTarget,
    ) -> Result<PathBuf> {
        let downloader = StreamDownloader::with_config(self.download_config.clone())?;
        let mut last_error = None;
        for candidate in candidates {
            if candidate.kind == StreamKind::Audio {
                continue;
            }
            debug!("Trying {:?} candidate from {:?}", candidate.kind, candidate.source);
            match self
                .acquire_candidate(candidate, candidates, jar, profile, target, &downloader)
                .await
            {
                Ok(path) => return Ok(path),
                Err(e) => {
                    warn!("Candidate failed: {}", e);
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or(AcquireError::NoCandidateFound))
    }

    /// Download one candidate to its final place. Muxed streams go
    /// straight to the target; video-only streams get the best audio
    /// candidate merged in.
    async fn acquire_candidate(
        &self,
        candidate: &StreamCandidate,
        candidates: &[StreamCandidate],
        jar: &CookieJar,
        profile: &CdnProfile,
        target: &OutputTarget,
        downloader: &StreamDownloader,
    ) -> Result<PathBuf> {
        let final_path = target.path();
        match candidate.kind {
            StreamKind::Muxed => {
                downloader
                    .download(&candidate.url, jar, profile, &final_path)
                    .await?;
                Ok(final_path)
            }
            StreamKind::Video => {
                let Some(ffmpeg) = &self.ffmpeg else {
                    return Err(AcquireError::MuxFailed(
                        "ffmpeg not available for split streams".to_string(),
                    ));
                };
                let audio = best_audio(candidates).ok_or(AcquireError::NoCandidateFound)?;

                let video_path = target.dir.join(format!("{}_video.mp4", target.stem()));
                let audio_path = target.dir.join(format!("{}_audio.m4a", target.stem()));
                downloader
                    .download(&candidate.url, jar, profile, &video_path)
                    .await?;
                downloader
                    .download(&audio.url, jar, profile, &audio_path)
                    .await?;

                let merge = Muxer::new(ffmpeg)
                    .merge(&video_path, &audio_path, &final_path)
                    .await;
                cleanup_intermediates(&target.dir, target.stem()).await;
                merge?;
                Ok(final_path)
            }
            // An audio stream alone is never the requested output
            StreamKind::Audio => Err(AcquireError::NoCandidateFound),
        }
    }
}

/// Highest-quality audio candidate, if any
fn best_audio(candidates: &[StreamCandidate]) -> Option<&StreamCandidate> {
    candidates
        .iter()
        .filter(|c| c.kind == StreamKind::Audio)
        .max_by_key(|c| c.quality_hint.unwrap_or(0))
}

#[async_trait]
impl Strategy for BrowserStrategy {
    fn name(&self) -> &'static str {
        "browser"
    }

    async fn run(&self, request: &AcquisitionRequest, target: &OutputTarget) -> Result<PathBuf> {
        let profile = Self::profile(request.platform);
        let seed = self.seed_jar();

        let session = BrowserSession::new(self.session_config.clone());
        let capture = session.run(&request.source_url, &seed, &profile).await?;

        // A session that got through is worth remembering
        if let Some(path) = &self.cookie_file {
            if let Err(e) = CookieStore::new(path).merge_and_save(&capture.cookies) {
                warn!("Could not persist session cookies: {}", e);
            }
        }

        let candidates = extract_candidates(&capture.html, &capture.events, &profile);
        if candidates.is_empty() {
            return Err(AcquireError::NoCandidateFound);
        }
        info!("Extracted {} stream candidates", candidates.len());

        let path = self
            .acquire_from_candidates(&candidates, &capture.cookies, &profile, target)
            .await?;
        info!("Browser strategy acquired {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::CandidateSource;

    fn candidate(kind: StreamKind, quality: Option<u32>, url: &str) -> StreamCandidate {
        StreamCandidate {
            url: url.to_string(),
            kind,
            quality_hint: quality,
            source: CandidateSource::NetworkLog,
        }
    }

    #[test]
    fn test_best_audio_prefers_higher_quality() {
        let candidates = vec![
            candidate(StreamKind::Audio, Some(140), "https://cdn/a140"),
            candidate(StreamKind::Audio, Some(251), "https://cdn/a251"),
            candidate(StreamKind::Video, Some(22), "https://cdn/v"),
        ];
        assert_eq!(best_audio(&candidates).unwrap().url, "https://cdn/a251");
    }

    #[test]
    fn test_best_audio_none_without_audio_streams() {
        let candidates = vec![candidate(StreamKind::Video, None, "https://cdn/v")];
        assert!(best_audio(&candidates).is_none());
    }

    #[test]
    fn test_profile_selection() {
        assert_eq!(
            BrowserStrategy::profile(Platform::YouTube).host_marker,
            "googlevideo.com"
        );
        assert_eq!(
            BrowserStrategy::profile(Platform::TikTok).page_origin,
            "https://www.tiktok.com"
        );
    }

    #[tokio::test]
    async fn test_muxed_candidate_attempted_when_split_streams_unusable() {
        let mut server = mockito::Server::new_async().await;
        let body = vec![0x42u8; 4096];
        let muxed = server
            .mock("GET", "/muxed")
            .with_status(200)
            .with_body(&body)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let target = OutputTarget {
            dir: dir.path().to_path_buf(),
            filename: "clip.mp4".to_string(),
        };
        // No ffmpeg, so the video-only candidate cannot be merged
        let strategy = BrowserStrategy::new(
            SessionConfig::default(),
            DownloadConfig::default(),
            None,
            None,
        );
        let candidates = vec![
            candidate(StreamKind::Video, Some(22), "https://cdn/video-only"),
            candidate(StreamKind::Muxed, Some(18), &format!("{}/muxed", server.url())),
        ];

        let path = strategy
            .acquire_from_candidates(
                &candidates,
                &CookieJar::new(),
                &CdnProfile::youtube(),
                &target,
            )
            .await
            .unwrap();

        muxed.assert_async().await;
        assert_eq!(path, target.path());
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 4096);
    }

    #[tokio::test]
    async fn test_failed_pass_leaves_no_intermediates() {
        let mut server = mockito::Server::new_async().await;
        let body = vec![0x42u8; 4096];
        server
            .mock("GET", "/video")
            .with_status(200)
            .with_body(&body)
            .create_async()
            .await;
        server
            .mock("GET", "/audio")
            .with_status(200)
            .with_body(&body)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let target = OutputTarget {
            dir: dir.path().to_path_buf(),
            filename: "clip.mp4".to_string(),
        };
        // ffmpeg path that cannot run, so the merge step fails
        let strategy = BrowserStrategy::new(
            SessionConfig::default(),
            DownloadConfig::default(),
            None,
            Some(PathBuf::from("/nonexistent/ffmpeg")),
        );
        let candidates = vec![
            candidate(StreamKind::Video, Some(137), &format!("{}/video", server.url())),
            candidate(StreamKind::Audio, Some(140), &format!("{}/audio", server.url())),
        ];

        let result = strategy
            .acquire_from_candidates(
                &candidates,
                &CookieJar::new(),
                &CdnProfile::youtube(),
                &target,
            )
            .await;

        assert!(result.is_err());
        assert!(!target.path().exists());
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| name.contains("_video") || name.contains("_audio"))
            .collect();
        assert!(leftovers.is_empty(), "intermediates left behind: {leftovers:?}");
    }

    #[test]
    fn test_missing_cookie_file_yields_empty_seed() {
        let strategy = BrowserStrategy::new(
            SessionConfig::default(),
            DownloadConfig::default(),
            Some(PathBuf::from("/nonexistent/cookies.txt")),
            None,
        );
        assert!(strategy.seed_jar().is_empty());
    }
}
