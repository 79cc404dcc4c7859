//! Authenticated streaming download of a single CDN stream.
//!
//! The request replays the browser's identity: its cookies, its user
//! agent, and Referer/Origin from the platform the stream was captured
//! on. CDNs tie stream URLs to that identity and answer 403 otherwise.

use std::path::Path;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::browser::stealth::USER_AGENT;
use crate::cookies::CookieJar;
use crate::error::AcquireError;
use crate::extract::CdnProfile;
use crate::Result;

/// Smallest payload accepted as a real media stream. CDNs answer
/// denials with tiny HTML or JSON bodies on a 200.
pub const MIN_VALID_SIZE: u64 = 1000;

/// Streaming downloader configuration
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    pub connect_timeout: Duration,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
        }
    }
}

/// Downloads captured stream URLs with the capturing session's identity
pub struct StreamDownloader {
    client: reqwest::Client,
}

impl StreamDownloader {
    pub fn new() -> Result<Self> {
        Self::with_config(DownloadConfig::default())
    }

    pub fn with_config(config: DownloadConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(config.connect_timeout)
            .build()?;
        Ok(Self { client })
    }

    /// Download `url` to `dest`, authenticating as the capturing session.
    ///
    /// One attempt per call; a URL that fails is dead and the caller
    /// moves on to the next candidate. Writes through a `.part` temp
    /// file renamed into place only after the size check passes, so
    /// `dest` never holds a denial body. Returns the byte count.
    pub async fn download(
        &self,
        url: &str,
        jar: &CookieJar,
        profile: &CdnProfile,
        dest: &Path,
    ) -> Result<u64> {
        let tmp_path = dest.with_extension("part");

        let outcome = match self.fetch_to_file(url, jar, profile, &tmp_path).await {
            Ok(size) if size >= MIN_VALID_SIZE => {
                tokio::fs::rename(&tmp_path, dest).await?;
                info!("Downloaded {} bytes to {}", size, dest.display());
                return Ok(size);
            }
            Ok(size) => {
                warn!("Stream body too small ({} bytes), treating as denial", size);
                AcquireError::DownloadFailed(format!(
                    "stream body was {size} bytes, expected at least {MIN_VALID_SIZE}"
                ))
            }
            Err(e) => e,
        };

        let _ = tokio::fs::remove_file(&tmp_path).await;
        Err(outcome)
    }

    async fn fetch_to_file(
        &self,
        url: &str,
        jar: &CookieJar,
        profile: &CdnProfile,
        tmp_path: &Path,
    ) -> Result<u64> {
        let mut request = self
            .client
            .get(url)
            .header("Referer", format!("{}/", profile.page_origin))
            .header("Origin", profile.page_origin)
            .header("Accept", "*/*")
            .header("Accept-Language", crate::browser::stealth::ACCEPT_LANGUAGE);
        if let Some(header) = jar.header_for(url) {
            request = request.header("Cookie", header);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.as_u16() == 403 {
            return Err(AcquireError::Blocked(format!(
                "CDN rejected the session identity for {url}"
            )));
        }
        if !status.is_success() {
            return Err(AcquireError::DownloadFailed(format!(
                "unexpected status {status} from stream URL"
            )));
        }

        let mut file = File::create(tmp_path).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        file.sync_all().await?;
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cookies::Cookie;

    fn jar_with(domain: &str, name: &str, value: &str) -> CookieJar {
        let mut jar = CookieJar::new();
        jar.insert(Cookie {
            domain: domain.to_string(),
            include_subdomains: true,
            path: "/".to_string(),
            secure: false,
            expiry: None,
            name: name.to_string(),
            value: value.to_string(),
        });
        jar
    }

    #[tokio::test]
    async fn test_download_writes_file_and_reports_size() {
        let mut server = mockito::Server::new_async().await;
        let body = vec![0xABu8; 4096];
        let mock = server
            .mock("GET", "/videoplayback")
            .with_status(200)
            .with_body(&body)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("clip.mp4");
        let downloader = StreamDownloader::new().unwrap();
        let url = format!("{}/videoplayback", server.url());
        let size = downloader
            .download(&url, &CookieJar::new(), &CdnProfile::youtube(), &dest)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(size, 4096);
        assert_eq!(std::fs::metadata(&dest).unwrap().len(), 4096);
        assert!(!dest.with_extension("part").exists());
    }

    #[tokio::test]
    async fn test_tiny_body_is_rejected_as_denial() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/videoplayback")
            .with_status(200)
            .with_body("denied")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("clip.mp4");
        let downloader = StreamDownloader::new().unwrap();
        let url = format!("{}/videoplayback", server.url());
        let result = downloader
            .download(&url, &CookieJar::new(), &CdnProfile::youtube(), &dest)
            .await;

        assert!(matches!(result, Err(AcquireError::DownloadFailed(_))));
        assert!(!dest.exists());
        assert!(!dest.with_extension("part").exists());
    }

    #[tokio::test]
    async fn test_failed_url_is_fetched_exactly_once() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/videoplayback")
            .with_status(500)
            .expect(1)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("clip.mp4");
        let downloader = StreamDownloader::new().unwrap();
        let url = format!("{}/videoplayback", server.url());
        let result = downloader
            .download(&url, &CookieJar::new(), &CdnProfile::youtube(), &dest)
            .await;

        assert!(result.is_err());
        // Dead URLs stay dead; trying candidates again is the caller's call
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_cookies_and_referer_are_replayed() {
        let mut server = mockito::Server::new_async().await;
        let body = vec![0u8; 2048];
        let mock = server
            .mock("GET", "/videoplayback")
            .match_header("cookie", "session=tok123")
            .match_header("referer", "https://www.youtube.com/")
            .with_status(200)
            .with_body(&body)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("clip.mp4");
        let downloader = StreamDownloader::new().unwrap();
        let url = format!("{}/videoplayback", server.url());
        let jar = jar_with("127.0.0.1", "session", "tok123");
        downloader
            .download(&url, &jar, &CdnProfile::youtube(), &dest)
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_forbidden_maps_to_blocked() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/videoplayback")
            .with_status(403)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("clip.mp4");
        let downloader = StreamDownloader::new().unwrap();
        let url = format!("{}/videoplayback", server.url());
        let result = downloader
            .download(&url, &CookieJar::new(), &CdnProfile::youtube(), &dest)
            .await;

        assert!(matches!(result, Err(AcquireError::Blocked(_))));
    }
}
