//! Acquisition through a Cobalt API instance.
//!
//! Last-resort strategy, only built when an endpoint is configured.
//! Cobalt answers in several shapes depending on version and source;
//! all known ones are tolerated: a direct `url`, a `picker` list
//! (mp4/video entries preferred), or an `error`/`text` pair.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::core::{AcquisitionRequest, OutputTarget};
use crate::download::MIN_VALID_SIZE;
use crate::error::AcquireError;
use crate::strategy::Strategy;
use crate::Result;

pub struct CobaltStrategy {
    endpoint: String,
    client: reqwest::Client,
}

impl CobaltStrategy {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    async fn request_stream_url(&self, source_url: &str) -> Result<String> {
        let api = format!("{}/api/json", self.endpoint);
        debug!("Cobalt request to {}", api);
        let response = self
            .client
            .post(&api)
            .header("Accept", "application/json")
            .json(&json!({
                "url": source_url,
                "videoQuality": "720",
                "filenameStyle": "basic",
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AcquireError::DownloadFailed(format!(
                "Cobalt answered {}",
                response.status()
            )));
        }
        let body: Value = response.json().await?;
        resolve_stream_url(&body)
    }

    async fn stream_to_file(&self, url: &str, dest: &Path) -> Result<u64> {
        let tmp_path = dest.with_extension("tmp");
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(AcquireError::DownloadFailed(format!(
                "Cobalt stream answered {}",
                response.status()
            )));
        }

        let mut file = tokio::fs::File::create(&tmp_path).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        drop(file);

        if written < MIN_VALID_SIZE {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(AcquireError::DownloadFailed(format!(
                "Cobalt stream was {written} bytes, expected at least {MIN_VALID_SIZE}"
            )));
        }
        tokio::fs::rename(&tmp_path, dest).await?;
        Ok(written)
    }
}

/// Pull the media URL out of whichever response shape this instance uses
fn resolve_stream_url(body: &Value) -> Result<String> {
    if body["status"] == "error" {
        let text = body["text"].as_str().unwrap_or("unspecified error");
        return Err(AcquireError::DownloadFailed(format!("Cobalt error: {text}")));
    }

    if let Some(url) = body["url"].as_str() {
        return Ok(url.to_string());
    }

    if let Some(picker) = body["picker"].as_array() {
        // Prefer an explicit video entry, then anything that looks like mp4
        let preferred = picker
            .iter()
            .find(|entry| entry["type"] == "video")
            .or_else(|| {
                picker
                    .iter()
                    .find(|entry| entry["url"].as_str().is_some_and(|u| u.contains(".mp4")))
            })
            .or_else(|| picker.first());
        if let Some(url) = preferred.and_then(|entry| entry["url"].as_str()) {
            return Ok(url.to_string());
        }
    }

    Err(AcquireError::DownloadFailed(
        "Cobalt response carried no stream URL".to_string(),
    ))
}

#[async_trait]
impl Strategy for CobaltStrategy {
    fn name(&self) -> &'static str {
        "cobalt"
    }

    async fn run(&self, request: &AcquisitionRequest, target: &OutputTarget) -> Result<PathBuf> {
        let stream_url = self.request_stream_url(&request.source_url).await?;
        debug!("Cobalt resolved stream URL");

        let final_path = target.path();
        match self.stream_to_file(&stream_url, &final_path).await {
            Ok(size) => {
                info!("Cobalt acquired {} ({} bytes)", final_path.display(), size);
                Ok(final_path)
            }
            Err(e) => {
                warn!("Cobalt stream download failed: {}", e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Platform;

    #[test]
    fn test_resolve_direct_url_shape() {
        let body = json!({"status": "stream", "url": "https://c.example/stream.mp4"});
        assert_eq!(
            resolve_stream_url(&body).unwrap(),
            "https://c.example/stream.mp4"
        );
    }

    #[test]
    fn test_resolve_picker_prefers_video_entry() {
        let body = json!({
            "status": "picker",
            "picker": [
                {"type": "photo", "url": "https://c.example/a.jpg"},
                {"type": "video", "url": "https://c.example/b.mp4"},
            ],
        });
        assert_eq!(resolve_stream_url(&body).unwrap(), "https://c.example/b.mp4");
    }

    #[test]
    fn test_resolve_error_shape() {
        let body = json!({"status": "error", "text": "rate limited"});
        let err = resolve_stream_url(&body).unwrap_err();
        assert!(err.to_string().contains("rate limited"));
    }

    #[test]
    fn test_resolve_empty_response() {
        assert!(resolve_stream_url(&json!({})).is_err());
    }

    #[tokio::test]
    async fn test_full_cobalt_flow_against_mock() {
        let mut server = mockito::Server::new_async().await;
        let stream_body = vec![7u8; 8192];
        let api_mock = server
            .mock("POST", "/api/json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(format!(
                r#"{{"status":"stream","url":"{}/media/clip.mp4"}}"#,
                server.url()
            ))
            .create_async()
            .await;
        let media_mock = server
            .mock("GET", "/media/clip.mp4")
            .with_status(200)
            .with_body(&stream_body)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let request = AcquisitionRequest::new(
            "https://www.tiktok.com/@u/video/1",
            Platform::TikTok,
            "1",
        );
        let target = OutputTarget::resolve(dir.path(), &request);
        std::fs::create_dir_all(&target.dir).unwrap();

        let strategy = CobaltStrategy::new(server.url()).unwrap();
        let path = strategy.run(&request, &target).await.unwrap();

        api_mock.assert_async().await;
        media_mock.assert_async().await;
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 8192);
    }

    #[tokio::test]
    async fn test_tiny_cobalt_stream_is_rejected() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(format!(
                r#"{{"status":"stream","url":"{}/media/clip.mp4"}}"#,
                server.url()
            ))
            .create_async()
            .await;
        server
            .mock("GET", "/media/clip.mp4")
            .with_status(200)
            .with_body("nope")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let request = AcquisitionRequest::new(
            "https://www.tiktok.com/@u/video/1",
            Platform::TikTok,
            "1",
        );
        let target = OutputTarget::resolve(dir.path(), &request);
        std::fs::create_dir_all(&target.dir).unwrap();

        let strategy = CobaltStrategy::new(server.url()).unwrap();
        let result = strategy.run(&request, &target).await;
        assert!(matches!(result, Err(AcquireError::DownloadFailed(_))));
        assert!(!target.path().exists());
        assert!(!target.path().with_extension("tmp").exists());
    }
}
