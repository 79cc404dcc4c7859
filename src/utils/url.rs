//! URL utilities for platform detection and video-ID extraction

use crate::core::Platform;
use crate::error::AcquireError;
use url::Url;

/// Detect the platform from a video URL
pub fn detect_platform(raw: &str) -> Result<Platform, AcquireError> {
    let parsed = Url::parse(raw)?;
    match parsed.host_str() {
        Some("youtu.be") | Some("youtube.com") | Some("www.youtube.com")
        | Some("m.youtube.com") => Ok(Platform::YouTube),
        Some(host) if host == "tiktok.com" || host.ends_with(".tiktok.com") => {
            Ok(Platform::TikTok)
        }
        Some(host) => Err(AcquireError::InvalidInput(format!(
            "Unsupported platform host: {host}"
        ))),
        None => Err(AcquireError::InvalidInput("URL has no host".to_string())),
    }
}

/// Extract the external video ID from a platform URL
pub fn extract_video_id(raw: &str) -> Result<String, AcquireError> {
    let parsed = Url::parse(raw)?;

    match parsed.host_str() {
        Some("youtu.be") => {
            let id = parsed.path().trim_start_matches('/');
            if id.is_empty() {
                return Err(AcquireError::InvalidInput("Missing video ID".to_string()));
            }
            Ok(id.to_string())
        }
        Some("youtube.com") | Some("www.youtube.com") | Some("m.youtube.com") => {
            if parsed.path().starts_with("/watch") {
                parsed
                    .query_pairs()
                    .find(|(key, _)| key == "v")
                    .map(|(_, value)| value.to_string())
                    .ok_or_else(|| AcquireError::InvalidInput("Missing v parameter".to_string()))
            } else if let Some(id) = parsed.path().strip_prefix("/shorts/") {
                let id = id.trim_end_matches('/');
                if id.is_empty() {
                    return Err(AcquireError::InvalidInput(
                        "Missing video ID in shorts path".to_string(),
                    ));
                }
                Ok(id.to_string())
            } else {
                Err(AcquireError::InvalidInput(
                    "Unsupported video URL format".to_string(),
                ))
            }
        }
        Some(host) if host == "tiktok.com" || host.ends_with(".tiktok.com") => {
            // https://www.tiktok.com/@user/video/7301234567890123456
            let segments: Vec<&str> = parsed
                .path_segments()
                .map(|s| s.collect())
                .unwrap_or_default();
            match segments.as_slice() {
                [_user, kind, id, ..] if *kind == "video" && !id.is_empty() => {
                    Ok((*id).to_string())
                }
                _ => Err(AcquireError::InvalidInput(
                    "Unsupported TikTok URL format".to_string(),
                )),
            }
        }
        _ => Err(AcquireError::InvalidInput(
            "Not a supported video platform URL".to_string(),
        )),
    }
}

/// Canonical watch URL derived from a video ID.
/// Used as a fallback when the received URL form (e.g. /shorts/) fails.
pub fn watch_url(platform: Platform, external_id: &str) -> String {
    match platform {
        Platform::YouTube => format!("https://www.youtube.com/watch?v={external_id}"),
        Platform::TikTok => format!("https://www.tiktok.com/@_/video/{external_id}"),
    }
}
