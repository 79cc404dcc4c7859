//! Pure extraction of direct CDN stream URLs from a captured browser
//! session: the network event log plus the final DOM snapshot.
//!
//! No I/O happens here; the browser session hands over everything it saw
//! and this module decides which URLs are worth trying to download.

use regex::Regex;
use serde_json::Value;
use tracing::debug;
use url::Url;

/// Quality identifiers known to be audio-only streams.
/// Everything else with a media marker defaults to video.
const AUDIO_ITAGS: &[u32] = &[139, 140, 141, 171, 249, 250, 251];

/// Progressive (video+audio in one container) quality identifiers.
const MUXED_ITAGS: &[u32] = &[18, 22, 37, 38, 43, 44, 45, 46];

/// Which capture source produced a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateSource {
    /// Observed on the wire while the page played — already known-valid
    NetworkLog,
    /// Parsed out of player-configuration JSON embedded in the DOM
    DomJson,
}

/// Stream payload kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Video,
    Audio,
    Muxed,
}

/// A possible direct media URL, not yet confirmed downloadable
#[derive(Debug, Clone)]
pub struct StreamCandidate {
    pub url: String,
    pub kind: StreamKind,
    pub quality_hint: Option<u32>,
    pub source: CandidateSource,
}

/// Request/response side of a captured network event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventPhase {
    Request,
    Response,
}

/// One captured network event, reduced to what extraction needs
#[derive(Debug, Clone)]
pub struct NetworkEvent {
    pub url: String,
    pub mime_type: Option<String>,
    pub phase: EventPhase,
}

/// Platform-specific CDN markers used to filter captured traffic
#[derive(Debug, Clone)]
pub struct CdnProfile {
    /// Substring the CDN host must contain
    pub host_marker: &'static str,
    /// Substring the stream path must contain
    pub path_marker: &'static str,
    /// Referer/Origin base replayed on authenticated downloads
    pub page_origin: &'static str,
}

impl CdnProfile {
    pub fn youtube() -> Self {
        Self {
            host_marker: "googlevideo.com",
            path_marker: "videoplayback",
            page_origin: "https://www.youtube.com",
        }
    }

    pub fn tiktok() -> Self {
        Self {
            host_marker: "tiktokcdn",
            path_marker: "/video/",
            page_origin: "https://www.tiktok.com",
        }
    }

    pub fn matches(&self, url: &str) -> bool {
        url.contains(self.host_marker) && url.contains(self.path_marker)
    }
}

/// Extract candidates from both sources and merge them, network-observed
/// URLs first (they are already known-valid), deduplicated by exact URL.
pub fn extract_candidates(
    html: &str,
    events: &[NetworkEvent],
    profile: &CdnProfile,
) -> Vec<StreamCandidate> {
    let mut merged = from_network_events(events, profile);
    let dom = from_embedded_json(html, profile);

    for candidate in dom {
        if !merged.iter().any(|c| c.url == candidate.url) {
            merged.push(candidate);
        }
    }

    debug!(
        "Extracted {} candidates ({} video, {} audio, {} muxed)",
        merged.len(),
        merged.iter().filter(|c| c.kind == StreamKind::Video).count(),
        merged.iter().filter(|c| c.kind == StreamKind::Audio).count(),
        merged.iter().filter(|c| c.kind == StreamKind::Muxed).count(),
    );
    merged
}

/// Candidates observed on the wire, filtered to the CDN profile
fn from_network_events(events: &[NetworkEvent], profile: &CdnProfile) -> Vec<StreamCandidate> {
    let mut out: Vec<StreamCandidate> = Vec::new();
    for event in events {
        if !profile.matches(&event.url) {
            continue;
        }
        let itag = itag_of(&event.url);
        let kind = classify(itag, event.mime_type.as_deref(), &event.url);
        let Some(kind) = kind else { continue };
        if out.iter().any(|c| c.url == event.url) {
            continue;
        }
        out.push(StreamCandidate {
            url: event.url.clone(),
            kind,
            quality_hint: itag,
            source: CandidateSource::NetworkLog,
        });
    }
    out
}

/// Ordered marker patterns for the embedded player-configuration JSON.
/// The host page renames these over time, so each is tried in turn.
const PLAYER_JSON_MARKERS: &[&str] = &[
    r"var ytInitialPlayerResponse\s*=\s*",
    r"ytInitialPlayerResponse\s*=\s*",
    r#""playerResponse"\s*:\s*"#,
];

/// Candidates parsed out of player JSON embedded in the DOM snapshot
fn from_embedded_json(html: &str, profile: &CdnProfile) -> Vec<StreamCandidate> {
    let Some(player) = locate_player_json(html) else {
        return Vec::new();
    };

    let streaming = &player["streamingData"];
    let mut out = Vec::new();
    for list in ["formats", "adaptiveFormats"] {
        let Some(entries) = streaming[list].as_array() else {
            continue;
        };
        for entry in entries {
            // A cipher-protected entry has no direct URL; deciphering is
            // out of scope, so it is discarded rather than guessed at.
            let Some(url) = entry["url"].as_str() else {
                if entry["signatureCipher"].is_string() || entry["cipher"].is_string() {
                    debug!("Discarding cipher-protected format entry");
                }
                continue;
            };
            if !url.contains(profile.host_marker) {
                continue;
            }
            let itag = entry["itag"].as_u64().map(|i| i as u32);
            let mime = entry["mimeType"].as_str();
            let Some(kind) = classify(itag, mime, url) else {
                continue;
            };
            if out.iter().any(|c: &StreamCandidate| c.url == url) {
                continue;
            }
            out.push(StreamCandidate {
                url: url.to_string(),
                kind,
                quality_hint: itag,
                source: CandidateSource::DomJson,
            });
        }
    }
    out
}

/// Try each marker pattern in order and parse the JSON object that
/// follows the first match. Returns `None` when no pattern yields
/// parseable JSON.
fn locate_player_json(html: &str) -> Option<Value> {
    for marker in PLAYER_JSON_MARKERS {
        let Ok(re) = Regex::new(marker) else { continue };
        for m in re.find_iter(html) {
            let rest = &html[m.end()..];
            if let Some(blob) = balanced_json_object(rest) {
                if let Ok(value) = serde_json::from_str::<Value>(blob) {
                    if value.get("streamingData").is_some() {
                        return Some(value);
                    }
                }
            }
        }
    }
    None
}

/// Slice the balanced `{...}` object at the start of `text`, tracking
/// string literals and escapes so braces inside values don't confuse
/// the scan.
fn balanced_json_object(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    if bytes.first() != Some(&b'{') {
        return None;
    }
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match b {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Classify a stream by its quality identifier or media-type marker.
/// Returns `None` when neither gives any signal.
fn classify(itag: Option<u32>, mime: Option<&str>, url: &str) -> Option<StreamKind> {
    if let Some(itag) = itag {
        if AUDIO_ITAGS.contains(&itag) {
            return Some(StreamKind::Audio);
        }
        if MUXED_ITAGS.contains(&itag) {
            return Some(StreamKind::Muxed);
        }
    }
    if let Some(mime) = mime {
        if mime.starts_with("audio/") {
            return Some(StreamKind::Audio);
        }
        if mime.starts_with("video/") {
            return Some(StreamKind::Video);
        }
    }
    // URL-embedded mime marker, as seen in captured CDN query strings
    if url.contains("mime=audio") {
        return Some(StreamKind::Audio);
    }
    if url.contains("mime=video") || itag.is_some() {
        return Some(StreamKind::Video);
    }
    None
}

/// Pull the quality identifier out of a CDN URL query string
fn itag_of(raw: &str) -> Option<u32> {
    let parsed = Url::parse(raw).ok()?;
    parsed
        .query_pairs()
        .find(|(k, _)| k == "itag")
        .and_then(|(_, v)| v.parse().ok())
}
