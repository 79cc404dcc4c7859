//! Request and result data model for a single acquisition

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;

use crate::utils::slugify;

/// Platform the source URL belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    YouTube,
    TikTok,
}

impl Platform {
    /// Short lowercase name, used in output paths and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::YouTube => "youtube",
            Platform::TikTok => "tiktok",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "youtube" | "yt" => Ok(Platform::YouTube),
            "tiktok" | "tt" => Ok(Platform::TikTok),
            other => Err(format!("unknown platform '{other}' (expected youtube or tiktok)")),
        }
    }
}

/// One immutable acquisition request
#[derive(Debug, Clone)]
pub struct AcquisitionRequest {
    /// The URL as received; strategies may fall back to a canonical form
    pub source_url: String,
    pub platform: Platform,
    /// Platform-native video id, used for legacy paths and URL fallback
    pub external_id: String,
    /// Optional grouping directory (e.g. a collection name)
    pub group: Option<String>,
    /// Optional source directory under the group (e.g. a channel handle)
    pub source: Option<String>,
    /// Optional human title; the output filename uses it when present
    pub title: Option<String>,
}

impl AcquisitionRequest {
    pub fn new(
        source_url: impl Into<String>,
        platform: Platform,
        external_id: impl Into<String>,
    ) -> Self {
        Self {
            source_url: source_url.into(),
            platform,
            external_id: external_id.into(),
            group: None,
            source: None,
            title: None,
        }
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Where the acquired file goes. Deterministic for a given request.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputTarget {
    pub dir: PathBuf,
    /// Final filename including the `.mp4` extension
    pub filename: String,
}

impl OutputTarget {
    /// Layout: `{base}/{group}/{source}/{slug}.mp4` when grouping was
    /// supplied, `{base}/{platform}/{slug}.mp4` otherwise. The slug
    /// comes from the title when known, else the external id.
    pub fn resolve(base: &Path, request: &AcquisitionRequest) -> Self {
        let dir = match (&request.group, &request.source) {
            (Some(group), Some(source)) => base.join(group).join(source),
            (Some(group), None) => base.join(group),
            _ => base.join(request.platform.as_str()),
        };
        let stem = match &request.title {
            Some(title) => slugify(title),
            None => slugify(&request.external_id),
        };
        Self {
            dir,
            filename: format!("{stem}.mp4"),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.filename)
    }

    /// Filename without the extension, used for intermediate stream files
    pub fn stem(&self) -> &str {
        self.filename.trim_end_matches(".mp4")
    }

    /// Earlier versions named files by raw external id; an existing file
    /// there still counts as done.
    pub fn legacy_path(&self, external_id: &str) -> PathBuf {
        self.dir.join(format!("{external_id}.mp4"))
    }
}

/// Outcome of one strategy try, append-only
#[derive(Debug, Clone, Serialize)]
pub struct StrategyAttempt {
    pub strategy: &'static str,
    pub status: AttemptStatus,
    pub error: Option<String>,
    #[serde(serialize_with = "as_secs")]
    pub elapsed: Duration,
}

fn as_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptStatus {
    Succeeded,
    Failed,
    /// Required capability missing; the strategy never ran
    Skipped,
}

/// Terminal outcome of an acquisition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AcquireStatus {
    Completed,
    Failed,
}

/// What `acquire` hands back; never mutated afterwards
#[derive(Debug, Clone, Serialize)]
pub struct DownloadResult {
    pub status: AcquireStatus,
    pub path: Option<PathBuf>,
    pub error: Option<String>,
    pub attempts: Vec<StrategyAttempt>,
}

impl DownloadResult {
    pub fn completed(path: PathBuf, attempts: Vec<StrategyAttempt>) -> Self {
        Self {
            status: AcquireStatus::Completed,
            path: Some(path),
            error: None,
            attempts,
        }
    }

    pub fn failed(error: impl Into<String>, attempts: Vec<StrategyAttempt>) -> Self {
        Self {
            status: AcquireStatus::Failed,
            path: None,
            error: Some(error.into()),
            attempts,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == AcquireStatus::Completed
    }
}
