//! Command line argument parsing

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::core::Platform;
use crate::strategy::StrategyId;
use crate::utils::{detect_platform, extract_video_id};

/// clipfetch - multi-strategy video acquisition for YouTube and TikTok
#[derive(Parser, Debug)]
#[command(name = "clipfetch", author, version, about, long_about = None)]
pub struct Args {
    /// Video URL (YouTube or TikTok)
    pub url: String,

    /// Platform override; detected from the URL when omitted
    #[arg(short, long, value_name = "PLATFORM")]
    pub platform: Option<Platform>,

    /// Platform-native video id; extracted from the URL when omitted
    #[arg(long, value_name = "ID")]
    pub id: Option<String>,

    /// Base output directory
    #[arg(short, long, value_name = "DIR", default_value = "downloads")]
    pub output_dir: PathBuf,

    /// Grouping directory under the output base
    #[arg(long, value_name = "NAME")]
    pub group: Option<String>,

    /// Source directory under the group (e.g. a channel handle)
    #[arg(long, value_name = "NAME")]
    pub source: Option<String>,

    /// Title used for the output filename instead of the video id
    #[arg(long, value_name = "TITLE")]
    pub title: Option<String>,

    /// Strategy order, comma separated (yt-dlp,browser,cobalt)
    #[arg(long, value_name = "ORDER", value_delimiter = ',')]
    pub order: Option<Vec<StrategyId>>,

    /// Netscape cookie file shared across strategies
    #[arg(long, value_name = "PATH")]
    pub cookies: Option<PathBuf>,

    /// Cobalt API instance URL (overrides the environment)
    #[arg(long, value_name = "URL")]
    pub cobalt_url: Option<String>,

    /// Run the browser with a visible window
    #[arg(long)]
    pub headful: bool,

    /// Seconds to wait for an anti-bot challenge to clear
    #[arg(long, value_name = "SECS", default_value = "60")]
    pub challenge_timeout: u64,

    /// Emit the result as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Quiet output (only errors)
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Explicit platform flag, else detection from the URL
    pub fn resolved_platform(&self) -> Result<Platform, String> {
        match self.platform {
            Some(platform) => Ok(platform),
            None => detect_platform(&self.url).map_err(|e| e.to_string()),
        }
    }

    /// Explicit id flag, else extraction from the URL
    pub fn resolved_id(&self) -> Result<String, String> {
        match &self.id {
            Some(id) => Ok(id.clone()),
            None => extract_video_id(&self.url).map_err(|e| e.to_string()),
        }
    }

    pub fn challenge_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.challenge_timeout)
    }

    pub fn verbosity_level(&self) -> VerbosityLevel {
        if self.quiet {
            VerbosityLevel::Quiet
        } else if self.verbose {
            VerbosityLevel::Verbose
        } else {
            VerbosityLevel::Normal
        }
    }
}

/// Output verbosity level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbosityLevel {
    /// Quiet (only errors)
    Quiet,
    /// Normal
    Normal,
    /// Verbose (debug info)
    Verbose,
}
