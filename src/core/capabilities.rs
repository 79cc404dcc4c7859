//! Startup probe of the external tools the strategies depend on.
//!
//! Probed once, then immutable. A missing tool disables the strategies
//! that need it; nothing re-checks availability mid-run.

use std::env;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

/// Well-known Chrome/Chromium install locations checked before PATH
const CHROME_LOCATIONS: &[&str] = &[
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/opt/google/chrome/chrome",
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
];

const CHROME_BINARIES: &[&str] = &["google-chrome", "google-chrome-stable", "chromium", "chromium-browser", "chrome"];

/// Environment variable naming a Cobalt API instance
pub const COBALT_URL_VAR: &str = "CLIPFETCH_COBALT_URL";

/// What the host can actually run
#[derive(Debug, Clone, Default)]
pub struct Capabilities {
    pub ytdlp: Option<PathBuf>,
    pub chrome: Option<PathBuf>,
    pub ffmpeg: Option<PathBuf>,
    pub cobalt_endpoint: Option<String>,
}

impl Capabilities {
    /// Probe the host once. Chrome is searched in well-known locations
    /// first, then PATH; the Cobalt endpoint comes from the environment.
    pub fn probe() -> Self {
        let caps = Self {
            ytdlp: find_in_path(&["yt-dlp"]),
            chrome: find_chrome(),
            ffmpeg: find_in_path(&["ffmpeg"]),
            cobalt_endpoint: env::var(COBALT_URL_VAR).ok().filter(|v| !v.is_empty()),
        };
        info!(
            "Capabilities: yt-dlp={} chrome={} ffmpeg={} cobalt={}",
            present(&caps.ytdlp),
            present(&caps.chrome),
            present(&caps.ffmpeg),
            caps.cobalt_endpoint.is_some(),
        );
        caps
    }

    pub fn with_cobalt_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.cobalt_endpoint = Some(endpoint.into());
        self
    }

    pub fn with_chrome(mut self, path: impl Into<PathBuf>) -> Self {
        self.chrome = Some(path.into());
        self
    }
}

fn present(path: &Option<PathBuf>) -> &'static str {
    if path.is_some() {
        "found"
    } else {
        "missing"
    }
}

fn find_chrome() -> Option<PathBuf> {
    for location in CHROME_LOCATIONS {
        let path = Path::new(location);
        if path.is_file() {
            debug!("Found Chrome at {}", location);
            return Some(path.to_path_buf());
        }
    }
    find_in_path(CHROME_BINARIES)
}

/// First of `names` found as an executable file on PATH
fn find_in_path(names: &[&str]) -> Option<PathBuf> {
    let path_var = env::var_os("PATH")?;
    for name in names {
        for dir in env::split_paths(&path_var) {
            let candidate = dir.join(name);
            if candidate.is_file() {
                debug!("Found {} at {}", name, candidate.display());
                return Some(candidate);
            }
        }
    }
    None
}
