//! Error types for clipfetch

use thiserror::Error;

/// Main error type for acquisition operations
#[derive(Debug, Error)]
pub enum AcquireError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Challenge wall did not clear within {0} seconds")]
    ChallengeTimeout(u64),

    #[error("Blocked by platform: {0}")]
    Blocked(String),

    #[error("No usable stream candidate found")]
    NoCandidateFound,

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Mux failed: {0}")]
    MuxFailed(String),

    #[error("All strategies exhausted: {0}")]
    AllStrategiesExhausted(String),

    #[error("Strategy not available: {0}")]
    StrategyUnavailable(String),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Cookie jar error: {0}")]
    CookieJar(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("Timeout: {0}")]
    Timeout(String),
}

impl AcquireError {
    /// Short, stable label used in attempt logs and consolidated errors
    pub fn label(&self) -> &'static str {
        match self {
            AcquireError::InvalidInput(_) => "invalid-input",
            AcquireError::ChallengeTimeout(_) => "challenge-timeout",
            AcquireError::Blocked(_) => "blocked",
            AcquireError::NoCandidateFound => "no-candidate",
            AcquireError::DownloadFailed(_) => "download-failed",
            AcquireError::MuxFailed(_) => "mux-failed",
            AcquireError::AllStrategiesExhausted(_) => "all-exhausted",
            AcquireError::StrategyUnavailable(_) => "unavailable",
            AcquireError::Browser(_) => "browser",
            AcquireError::CookieJar(_) => "cookie-jar",
            AcquireError::Http(_) => "http",
            AcquireError::Io(_) => "io",
            AcquireError::Json(_) => "json",
            AcquireError::Url(_) => "url",
            AcquireError::Regex(_) => "regex",
            AcquireError::Timeout(_) => "timeout",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_are_stable() {
        assert_eq!(AcquireError::NoCandidateFound.label(), "no-candidate");
        assert_eq!(AcquireError::ChallengeTimeout(60).label(), "challenge-timeout");
        assert_eq!(
            AcquireError::DownloadFailed("x".into()).label(),
            "download-failed"
        );
    }

    #[test]
    fn test_display_includes_detail() {
        let err = AcquireError::Blocked("HTTP 403 on watch page".into());
        assert!(err.to_string().contains("403"));

        let err = AcquireError::ChallengeTimeout(60);
        assert!(err.to_string().contains("60"));
    }
}
