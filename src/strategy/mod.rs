//! Acquisition strategies and the trait the orchestrator drives them by

pub mod browser;
pub mod cobalt;
pub mod ytdlp;

use std::path::PathBuf;

use async_trait::async_trait;

use crate::core::{AcquireConfig, AcquisitionRequest, Capabilities, OutputTarget};
use crate::Result;

pub use browser::BrowserStrategy;
pub use cobalt::CobaltStrategy;
pub use ytdlp::YtdlpStrategy;

/// One way of turning a request into a file on disk.
///
/// A strategy owns its whole pipeline and absorbs internal fallbacks;
/// the orchestrator only sees the final path or error.
#[async_trait]
pub trait Strategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Produce the file at the target path and return it
    async fn run(&self, request: &AcquisitionRequest, target: &OutputTarget) -> Result<PathBuf>;
}

/// Stable identifiers for the configurable strategy order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyId {
    Ytdlp,
    Browser,
    Cobalt,
}

impl StrategyId {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyId::Ytdlp => "yt-dlp",
            StrategyId::Browser => "browser",
            StrategyId::Cobalt => "cobalt",
        }
    }

    /// Cheap external binary first, browser next, paid/remote API last
    pub fn default_order() -> Vec<StrategyId> {
        vec![StrategyId::Ytdlp, StrategyId::Browser, StrategyId::Cobalt]
    }
}

impl std::fmt::Display for StrategyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StrategyId {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ytdlp" | "yt-dlp" => Ok(StrategyId::Ytdlp),
            "browser" => Ok(StrategyId::Browser),
            "cobalt" => Ok(StrategyId::Cobalt),
            other => Err(format!(
                "unknown strategy '{other}' (expected yt-dlp, browser, or cobalt)"
            )),
        }
    }
}

/// Build a strategy when its capabilities are present; `None` means the
/// orchestrator records a skip instead of an attempt.
pub fn build_strategy(
    id: StrategyId,
    config: &AcquireConfig,
    caps: &Capabilities,
) -> Option<Box<dyn Strategy>> {
    match id {
        StrategyId::Ytdlp => caps.ytdlp.as_ref().map(|binary| {
            Box::new(YtdlpStrategy::new(
                binary.clone(),
                config.cookie_file.clone(),
                config.subprocess_timeout,
            )) as Box<dyn Strategy>
        }),
        StrategyId::Browser => caps.chrome.as_ref().map(|chrome| {
            let mut session = config.session.clone();
            session.chrome_path = Some(chrome.clone());
            Box::new(BrowserStrategy::new(
                session,
                config.download.clone(),
                config.cookie_file.clone(),
                caps.ffmpeg.clone(),
            )) as Box<dyn Strategy>
        }),
        StrategyId::Cobalt => caps.cobalt_endpoint.as_ref().and_then(|endpoint| {
            match CobaltStrategy::new(endpoint.clone()) {
                Ok(strategy) => Some(Box::new(strategy) as Box<dyn Strategy>),
                Err(e) => {
                    tracing::warn!("Cobalt strategy unavailable: {}", e);
                    None
                }
            }
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_id_parse() {
        assert_eq!("yt-dlp".parse::<StrategyId>().unwrap(), StrategyId::Ytdlp);
        assert_eq!("ytdlp".parse::<StrategyId>().unwrap(), StrategyId::Ytdlp);
        assert_eq!("Browser".parse::<StrategyId>().unwrap(), StrategyId::Browser);
        assert!("carrier-pigeon".parse::<StrategyId>().is_err());
    }

    #[test]
    fn test_default_order_puts_remote_api_last() {
        let order = StrategyId::default_order();
        assert_eq!(order.first(), Some(&StrategyId::Ytdlp));
        assert_eq!(order.last(), Some(&StrategyId::Cobalt));
    }

    #[test]
    fn test_missing_capability_builds_nothing() {
        let config = AcquireConfig::default();
        let caps = Capabilities::default();
        assert!(build_strategy(StrategyId::Ytdlp, &config, &caps).is_none());
        assert!(build_strategy(StrategyId::Browser, &config, &caps).is_none());
        assert!(build_strategy(StrategyId::Cobalt, &config, &caps).is_none());
    }
}
