//! The strategy waterfall: try each acquisition strategy in order until
//! one produces a valid file.
//!
//! The loop is strictly sequential. A strategy gets the whole machine to
//! itself; nothing races a browser session against another download.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::browser::SessionConfig;
use crate::core::{
    AcquireStatus, AcquisitionRequest, AttemptStatus, Capabilities, DownloadResult, OutputTarget,
    StrategyAttempt,
};
use crate::download::{cleanup_intermediates, DownloadConfig, MIN_VALID_SIZE};
use crate::error::AcquireError;
use crate::strategy::{build_strategy, StrategyId};

/// Most underlying errors quoted in a consolidated failure
const MAX_REPORTED_ERRORS: usize = 3;

/// Orchestrator configuration
#[derive(Debug, Clone)]
pub struct AcquireConfig {
    /// Base directory the output layout is rooted at
    pub output_dir: PathBuf,
    /// Strategies to try, in order
    pub strategy_order: Vec<StrategyId>,
    /// Netscape cookie file shared across strategies
    pub cookie_file: Option<PathBuf>,
    pub session: SessionConfig,
    pub download: DownloadConfig,
    /// Bound on external binary runs (yt-dlp)
    pub subprocess_timeout: Duration,
}

impl Default for AcquireConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("downloads"),
            strategy_order: StrategyId::default_order(),
            cookie_file: None,
            session: SessionConfig::default(),
            download: DownloadConfig::default(),
            subprocess_timeout: Duration::from_secs(180),
        }
    }
}

/// Runs the waterfall for one request at a time
pub struct Orchestrator {
    config: AcquireConfig,
    capabilities: Capabilities,
}

impl Orchestrator {
    pub fn new(config: AcquireConfig, capabilities: Capabilities) -> Self {
        Self {
            config,
            capabilities,
        }
    }

    /// Acquire the requested video. Terminal: every outcome is a
    /// `DownloadResult`, with the attempt log attached.
    pub async fn acquire(&self, request: &AcquisitionRequest) -> DownloadResult {
        if let Err(e) = url::Url::parse(&request.source_url) {
            let error = AcquireError::InvalidInput(format!("source URL: {e}"));
            return DownloadResult::failed(error.to_string(), Vec::new());
        }
        if request.external_id.trim().is_empty() {
            let error = AcquireError::InvalidInput("empty external id".to_string());
            return DownloadResult::failed(error.to_string(), Vec::new());
        }

        let target = OutputTarget::resolve(&self.config.output_dir, request);
        if let Err(e) = tokio::fs::create_dir_all(&target.dir).await {
            return DownloadResult::failed(
                format!("cannot create {}: {e}", target.dir.display()),
                Vec::new(),
            );
        }

        // Repeat calls for an already-acquired video are free
        if let Some(existing) = self.existing_valid_file(request, &target).await {
            info!("Already acquired: {}", existing.display());
            return DownloadResult::completed(existing, Vec::new());
        }

        let mut attempts = Vec::new();
        for id in &self.config.strategy_order {
            let Some(strategy) = build_strategy(*id, &self.config, &self.capabilities) else {
                debug!("Skipping {} (capability missing)", id);
                attempts.push(StrategyAttempt {
                    strategy: id.as_str(),
                    status: AttemptStatus::Skipped,
                    error: None,
                    elapsed: Duration::ZERO,
                });
                continue;
            };

            info!("Trying strategy: {}", strategy.name());
            let started = Instant::now();
            match strategy.run(request, &target).await {
                Ok(path) => {
                    attempts.push(StrategyAttempt {
                        strategy: strategy.name(),
                        status: AttemptStatus::Succeeded,
                        error: None,
                        elapsed: started.elapsed(),
                    });
                    self.cleanup_partials(&target).await;
                    info!(
                        "Strategy {} succeeded in {:.1}s",
                        strategy.name(),
                        started.elapsed().as_secs_f64()
                    );
                    return DownloadResult {
                        status: AcquireStatus::Completed,
                        path: Some(path),
                        error: None,
                        attempts,
                    };
                }
                Err(e) => {
                    warn!("Strategy {} failed: {}", strategy.name(), e);
                    attempts.push(StrategyAttempt {
                        strategy: strategy.name(),
                        status: AttemptStatus::Failed,
                        error: Some(e.to_string()),
                        elapsed: started.elapsed(),
                    });
                    // A later strategy must not inherit this one's partials
                    self.cleanup_partials(&target).await;
                }
            }
        }

        let summary = self.consolidate_failure(request, &target, &attempts).await;
        DownloadResult::failed(summary, attempts)
    }

    /// A file already above the size threshold at the canonical or
    /// legacy path means the work is done.
    async fn existing_valid_file(
        &self,
        request: &AcquisitionRequest,
        target: &OutputTarget,
    ) -> Option<PathBuf> {
        for path in [target.path(), target.legacy_path(&request.external_id)] {
            if let Ok(meta) = tokio::fs::metadata(&path).await {
                if meta.is_file() && meta.len() > MIN_VALID_SIZE {
                    return Some(path);
                }
            }
        }
        None
    }

    async fn cleanup_partials(&self, target: &OutputTarget) {
        cleanup_intermediates(&target.dir, target.stem()).await;
        for suffix in ["part", "tmp"] {
            let path = target.path().with_extension(suffix);
            if tokio::fs::remove_file(&path).await.is_ok() {
                debug!("Removed partial {}", path.display());
            }
        }
    }

    /// One message naming what was tried, up to three underlying errors,
    /// and any partial file left on disk.
    async fn consolidate_failure(
        &self,
        request: &AcquisitionRequest,
        target: &OutputTarget,
        attempts: &[StrategyAttempt],
    ) -> String {
        let tried: Vec<&str> = attempts
            .iter()
            .filter(|a| a.status == AttemptStatus::Failed)
            .map(|a| a.strategy)
            .collect();
        if tried.is_empty() {
            return "no strategy was available to run".to_string();
        }
        let mut message = tried.join(", ");

        let errors: Vec<String> = attempts
            .iter()
            .filter_map(|a| a.error.as_ref())
            .take(MAX_REPORTED_ERRORS)
            .map(|e| e.to_string())
            .collect();
        if !errors.is_empty() {
            message.push_str(": ");
            message.push_str(&errors.join("; "));
        }

        for path in [target.path(), target.legacy_path(&request.external_id)] {
            if let Ok(meta) = tokio::fs::metadata(&path).await {
                if meta.is_file() {
                    message.push_str(&format!(
                        " (partial file {} at {} bytes)",
                        path.display(),
                        meta.len()
                    ));
                }
            }
        }
        AcquireError::AllStrategiesExhausted(message).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Platform;
    use std::path::Path;

    fn config_in(dir: &Path) -> AcquireConfig {
        AcquireConfig {
            output_dir: dir.to_path_buf(),
            ..AcquireConfig::default()
        }
    }

    #[tokio::test]
    async fn test_invalid_url_fails_without_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = Orchestrator::new(config_in(dir.path()), Capabilities::default());
        let request = AcquisitionRequest::new("not a url", Platform::YouTube, "abc");
        let result = orchestrator.acquire(&request).await;
        assert_eq!(result.status, AcquireStatus::Failed);
        assert!(result.attempts.is_empty());
    }

    #[tokio::test]
    async fn test_existing_file_short_circuits_with_zero_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let request =
            AcquisitionRequest::new("https://www.youtube.com/watch?v=abc", Platform::YouTube, "abc");
        let target = OutputTarget::resolve(dir.path(), &request);
        std::fs::create_dir_all(&target.dir).unwrap();
        std::fs::write(target.path(), vec![0u8; 50 * 1024]).unwrap();

        let orchestrator = Orchestrator::new(config_in(dir.path()), Capabilities::default());
        let result = orchestrator.acquire(&request).await;
        assert!(result.is_completed());
        assert!(result.attempts.is_empty());
        assert_eq!(result.path, Some(target.path()));
    }

    #[tokio::test]
    async fn test_legacy_path_counts_as_done() {
        let dir = tempfile::tempdir().unwrap();
        let request =
            AcquisitionRequest::new("https://www.youtube.com/watch?v=XyZ", Platform::YouTube, "XyZ")
                .with_title("Named Differently");
        let target = OutputTarget::resolve(dir.path(), &request);
        std::fs::create_dir_all(&target.dir).unwrap();
        let legacy = target.legacy_path("XyZ");
        std::fs::write(&legacy, vec![0u8; 4096]).unwrap();

        let orchestrator = Orchestrator::new(config_in(dir.path()), Capabilities::default());
        let result = orchestrator.acquire(&request).await;
        assert!(result.is_completed());
        assert_eq!(result.path, Some(legacy));
    }

    #[tokio::test]
    async fn test_tiny_existing_file_does_not_short_circuit() {
        let dir = tempfile::tempdir().unwrap();
        let request =
            AcquisitionRequest::new("https://www.youtube.com/watch?v=abc", Platform::YouTube, "abc");
        let target = OutputTarget::resolve(dir.path(), &request);
        std::fs::create_dir_all(&target.dir).unwrap();
        std::fs::write(target.path(), b"nope").unwrap();

        // No capabilities, so every strategy is skipped and the run fails
        let orchestrator = Orchestrator::new(config_in(dir.path()), Capabilities::default());
        let result = orchestrator.acquire(&request).await;
        assert_eq!(result.status, AcquireStatus::Failed);
        assert_eq!(result.attempts.len(), StrategyId::default_order().len());
        assert!(result
            .attempts
            .iter()
            .all(|a| a.status == AttemptStatus::Skipped));
    }

    #[tokio::test]
    async fn test_consolidated_error_names_multiple_strategies() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = Orchestrator::new(config_in(dir.path()), Capabilities::default());
        let request =
            AcquisitionRequest::new("https://www.youtube.com/watch?v=abc", Platform::YouTube, "abc");
        let target = OutputTarget::resolve(dir.path(), &request);
        let attempts = vec![
            StrategyAttempt {
                strategy: "yt-dlp",
                status: AttemptStatus::Failed,
                error: Some("exit status 1".to_string()),
                elapsed: Duration::from_secs(2),
            },
            StrategyAttempt {
                strategy: "browser",
                status: AttemptStatus::Failed,
                error: Some("challenge wait timed out".to_string()),
                elapsed: Duration::from_secs(60),
            },
        ];
        let message = orchestrator
            .consolidate_failure(&request, &target, &attempts)
            .await;
        assert!(message.contains("yt-dlp"), "{message}");
        assert!(message.contains("browser"), "{message}");
        assert!(message.contains("exit status 1"), "{message}");
        assert!(message.contains("challenge wait timed out"), "{message}");
    }

    #[tokio::test]
    async fn test_no_capabilities_reports_nothing_available() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = Orchestrator::new(config_in(dir.path()), Capabilities::default());
        let request =
            AcquisitionRequest::new("https://www.youtube.com/watch?v=abc", Platform::YouTube, "abc");
        let result = orchestrator.acquire(&request).await;
        let error = result.error.unwrap();
        assert!(error.contains("no strategy was available"), "{error}");
    }
}
