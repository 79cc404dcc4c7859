//! Output formatting and progress display

use std::time::Duration;

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use crate::cli::args::VerbosityLevel;
use crate::core::{AttemptStatus, DownloadResult};

/// Output formatter for clipfetch
pub struct OutputFormatter {
    verbosity: VerbosityLevel,
    spinner: Option<ProgressBar>,
}

impl OutputFormatter {
    pub fn new(verbosity: VerbosityLevel) -> Self {
        Self {
            verbosity,
            spinner: None,
        }
    }

    /// Spinner shown while the strategy waterfall runs
    pub fn start_acquire(&mut self, url: &str) {
        if self.verbosity == VerbosityLevel::Quiet {
            return;
        }
        println!("🔗 {}", url);
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg} [{elapsed_precise}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(style);
        spinner.set_message("Acquiring...");
        spinner.enable_steady_tick(Duration::from_millis(120));
        self.spinner = Some(spinner);
    }

    fn finish_spinner(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }

    /// Final report: per-strategy attempt lines, then the outcome
    pub fn print_result(&mut self, result: &DownloadResult) {
        self.finish_spinner();
        if self.verbosity != VerbosityLevel::Quiet {
            for attempt in &result.attempts {
                let status = match attempt.status {
                    AttemptStatus::Succeeded => "ok".green(),
                    AttemptStatus::Failed => "failed".red(),
                    AttemptStatus::Skipped => "skipped".yellow(),
                };
                let detail = attempt
                    .error
                    .as_deref()
                    .map(|e| format!(" - {e}"))
                    .unwrap_or_default();
                println!(
                    "  {} {} ({}){}",
                    attempt.strategy.bold(),
                    status,
                    format_duration(attempt.elapsed),
                    detail
                );
            }
        }

        if result.is_completed() {
            if self.verbosity != VerbosityLevel::Quiet {
                let path = result
                    .path
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default();
                println!("✅ {} {}", "Saved".green().bold(), path);
            }
        } else {
            let error = result.error.as_deref().unwrap_or("unknown error");
            eprintln!("❌ {} {}", "Failed:".red().bold(), error);
        }
    }

    pub fn error(&mut self, message: &str) {
        self.finish_spinner();
        eprintln!("❌ {}", message);
    }
}

/// Human-friendly duration (e.g. "1m 23s", "4.2s")
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs >= 60.0 {
        format!("{}m {}s", (secs / 60.0) as u64, (secs % 60.0) as u64)
    } else {
        format!("{secs:.1}s")
    }
}

/// Human-friendly byte count
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
