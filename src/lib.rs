//! # clipfetch - multi-strategy video acquisition
//!
//! Turns a short-form video platform URL (YouTube/TikTok) into a validated
//! local media file despite active bot countermeasures.
//!
//! ## How it works
//!
//! An ordered waterfall of independent strategies is tried until one
//! produces a valid file:
//!
//! - external `yt-dlp` binary with a small format waterfall
//! - a real browser driven over CDP, intercepting network traffic and
//!   embedded player JSON to reconstruct direct CDN stream URLs, then an
//!   authenticated download + ffmpeg mux
//! - a third-party Cobalt API instance
//!
//! ## Example
//!
//! ```rust,no_run
//! use clipfetch::{AcquireConfig, AcquisitionRequest, Capabilities, Orchestrator, Platform};
//!
//! #[tokio::main]
//! async fn main() {
//!     let caps = Capabilities::probe();
//!     let orchestrator = Orchestrator::new(AcquireConfig::default(), caps);
//!
//!     let request = AcquisitionRequest::new(
//!         "https://www.youtube.com/shorts/brZCOVlyPPo",
//!         Platform::YouTube,
//!         "brZCOVlyPPo",
//!     );
//!     let result = orchestrator.acquire(&request).await;
//!     println!("{:?}", result.status);
//! }
//! ```

pub mod browser;
pub mod cli;
pub mod cookies;
pub mod core;
pub mod download;
pub mod error;
pub mod extract;
pub mod strategy;
pub mod utils;

// Re-export main types
pub use core::{
    AcquireConfig, AcquireStatus, AcquisitionRequest, Capabilities, DownloadResult, Orchestrator,
    OutputTarget, Platform, StrategyAttempt,
};
pub use error::AcquireError;
pub use extract::{CandidateSource, StreamCandidate, StreamKind};

/// Result type alias for clipfetch operations
pub type Result<T> = std::result::Result<T, AcquireError>;
