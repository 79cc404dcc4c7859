//! Fetching captured stream URLs and assembling the final media file

pub mod mux;
pub mod stream;

pub use mux::{cleanup_intermediates, Muxer};
pub use stream::{DownloadConfig, StreamDownloader, MIN_VALID_SIZE};
