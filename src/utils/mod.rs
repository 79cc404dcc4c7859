//! Utility modules

pub mod filename;
pub mod url;

pub use filename::slugify;
pub use url::{detect_platform, extract_video_id, watch_url};
