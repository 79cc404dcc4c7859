//! Browser automation: a CDP-driven session that loads a target page
//! behind anti-bot walls and captures network traffic, DOM, and cookies.

pub mod classify;
pub mod session;
pub mod stealth;

pub use classify::{classify_page, wait_for_content, ChallengeMarkers, PageState};
pub use session::{BrowserSession, SessionCapture, SessionConfig};
