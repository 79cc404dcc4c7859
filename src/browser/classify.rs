//! Page-state classification and the bounded challenge-resolution wait.
//!
//! Classification is a pure function over the page title and DOM text so
//! it can be tested against captured fixtures; the wait loop is generic
//! over a poll closure so it can be tested without a live browser.

use crate::error::AcquireError;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// What the page currently looks like
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageState {
    /// Anti-bot interstitial still showing
    Challenged,
    /// Explicit forbidden/denied markers present
    Blocked,
    /// Target-specific content markers present
    Loaded,
    /// None of the markers matched yet
    Pending,
}

/// Marker strings used to classify page state. Matching is
/// case-insensitive substring search.
#[derive(Debug, Clone)]
pub struct ChallengeMarkers {
    /// Title/content fragments shown by challenge interstitials
    pub challenge: Vec<String>,
    /// Fragments of explicit block pages
    pub blocked: Vec<String>,
    /// Fragments that only appear once real content rendered
    pub loaded: Vec<String>,
}

impl Default for ChallengeMarkers {
    fn default() -> Self {
        Self {
            challenge: vec![
                "just a moment".to_string(),
                "checking your browser".to_string(),
                "verify you are human".to_string(),
                "sorry for the interruption".to_string(),
            ],
            blocked: vec![
                "403 forbidden".to_string(),
                "access denied".to_string(),
                "has been blocked".to_string(),
            ],
            loaded: vec!["<video".to_string(), "videoplayback".to_string()],
        }
    }
}

/// Classify the page. Blocked markers win over challenge markers, which
/// win over loaded markers: a challenge page may legitimately embed a
/// `<video>` element of its own.
pub fn classify_page(title: &str, html: &str, markers: &ChallengeMarkers) -> PageState {
    let title = title.to_lowercase();
    let html = html.to_lowercase();
    let hit = |needles: &[String]| {
        needles
            .iter()
            .any(|n| title.contains(n.as_str()) || html.contains(n.as_str()))
    };

    if hit(&markers.blocked) {
        return PageState::Blocked;
    }
    if hit(&markers.challenge) {
        return PageState::Challenged;
    }
    if hit(&markers.loaded) {
        return PageState::Loaded;
    }
    PageState::Pending
}

/// Poll until the page reports `Loaded`, a block, or the deadline.
///
/// Terminates deterministically: `ChallengeTimeout` when the wall never
/// cleared within `timeout`, `Blocked` as soon as a block page shows.
pub async fn wait_for_content<F, Fut>(
    mut poll: F,
    interval: Duration,
    timeout: Duration,
) -> Result<PageState, AcquireError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<PageState, AcquireError>>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    let mut last = PageState::Pending;

    loop {
        match poll().await {
            Ok(PageState::Loaded) => return Ok(PageState::Loaded),
            Ok(PageState::Blocked) => {
                return Err(AcquireError::Blocked(
                    "block page observed during challenge wait".to_string(),
                ))
            }
            Ok(state) => {
                if state != last {
                    debug!("Challenge wait state: {:?}", state);
                    last = state;
                }
            }
            // A transient evaluate failure mid-navigation is not fatal
            Err(e) => debug!("Challenge poll error (ignored): {}", e),
        }

        if tokio::time::Instant::now() + interval > deadline {
            return Err(AcquireError::ChallengeTimeout(timeout.as_secs()));
        }
        tokio::time::sleep(interval).await;
    }
}
