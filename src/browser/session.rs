//! A single CDP-driven browser session against one target page.
//!
//! The session owns the full lifecycle: launch Chrome with the stealth
//! profile, seed cookies, warm up on the platform origin, navigate to
//! the target, sit out any anti-bot interstitial, record CDN traffic,
//! and hand back the rendered DOM plus the refreshed cookie jar. The
//! browser process is torn down on every exit path, success or not.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    CookieParam, EventRequestWillBeSent, EventResponseReceived, TimeSinceEpoch,
};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::browser::classify::{classify_page, wait_for_content, ChallengeMarkers};
use crate::browser::stealth::{
    interaction_pause, scroll_script, ACCEPT_LANGUAGE, PLAY_MEDIA_SCRIPT, SCROLL_POSITIONS,
    STEALTH_CHROME_ARGS, STEALTH_SCRIPTS, USER_AGENT,
};
use crate::cookies::{Cookie, CookieJar};
use crate::error::AcquireError;
use crate::extract::{CdnProfile, EventPhase, NetworkEvent};
use crate::Result;

/// Tunables for one browser session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub headless: bool,
    /// Explicit Chrome binary; `None` lets the launcher search PATH
    pub chrome_path: Option<PathBuf>,
    /// How long an anti-bot interstitial may take to clear
    pub challenge_timeout: Duration,
    /// Delay between page-state polls during the challenge wait
    pub poll_interval: Duration,
    /// Bound on a single page navigation
    pub nav_timeout: Duration,
    /// Quiet period after load so media requests get captured
    pub settle_delay: Duration,
    pub markers: ChallengeMarkers,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_path: None,
            challenge_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_millis(1500),
            nav_timeout: Duration::from_secs(30),
            settle_delay: Duration::from_secs(3),
            markers: ChallengeMarkers::default(),
        }
    }
}

/// Everything a session observed, for downstream extraction
#[derive(Debug, Clone)]
pub struct SessionCapture {
    /// Rendered DOM after the challenge cleared
    pub html: String,
    /// CDN traffic matching the platform profile, in observation order
    pub events: Vec<NetworkEvent>,
    /// Cookie state at the end of the session
    pub cookies: CookieJar,
}

/// Owns the browser process and its background tasks so teardown
/// happens exactly once, on every exit path.
struct BrowserGuard {
    browser: Browser,
    handler: JoinHandle<()>,
    listeners: Vec<JoinHandle<()>>,
}

impl BrowserGuard {
    async fn shutdown(mut self) {
        for task in &self.listeners {
            task.abort();
        }
        if let Err(e) = self.browser.close().await {
            debug!("Browser close failed, killing process: {}", e);
            let _ = self.browser.kill().await;
        }
        let _ = self.browser.wait().await;
        self.handler.abort();
    }
}

/// One-shot page capture behind anti-bot walls
pub struct BrowserSession {
    config: SessionConfig,
}

impl BrowserSession {
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }

    /// Load `page_url` and capture DOM, CDN traffic, and cookies.
    ///
    /// `seed` cookies are installed before the first navigation so an
    /// earlier session's clearance tokens carry over.
    pub async fn run(
        &self,
        page_url: &str,
        seed: &CookieJar,
        profile: &CdnProfile,
    ) -> Result<SessionCapture> {
        let mut guard = self.launch().await?;
        let result = self.drive(&mut guard, page_url, seed, profile).await;
        guard.shutdown().await;
        result
    }

    async fn launch(&self) -> Result<BrowserGuard> {
        let mut builder = BrowserConfig::builder().args(STEALTH_CHROME_ARGS.iter().copied());
        if !self.config.headless {
            builder = builder.with_head();
        }
        if let Some(ref path) = self.config.chrome_path {
            builder = builder.chrome_executable(path);
        }
        let browser_config = builder.build().map_err(AcquireError::Browser)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| AcquireError::Browser(format!("launch failed: {e}")))?;
        info!("Browser launched (headless: {})", self.config.headless);

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser handler error: {}", e);
                }
            }
        });

        Ok(BrowserGuard {
            browser,
            handler,
            listeners: Vec::new(),
        })
    }

    async fn drive(
        &self,
        guard: &mut BrowserGuard,
        page_url: &str,
        seed: &CookieJar,
        profile: &CdnProfile,
    ) -> Result<SessionCapture> {
        let page = guard
            .browser
            .new_page("about:blank")
            .await
            .map_err(cdp_err)?;

        self.apply_stealth(&page).await?;
        seed_cookies(&page, seed).await?;

        let events = Arc::new(Mutex::new(Vec::new()));
        guard
            .listeners
            .extend(attach_listeners(&page, profile, &events).await?);

        self.warm_up(&page, profile).await;

        debug!("Navigating to {}", page_url);
        tokio::time::timeout(self.config.nav_timeout, page.goto(page_url))
            .await
            .map_err(|_| AcquireError::Timeout(format!("navigation to {page_url}")))?
            .map_err(cdp_err)?;

        self.await_content(&page).await?;

        // Nudge playback so the media CDN request actually fires
        if let Err(e) = page.evaluate(PLAY_MEDIA_SCRIPT).await {
            debug!("Play nudge failed (ignored): {}", e);
        }
        tokio::time::sleep(self.config.settle_delay).await;

        let html = page.content().await.map_err(cdp_err)?;
        let cookies = capture_cookies(&page).await?;
        let events = match events.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        info!(
            "Session captured {} bytes of DOM, {} CDN events, {} cookies",
            html.len(),
            events.len(),
            cookies.len()
        );

        Ok(SessionCapture {
            html,
            events,
            cookies,
        })
    }

    async fn apply_stealth(&self, page: &Page) -> Result<()> {
        let ua = chromiumoxide::cdp::browser_protocol::emulation::SetUserAgentOverrideParams::builder()
            .user_agent(USER_AGENT)
            .accept_language(ACCEPT_LANGUAGE)
            .build()
            .map_err(AcquireError::Browser)?;
        page.execute(ua).await.map_err(cdp_err)?;

        for script in STEALTH_SCRIPTS {
            page.execute(AddScriptToEvaluateOnNewDocumentParams::new(*script))
                .await
                .map_err(cdp_err)?;
        }
        Ok(())
    }

    /// Visit the platform origin first and skim it like a person would.
    /// Everything here is best-effort; a failed warm-up never aborts
    /// the session.
    async fn warm_up(&self, page: &Page, profile: &CdnProfile) {
        debug!("Warming up on {}", profile.page_origin);
        match tokio::time::timeout(self.config.nav_timeout, page.goto(profile.page_origin)).await {
            Ok(Ok(_)) => {
                for position in SCROLL_POSITIONS {
                    tokio::time::sleep(interaction_pause()).await;
                    if let Err(e) = page.evaluate(scroll_script(*position)).await {
                        debug!("Warm-up scroll failed (ignored): {}", e);
                        break;
                    }
                }
            }
            Ok(Err(e)) => debug!("Warm-up navigation failed (ignored): {}", e),
            Err(_) => debug!("Warm-up navigation timed out (ignored)"),
        }
    }

    async fn await_content(&self, page: &Page) -> Result<()> {
        let markers = self.config.markers.clone();
        let state = wait_for_content(
            || {
                let page = page.clone();
                let markers = markers.clone();
                async move {
                    let title = page
                        .get_title()
                        .await
                        .map_err(cdp_err)?
                        .unwrap_or_default();
                    let html = page.content().await.map_err(cdp_err)?;
                    Ok(classify_page(&title, &html, &markers))
                }
            },
            self.config.poll_interval,
            self.config.challenge_timeout,
        )
        .await?;
        debug!("Challenge wait finished: {:?}", state);
        Ok(())
    }
}

fn cdp_err(e: impl std::fmt::Display) -> AcquireError {
    AcquireError::Browser(e.to_string())
}

/// Install the seed jar before the first navigation
async fn seed_cookies(page: &Page, seed: &CookieJar) -> Result<()> {
    if seed.is_empty() {
        return Ok(());
    }
    let mut params = Vec::new();
    for cookie in seed.iter() {
        let mut builder = CookieParam::builder()
            .name(&cookie.name)
            .value(&cookie.value)
            .domain(&cookie.domain)
            .path(&cookie.path)
            .secure(cookie.secure);
        if let Some(expiry) = cookie.expiry {
            builder = builder.expires(TimeSinceEpoch::new(expiry as f64));
        }
        match builder.build() {
            Ok(param) => params.push(param),
            Err(e) => warn!("Skipping malformed cookie {}: {}", cookie.name, e),
        }
    }
    debug!("Seeding {} cookies", params.len());
    page.set_cookies(params).await.map_err(cdp_err)?;
    Ok(())
}

/// Read the browser's cookie state back into a jar
async fn capture_cookies(page: &Page) -> Result<CookieJar> {
    let mut jar = CookieJar::new();
    for c in page.get_cookies().await.map_err(cdp_err)? {
        let expiry = if c.expires < 0.0 {
            None
        } else {
            Some(c.expires as i64)
        };
        jar.insert(Cookie {
            include_subdomains: c.domain.starts_with('.'),
            domain: c.domain,
            path: c.path,
            secure: c.secure,
            expiry,
            name: c.name,
            value: c.value,
        });
    }
    Ok(jar)
}

/// Record request and response URLs that match the CDN profile
async fn attach_listeners(
    page: &Page,
    profile: &CdnProfile,
    events: &Arc<Mutex<Vec<NetworkEvent>>>,
) -> Result<Vec<JoinHandle<()>>> {
    let mut responses = page
        .event_listener::<EventResponseReceived>()
        .await
        .map_err(cdp_err)?;
    let response_profile = profile.clone();
    let response_sink = Arc::clone(events);
    let response_task = tokio::spawn(async move {
        while let Some(event) = responses.next().await {
            if response_profile.matches(&event.response.url) {
                debug!("CDN response: {}", event.response.url);
                if let Ok(mut sink) = response_sink.lock() {
                    sink.push(NetworkEvent {
                        url: event.response.url.clone(),
                        mime_type: Some(event.response.mime_type.clone()),
                        phase: EventPhase::Response,
                    });
                }
            }
        }
    });

    let mut requests = page
        .event_listener::<EventRequestWillBeSent>()
        .await
        .map_err(cdp_err)?;
    let request_profile = profile.clone();
    let request_sink = Arc::clone(events);
    let request_task = tokio::spawn(async move {
        while let Some(event) = requests.next().await {
            if request_profile.matches(&event.request.url) {
                debug!("CDN request: {}", event.request.url);
                if let Ok(mut sink) = request_sink.lock() {
                    sink.push(NetworkEvent {
                        url: event.request.url.clone(),
                        mime_type: None,
                        phase: EventPhase::Request,
                    });
                }
            }
        }
    });

    Ok(vec![response_task, request_task])
}
