//! Anti-automation-fingerprint mitigations and human-interaction nudges.
//!
//! The init scripts hide the usual automation markers before any page
//! script runs. Interaction simulation is a best-effort nudge during the
//! challenge wait; its failures are always swallowed.

use rand::Rng;
use std::time::Duration;

/// User agent presented by the browser and replayed on CDN downloads.
/// Must stay consistent between the two or the CDN rejects the session.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Accept-Language presented alongside the user agent
pub const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

/// Scripts evaluated on every new document before page scripts run
pub const STEALTH_SCRIPTS: &[&str] = &[
    // navigator.webdriver is the first thing every detector checks
    r#"
    Object.defineProperty(navigator, 'webdriver', {
        get: () => undefined,
        configurable: true
    });
    "#,
    // Headless Chrome ships without a chrome object
    r#"
    window.chrome = { runtime: {}, loadTimes: function() {}, csi: function() {}, app: {} };
    "#,
    // Zero plugins is a headless giveaway
    r#"
    Object.defineProperty(navigator, 'plugins', {
        get: () => [
            { name: 'Chrome PDF Plugin', filename: 'internal-pdf-viewer' },
            { name: 'Chrome PDF Viewer', filename: 'mhjfbmdgcfjbbpaeojofohoefgiehjai' },
            { name: 'Native Client', filename: 'internal-nacl-plugin' }
        ],
        configurable: true
    });
    "#,
    r#"
    Object.defineProperty(navigator, 'languages', {
        get: () => ['en-US', 'en'],
        configurable: true
    });
    "#,
    // Leftover chromedriver globals
    r#"
    delete window.cdc_adoQpoasnfa76pfcZLmcfl_Array;
    delete window.cdc_adoQpoasnfa76pfcZLmcfl_Promise;
    delete window.cdc_adoQpoasnfa76pfcZLmcfl_Symbol;
    "#,
    // Notification permission probe mismatch under automation
    r#"
    const originalQuery = window.navigator.permissions.query;
    window.navigator.permissions.query = (parameters) => (
        parameters.name === 'notifications' ?
        Promise.resolve({ state: Notification.permission }) :
        originalQuery(parameters)
    );
    "#,
];

/// Chrome launch arguments that reduce the automation fingerprint
pub const STEALTH_CHROME_ARGS: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--disable-infobars",
    "--no-first-run",
    "--no-default-browser-check",
    "--disable-background-networking",
    "--disable-sync",
    "--disable-translate",
    "--no-sandbox",
    "--disable-dev-shm-usage",
    "--disable-gpu",
    "--window-size=1920,1080",
    "--lang=en-US",
];

/// Gradual scroll positions mimicking a human skimming the page
pub const SCROLL_POSITIONS: &[u32] = &[200, 400, 300, 0];

/// JS that scrolls the viewport to a given position
pub fn scroll_script(position: u32) -> String {
    format!("window.scrollTo(0, {position});")
}

/// JS that nudges the first media element into playing
pub const PLAY_MEDIA_SCRIPT: &str = r#"
    (() => { const v = document.querySelector('video'); if (v) { v.muted = true; v.play().catch(() => {}); } })()
"#;

/// A small randomized pause between simulated interactions
pub fn interaction_pause() -> Duration {
    let millis = rand::thread_rng().gen_range(800..1800);
    Duration::from_millis(millis)
}
