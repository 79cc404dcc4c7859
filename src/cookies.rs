//! Netscape-format cookie jar loading and persistence
//!
//! The jar seeds authenticated browser sessions and is rewritten after a
//! session that cleared a challenge wall. `CookieStore` is the only
//! writer; sessions borrow a copy of the jar.

use crate::error::AcquireError;
use chrono::Utc;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};
use url::Url;

/// Serializes cookie-file writes so concurrent acquisitions cannot
/// interleave and corrupt the jar.
static JAR_WRITE_LOCK: Mutex<()> = Mutex::new(());

/// A single browser-style cookie
#[derive(Debug, Clone, PartialEq)]
pub struct Cookie {
    pub domain: String,
    pub include_subdomains: bool,
    pub path: String,
    pub secure: bool,
    /// Unix timestamp; `None` means session cookie
    pub expiry: Option<i64>,
    pub name: String,
    pub value: String,
}

impl Cookie {
    /// Whether this cookie applies to the given request URL
    fn matches(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        let domain = self.domain.trim_start_matches('.');
        let domain_ok = host == domain
            || (self.include_subdomains && host.ends_with(&format!(".{domain}")));
        let path_ok = url.path().starts_with(&self.path);
        let scheme_ok = !self.secure || url.scheme() == "https";
        domain_ok && path_ok && scheme_ok
    }

    fn is_expired(&self, now: i64) -> bool {
        matches!(self.expiry, Some(exp) if exp != 0 && exp < now)
    }
}

/// An ordered set of cookies keyed by (domain, name)
#[derive(Debug, Clone, Default)]
pub struct CookieJar {
    cookies: Vec<Cookie>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cookie> {
        self.cookies.iter()
    }

    /// Insert or replace by (domain, name)
    pub fn insert(&mut self, cookie: Cookie) {
        if let Some(existing) = self
            .cookies
            .iter_mut()
            .find(|c| c.domain == cookie.domain && c.name == cookie.name)
        {
            *existing = cookie;
        } else {
            self.cookies.push(cookie);
        }
    }

    /// Build a `Cookie:` header value for the given URL, skipping expired
    /// entries. Returns `None` when nothing matches.
    pub fn header_for(&self, url: &str) -> Option<String> {
        let parsed = Url::parse(url).ok()?;
        let now = Utc::now().timestamp();
        let pairs: Vec<String> = self
            .cookies
            .iter()
            .filter(|c| !c.is_expired(now) && c.matches(&parsed))
            .map(|c| format!("{}={}", c.name, c.value))
            .collect();
        if pairs.is_empty() {
            None
        } else {
            Some(pairs.join("; "))
        }
    }

    /// Parse a Netscape cookie-jar text document.
    /// Malformed lines are skipped, `#` comments and blanks ignored.
    pub fn parse(text: &str) -> Self {
        let mut jar = Self::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < 7 {
                continue;
            }
            let expiry = match fields[4].parse::<i64>() {
                Ok(0) => None,
                Ok(ts) => Some(ts),
                Err(_) => None,
            };
            jar.insert(Cookie {
                domain: fields[0].to_string(),
                include_subdomains: fields[1].eq_ignore_ascii_case("TRUE"),
                path: fields[2].to_string(),
                secure: fields[3].eq_ignore_ascii_case("TRUE"),
                expiry,
                name: fields[5].to_string(),
                value: fields[6].to_string(),
            });
        }
        jar
    }

    /// Serialize back to Netscape cookie-jar text
    pub fn to_netscape(&self) -> String {
        let mut out = String::from("# Netscape HTTP Cookie File\n\n");
        for c in &self.cookies {
            let flag = if c.include_subdomains { "TRUE" } else { "FALSE" };
            let secure = if c.secure { "TRUE" } else { "FALSE" };
            let expiry = c.expiry.unwrap_or(0);
            out.push_str(&format!(
                "{}\t{}\t{}\t{}\t{}\t{}\t{}\n",
                c.domain, flag, c.path, secure, expiry, c.name, c.value
            ));
        }
        out
    }
}

/// Loads and persists the on-disk cookie jar
#[derive(Debug, Clone)]
pub struct CookieStore {
    path: PathBuf,
}

impl CookieStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the jar from disk. A missing file yields an empty jar.
    pub fn load(&self) -> Result<CookieJar, AcquireError> {
        if !self.path.exists() {
            debug!("No cookie file at {:?}, starting with empty jar", self.path);
            return Ok(CookieJar::new());
        }
        let text = std::fs::read_to_string(&self.path)?;
        let jar = CookieJar::parse(&text);
        debug!("Loaded {} cookies from {:?}", jar.len(), self.path);
        Ok(jar)
    }

    /// Persist the jar atomically (temp file + rename) under the
    /// process-wide write lock.
    pub fn save(&self, jar: &CookieJar) -> Result<(), AcquireError> {
        let _guard = JAR_WRITE_LOCK
            .lock()
            .map_err(|_| AcquireError::CookieJar("write lock poisoned".to_string()))?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(jar.to_netscape().as_bytes())?;
        tmp.flush()?;
        tmp.persist(&self.path)
            .map_err(|e| AcquireError::CookieJar(format!("persist failed: {e}")))?;
        debug!("Saved {} cookies to {:?}", jar.len(), self.path);
        Ok(())
    }

    /// Merge session cookies into the stored jar and persist.
    /// Used after a browser session that cleared a challenge.
    pub fn merge_and_save(&self, session_cookies: &CookieJar) -> Result<(), AcquireError> {
        let mut jar = self.load()?;
        for cookie in session_cookies.iter() {
            jar.insert(cookie.clone());
        }
        if let Err(e) = self.save(&jar) {
            warn!("Failed to persist session cookies: {}", e);
            return Err(e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = "\
# Netscape HTTP Cookie File
# This is a comment

.youtube.com\tTRUE\t/\tTRUE\t1999999999\t__Secure-3PSID\tsecret
.youtube.com\tTRUE\t/\tFALSE\t0\tYSC\tabc123
malformed line without tabs
.tiktok.com\tTRUE\t/\tFALSE\t1999999999\tsessionid\ttok
";

    #[test]
    fn test_parse_skips_comments_and_malformed() {
        let jar = CookieJar::parse(FIXTURE);
        assert_eq!(jar.len(), 3);
    }

    #[test]
    fn test_parse_session_cookie_expiry() {
        let jar = CookieJar::parse(FIXTURE);
        let ysc = jar.iter().find(|c| c.name == "YSC").unwrap();
        assert_eq!(ysc.expiry, None);
    }

    #[test]
    fn test_header_for_matches_domain_and_scheme() {
        let jar = CookieJar::parse(FIXTURE);

        let header = jar.header_for("https://www.youtube.com/watch?v=x").unwrap();
        assert!(header.contains("__Secure-3PSID=secret"));
        assert!(header.contains("YSC=abc123"));
        assert!(!header.contains("sessionid"));

        // Secure cookie must not leak over http
        let header = jar.header_for("http://www.youtube.com/").unwrap();
        assert!(!header.contains("__Secure-3PSID"));
        assert!(header.contains("YSC"));
    }

    #[test]
    fn test_header_for_no_match() {
        let jar = CookieJar::parse(FIXTURE);
        assert!(jar.header_for("https://example.com/").is_none());
    }

    #[test]
    fn test_expired_cookie_excluded() {
        let mut jar = CookieJar::new();
        jar.insert(Cookie {
            domain: ".youtube.com".to_string(),
            include_subdomains: true,
            path: "/".to_string(),
            secure: false,
            expiry: Some(1), // 1970
            name: "old".to_string(),
            value: "x".to_string(),
        });
        assert!(jar.header_for("https://www.youtube.com/").is_none());
    }

    #[test]
    fn test_insert_replaces_by_domain_and_name() {
        let mut jar = CookieJar::parse(FIXTURE);
        jar.insert(Cookie {
            domain: ".youtube.com".to_string(),
            include_subdomains: true,
            path: "/".to_string(),
            secure: false,
            expiry: None,
            name: "YSC".to_string(),
            value: "updated".to_string(),
        });
        assert_eq!(jar.len(), 3);
        let ysc = jar.iter().find(|c| c.name == "YSC").unwrap();
        assert_eq!(ysc.value, "updated");
    }

    #[test]
    fn test_roundtrip_through_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = CookieStore::new(dir.path().join("cookies.txt"));

        let jar = CookieJar::parse(FIXTURE);
        store.save(&jar).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), jar.len());
        assert_eq!(
            loaded.header_for("https://www.youtube.com/"),
            jar.header_for("https://www.youtube.com/")
        );
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = CookieStore::new(dir.path().join("nope.txt"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_merge_and_save() {
        let dir = tempfile::tempdir().unwrap();
        let store = CookieStore::new(dir.path().join("cookies.txt"));
        store.save(&CookieJar::parse(FIXTURE)).unwrap();

        let mut session = CookieJar::new();
        session.insert(Cookie {
            domain: ".youtube.com".to_string(),
            include_subdomains: true,
            path: "/".to_string(),
            secure: true,
            expiry: Some(1999999999),
            name: "VISITOR_INFO1_LIVE".to_string(),
            value: "fresh".to_string(),
        });
        store.merge_and_save(&session).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 4);
        assert!(loaded
            .iter()
            .any(|c| c.name == "VISITOR_INFO1_LIVE" && c.value == "fresh"));
    }
}
