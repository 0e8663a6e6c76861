//! The cookie jar.
//!
//! # Responsibilities
//! - Parse `Set-Cookie` strings and store them under the target host
//! - Build `Cookie` header values for a URL, for HTTP or script access
//! - Serialize the whole jar for cross-context synchronization
//!
//! # Design Decisions
//! - Sharded map; each mutation is one short critical section
//! - Overwriting a key keeps its original insertion position
//! - Expired cookies are skipped on read, never swept

use std::sync::atomic::{AtomicU64, Ordering};

use cookie::Cookie;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use thiserror::Error;
use time::OffsetDateTime;
use url::Url;

use crate::cookies::record::CookieRecord;

#[derive(Debug, Error)]
pub enum JarError {
    #[error("invalid cookie dump: {0}")]
    Json(#[from] serde_json::Error),
}

type CookieKey = (String, String, String);

#[derive(Debug, Clone)]
struct StoredCookie {
    seq: u64,
    record: CookieRecord,
}

#[derive(Debug, Default)]
pub struct CookieJar {
    entries: DashMap<CookieKey, StoredCookie>,
    seq: AtomicU64,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store every cookie in `headers`, received from `url`.
    ///
    /// Cookies that fail to parse, or whose `Domain` does not cover the
    /// host of `url`, are dropped.
    pub fn set_cookies<I, S>(&self, headers: I, url: &Url)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
        let now = now_ms();

        for raw in headers {
            let raw = raw.as_ref();
            let parsed = match Cookie::parse_encoded(raw).or_else(|_| Cookie::parse(raw)) {
                Ok(c) => c,
                Err(e) => {
                    tracing::debug!(error = %e, url = %url, "Ignoring unparsable Set-Cookie");
                    continue;
                }
            };

            let domain = parsed
                .domain()
                .map(|d| d.trim_start_matches('.').to_ascii_lowercase())
                .filter(|d| !d.is_empty())
                .unwrap_or_else(|| host.clone());
            if host != domain && !host.ends_with(&format!(".{}", domain)) {
                tracing::debug!(domain = %domain, host = %host, "Ignoring cookie for foreign domain");
                continue;
            }

            let path = parsed
                .path()
                .filter(|p| p.starts_with('/'))
                .unwrap_or("/")
                .to_string();

            let expires_at = match (parsed.max_age(), parsed.expires_datetime()) {
                (Some(max_age), _) => Some(now + max_age.whole_milliseconds() as i64),
                (None, Some(at)) => Some((at.unix_timestamp_nanos() / 1_000_000) as i64),
                (None, None) => None,
            };

            let record = CookieRecord {
                domain,
                path,
                name: parsed.name().to_string(),
                value: parsed.value().to_string(),
                secure: parsed.secure().unwrap_or(false),
                http_only: parsed.http_only().unwrap_or(false),
                same_site: parsed.same_site().map(|s| s.to_string()),
                expires_at,
            };
            self.insert(record);
        }
    }

    /// Store a cookie written by script (`document.cookie = ...`).
    /// `HttpOnly` cookies cannot be created or replaced this way.
    pub fn set_from_script(&self, raw: &str, url: &Url) {
        if let Ok(parsed) = Cookie::parse(raw) {
            if parsed.http_only().unwrap_or(false) {
                return;
            }
            let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
            let key = (
                parsed
                    .domain()
                    .map(|d| d.trim_start_matches('.').to_ascii_lowercase())
                    .unwrap_or(host),
                parsed.path().unwrap_or("/").to_string(),
                parsed.name().to_string(),
            );
            if self.entries.get(&key).is_some_and(|e| e.record.http_only) {
                return;
            }
        }
        self.set_cookies([raw], url);
    }

    /// `name=value` pairs for `url`, joined by `"; "` in insertion order.
    pub fn get_cookies(&self, url: &Url, from_script: bool) -> String {
        let host = url.host_str().unwrap_or_default();
        let now = now_ms();

        let mut matched: Vec<(u64, String)> = self
            .entries
            .iter()
            .filter(|e| {
                let r = &e.record;
                !r.is_expired(now)
                    && r.matches(host, url.path(), url.scheme())
                    && !(from_script && r.http_only)
            })
            .map(|e| (e.seq, format!("{}={}", e.record.name, e.record.value)))
            .collect();
        matched.sort_by_key(|(seq, _)| *seq);

        matched
            .into_iter()
            .map(|(_, pair)| pair)
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// All records in insertion order.
    pub fn records(&self) -> Vec<CookieRecord> {
        let mut all: Vec<StoredCookie> = self.entries.iter().map(|e| e.value().clone()).collect();
        all.sort_by_key(|s| s.seq);
        all.into_iter().map(|s| s.record).collect()
    }

    /// Serialize the whole jar as a JSON array.
    pub fn dump(&self) -> Result<String, JarError> {
        Ok(serde_json::to_string(&self.records())?)
    }

    /// Replace the whole jar with a previous [`dump`](Self::dump).
    pub fn load(&self, json: &str) -> Result<(), JarError> {
        let records: Vec<CookieRecord> = serde_json::from_str(json)?;
        self.entries.clear();
        for record in records {
            self.insert(record);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(&self, record: CookieRecord) {
        let key = record.key();
        match self.entries.entry(key) {
            Entry::Occupied(mut stored) => stored.get_mut().record = record,
            Entry::Vacant(slot) => {
                slot.insert(StoredCookie {
                    seq: self.seq.fetch_add(1, Ordering::Relaxed),
                    record,
                });
            }
        }
    }
}

fn now_ms() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_set_and_get() {
        let jar = CookieJar::new();
        jar.set_cookies(["a=1", "b=2; Path=/app"], &url("https://site.test/app/page"));
        assert_eq!(jar.get_cookies(&url("https://site.test/app/x"), false), "a=1; b=2");
        assert_eq!(jar.get_cookies(&url("https://site.test/"), false), "a=1");
        assert_eq!(jar.get_cookies(&url("https://other.test/"), false), "");
    }

    #[test]
    fn test_domain_normalized_and_shared_with_subdomains() {
        let jar = CookieJar::new();
        jar.set_cookies(["sid=x; Domain=.Site.TEST"], &url("https://www.site.test/"));
        let records = jar.records();
        assert_eq!(records[0].domain, "site.test");
        assert_eq!(jar.get_cookies(&url("https://api.site.test/"), false), "sid=x");
    }

    #[test]
    fn test_foreign_domain_rejected() {
        let jar = CookieJar::new();
        jar.set_cookies(["sid=x; Domain=evil.test"], &url("https://site.test/"));
        assert!(jar.is_empty());
    }

    #[test]
    fn test_overwrite_keeps_position() {
        let jar = CookieJar::new();
        let u = url("https://site.test/");
        jar.set_cookies(["a=1", "b=2"], &u);
        jar.set_cookies(["a=3"], &u);
        assert_eq!(jar.get_cookies(&u, false), "a=3; b=2");
        assert_eq!(jar.len(), 2);
    }

    #[test]
    fn test_http_only_hidden_from_script() {
        let jar = CookieJar::new();
        let u = url("https://site.test/");
        jar.set_cookies(["a=1; HttpOnly", "b=2"], &u);
        assert_eq!(jar.get_cookies(&u, true), "b=2");
        assert_eq!(jar.get_cookies(&u, false), "a=1; b=2");

        jar.set_from_script("a=evil", &u);
        assert_eq!(jar.get_cookies(&u, false), "a=1; b=2");
    }

    #[test]
    fn test_secure_needs_https() {
        let jar = CookieJar::new();
        jar.set_cookies(["s=1; Secure"], &url("https://site.test/"));
        assert_eq!(jar.get_cookies(&url("http://site.test/"), false), "");
    }

    #[test]
    fn test_max_age_beats_expires() {
        let jar = CookieJar::new();
        let u = url("https://site.test/");
        jar.set_cookies(["a=1; Max-Age=3600; Expires=Thu, 01 Jan 1970 00:00:00 GMT"], &u);
        jar.set_cookies(["gone=1; Expires=Thu, 01 Jan 1970 00:00:00 GMT"], &u);
        jar.set_cookies(["zero=1; Max-Age=0"], &u);
        assert_eq!(jar.get_cookies(&u, false), "a=1");
        assert_eq!(jar.len(), 3);
    }

    #[test]
    fn test_dump_and_load_replace() {
        let jar = CookieJar::new();
        let u = url("https://site.test/");
        jar.set_cookies(["a=1", "b=2"], &u);
        let dump = jar.dump().unwrap();

        let other = CookieJar::new();
        other.set_cookies(["stale=1"], &u);
        other.load(&dump).unwrap();
        assert_eq!(other.get_cookies(&u, false), "a=1; b=2");
        assert!(other.load("not json").is_err());
    }
}
