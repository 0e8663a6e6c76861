//! Referrer and site-policy tracking across redirects.
//!
//! # Responsibilities
//! - Remember the site classification of each requested URL
//! - Follow redirects so the final hop inherits the chain's classification
//! - Record `referrer-policy` response headers
//!
//! # Design Decisions
//! - Keyed by the normalized original URL
//! - Every touch resets the entry's expiry

use std::time::{Duration, Instant};

use dashmap::DashMap;
use url::Url;

use crate::security::site::SiteDirective;

/// How long an entry survives without being touched.
pub const TRACKER_TTL: Duration = Duration::from_secs(60 * 60);

pub const DEFAULT_REFERRER_POLICY: &str = "strict-origin-when-cross-origin";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerEntry {
    pub original: String,
    pub latest: String,
    pub site: SiteDirective,
    pub policy: String,
    pub expires_at: Instant,
}

#[derive(Debug)]
pub struct ReferrerTracker {
    entries: DashMap<String, TrackerEntry>,
    ttl: Duration,
}

impl Default for ReferrerTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ReferrerTracker {
    pub fn new() -> Self {
        Self::with_ttl(TRACKER_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Create or refresh the entry for `url` with classification `site`.
    pub fn initialize(&self, url: &str, site: SiteDirective) {
        let key = normalize(url);
        let expires_at = Instant::now() + self.ttl;
        self.entries
            .entry(key.clone())
            .and_modify(|entry| {
                entry.site = site;
                entry.expires_at = expires_at;
            })
            .or_insert_with(|| TrackerEntry {
                original: key.clone(),
                latest: key.clone(),
                site,
                policy: DEFAULT_REFERRER_POLICY.to_string(),
                expires_at,
            });
    }

    /// Record that `original` redirected to `redirect`. Unknown originals are
    /// ignored.
    pub fn update(&self, original: &str, redirect: &str, policy: Option<&str>) {
        let key = normalize(original);
        if let Some(mut entry) = self.entries.get_mut(&key) {
            entry.latest = normalize(redirect);
            if let Some(policy) = policy.filter(|p| !p.is_empty()) {
                entry.policy = policy.to_string();
            }
            entry.expires_at = Instant::now() + self.ttl;
        }
    }

    /// Record a `referrer-policy` header seen on the response for `url`.
    pub fn store_referrer_policy(&self, url: &str, policy: &str) {
        let key = normalize(url);
        let expires_at = Instant::now() + self.ttl;
        let mut entry = self.entries.entry(key.clone()).or_insert_with(|| TrackerEntry {
            original: key.clone(),
            latest: key.clone(),
            site: SiteDirective::CrossSite,
            policy: policy.to_string(),
            expires_at,
        });
        entry.policy = policy.to_string();
        entry.expires_at = expires_at;
    }

    /// Combine `current` with the classification of every live redirect
    /// chain that ended at `url`. The higher-ranked directive is returned.
    ///
    /// The entry stored for `url` itself never contributes: each request is
    /// classified from its own referrer.
    pub fn most_restrictive_site(&self, url: &str, current: SiteDirective) -> SiteDirective {
        let key = normalize(url);
        let now = Instant::now();
        self.entries
            .iter()
            .filter(|e| e.expires_at > now && e.latest == key && e.key() != &key)
            .map(|e| e.site)
            .fold(current, |best, site| if site.rank() > best.rank() { site } else { best })
    }

    /// Policy recorded for `url`, if any.
    pub fn policy(&self, url: &str) -> Option<String> {
        self.entries.get(&normalize(url)).map(|e| e.policy.clone())
    }

    pub fn get(&self, url: &str) -> Option<TrackerEntry> {
        self.entries.get(&normalize(url)).map(|e| e.clone())
    }

    /// Drop entries past their expiry. Returns how many were removed.
    pub fn clean_expired(&self) -> usize {
        self.clean_expired_at(Instant::now())
    }

    pub fn clean_expired_at(&self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn normalize(url: &str) -> String {
    Url::parse(url).map(|u| u.to_string()).unwrap_or_else(|_| url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialize_sets_default_policy() {
        let tracker = ReferrerTracker::new();
        tracker.initialize("https://Site.test", SiteDirective::CrossSite);
        let entry = tracker.get("https://site.test/").unwrap();
        assert_eq!(entry.original, "https://site.test/");
        assert_eq!(entry.policy, DEFAULT_REFERRER_POLICY);
    }

    #[test]
    fn test_redirect_chain_carries_classification() {
        let tracker = ReferrerTracker::new();
        tracker.initialize("https://a.test/start", SiteDirective::SameOrigin);
        tracker.update("https://a.test/start", "https://b.test/end", Some("no-referrer"));

        let entry = tracker.get("https://a.test/start").unwrap();
        assert_eq!(entry.latest, "https://b.test/end");
        assert_eq!(entry.policy, "no-referrer");
        assert_eq!(
            tracker.most_restrictive_site("https://b.test/end", SiteDirective::CrossSite),
            SiteDirective::SameOrigin
        );
    }

    #[test]
    fn test_own_entry_does_not_override_request() {
        let tracker = ReferrerTracker::new();
        tracker.initialize("https://a.test/x", SiteDirective::None);
        assert_eq!(
            tracker.most_restrictive_site("https://a.test/x", SiteDirective::CrossSite),
            SiteDirective::CrossSite
        );
    }

    #[test]
    fn test_untracked_url_keeps_current() {
        let tracker = ReferrerTracker::new();
        assert_eq!(
            tracker.most_restrictive_site("https://x.test/", SiteDirective::SameSite),
            SiteDirective::SameSite
        );
        tracker.update("https://x.test/", "https://y.test/", None);
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_store_policy_creates_cross_site_entry() {
        let tracker = ReferrerTracker::new();
        tracker.store_referrer_policy("https://x.test/", "origin");
        let entry = tracker.get("https://x.test/").unwrap();
        assert_eq!(entry.site, SiteDirective::CrossSite);
        assert_eq!(entry.policy, "origin");
    }

    #[test]
    fn test_sweep_removes_expired_only() {
        let tracker = ReferrerTracker::with_ttl(Duration::from_secs(60));
        tracker.initialize("https://x.test/", SiteDirective::None);
        assert_eq!(tracker.clean_expired(), 0);
        assert_eq!(tracker.clean_expired_at(Instant::now() + Duration::from_secs(61)), 1);
        assert!(tracker.is_empty());
    }
}
