//! Stored cookie representation.

use serde::{Deserialize, Serialize};

/// One stored cookie. Unique per `(domain, path, name)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CookieRecord {
    pub domain: String,
    pub path: String,
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub same_site: Option<String>,
    /// Expiry as Unix milliseconds. `None` for session cookies.
    #[serde(default, rename = "expires", skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

impl CookieRecord {
    pub fn key(&self) -> (String, String, String) {
        (self.domain.clone(), self.path.clone(), self.name.clone())
    }

    pub fn is_expired(&self, now_ms: i64) -> bool {
        self.expires_at.is_some_and(|at| at <= now_ms)
    }

    /// True if this cookie would be sent to `host` at `path` over `scheme`.
    pub fn matches(&self, host: &str, path: &str, scheme: &str) -> bool {
        let host = host.to_ascii_lowercase();
        let domain_ok = host == self.domain
            || (host.len() > self.domain.len()
                && host.ends_with(&self.domain)
                && host.as_bytes()[host.len() - self.domain.len() - 1] == b'.');
        domain_ok && path.starts_with(&self.path) && (!self.secure || scheme == "https")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(domain: &str, path: &str, secure: bool) -> CookieRecord {
        CookieRecord {
            domain: domain.to_string(),
            path: path.to_string(),
            name: "n".to_string(),
            value: "v".to_string(),
            secure,
            http_only: false,
            same_site: None,
            expires_at: None,
        }
    }

    #[test]
    fn test_domain_suffix_requires_dot() {
        let r = record("site.test", "/", false);
        assert!(r.matches("site.test", "/", "http"));
        assert!(r.matches("www.Site.test", "/", "http"));
        assert!(!r.matches("evilsite.test", "/", "http"));
    }

    #[test]
    fn test_path_and_secure() {
        let r = record("site.test", "/app", true);
        assert!(r.matches("site.test", "/app/x", "https"));
        assert!(!r.matches("site.test", "/other", "https"));
        assert!(!r.matches("site.test", "/app", "http"));
    }

    #[test]
    fn test_serialized_field_names() {
        let mut r = record("site.test", "/", false);
        r.expires_at = Some(5);
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["httpOnly"], false);
        assert_eq!(json["expires"], 5);
        assert!(json.get("sameSite").is_none());
    }
}
