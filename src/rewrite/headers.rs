//! Response header rewriting.

use axum::http::header::{HeaderMap, HeaderValue, LOCATION};

/// Headers removed from every proxied response.
pub const STRIPPED_HEADERS: &[&str] = &[
    "content-security-policy",
    "content-security-policy-report-only",
    "cross-origin-resource-policy",
    "x-frame-options",
    // Captured into the cookie jar instead.
    "set-cookie",
    // Invalidated once the body is rewritten.
    "content-length",
    "transfer-encoding",
    "connection",
    "keep-alive",
];

/// Copy `headers` without the stripped set, passing `location` through
/// `rewrite_location`.
pub fn rewrite_headers(headers: &HeaderMap, rewrite_location: impl Fn(&str) -> String) -> HeaderMap {
    let mut out = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if STRIPPED_HEADERS.contains(&name.as_str()) {
            continue;
        }
        if name == LOCATION {
            if let Ok(raw) = value.to_str() {
                if let Ok(rewritten) = HeaderValue::from_str(&rewrite_location(raw)) {
                    out.append(name.clone(), rewritten);
                    continue;
                }
            }
        }
        out.append(name.clone(), value.clone());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_policy_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("content-security-policy", HeaderValue::from_static("default-src 'self'"));
        headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
        headers.insert("cross-origin-resource-policy", HeaderValue::from_static("same-origin"));
        headers.insert("set-cookie", HeaderValue::from_static("a=1"));
        headers.insert("content-type", HeaderValue::from_static("text/html"));
        headers.append("vary", HeaderValue::from_static("accept"));
        headers.append("vary", HeaderValue::from_static("origin"));

        let out = rewrite_headers(&headers, |l| l.to_string());
        assert_eq!(out.len(), 3);
        assert_eq!(out.get_all("vary").iter().count(), 2);
        assert!(out.get("x-frame-options").is_none());
    }

    #[test]
    fn test_location_is_rewritten() {
        let mut headers = HeaderMap::new();
        headers.insert(LOCATION, HeaderValue::from_static("/next"));
        let out = rewrite_headers(&headers, |l| format!("/p{}", l));
        assert_eq!(out.get(LOCATION).unwrap(), "/p/next");
    }
}
