//! Resource kind of an intercepted request.

use axum::http::HeaderMap;

/// Destination of a request, taken from `sec-fetch-dest`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Document,
    Iframe,
    Script,
    Style,
    Worker,
    SharedWorker,
    Other,
}

impl ResourceKind {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        headers
            .get("sec-fetch-dest")
            .and_then(|v| v.to_str().ok())
            .map(Self::from_destination)
            .unwrap_or(ResourceKind::Other)
    }

    pub fn from_destination(dest: &str) -> Self {
        match dest.trim().to_ascii_lowercase().as_str() {
            "document" => ResourceKind::Document,
            "iframe" | "frame" => ResourceKind::Iframe,
            "script" => ResourceKind::Script,
            "style" => ResourceKind::Style,
            "worker" => ResourceKind::Worker,
            "sharedworker" => ResourceKind::SharedWorker,
            _ => ResourceKind::Other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Document => "document",
            ResourceKind::Iframe => "iframe",
            ResourceKind::Script => "script",
            ResourceKind::Style => "style",
            ResourceKind::Worker => "worker",
            ResourceKind::SharedWorker => "sharedworker",
            ResourceKind::Other => "other",
        }
    }

    /// Document or iframe navigation.
    pub fn is_navigation(self) -> bool {
        matches!(self, ResourceKind::Document | ResourceKind::Iframe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_headers() {
        let mut headers = HeaderMap::new();
        assert_eq!(ResourceKind::from_headers(&headers), ResourceKind::Other);
        headers.insert("sec-fetch-dest", "IFRAME".parse().unwrap());
        let kind = ResourceKind::from_headers(&headers);
        assert_eq!(kind, ResourceKind::Iframe);
        assert!(kind.is_navigation());
        assert!(!ResourceKind::from_destination("image").is_navigation());
    }
}
