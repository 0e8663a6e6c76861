//! Request identification and extraction.
//!
//! # Responsibilities
//! - Assign every request an `x-request-id` (UUID v4) unless the caller
//!   already sent one, and echo it on the response
//! - Buffer an incoming request into a [`ProxyRequest`] under the body limit
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Oversized bodies are rejected before the pipeline sees them

use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, Request, StatusCode};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

use crate::pipeline::ProxyRequest;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Layer that stamps a fresh request id on requests lacking one.
pub fn set_request_id() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid)
}

/// Layer that copies the request id onto the response.
pub fn propagate_request_id() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::new(X_REQUEST_ID)
}

pub trait RequestIdExt {
    /// The request id, or `"unknown"` when absent.
    fn request_id(&self) -> &str;
}

impl RequestIdExt for HeaderMap {
    fn request_id(&self) -> &str {
        self.get(&X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
    }
}

/// Buffer `request` into a pipeline request.
pub async fn into_proxy_request(request: Request<Body>, limit: usize) -> Result<ProxyRequest, StatusCode> {
    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, limit).await.map_err(|e| {
        tracing::warn!(
            request_id = %parts.headers.request_id(),
            limit,
            error = %e,
            "Request body rejected"
        );
        StatusCode::PAYLOAD_TOO_LARGE
    })?;

    Ok(ProxyRequest {
        method: parts.method,
        uri: parts.uri,
        headers: parts.headers,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_request_id_lookup() {
        let mut headers = HeaderMap::new();
        assert_eq!(headers.request_id(), "unknown");
        headers.insert(X_REQUEST_ID, HeaderValue::from_static("abc"));
        assert_eq!(headers.request_id(), "abc");
    }

    #[tokio::test]
    async fn test_body_limit() {
        let request = Request::builder()
            .uri("/webrascal/x")
            .body(Body::from(vec![0u8; 32]))
            .unwrap();
        assert_eq!(
            into_proxy_request(request, 8).await.unwrap_err(),
            StatusCode::PAYLOAD_TOO_LARGE
        );

        let request = Request::builder()
            .method("POST")
            .uri("/webrascal/x?y=1")
            .body(Body::from("hello"))
            .unwrap();
        let proxied = into_proxy_request(request, 8).await.unwrap();
        assert_eq!(proxied.method, "POST");
        assert_eq!(proxied.uri.query(), Some("y=1"));
        assert_eq!(&proxied.body[..], b"hello");
    }
}
