//! The fetch interception pipeline.
//!
//! Every request under the proxy prefix runs the same linear sequence:
//!
//! ```text
//! decode → guard → prepare → forward → headers → body → sweep → respond
//! ```
//!
//! The stage reached is kept so failures can report where they happened.

use std::sync::Arc;
use std::time::Instant;

use axum::body::{Body, Bytes};
use axum::http::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT_ENCODING, CONNECTION, CONTENT_DISPOSITION,
    CONTENT_LENGTH, CONTENT_TYPE, COOKIE, HOST, LOCATION, ORIGIN, REFERER, REFERRER_POLICY,
    SET_COOKIE, TRANSFER_ENCODING,
};
use axum::http::{Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use url::Url;

use crate::codec::UrlMeta;
use crate::config::{Flag, RuntimeConfig, SharedConfig};
use crate::controller::messages::{Message, MessageBus, Reply};
use crate::cookies::CookieJar;
use crate::observability::metrics;
use crate::pipeline::error::PipelineError;
use crate::pipeline::error_page::{render_error_page, ErrorDiagnostics};
use crate::pipeline::resource::ResourceKind;
use crate::pipeline::stage::Stage;
use crate::pipeline::transport::{Transport, UpstreamRequest, UpstreamResponse};
use crate::rewrite::{Rewriter, WorkerKind};
use crate::security::{get_site_directive, ReferrerTracker};

const SEC_FETCH_SITE: HeaderName = HeaderName::from_static("sec-fetch-site");

/// Header carrying the error code on pipeline error pages.
pub const ERROR_CODE_HEADER: HeaderName = HeaderName::from_static("x-webrascal-error");

/// An intercepted request, as received from the embedded page.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[derive(Debug, Clone)]
pub struct ProxyResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl IntoResponse for ProxyResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

/// What is known about the request so far; used to build error pages.
#[derive(Debug)]
struct Trace {
    method: String,
    request_url: String,
    target: Option<Url>,
    kind: ResourceKind,
    stage: Stage,
}

#[derive(Clone)]
pub struct FetchPipeline {
    config: SharedConfig,
    rewriter: Rewriter,
    jar: Arc<CookieJar>,
    tracker: Arc<ReferrerTracker>,
    transport: Arc<dyn Transport>,
    bus: MessageBus,
    error_preview_bytes: usize,
}

impl FetchPipeline {
    pub fn new(config: SharedConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            config,
            rewriter: Rewriter::passthrough(),
            jar: Arc::new(CookieJar::new()),
            tracker: Arc::new(ReferrerTracker::new()),
            transport,
            bus: MessageBus::default(),
            error_preview_bytes: 512,
        }
    }

    pub fn with_rewriter(mut self, rewriter: Rewriter) -> Self {
        self.rewriter = rewriter;
        self
    }

    pub fn with_jar(mut self, jar: Arc<CookieJar>) -> Self {
        self.jar = jar;
        self
    }

    pub fn with_tracker(mut self, tracker: Arc<ReferrerTracker>) -> Self {
        self.tracker = tracker;
        self
    }

    pub fn with_bus(mut self, bus: MessageBus) -> Self {
        self.bus = bus;
        self
    }

    pub fn with_error_preview(mut self, bytes: usize) -> Self {
        self.error_preview_bytes = bytes;
        self
    }

    pub fn config(&self) -> &SharedConfig {
        &self.config
    }

    pub fn rewriter(&self) -> &Rewriter {
        &self.rewriter
    }

    pub fn jar(&self) -> &Arc<CookieJar> {
        &self.jar
    }

    pub fn tracker(&self) -> &Arc<ReferrerTracker> {
        &self.tracker
    }

    pub fn bus(&self) -> &MessageBus {
        &self.bus
    }

    /// Run the pipeline for one request. Never fails; errors become error
    /// pages.
    pub async fn handle(&self, request: ProxyRequest) -> ProxyResponse {
        let start = Instant::now();
        let cfg = self.config.load_full();
        let mut trace = Trace {
            method: request.method.to_string(),
            request_url: request.uri.to_string(),
            target: None,
            kind: ResourceKind::from_headers(&request.headers),
            stage: Stage::Decode,
        };

        let response = match self.run(&cfg, request, &mut trace).await {
            Ok(response) => response,
            Err(error) => self.error_response(&trace, error),
        };

        tracing::debug!(
            method = %trace.method,
            target = ?trace.target.as_ref().map(|u| u.as_str()),
            kind = trace.kind.as_str(),
            status = response.status.as_u16(),
            "Request proxied"
        );
        metrics::record_request(&trace.method, response.status.as_u16(), trace.kind.as_str(), start);
        response
    }

    async fn run(
        &self,
        cfg: &RuntimeConfig,
        request: ProxyRequest,
        trace: &mut Trace,
    ) -> Result<ProxyResponse, PipelineError> {
        trace.stage = Stage::Decode;
        let target = decode_target(cfg, &request.uri)?;
        trace.target = Some(target.clone());

        trace.stage = Stage::Guard;
        guard(cfg, &target)?;

        trace.stage = Stage::Prepare;
        let meta = UrlMeta::new(target.clone()).with_kind(trace.kind.as_str());
        let headers = self.prepare_headers(cfg, &target, &request.headers);

        trace.stage = Stage::Forward;
        let upstream = self
            .transport
            .send(UpstreamRequest {
                method: request.method.clone(),
                url: target.clone(),
                headers,
                body: request.body,
            })
            .await?;
        if upstream.status.is_server_error() {
            return Err(PipelineError::UpstreamServer {
                status: upstream.status.as_u16(),
                preview: preview(&upstream.body, self.error_preview_bytes),
            });
        }

        trace.stage = Stage::Headers;
        let headers = self.response_headers(cfg, &target, &meta, &upstream);

        trace.stage = Stage::Body;
        let is_module = is_module_request(&request.uri);
        let body = self.rewrite_body(cfg, &target, &meta, trace.kind, is_module, &headers, upstream.body);
        if trace.kind.is_navigation() && cfg.flag_enabled(Flag::InterceptDownloads, &target) {
            if let Some(filename) = attachment_filename(&headers) {
                self.bus.publish(Message::Download {
                    url: target.to_string(),
                    filename,
                });
            }
        }

        trace.stage = Stage::Sweep;
        let swept = self.tracker.clean_expired();
        if swept > 0 {
            tracing::debug!(swept, "Expired referrer trackers removed");
        }

        trace.stage = Stage::Respond;
        // Redirects keep their status so the browser still follows the
        // rewritten `location`; every other navigation answer becomes 200.
        let status = if trace.kind.is_navigation() && !upstream.status.is_redirection() {
            StatusCode::OK
        } else {
            upstream.status
        };
        Ok(ProxyResponse { status, headers, body })
    }

    /// Build the headers sent upstream.
    fn prepare_headers(&self, cfg: &RuntimeConfig, target: &Url, incoming: &HeaderMap) -> HeaderMap {
        let mut headers = incoming.clone();
        for name in [HOST, ACCEPT_ENCODING, CONTENT_LENGTH, CONNECTION, TRANSFER_ENCODING, COOKIE, REFERER] {
            headers.remove(name);
        }

        let referrer = incoming
            .get(REFERER)
            .and_then(|v| v.to_str().ok())
            .and_then(|raw| cfg.codec().try_decode(raw))
            .and_then(|decoded| Url::parse(&decoded).ok())
            .filter(|u| u.origin() != cfg.origin().origin());

        let own = get_site_directive(target, referrer.as_ref());
        self.tracker.initialize(target.as_str(), own);
        let site = self.tracker.most_restrictive_site(target.as_str(), own);
        headers.insert(SEC_FETCH_SITE, HeaderValue::from_static(site.as_str()));

        let cookies = self.jar.get_cookies(target, false);
        if !cookies.is_empty() {
            if let Ok(value) = HeaderValue::from_str(&cookies) {
                headers.insert(COOKIE, value);
            }
        }

        match &referrer {
            Some(referrer) => {
                if let Ok(value) = HeaderValue::from_str(referrer.as_str()) {
                    headers.insert(REFERER, value);
                }
                if headers.contains_key(ORIGIN) {
                    if let Ok(value) = HeaderValue::from_str(&referrer.origin().ascii_serialization()) {
                        headers.insert(ORIGIN, value);
                    }
                }
            }
            None => {
                headers.remove(ORIGIN);
            }
        }

        headers
    }

    /// Rewrite upstream headers and record cookies, redirects and policies.
    fn response_headers(
        &self,
        cfg: &RuntimeConfig,
        target: &Url,
        meta: &UrlMeta,
        upstream: &UpstreamResponse,
    ) -> HeaderMap {
        let headers = self.rewriter.rewrite_headers(cfg, &upstream.headers, meta);

        let set_cookies: Vec<&str> = upstream
            .headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();
        if !set_cookies.is_empty() {
            self.jar.set_cookies(set_cookies, target);
            match self.jar.dump() {
                Ok(cookies) => {
                    self.bus.publish(Message::CookieSync { cookies });
                }
                Err(e) => tracing::warn!(error = %e, "Failed to serialize cookie jar"),
            }
        }

        let policy = upstream
            .headers
            .get(REFERRER_POLICY)
            .and_then(|v| v.to_str().ok());
        if let Some(location) = upstream.headers.get(LOCATION).and_then(|v| v.to_str().ok()) {
            if let Ok(next) = target.join(location) {
                self.tracker.update(target.as_str(), next.as_str(), policy);
            }
        }
        if let Some(policy) = policy {
            self.tracker.store_referrer_policy(target.as_str(), policy);
        }

        headers
    }

    #[allow(clippy::too_many_arguments)]
    fn rewrite_body(
        &self,
        cfg: &RuntimeConfig,
        target: &Url,
        meta: &UrlMeta,
        kind: ResourceKind,
        is_module: bool,
        headers: &HeaderMap,
        body: Bytes,
    ) -> Bytes {
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let is_html = kind.is_navigation() && content_type.contains("text/html");
        let rewritable = matches!(
            kind,
            ResourceKind::Script | ResourceKind::Style | ResourceKind::Worker | ResourceKind::SharedWorker
        );
        if !is_html && !rewritable {
            return body;
        }

        let text = String::from_utf8_lossy(&body);
        let rewritten = match kind {
            ResourceKind::Script => self.rewriter.rewrite_js(cfg, &text, target.as_str(), meta, is_module),
            ResourceKind::Style => self.rewriter.rewrite_css(cfg, &text, meta),
            ResourceKind::Worker => {
                self.rewriter
                    .rewrite_worker(cfg, &text, WorkerKind::Dedicated, target.as_str(), meta)
            }
            ResourceKind::SharedWorker => {
                self.rewriter
                    .rewrite_worker(cfg, &text, WorkerKind::Shared, target.as_str(), meta)
            }
            _ => self.rewriter.rewrite_html(cfg, &text, meta, true),
        };
        Bytes::from(rewritten)
    }

    fn error_response(&self, trace: &Trace, error: PipelineError) -> ProxyResponse {
        let code = error.code();
        tracing::warn!(
            code,
            stage = %trace.stage,
            method = %trace.method,
            target = ?trace.target.as_ref().map(|u| u.as_str()),
            error = %error,
            "Pipeline failed"
        );
        metrics::record_pipeline_error(code);

        let (upstream_status, preview) = match &error {
            PipelineError::UpstreamServer { status, preview } => (Some(*status), Some(preview.clone())),
            _ => (None, None),
        };
        let diagnostics = ErrorDiagnostics {
            code: code.to_string(),
            summary: error.summary().to_string(),
            method: trace.method.clone(),
            request_url: trace.request_url.clone(),
            target: trace.target.as_ref().map(|u| u.to_string()),
            resource_kind: trace.kind.as_str().to_string(),
            stage: trace.stage.to_string(),
            error: error.to_string(),
            upstream_status,
            preview,
        };

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"));
        headers.insert(ERROR_CODE_HEADER, HeaderValue::from_static(code));

        let status = if trace.kind.is_navigation() {
            StatusCode::OK
        } else {
            error.status()
        };
        ProxyResponse {
            status,
            headers,
            body: Bytes::from(render_error_page(&diagnostics)),
        }
    }

    /// Apply a message sent to the service side.
    pub fn handle_message(&self, message: Message) -> Reply {
        match message {
            Message::LoadConfig { config } => {
                match self.config.load().recompile(config) {
                    Ok(compiled) => {
                        self.config.store(Arc::new(compiled));
                        tracing::info!("Configuration replaced by loadConfig message");
                        Reply::ok()
                    }
                    Err(e) => Reply::error(e.to_string()),
                }
            }
            Message::CookieSync { cookies } => match self.jar.load(&cookies) {
                Ok(()) => Reply::ok(),
                Err(e) => Reply::error(e.to_string()),
            },
            message @ Message::Download { .. } => {
                self.bus.publish(message);
                Reply::ok()
            }
        }
    }
}

impl std::fmt::Debug for FetchPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchPipeline")
            .field("cookies", &self.jar.len())
            .field("trackers", &self.tracker.len())
            .finish()
    }
}

/// Recover the real target from the proxied request path.
fn decode_target(cfg: &RuntimeConfig, uri: &Uri) -> Result<Url, PipelineError> {
    let raw = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
    let decoded = cfg.codec().decode(raw);
    Url::parse(&decoded)
        .or_else(|_| cfg.origin().join(&decoded))
        .map_err(|e| PipelineError::internal(format!("cannot decode target from '{}': {}", raw, e)))
}

/// Refuse targets that would loop back into the proxy.
fn guard(cfg: &RuntimeConfig, target: &Url) -> Result<(), PipelineError> {
    if target.origin() == cfg.origin().origin() {
        return Err(PipelineError::PolicyViolation {
            target: target.to_string(),
            reason: "target resolves to the proxy's own origin".to_string(),
        });
    }
    if !matches!(target.scheme(), "http" | "https") {
        return Err(PipelineError::PolicyViolation {
            target: target.to_string(),
            reason: format!("scheme '{}' cannot be fetched", target.scheme()),
        });
    }
    Ok(())
}

fn is_module_request(uri: &Uri) -> bool {
    uri.query()
        .map(|q| url::form_urlencoded::parse(q.as_bytes()).any(|(k, v)| k == "type" && v == "module"))
        .unwrap_or(false)
}

fn preview(body: &[u8], limit: usize) -> String {
    let end = body.len().min(limit);
    String::from_utf8_lossy(&body[..end]).into_owned()
}

/// `Some(filename)` when the response is an attachment.
fn attachment_filename(headers: &HeaderMap) -> Option<Option<String>> {
    let value = headers.get(CONTENT_DISPOSITION)?.to_str().ok()?;
    let mut parts = value.split(';').map(str::trim);
    if !parts.next()?.eq_ignore_ascii_case("attachment") {
        return None;
    }
    let filename = parts.find_map(|p| {
        let (key, value) = p.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("filename")
            .then(|| value.trim().trim_matches('"').to_string())
    });
    Some(filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_query() {
        assert!(is_module_request(&"/webrascal/abc?type=module".parse().unwrap()));
        assert!(!is_module_request(&"/webrascal/abc?type=classic".parse().unwrap()));
        assert!(!is_module_request(&"/webrascal/abc".parse().unwrap()));
    }

    #[test]
    fn test_attachment_filename() {
        let mut headers = HeaderMap::new();
        assert_eq!(attachment_filename(&headers), None);
        headers.insert(CONTENT_DISPOSITION, "inline".parse().unwrap());
        assert_eq!(attachment_filename(&headers), None);
        headers.insert(CONTENT_DISPOSITION, "attachment".parse().unwrap());
        assert_eq!(attachment_filename(&headers), Some(None));
        headers.insert(CONTENT_DISPOSITION, "Attachment; filename=\"r.pdf\"".parse().unwrap());
        assert_eq!(attachment_filename(&headers), Some(Some("r.pdf".to_string())));
    }

    #[test]
    fn test_preview_truncates() {
        assert_eq!(preview(b"abcdef", 3), "abc");
        assert_eq!(preview(b"ab", 3), "ab");
    }
}
