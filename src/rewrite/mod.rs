//! Content rewriting subsystem.
//!
//! # Data Flow
//! ```text
//! upstream body + UrlMeta
//!     → html.rs   (attributes, inline scripts/styles, bootstrap)
//!     → css.rs    (url(...) references)
//!     → js.rs     (pooled external engine, pool.rs)
//!     → worker.rs (runtime preamble + rewritten body)
//! upstream headers
//!     → headers.rs (policy headers stripped, location rewritten)
//! ```
//!
//! # Design Decisions
//! - Every rewriter reads one `RuntimeConfig` snapshot per call
//! - Rewrite failures are fail-open: the original content is served
//! - No DOM or CSSOM; targeted patterns only

pub mod css;
pub mod headers;
pub mod html;
pub mod js;
pub mod pool;
pub mod rules;
pub mod worker;

use std::sync::Arc;

use axum::http::HeaderMap;

use crate::codec::{ScriptRewrite, UrlMeta};
use crate::config::RuntimeConfig;
use crate::observability::metrics;

pub use js::RewriteError;
pub use pool::{EngineError, ExternalRewriter, RewriteOutput, RewriterFactory, RewriterPool};
pub use worker::WorkerKind;

/// Entry point for all content rewriting.
#[derive(Debug, Clone)]
pub struct Rewriter {
    pool: Arc<RewriterPool>,
}

impl Rewriter {
    pub fn new(pool: Arc<RewriterPool>) -> Self {
        Self { pool }
    }

    /// A rewriter whose JS engine returns scripts unchanged.
    pub fn passthrough() -> Self {
        Self::new(Arc::new(RewriterPool::passthrough()))
    }

    pub fn pool(&self) -> &Arc<RewriterPool> {
        &self.pool
    }

    pub fn rewrite_url(&self, cfg: &RuntimeConfig, input: &str, meta: &UrlMeta) -> String {
        cfg.codec().encode(input, meta, &ScriptBridge { rewriter: self, cfg })
    }

    pub fn unrewrite_url(&self, cfg: &RuntimeConfig, input: &str) -> String {
        cfg.codec().decode(input)
    }

    /// Rewrite an HTML document. `from_top` injects the bootstrap sequence.
    pub fn rewrite_html(&self, cfg: &RuntimeConfig, html: &str, meta: &UrlMeta, from_top: bool) -> String {
        let bootstrap = from_top.then(|| bootstrap(cfg));
        let ctx = DocumentContext { rewriter: self, cfg, meta };
        let out = html::rewrite_html(html, &ctx, bootstrap.as_deref());
        metrics::record_rewrite("html", "ok");
        out
    }

    pub fn rewrite_css(&self, cfg: &RuntimeConfig, css: &str, meta: &UrlMeta) -> String {
        let out = css::rewrite_css(css, |url| self.rewrite_url(cfg, url, meta));
        metrics::record_rewrite("css", "ok");
        out
    }

    /// Rewrite a script fetched from `target_url`.
    pub fn rewrite_js(
        &self,
        cfg: &RuntimeConfig,
        source: &str,
        target_url: &str,
        meta: &UrlMeta,
        is_module: bool,
    ) -> String {
        js::rewrite_js(&self.pool, cfg, source, meta.base.as_str(), target_url, is_module)
    }

    pub fn try_rewrite_js(
        &self,
        cfg: &RuntimeConfig,
        source: &str,
        target_url: &str,
        meta: &UrlMeta,
        is_module: bool,
    ) -> Result<RewriteOutput, RewriteError> {
        js::try_rewrite_js(&self.pool, cfg, source, meta.base.as_str(), target_url, is_module)
    }

    pub fn rewrite_headers(&self, cfg: &RuntimeConfig, headers: &HeaderMap, meta: &UrlMeta) -> HeaderMap {
        headers::rewrite_headers(headers, |location| self.rewrite_url(cfg, location, meta))
    }

    pub fn rewrite_worker(
        &self,
        cfg: &RuntimeConfig,
        source: &str,
        kind: WorkerKind,
        target_url: &str,
        meta: &UrlMeta,
    ) -> String {
        let body = self.rewrite_js(cfg, source, target_url, meta, kind.is_module());
        let mut out = worker::preamble(cfg, kind);
        out.push_str(&body);
        out
    }
}

/// Runtime configuration as an inline script literal, `<` escaped.
pub(crate) fn inline_config(cfg: &RuntimeConfig) -> String {
    serde_json::to_string(cfg.proxy())
        .unwrap_or_else(|_| "{}".to_string())
        .replace('<', "\\u003c")
}

/// The sequence injected into top-level documents.
pub fn bootstrap(cfg: &RuntimeConfig) -> String {
    let files = &cfg.proxy().files;
    format!(
        concat!(
            "<script>self.__WEBRASCAL_CONFIG__={};</script>",
            "<script src=\"{}\"></script>",
            "<script src=\"{}\"></script>",
            "<script>if (self.$webrascalLoadClient) {{ ",
            "self.$webrascalLoadClient().loadAndHook(self.__WEBRASCAL_CONFIG__); }}</script>",
        ),
        inline_config(cfg),
        files.wasm,
        files.all,
    )
}

struct ScriptBridge<'a> {
    rewriter: &'a Rewriter,
    cfg: &'a RuntimeConfig,
}

impl ScriptRewrite for ScriptBridge<'_> {
    fn rewrite_script(&self, source: &str, meta: &UrlMeta) -> String {
        self.rewriter
            .rewrite_js(self.cfg, source, meta.base.as_str(), meta, false)
    }
}

struct DocumentContext<'a> {
    rewriter: &'a Rewriter,
    cfg: &'a RuntimeConfig,
    meta: &'a UrlMeta,
}

impl html::HtmlContext for DocumentContext<'_> {
    fn url(&self, value: &str) -> String {
        self.rewriter.rewrite_url(self.cfg, value, self.meta)
    }

    fn script(&self, source: &str, is_module: bool) -> String {
        self.rewriter
            .rewrite_js(self.cfg, source, self.meta.base.as_str(), self.meta, is_module)
    }

    fn style(&self, source: &str) -> String {
        self.rewriter.rewrite_css(self.cfg, source, self.meta)
    }
}
