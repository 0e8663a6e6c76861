//! HTTP server setup.
//!
//! # Responsibilities
//! - Build the Axum router: admin endpoints plus the proxy fallback
//! - Wire up middleware (request ID, tracing)
//! - Hand every request under the prefix to the fetch pipeline
//! - Apply configuration reloads without restarting

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;
use url::Url;

use crate::admin;
use crate::config::schema::{BundleConfig, LimitsConfig};
use crate::config::validation::ValidationError;
use crate::config::{ConfigError, RuntimeConfig, ServerConfig};
use crate::http::bundle;
use crate::http::request::{self, RequestIdExt};
use crate::observability::metrics;
use crate::pipeline::{FetchPipeline, Transport};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: FetchPipeline,
    pub limits: LimitsConfig,
    pub bundle: BundleConfig,
}

/// HTTP front end of the proxy.
pub struct HttpServer {
    router: Router,
    config: ServerConfig,
    pipeline: FetchPipeline,
}

impl HttpServer {
    /// Compile `config` and build a server forwarding through `transport`.
    pub fn new(config: ServerConfig, transport: Arc<dyn Transport>) -> Result<Self, ConfigError> {
        let origin = public_origin(&config)?;
        let runtime = RuntimeConfig::compile(config.proxy.clone(), origin)?;
        let pipeline = FetchPipeline::new(runtime.into_shared(), transport)
            .with_error_preview(config.limits.error_preview_bytes);
        Ok(Self::with_pipeline(config, pipeline))
    }

    /// Build a server around an existing pipeline.
    pub fn with_pipeline(config: ServerConfig, pipeline: FetchPipeline) -> Self {
        let state = AppState {
            pipeline: pipeline.clone(),
            limits: config.limits.clone(),
            bundle: config.bundle.clone(),
        };
        let router = Self::build_router(state);
        Self {
            router,
            config,
            pipeline,
        }
    }

    fn build_router(state: AppState) -> Router {
        Router::new()
            .merge(admin::router())
            .fallback(proxy_handler)
            .with_state(state)
            .layer(request::propagate_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(request::set_request_id())
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn pipeline(&self) -> &FetchPipeline {
        &self.pipeline
    }

    /// The fully layered router, for serving or in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until `shutdown` resolves.
    ///
    /// Each configuration received on `updates` replaces the proxy section;
    /// listener and upstream settings only apply on restart.
    pub async fn run<F>(
        self,
        listener: TcpListener,
        updates: Option<mpsc::UnboundedReceiver<ServerConfig>>,
        shutdown: F,
    ) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            prefix = %self.config.proxy.prefix,
            "HTTP server starting"
        );

        let reloader = updates.map(|rx| tokio::spawn(apply_updates(self.pipeline.clone(), self.config.clone(), rx)));

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        if let Some(task) = reloader {
            task.abort();
        }
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Proxy handler: everything under the prefix goes through the pipeline.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let (prefix, wasm_path) = {
        let cfg = state.pipeline.config().load();
        (cfg.prefix().to_string(), cfg.proxy().files.wasm.clone())
    };
    if let Some(module) = &state.bundle.wasm_module {
        if request.uri().path() == wasm_path {
            return bundle::serve_wasm(module).await;
        }
    }
    if !request.uri().path().starts_with(&prefix) {
        tracing::debug!(
            request_id = %request.headers().request_id(),
            path = %request.uri().path(),
            "Outside proxy prefix"
        );
        metrics::record_request(request.method().as_str(), 404, "none", start);
        return (StatusCode::NOT_FOUND, "Not found").into_response();
    }

    let method = request.method().clone();
    match request::into_proxy_request(request, state.limits.max_request_body).await {
        Ok(proxied) => state.pipeline.handle(proxied).await.into_response(),
        Err(status) => {
            metrics::record_request(method.as_str(), status.as_u16(), "none", start);
            status.into_response()
        }
    }
}

async fn apply_updates(
    pipeline: FetchPipeline,
    mut current: ServerConfig,
    mut rx: mpsc::UnboundedReceiver<ServerConfig>,
) {
    while let Some(next) = rx.recv().await {
        let restart_only = crate::config::watcher::changed_sections(&current, &next)
            .into_iter()
            .filter(|s| *s != "proxy")
            .collect::<Vec<_>>();
        if !restart_only.is_empty() {
            tracing::warn!(sections = ?restart_only, "Changes outside the proxy section take effect after a restart");
        }

        let compiled = pipeline.config().load().recompile(next.proxy.clone());
        match compiled {
            Ok(compiled) => {
                pipeline.config().store(Arc::new(compiled));
                tracing::info!(prefix = %next.proxy.prefix, "Configuration reloaded");
                current = next;
            }
            Err(e) => {
                tracing::error!(error = %e, "Rejected configuration reload, keeping current configuration");
            }
        }
    }
}

fn public_origin(config: &ServerConfig) -> Result<Url, ConfigError> {
    Url::parse(&config.listener.public_origin).map_err(|e| {
        ConfigError::Validation(vec![ValidationError {
            field: "listener.public_origin".to_string(),
            message: e.to_string(),
        }])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;
    use axum::http::HeaderMap;
    use futures_util::future::BoxFuture;
    use tower::ServiceExt;

    use crate::pipeline::{TransportError, UpstreamRequest, UpstreamResponse};

    /// Answers every request with the target URL as a plain-text body.
    struct EchoTransport;

    impl Transport for EchoTransport {
        fn send(&self, request: UpstreamRequest) -> BoxFuture<'_, Result<UpstreamResponse, TransportError>> {
            Box::pin(async move {
                Ok(UpstreamResponse {
                    status: StatusCode::OK,
                    headers: HeaderMap::new(),
                    body: Bytes::from(request.url.to_string()),
                })
            })
        }
    }

    fn server() -> HttpServer {
        HttpServer::new(ServerConfig::default(), Arc::new(EchoTransport)).unwrap()
    }

    async fn get(router: Router, uri: &str) -> Response {
        router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_prefix_routing() {
        let server = server();
        let path = {
            let cfg = server.pipeline().config().load();
            let target = Url::parse("https://site.test/hello").unwrap();
            cfg.codec()
                .encode(target.as_str(), &crate::codec::UrlMeta::new(target.clone()), &crate::codec::IdentityScripts)
        };

        let response = get(server.router(), &path).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"https://site.test/hello");

        let response = get(server.router(), "/elsewhere").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_admin_routes_bypass_pipeline() {
        let response = get(server().router(), "/__webrascal/config").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["prefix"], "/webrascal/");
    }

    #[tokio::test]
    async fn test_wasm_bundle_is_served_as_script() {
        let module = std::env::temp_dir().join(format!("webrascal-{}.wasm", uuid::Uuid::new_v4()));
        std::fs::write(&module, b"\0asm").unwrap();
        let mut config = ServerConfig::default();
        config.bundle.wasm_module = Some(module.clone());
        let bundled = HttpServer::new(config, Arc::new(EchoTransport)).unwrap();

        let response = get(bundled.router(), "/dist/webrascal.wasm.js").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "application/javascript");
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert!(body.starts_with(b"self.WASM = Uint8Array.from(atob(\"AGFzbQ==\")"));

        let response = get(server().router(), "/dist/webrascal.wasm.js").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        std::fs::remove_file(&module).unwrap();
    }

    #[test]
    fn test_bad_public_origin_is_a_config_error() {
        let mut config = ServerConfig::default();
        config.listener.public_origin = "not a url".to_string();
        assert!(matches!(
            HttpServer::new(config, Arc::new(EchoTransport)),
            Err(ConfigError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_reload_swaps_proxy_section() {
        let server = server();
        let pipeline = server.pipeline().clone();
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(apply_updates(pipeline.clone(), server.config().clone(), rx));

        let mut next = ServerConfig::default();
        next.proxy.prefix = "/p/".to_string();
        tx.send(next).unwrap();
        let mut broken = ServerConfig::default();
        broken.proxy.prefix = "broken".to_string();
        tx.send(broken).unwrap();
        drop(tx);
        task.await.unwrap();

        assert_eq!(pipeline.config().load().prefix(), "/p/");
    }
}
