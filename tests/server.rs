//! End-to-end tests through the HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;

use serde_json::{json, Value};
use tokio::net::TcpListener;
use url::Url;
use webrascal::codec::{IdentityScripts, UrlMeta};
use webrascal::config::ServerConfig;
use webrascal::pipeline::ReqwestTransport;
use webrascal::{HttpServer, Shutdown};

mod common;
use common::MockResponse;

struct Running {
    addr: SocketAddr,
    shutdown: Shutdown,
    server: tokio::task::JoinHandle<()>,
}

impl Running {
    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    async fn stop(self) {
        self.shutdown.trigger();
        let _ = self.server.await;
    }
}

async fn start(config: ServerConfig) -> (Running, HttpServerHandle) {
    let transport = ReqwestTransport::new(&config.upstream, config.limits.max_upstream_body).unwrap();
    let server = HttpServer::new(config, Arc::new(transport)).unwrap();
    let handle = HttpServerHandle {
        config: server.pipeline().config().clone(),
    };

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let signalled = shutdown.signalled();
    let server = tokio::spawn(async move {
        server.run(listener, None, signalled).await.unwrap();
    });

    (
        Running {
            addr,
            shutdown,
            server,
        },
        handle,
    )
}

struct HttpServerHandle {
    config: webrascal::config::SharedConfig,
}

impl HttpServerHandle {
    fn proxied(&self, target: &str) -> String {
        let cfg = self.config.load();
        cfg.codec()
            .encode(target, &UrlMeta::new(Url::parse(target).unwrap()), &IdentityScripts)
    }
}

fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

fn config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.listener.public_origin = "http://proxy.test".to_string();
    config
}

#[tokio::test]
async fn test_status_endpoint_and_request_id() {
    let (running, _) = start(config()).await;

    let res = client().get(running.url("/__webrascal/status")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert!(res.headers().get("x-request-id").is_some());
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "operational");
    assert_eq!(body["prefix"], "/webrascal/");
    assert_eq!(body["origin"], "http://proxy.test");

    let res = client()
        .get(running.url("/__webrascal/status"))
        .header("x-request-id", "given-id")
        .send()
        .await
        .unwrap();
    assert_eq!(res.headers().get("x-request-id").unwrap(), "given-id");

    running.stop().await;
}

#[tokio::test]
async fn test_paths_outside_prefix_are_not_found() {
    let (running, _) = start(config()).await;
    let res = client().get(running.url("/somewhere/else")).send().await.unwrap();
    assert_eq!(res.status(), 404);
    running.stop().await;
}

#[tokio::test]
async fn test_proxies_and_rewrites_documents() {
    let (backend, mut seen) =
        common::start_mock_backend(MockResponse::html(r#"<head></head><img src="/logo.png">"#)).await;
    let (running, handle) = start(config()).await;

    let path = handle.proxied(&format!("http://{}/home", backend));
    let res = client()
        .get(running.url(&path))
        .header("sec-fetch-dest", "document")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let html = res.text().await.unwrap();
    assert!(html.contains(r#"src="/webrascal/"#));
    assert!(html.contains("$webrascalLoadClient"));

    let head = seen.recv().await.unwrap();
    assert!(head.starts_with("GET /home HTTP/1.1"));
    assert!(!head.contains("proxy.test"));

    running.stop().await;
}

#[tokio::test]
async fn test_message_endpoint_applies_config() {
    let (running, _) = start(config()).await;
    let client = client();

    let current: Value = client
        .get(running.url("/__webrascal/config"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(current["prefix"], "/webrascal/");

    let mut next = current.clone();
    next["prefix"] = json!("/go/");
    let reply: Value = client
        .post(running.url("/__webrascal/message"))
        .json(&json!({ "webrascal$type": "loadConfig", "config": next }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(reply, json!({ "ok": true }));

    let res = client.get(running.url("/webrascal/anything")).send().await.unwrap();
    assert_eq!(res.status(), 404);

    let mut bad = current;
    bad["prefix"] = json!("no-slashes");
    let reply: Value = client
        .post(running.url("/__webrascal/message"))
        .json(&json!({ "webrascal$type": "loadConfig", "config": bad }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(reply["ok"], false);

    running.stop().await;
}

#[tokio::test]
async fn test_request_body_limit() {
    let mut config = config();
    config.limits.max_request_body = 16;
    let (running, _) = start(config).await;

    let res = client()
        .post(running.url("/webrascal/x"))
        .body(vec![b'a'; 64])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 413);

    running.stop().await;
}
