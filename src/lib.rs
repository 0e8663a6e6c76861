//! webrascal: a web-rewriting proxy.
//!
//! Pages are fetched through `{prefix}{encoded URL}` paths. Responses are
//! rewritten so every reference they contain stays inside the proxy, and
//! the client layer virtualizes the browser APIs a page could use to
//! escape it.

// Core subsystems
pub mod codec;
pub mod config;
pub mod pipeline;
pub mod rewrite;

// State shared across requests and contexts
pub mod cookies;
pub mod security;

// Contexts and their coordination
pub mod client;
pub mod controller;

// Serving
pub mod admin;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use config::schema::{ProxyConfig, ServerConfig};
pub use controller::Controller;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use pipeline::FetchPipeline;
