//! Introspection and message endpoints under `/__webrascal/`.
//!
//! These sit outside the proxy prefix, so they never reach the pipeline.

pub mod handlers;

use axum::routing::{get, post};
use axum::Router;

use crate::http::server::AppState;

use self::handlers::*;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/__webrascal/status", get(get_status))
        .route("/__webrascal/config", get(get_config))
        .route("/__webrascal/cookies", get(get_cookies))
        .route("/__webrascal/message", post(post_message))
}
