use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::controller::messages::{Message, Reply};
use crate::http::server::AppState;

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub prefix: String,
    pub origin: String,
    pub cookies: usize,
    pub tracked_referrers: usize,
    pub rewriter_pool: PoolStatus,
}

#[derive(Debug, Serialize)]
pub struct PoolStatus {
    pub size: usize,
    pub in_use: usize,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let pipeline = &state.pipeline;
    let cfg = pipeline.config().load();
    let pool = pipeline.rewriter().pool();

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        prefix: cfg.prefix().to_string(),
        origin: cfg.codec().origin_str(),
        cookies: pipeline.jar().len(),
        tracked_referrers: pipeline.tracker().len(),
        rewriter_pool: PoolStatus {
            size: pool.size(),
            in_use: pool.in_use(),
        },
    })
}

pub async fn get_config(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(state.pipeline.config().load().to_json())
}

pub async fn get_cookies(State(state): State<AppState>) -> impl IntoResponse {
    match state.pipeline.jar().dump() {
        Ok(dump) => (StatusCode::OK, dump).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

/// Deliver one protocol message to the service side.
pub async fn post_message(State(state): State<AppState>, Json(message): Json<Message>) -> Json<Reply> {
    tracing::info!(kind = message.kind(), "Message received over HTTP");
    Json(state.pipeline.handle_message(message))
}
