//! JavaScript rewriting through the pooled external engine.

use std::panic::{self, AssertUnwindSafe};

use thiserror::Error;
use url::Url;

use crate::config::{Flag, RuntimeConfig};
use crate::observability::metrics;
use crate::rewrite::pool::{EngineError, RewriteOutput, RewriterPool};

#[derive(Debug, Error)]
pub enum RewriteError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("rewriter panicked: {0}")]
    Panicked(String),
}

/// Run the engine once. The handle is returned to the pool on every path,
/// including a panic inside the engine.
pub fn try_rewrite_js(
    pool: &RewriterPool,
    cfg: &RuntimeConfig,
    source: &str,
    base: &str,
    target_url: &str,
    is_module: bool,
) -> Result<RewriteOutput, RewriteError> {
    let handle = pool.checkout(cfg.proxy());
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        handle.rewrite(source, base, target_url, is_module)
    }));
    drop(handle);

    match result {
        Ok(output) => Ok(output?),
        Err(payload) => Err(RewriteError::Panicked(panic_message(payload.as_ref()))),
    }
}

/// Rewrite `source`, returning it unchanged if the engine fails.
pub fn rewrite_js(
    pool: &RewriterPool,
    cfg: &RuntimeConfig,
    source: &str,
    base: &str,
    target_url: &str,
    is_module: bool,
) -> String {
    if source.trim().is_empty() {
        return source.to_string();
    }

    let target = Url::parse(target_url).ok();
    let flag = |f: Flag| match &target {
        Some(url) => cfg.flag_enabled(f, url),
        None => cfg.proxy().flags.get(f),
    };

    match try_rewrite_js(pool, cfg, source, base, target_url, is_module) {
        Ok(output) => {
            if let Some(first) = output.errors.first() {
                if flag(Flag::RewriterLogs) {
                    tracing::warn!(
                        url = %target_url,
                        errors = ?output.errors,
                        "JS rewriter reported errors"
                    );
                }
                if !flag(Flag::AllowInvalidJs) {
                    metrics::record_rewrite("js", "rejected");
                    return syntax_error_stub(first);
                }
            }
            metrics::record_rewrite("js", "ok");
            output.source
        }
        Err(e) => {
            if flag(Flag::RewriterLogs) {
                tracing::warn!(url = %target_url, error = %e, "JS rewrite failed, serving original");
            } else {
                tracing::debug!(url = %target_url, error = %e, "JS rewrite failed, serving original");
            }
            metrics::record_rewrite("js", "failed");
            source.to_string()
        }
    }
}

/// A script that throws `message` as a `SyntaxError` when run.
pub fn syntax_error_stub(message: &str) -> String {
    let literal = serde_json::to_string(message).unwrap_or_else(|_| "\"\"".to_string());
    format!("throw new SyntaxError({});", literal)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
