//! Named frames driven by the controller.

use std::sync::{Arc, PoisonError, RwLock};

use thiserror::Error;
use url::Url;

use crate::client::api::{ApiCall, ApiValue};
use crate::client::ExecutionContext;
use crate::codec::{IdentityScripts, UrlMeta};
use crate::config::SharedConfig;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("invalid URL '{0}'")]
    InvalidUrl(String),

    #[error("frame has no live context")]
    Detached,
}

#[derive(Debug)]
pub struct Frame {
    name: String,
    config: SharedConfig,
    src: RwLock<String>,
    context: RwLock<Option<Arc<ExecutionContext>>>,
}

impl Frame {
    pub(crate) fn new(config: SharedConfig) -> Self {
        Self {
            name: uuid::Uuid::new_v4().to_string(),
            config,
            src: RwLock::new(String::new()),
            context: RwLock::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The proxied URL the host should load into the frame element.
    pub fn src(&self) -> String {
        self.src.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Bind the context the host created for this frame's document.
    pub fn attach(&self, ctx: Arc<ExecutionContext>) {
        *self.context.write().unwrap_or_else(PoisonError::into_inner) = Some(ctx);
    }

    pub fn context(&self) -> Option<Arc<ExecutionContext>> {
        self.context
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Navigate to `url`. The previous document's context is dropped.
    pub fn go(&self, url: &str) -> Result<String, FrameError> {
        let target = Url::parse(url).map_err(|_| FrameError::InvalidUrl(url.to_string()))?;
        let cfg = self.config.load();
        let codec = cfg.codec();
        let encoded = codec.encode(target.as_str(), &UrlMeta::new(target.clone()), &IdentityScripts);
        let src = format!("{}{}", codec.origin_str(), encoded);

        *self.src.write().unwrap_or_else(PoisonError::into_inner) = src.clone();
        *self.context.write().unwrap_or_else(PoisonError::into_inner) = None;
        tracing::debug!(frame = %self.name, url = %target, "Frame navigated");
        Ok(src)
    }

    pub fn back(&self) -> Result<ApiValue, FrameError> {
        self.traverse(-1)
    }

    pub fn forward(&self) -> Result<ApiValue, FrameError> {
        self.traverse(1)
    }

    pub fn reload(&self) -> Result<ApiValue, FrameError> {
        let ctx = self.context().ok_or(FrameError::Detached)?;
        Ok(ctx.call(ApiCall::Reload))
    }

    /// The real URL currently shown, if any.
    pub fn url(&self) -> Option<Url> {
        if let Some(ctx) = self.context() {
            return Some(ctx.url());
        }
        let src = self.src();
        if src.is_empty() {
            return None;
        }
        let decoded = self.config.load().codec().try_decode(&src)?;
        Url::parse(&decoded).ok()
    }

    fn traverse(&self, delta: i32) -> Result<ApiValue, FrameError> {
        let ctx = self.context().ok_or(FrameError::Detached)?;
        Ok(ctx.call(ApiCall::HistoryTraverse { delta }))
    }
}
