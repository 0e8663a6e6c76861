//! Per-call rewrite context.

use url::Url;

/// Resolution context passed to every rewrite call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlMeta {
    /// Base URL relative references resolve against.
    pub base: Url,

    /// Real URL of the top-level frame, when known.
    pub top_frame: Option<String>,

    /// Real URL of the parent frame, when known.
    pub parent_frame: Option<String>,

    /// Resource-type hint (e.g. "script", "worker").
    pub kind: Option<String>,
}

impl UrlMeta {
    pub fn new(base: Url) -> Self {
        Self {
            base,
            top_frame: None,
            parent_frame: None,
            kind: None,
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn with_frames(mut self, top: Option<String>, parent: Option<String>) -> Self {
        self.top_frame = top;
        self.parent_frame = parent;
        self
    }
}
