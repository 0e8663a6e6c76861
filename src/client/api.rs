//! Calls an embedded page can make into its host environment.
//!
//! Each browser API the virtualization layer intercepts is modelled as one
//! [`ApiCall`] variant. The host embedding executes the (rewritten) call and
//! answers with an [`ApiValue`].

use serde_json::Value;
use uuid::Uuid;

pub type ContextId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextKind {
    Window,
    Frame,
    Worker,
    SharedWorker,
}

/// Handle to a DOM element owned by the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementRef {
    pub id: u64,
    /// Upper- or lower-case tag name (`"SCRIPT"`, `"iframe"`, ...).
    pub tag: String,
}

impl ElementRef {
    pub fn new(id: u64, tag: impl Into<String>) -> Self {
        Self { id, tag: tag.into() }
    }

    pub fn is(&self, tag: &str) -> bool {
        self.tag.eq_ignore_ascii_case(tag)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageArea {
    Local,
    Session,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationPart {
    Href,
    Protocol,
    Host,
    Hostname,
    Port,
    Pathname,
    Search,
    Hash,
    Origin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryMethod {
    Push,
    Replace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OriginProperty {
    /// `self.origin`
    Origin,
    /// `document.URL`
    DocumentUrl,
    /// `document.documentURI`
    DocumentUri,
    /// `document.domain`
    Domain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Function,
    AsyncFunction,
    GeneratorFunction,
    AsyncGeneratorFunction,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApiCall {
    Fetch { url: String },
    /// `XMLHttpRequest.prototype.open`; `is_async` is false for
    /// synchronous requests.
    XhrOpen { method: String, url: String, is_async: bool },
    WebSocket { url: String, protocols: Vec<String> },
    EventSource { url: String },
    Worker { url: String, shared: bool },
    ServiceWorkerRegister { url: String, scope: Option<String> },
    /// `Response.prototype.url` / `Request.prototype.url` getters.
    ResponseUrl { url: String },
    HistoryState { method: HistoryMethod, url: Option<String> },
    HistoryTraverse { delta: i32 },
    Reload,
    WindowOpen { url: Option<String>, target: Option<String> },
    LocationGet { part: LocationPart },
    LocationSet { part: LocationPart, value: String },
    OriginGet { property: OriginProperty },
    SetAttribute { element: ElementRef, name: String, value: String },
    GetAttribute { element: ElementRef, name: String },
    RemoveAttribute { element: ElementRef, name: String },
    SetInnerHtml { element: ElementRef, html: String },
    /// Reflected URL properties such as `a.href` and `img.src`.
    ElementUrlGet { element: ElementRef, property: String },
    ElementUrlSet { element: ElementRef, property: String, value: String },
    /// `iframe.contentWindow` / `iframe.contentDocument`.
    FrameContent { element: ElementRef },
    StorageGet { area: StorageArea, key: String },
    StorageSet { area: StorageArea, key: String, value: String },
    StorageRemove { area: StorageArea, key: String },
    PostMessage { data: Value, target_origin: String },
    /// A `message` event about to be delivered to page listeners.
    MessageDispatch { data: Value, origin: String },
    Eval { source: String, direct: bool },
    FunctionConstructor { kind: FunctionKind, args: Vec<String> },
    FunctionToString { source: String },
    PushSourceMap { tag: String, map: Vec<u8> },
    CookieGet,
    CookieSet { value: String },
    Download { url: String, filename: Option<String> },
}

/// The API surface a call belongs to. Interceptors register per target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiTarget {
    Fetch,
    Xhr,
    WebSocket,
    EventSource,
    Worker,
    ServiceWorker,
    ResponseUrl,
    History,
    WindowOpen,
    Location,
    Origin,
    Attribute,
    InnerHtml,
    ElementUrl,
    FrameContent,
    Storage,
    PostMessage,
    MessageDispatch,
    Eval,
    Function,
    FunctionToString,
    SourceMap,
    Cookie,
    Download,
}

impl ApiCall {
    pub fn target(&self) -> ApiTarget {
        match self {
            ApiCall::Fetch { .. } => ApiTarget::Fetch,
            ApiCall::XhrOpen { .. } => ApiTarget::Xhr,
            ApiCall::WebSocket { .. } => ApiTarget::WebSocket,
            ApiCall::EventSource { .. } => ApiTarget::EventSource,
            ApiCall::Worker { .. } => ApiTarget::Worker,
            ApiCall::ServiceWorkerRegister { .. } => ApiTarget::ServiceWorker,
            ApiCall::ResponseUrl { .. } => ApiTarget::ResponseUrl,
            ApiCall::HistoryState { .. } | ApiCall::HistoryTraverse { .. } => ApiTarget::History,
            ApiCall::Reload | ApiCall::LocationGet { .. } | ApiCall::LocationSet { .. } => {
                ApiTarget::Location
            }
            ApiCall::WindowOpen { .. } => ApiTarget::WindowOpen,
            ApiCall::OriginGet { .. } => ApiTarget::Origin,
            ApiCall::SetAttribute { .. }
            | ApiCall::GetAttribute { .. }
            | ApiCall::RemoveAttribute { .. } => ApiTarget::Attribute,
            ApiCall::SetInnerHtml { .. } => ApiTarget::InnerHtml,
            ApiCall::ElementUrlGet { .. } | ApiCall::ElementUrlSet { .. } => ApiTarget::ElementUrl,
            ApiCall::FrameContent { .. } => ApiTarget::FrameContent,
            ApiCall::StorageGet { .. } | ApiCall::StorageSet { .. } | ApiCall::StorageRemove { .. } => {
                ApiTarget::Storage
            }
            ApiCall::PostMessage { .. } => ApiTarget::PostMessage,
            ApiCall::MessageDispatch { .. } => ApiTarget::MessageDispatch,
            ApiCall::Eval { .. } => ApiTarget::Eval,
            ApiCall::FunctionConstructor { .. } => ApiTarget::Function,
            ApiCall::FunctionToString { .. } => ApiTarget::FunctionToString,
            ApiCall::PushSourceMap { .. } => ApiTarget::SourceMap,
            ApiCall::CookieGet | ApiCall::CookieSet { .. } => ApiTarget::Cookie,
            ApiCall::Download { .. } => ApiTarget::Download,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApiValue {
    Undefined,
    Null,
    Bool(bool),
    Text(String),
    Json(Value),
    /// A nested execution context (frame window, worker).
    Context(ContextId),
    Message { data: Value, origin: String },
    Error(String),
}

impl ApiValue {
    pub fn text(value: impl Into<String>) -> Self {
        ApiValue::Text(value.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ApiValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ApiValue::Error(_))
    }
}
