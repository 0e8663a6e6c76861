//! Per-context client state and call dispatch.
//!
//! # Responsibilities
//! - Hold the proxied location of one window, frame or worker
//! - Install the interceptor chain once per context
//! - Run calls through the chain down to the [`HostApi`]
//!
//! # Design Decisions
//! - Context handles are shared (`Arc`); all mutable state sits behind
//!   atomics, locks or `ArcSwap` so host callbacks can re-enter
//! - Enable predicates are evaluated at install time against the
//!   context's real URL

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};

use arc_swap::ArcSwap;
use dashmap::DashMap;
use tracing::{debug, trace, warn};
use url::Url;

use crate::codec::UrlMeta;
use crate::config::runtime::RuntimeConfig;
use crate::config::{Flag, SharedConfig};
use crate::controller::messages::Port;
use crate::cookies::CookieJar;
use crate::rewrite::Rewriter;

use super::api::{ApiCall, ApiValue, ContextId, ContextKind};
use super::interceptor::Interceptor;
use super::registry::ContextRegistry;

/// The real implementation behind every intercepted API.
pub trait HostApi: Send + Sync {
    fn invoke(&self, ctx: &ExecutionContext, call: &ApiCall) -> ApiValue;
}

/// State shared by every context of one client runtime.
pub struct ClientServices {
    pub config: SharedConfig,
    pub rewriter: Rewriter,
    pub jar: Arc<CookieJar>,
    /// Where cookie and download notifications go.
    pub sync: Option<Port>,
    pub interceptors: Vec<Arc<dyn Interceptor>>,
    /// Source maps pushed by rewritten scripts, keyed by tag.
    pub source_maps: DashMap<String, Vec<u8>>,
}

impl fmt::Debug for ClientServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientServices")
            .field("interceptors", &self.interceptors.len())
            .field("source_maps", &self.source_maps.len())
            .finish()
    }
}

pub struct ExecutionContext {
    id: ContextId,
    kind: ContextKind,
    name: String,
    parent: Option<ContextId>,
    services: Arc<ClientServices>,
    host: Arc<dyn HostApi>,
    registry: Weak<ContextRegistry>,
    installed: AtomicBool,
    chain: ArcSwap<Vec<Arc<dyn Interceptor>>>,
    /// Native (proxied) href.
    location: RwLock<String>,
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("installed", &self.is_installed())
            .finish()
    }
}

impl ExecutionContext {
    pub(crate) fn new(
        kind: ContextKind,
        name: String,
        parent: Option<ContextId>,
        location: String,
        services: Arc<ClientServices>,
        host: Arc<dyn HostApi>,
        registry: Weak<ContextRegistry>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            kind,
            name,
            parent,
            services,
            host,
            registry,
            installed: AtomicBool::new(false),
            chain: ArcSwap::from_pointee(Vec::new()),
            location: RwLock::new(location),
        }
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn kind(&self) -> ContextKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<ContextId> {
        self.parent
    }

    pub fn services(&self) -> &Arc<ClientServices> {
        &self.services
    }

    pub fn host(&self) -> &Arc<dyn HostApi> {
        &self.host
    }

    pub fn registry(&self) -> Option<Arc<ContextRegistry>> {
        self.registry.upgrade()
    }

    pub fn config(&self) -> Arc<RuntimeConfig> {
        self.services.config.load_full()
    }

    /// The proxied href the host actually sees.
    pub fn location(&self) -> String {
        self.location
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_location(&self, href: impl Into<String>) {
        *self.location.write().unwrap_or_else(PoisonError::into_inner) = href.into();
    }

    /// The real URL this context believes it is at.
    pub fn url(&self) -> Url {
        let location = self.location();
        let decoded = self.config().codec().decode(&location);
        Url::parse(&decoded)
            .or_else(|_| Url::parse(&location))
            .unwrap_or_else(|_| self.config().origin().clone())
    }

    pub fn meta(&self) -> UrlMeta {
        UrlMeta::new(self.url())
    }

    pub fn flag(&self, flag: Flag) -> bool {
        self.config().flag_enabled(flag, &self.url())
    }

    pub fn rewrite_url(&self, input: &str) -> String {
        self.services
            .rewriter
            .rewrite_url(&self.config(), input, &self.meta())
    }

    pub fn unrewrite_url(&self, input: &str) -> String {
        self.services.rewriter.unrewrite_url(&self.config(), input)
    }

    /// Rewrite script text evaluated inside this context.
    pub fn rewrite_js(&self, source: &str, is_module: bool) -> String {
        let url = self.url();
        self.services
            .rewriter
            .rewrite_js(&self.config(), source, url.as_str(), &self.meta(), is_module)
    }

    pub fn rewrite_html(&self, html: &str) -> String {
        self.services
            .rewriter
            .rewrite_html(&self.config(), html, &self.meta(), false)
    }

    pub fn is_installed(&self) -> bool {
        self.installed.load(Ordering::Acquire)
    }

    /// Install the interceptor chain. Returns false if already installed.
    pub fn install(&self) -> bool {
        if self
            .installed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        let mut chain: Vec<Arc<dyn Interceptor>> = self
            .services
            .interceptors
            .iter()
            .filter(|interceptor| interceptor.enabled(self))
            .cloned()
            .collect();
        chain.sort_by_key(|interceptor| interceptor.order());

        debug!(
            context = %self.id,
            kind = ?self.kind,
            interceptors = chain.len(),
            "Installed client interceptors"
        );
        self.chain.store(Arc::new(chain));
        true
    }

    pub fn interceptor_names(&self) -> Vec<&'static str> {
        self.chain.load().iter().map(|i| i.name()).collect()
    }

    /// Run `call` through the interceptors registered for its target.
    pub fn call(&self, call: ApiCall) -> ApiValue {
        let target = call.target();
        let chain: Vec<Arc<dyn Interceptor>> = self
            .chain
            .load()
            .iter()
            .filter(|interceptor| interceptor.targets().contains(&target))
            .cloned()
            .collect();
        self.dispatch(&chain, call)
    }

    fn dispatch(&self, chain: &[Arc<dyn Interceptor>], call: ApiCall) -> ApiValue {
        let Some((interceptor, rest)) = chain.split_first() else {
            return self.host.invoke(self, &call);
        };

        let next = |call: ApiCall| self.dispatch(rest, call);
        match interceptor.intercept(self, call.clone(), &next) {
            Ok(interception) => {
                trace!(
                    interceptor = interceptor.name(),
                    short_circuit = interception.short_circuit,
                    "Intercepted call"
                );
                interception.value
            }
            Err(e) => {
                warn!(
                    context = %self.id,
                    interceptor = interceptor.name(),
                    error = %e,
                    "Interceptor failed"
                );
                if self.flag(Flag::AllowFailedIntercepts) {
                    self.dispatch(rest, call)
                } else {
                    ApiValue::Error(e.to_string())
                }
            }
        }
    }
}
