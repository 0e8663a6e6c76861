//! Client runtime: owns the shared services and the context registry, and
//! applies messages sent by the controller or the service side.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, info, warn};

use crate::config::runtime::RuntimeConfig;
use crate::config::SharedConfig;
use crate::controller::messages::{Inbox, Message, Port, Reply};
use crate::cookies::CookieJar;
use crate::rewrite::Rewriter;

use super::api::{ContextId, ContextKind};
use super::context::{ClientServices, ExecutionContext, HostApi};
use super::hooks::default_interceptors;
use super::interceptor::Interceptor;
use super::registry::ContextRegistry;

#[derive(Debug)]
pub struct ClientRuntimeBuilder {
    config: SharedConfig,
    rewriter: Rewriter,
    jar: Arc<CookieJar>,
    sync: Option<Port>,
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl ClientRuntimeBuilder {
    pub fn rewriter(mut self, rewriter: Rewriter) -> Self {
        self.rewriter = rewriter;
        self
    }

    pub fn jar(mut self, jar: Arc<CookieJar>) -> Self {
        self.jar = jar;
        self
    }

    /// Port that receives `cookieSync` and `download` notifications.
    pub fn sync_port(mut self, port: Port) -> Self {
        self.sync = Some(port);
        self
    }

    /// Add an interceptor on top of the built-in set.
    pub fn interceptor(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    pub fn build(self) -> ClientRuntime {
        ClientRuntime {
            services: Arc::new(ClientServices {
                config: self.config,
                rewriter: self.rewriter,
                jar: self.jar,
                sync: self.sync,
                interceptors: self.interceptors,
                source_maps: DashMap::new(),
            }),
            registry: ContextRegistry::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientRuntime {
    services: Arc<ClientServices>,
    registry: Arc<ContextRegistry>,
}

impl ClientRuntime {
    pub fn builder(config: SharedConfig) -> ClientRuntimeBuilder {
        ClientRuntimeBuilder {
            config,
            rewriter: Rewriter::passthrough(),
            jar: Arc::new(CookieJar::new()),
            sync: None,
            interceptors: default_interceptors(),
        }
    }

    pub fn services(&self) -> &Arc<ClientServices> {
        &self.services
    }

    pub fn registry(&self) -> &Arc<ContextRegistry> {
        &self.registry
    }

    pub fn config(&self) -> Arc<RuntimeConfig> {
        self.services.config.load_full()
    }

    /// Register a context without hooking it.
    pub fn create_context(
        &self,
        host: Arc<dyn HostApi>,
        kind: ContextKind,
        name: Option<String>,
        parent: Option<ContextId>,
        location: &str,
    ) -> Arc<ExecutionContext> {
        self.registry.create(
            Arc::clone(&self.services),
            host,
            kind,
            name,
            parent,
            location,
        )
    }

    /// Create a context at `location` (a proxied href) and install the
    /// interceptors into it.
    pub fn load_and_hook(
        &self,
        host: Arc<dyn HostApi>,
        kind: ContextKind,
        location: &str,
    ) -> Arc<ExecutionContext> {
        let ctx = self.create_context(host, kind, None, None, location);
        ctx.install();
        info!(context = %ctx.id(), url = %ctx.url(), "Client context hooked");
        ctx
    }

    pub fn apply_message(&self, message: Message) -> Reply {
        debug!(kind = message.kind(), "Client received message");
        match message {
            Message::LoadConfig { config } => {
                let compiled = self.services.config.load().recompile(config);
                match compiled {
                    Ok(compiled) => {
                        self.services.config.store(Arc::new(compiled));
                        Reply::ok()
                    }
                    Err(e) => Reply::error(e.to_string()),
                }
            }
            Message::CookieSync { cookies } => match self.services.jar.load(&cookies) {
                Ok(()) => Reply::ok(),
                Err(e) => Reply::error(e.to_string()),
            },
            Message::Download { .. } => Reply::ok(),
        }
    }

    /// Answer messages from `inbox` until every sender is gone.
    pub async fn serve(self, mut inbox: Inbox) {
        while let Some(envelope) = inbox.recv().await {
            let reply = self.apply_message(envelope.message.clone());
            if let Some(error) = &reply.error {
                warn!(error = %error, "Client rejected message");
            }
            envelope.reply(reply);
        }
    }
}
