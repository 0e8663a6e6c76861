//! Host-side controller.
//!
//! # Responsibilities
//! - Own the active configuration and push it to every connected context
//! - Create frames and translate URLs with the compiled codec
//! - Surface downloads raised anywhere in the proxy as controller events
//!
//! # Data Flow
//! ```text
//! Controller::init ──loadConfig──► Port ──► context inbox (pipeline, client)
//!
//! pipeline ──Download──► MessageBus ──┐
//! client   ──Download──► client port ─┴──► ControllerEvent::Download
//! ```

pub mod frame;
pub mod messages;

use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use crate::codec::{IdentityScripts, UrlMeta};
use crate::config::runtime::{merge_partial, RuntimeConfig};
use crate::config::{ConfigError, ProxyConfig, SharedConfig};

pub use frame::{Frame, FrameError};
pub use messages::{channel, Envelope, Inbox, Message, MessageBus, Port, Reply};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    Download { url: String, filename: Option<String> },
    ConfigChanged,
}

#[derive(Debug)]
pub struct Controller {
    config: SharedConfig,
    ports: Arc<Mutex<Vec<Port>>>,
    bus: MessageBus,
    events: broadcast::Sender<ControllerEvent>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    relay: Mutex<Option<JoinHandle<()>>>,
}

impl Controller {
    /// Build a controller from a partial JSON configuration merged over the
    /// defaults.
    pub fn new(init: Value, origin: Url) -> Result<Self, ConfigError> {
        let config = merge_partial(&ProxyConfig::default(), init)?;
        let compiled = RuntimeConfig::compile(config, origin)?;
        Ok(Self::with_config(compiled.into_shared(), MessageBus::default()))
    }

    /// Wrap an already shared configuration, e.g. the server's.
    pub fn with_config(config: SharedConfig, bus: MessageBus) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            config,
            ports: Arc::new(Mutex::new(Vec::new())),
            bus,
            events,
            tasks: Mutex::new(Vec::new()),
            relay: Mutex::new(None),
        }
    }

    pub fn config(&self) -> Arc<RuntimeConfig> {
        self.config.load_full()
    }

    pub fn shared_config(&self) -> SharedConfig {
        Arc::clone(&self.config)
    }

    pub fn bus(&self) -> &MessageBus {
        &self.bus
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ControllerEvent> {
        self.events.subscribe()
    }

    /// Register a context. The caller serves the returned inbox.
    pub fn connect(&self) -> Inbox {
        let (port, inbox) = channel();
        self.ports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(port);
        inbox
    }

    /// A port for client contexts to report cookie writes and downloads.
    ///
    /// Cookie syncs are relayed to every connected context; downloads
    /// become controller events.
    pub fn client_port(&self) -> Port {
        let (port, mut inbox) = channel();
        let ports = Arc::clone(&self.ports);
        let events = self.events.clone();

        let task = tokio::spawn(async move {
            while let Some(envelope) = inbox.recv().await {
                let reply = match &envelope.message {
                    Message::Download { url, filename } => {
                        let _ = events.send(ControllerEvent::Download {
                            url: url.clone(),
                            filename: filename.clone(),
                        });
                        Reply::ok()
                    }
                    Message::CookieSync { .. } => {
                        for port in live_ports(&ports) {
                            port.post(envelope.message.clone());
                        }
                        Reply::ok()
                    }
                    Message::LoadConfig { .. } => {
                        Reply::error("contexts cannot change the configuration")
                    }
                };
                envelope.reply(reply);
            }
        });
        self.track(task);
        port
    }

    /// Push the current configuration to every connected context and start
    /// relaying downloads from the bus. Returns how many contexts accepted.
    pub async fn init(&self) -> usize {
        self.start_download_relay();
        let accepted = self.broadcast_config().await;
        info!(accepted, prefix = %self.config().prefix(), "Controller initialized");
        accepted
    }

    pub fn create_frame(&self) -> Frame {
        Frame::new(Arc::clone(&self.config))
    }

    pub fn encode_url(&self, url: &str) -> Result<String, FrameError> {
        let target = Url::parse(url).map_err(|_| FrameError::InvalidUrl(url.to_string()))?;
        let cfg = self.config.load();
        let codec = cfg.codec();
        let encoded = codec.encode(target.as_str(), &UrlMeta::new(target.clone()), &IdentityScripts);
        Ok(format!("{}{}", codec.origin_str(), encoded))
    }

    pub fn decode_url(&self, url: &str) -> String {
        self.config.load().codec().decode(url)
    }

    /// Merge `partial` over the current configuration and re-initialize.
    pub async fn modify_config(&self, partial: Value) -> Result<usize, ConfigError> {
        let current = self.config.load_full();
        let merged = merge_partial(current.proxy(), partial)?;
        let compiled = current.recompile(merged)?;

        self.config.store(Arc::new(compiled));
        let _ = self.events.send(ControllerEvent::ConfigChanged);
        Ok(self.init().await)
    }

    async fn broadcast_config(&self) -> usize {
        let config = self.config().proxy().clone();
        let mut accepted = 0;
        for port in live_ports(&self.ports) {
            let reply = port
                .dispatch(Message::LoadConfig {
                    config: config.clone(),
                })
                .await;
            if reply.ok {
                accepted += 1;
            } else {
                warn!(error = ?reply.error, "Context rejected configuration");
            }
        }
        accepted
    }

    fn start_download_relay(&self) {
        let mut relay = self.relay.lock().unwrap_or_else(PoisonError::into_inner);
        if relay.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }

        let mut rx = self.bus.subscribe();
        let events = self.events.clone();
        *relay = Some(tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(Message::Download { url, filename }) => {
                        debug!(url = %url, "Relaying download");
                        let _ = events.send(ControllerEvent::Download { url, filename });
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Download relay lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }));
    }

    fn track(&self, task: JoinHandle<()>) {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(task);
    }
}

/// Open ports; closed ones are dropped from the list.
fn live_ports(ports: &Mutex<Vec<Port>>) -> Vec<Port> {
    let mut ports = ports.lock().unwrap_or_else(PoisonError::into_inner);
    ports.retain(|port| !port.is_closed());
    ports.clone()
}

impl Drop for Controller {
    fn drop(&mut self) {
        for task in self.tasks.get_mut().unwrap_or_else(PoisonError::into_inner).drain(..) {
            task.abort();
        }
        if let Some(task) = self.relay.get_mut().unwrap_or_else(PoisonError::into_inner).take() {
            task.abort();
        }
    }
}
