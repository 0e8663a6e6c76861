//! Cross-context message protocol.
//!
//! # Responsibilities
//! - Define the tagged JSON messages exchanged between the controller, the
//!   service side and client contexts
//! - Request/reply dispatch over per-context ports
//! - One-to-many event publication over the message bus
//!
//! # Design Decisions
//! - A dispatch that gets no reply within 250 ms counts as acknowledged
//! - Ports are unbounded; a slow context never blocks the sender

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::config::ProxyConfig;

/// How long [`Port::dispatch`] waits for a reply.
pub const DISPATCH_TIMEOUT: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "webrascal$type", rename_all = "camelCase")]
pub enum Message {
    LoadConfig {
        config: ProxyConfig,
    },
    CookieSync {
        /// A cookie-jar dump.
        cookies: String,
    },
    Download {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        filename: Option<String>,
    },
}

impl Message {
    pub fn kind(&self) -> &'static str {
        match self {
            Message::LoadConfig { .. } => "loadConfig",
            Message::CookieSync { .. } => "cookieSync",
            Message::Download { .. } => "download",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Reply {
    pub fn ok() -> Self {
        Self { ok: true, error: None }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(message.into()),
        }
    }
}

/// A message waiting for its receiver to answer.
#[derive(Debug)]
pub struct Envelope {
    pub message: Message,
    reply: oneshot::Sender<Reply>,
}

impl Envelope {
    pub fn reply(self, reply: Reply) {
        let _ = self.reply.send(reply);
    }
}

/// Sending half of a context's message channel.
#[derive(Debug, Clone)]
pub struct Port {
    tx: mpsc::UnboundedSender<Envelope>,
}

/// Receiving half of a context's message channel.
#[derive(Debug)]
pub struct Inbox {
    rx: mpsc::UnboundedReceiver<Envelope>,
}

pub fn channel() -> (Port, Inbox) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Port { tx }, Inbox { rx })
}

impl Port {
    /// Send `message` and wait for the reply.
    pub async fn dispatch(&self, message: Message) -> Reply {
        let (reply_tx, reply_rx) = oneshot::channel();
        let envelope = Envelope {
            message,
            reply: reply_tx,
        };
        if self.tx.send(envelope).is_err() {
            return Reply::error("port closed");
        }

        match tokio::time::timeout(DISPATCH_TIMEOUT, reply_rx).await {
            Ok(Ok(reply)) => reply,
            // Dropped without answering, or no answer in time.
            Ok(Err(_)) | Err(_) => Reply::ok(),
        }
    }

    /// Send without waiting for a reply. Returns false if the port is closed.
    pub fn post(&self, message: Message) -> bool {
        let (reply, _) = oneshot::channel();
        self.tx.send(Envelope { message, reply }).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl Inbox {
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Envelope> {
        self.rx.try_recv().ok()
    }
}

/// Broadcast channel for events raised while serving requests.
#[derive(Debug, Clone)]
pub struct MessageBus {
    tx: broadcast::Sender<Message>,
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new(64)
    }
}

impl MessageBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish to every current subscriber. Returns how many received it.
    pub fn publish(&self, message: Message) -> usize {
        self.tx.send(message).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Message> {
        self.tx.subscribe()
    }
}
