//! webrascal server.
//!
//! ```text
//!   browser ──► /webrascal/{encoded} ──► http server ──► fetch pipeline ──► upstream site
//!                                              │               │
//!                                              │        rewriters, cookie jar,
//!                                              │        referrer tracker
//!                                              ▼
//!                                     /__webrascal/* admin + messages
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use webrascal::config::loader::load_config;
use webrascal::config::validation::validate_config;
use webrascal::config::watcher::ConfigWatcher;
use webrascal::config::{ConfigError, ServerConfig};
use webrascal::lifecycle::{shutdown_signal, Shutdown};
use webrascal::observability::{logging, metrics};
use webrascal::pipeline::ReqwestTransport;
use webrascal::HttpServer;

#[derive(Debug, Parser)]
#[command(name = "webrascal", version, about = "Web-rewriting proxy")]
struct Args {
    /// TOML configuration file. Watched for changes.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }
    validate_config(&config).map_err(ConfigError::Validation)?;

    logging::init_logging(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "webrascal starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        public_origin = %config.listener.public_origin,
        prefix = %config.proxy.prefix,
        codec = %config.proxy.codec.algorithm,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let transport = Arc::new(ReqwestTransport::new(
        &config.upstream,
        config.limits.max_upstream_body,
    )?);

    // The watcher handle must outlive the server.
    let (_watcher, updates) = match &args.config {
        Some(path) => {
            let (watcher, rx) = ConfigWatcher::new(path, config.clone());
            (Some(watcher.run()?), Some(rx))
        }
        None => (None, None),
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        trigger.trigger();
    });

    let server = HttpServer::new(config, transport)?;
    server.run(listener, updates, shutdown.signalled()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
