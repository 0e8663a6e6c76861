//! Configuration file watcher for hot reload.
//!
//! # Responsibilities
//! - Watch the config file and re-read it on change
//! - Drop reloads that parse to the configuration already in effect
//! - Report which sections changed, since only the rewriting section
//!   applies without a restart
//!
//! # Data Flow
//! ```text
//! notify event ──▶ Reloader::reload ──▶ Changed ──▶ mpsc ──▶ HttpServer
//!                                   └─▶ Unchanged / Failed (logged)
//! ```

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::{load_config, ConfigError};
use crate::config::schema::ServerConfig;

/// Outcome of re-reading the config file.
#[derive(Debug)]
pub enum Reload {
    Changed {
        config: ServerConfig,
        sections: Vec<&'static str>,
    },
    Unchanged,
    Failed(ConfigError),
}

/// Re-reads the config file and compares it with the last accepted copy.
#[derive(Debug)]
pub struct Reloader {
    path: PathBuf,
    current: Mutex<ServerConfig>,
}

impl Reloader {
    pub fn new(path: &Path, current: ServerConfig) -> Self {
        Self {
            path: path.to_path_buf(),
            current: Mutex::new(current),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn reload(&self) -> Reload {
        let next = match load_config(&self.path) {
            Ok(next) => next,
            Err(e) => return Reload::Failed(e),
        };

        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        let sections = changed_sections(&current, &next);
        if sections.is_empty() {
            return Reload::Unchanged;
        }
        *current = next.clone();
        Reload::Changed {
            config: next,
            sections,
        }
    }
}

/// Top-level sections that differ between `a` and `b`.
pub fn changed_sections(a: &ServerConfig, b: &ServerConfig) -> Vec<&'static str> {
    let mut sections = Vec::new();
    if a.proxy != b.proxy {
        sections.push("proxy");
    }
    if a.listener != b.listener {
        sections.push("listener");
    }
    if a.upstream != b.upstream {
        sections.push("upstream");
    }
    if a.limits != b.limits {
        sections.push("limits");
    }
    if a.observability != b.observability {
        sections.push("observability");
    }
    if a.bundle != b.bundle {
        sections.push("bundle");
    }
    sections
}

/// A watcher that monitors the configuration file for changes.
pub struct ConfigWatcher {
    reloader: Reloader,
    update_tx: mpsc::UnboundedSender<ServerConfig>,
}

impl ConfigWatcher {
    /// Create a watcher for `path`; `current` is the configuration the
    /// server started with.
    ///
    /// Returns the watcher and a receiver for configuration updates.
    pub fn new(path: &Path, current: ServerConfig) -> (Self, mpsc::UnboundedReceiver<ServerConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        (
            Self {
                reloader: Reloader::new(path, current),
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching the file. The returned watcher must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let path = self.reloader.path().to_path_buf();
        let Self { reloader, update_tx } = self;

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                    match reloader.reload() {
                        Reload::Changed { config, sections } => {
                            tracing::info!(path = ?reloader.path(), ?sections, "Config file changed");
                            if sections.iter().any(|s| *s != "proxy") {
                                tracing::warn!(?sections, "Some changed sections only apply after a restart");
                            }
                            let _ = update_tx.send(config);
                        }
                        Reload::Unchanged => {
                            tracing::debug!(path = ?reloader.path(), "Config file touched without changes");
                        }
                        Reload::Failed(e) => {
                            tracing::error!(
                                error = %e,
                                "Failed to reload config, keeping current configuration"
                            );
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = ?e, "Watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?path, "Config watcher started");
        Ok(watcher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_config(contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("webrascal-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_reload_reports_changed_sections() {
        let path = temp_config("prefix = \"/webrascal/\"\n");
        let reloader = Reloader::new(&path, ServerConfig::default());
        assert!(matches!(reloader.reload(), Reload::Unchanged));

        std::fs::write(&path, "prefix = \"/go/\"\n[limits]\nmax_request_body = 10\n").unwrap();
        match reloader.reload() {
            Reload::Changed { config, sections } => {
                assert_eq!(config.proxy.prefix, "/go/");
                assert_eq!(sections, vec!["proxy", "limits"]);
            }
            other => panic!("expected change, got {:?}", other),
        }
        assert!(matches!(reloader.reload(), Reload::Unchanged));
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_invalid_file_keeps_current() {
        let path = temp_config("prefix = \"no-slashes\"\n");
        let reloader = Reloader::new(&path, ServerConfig::default());
        assert!(matches!(reloader.reload(), Reload::Failed(ConfigError::Validation(_))));

        std::fs::write(&path, "").unwrap();
        assert!(matches!(reloader.reload(), Reload::Unchanged));
        std::fs::remove_file(&path).unwrap();
    }
}
