//! Pool of external JavaScript rewriter instances.
//!
//! # Responsibilities
//! - Hand out exclusive handles to rewriter engines
//! - Grow on demand instead of blocking when every engine is busy
//! - Fall back to a pass-through engine when none can be built
//!
//! # Design Decisions
//! - Each slot carries its own atomic in-use flag; checkout is a CAS
//! - Handles release their slot on drop, so every exit path returns it
//! - Slots are never evicted

use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;

use crate::config::ProxyConfig;
use crate::observability::metrics;

/// Result of one engine invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteOutput {
    pub source: String,
    pub source_map: Option<Vec<u8>>,
    /// Syntax errors reported by the engine. The source is still returned.
    pub errors: Vec<String>,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("rewriter unavailable: {0}")]
    Unavailable(String),

    #[error("rewrite failed: {0}")]
    Failed(String),
}

/// The AST-level JavaScript rewriter.
pub trait ExternalRewriter: Send + Sync {
    fn rewrite(
        &self,
        source: &str,
        base: &str,
        target_url: &str,
        is_module: bool,
    ) -> Result<RewriteOutput, EngineError>;
}

/// Builds engines for the pool. Given the configuration so the engine can
/// pick up the hook-name table.
pub trait RewriterFactory: Send + Sync {
    fn create(&self, config: &ProxyConfig) -> Result<Box<dyn ExternalRewriter>, EngineError>;
}

/// Returns scripts unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassThroughRewriter;

impl ExternalRewriter for PassThroughRewriter {
    fn rewrite(
        &self,
        source: &str,
        _base: &str,
        _target_url: &str,
        _is_module: bool,
    ) -> Result<RewriteOutput, EngineError> {
        Ok(RewriteOutput {
            source: source.to_string(),
            ..Default::default()
        })
    }
}

struct Slot {
    engine: Box<dyn ExternalRewriter>,
    in_use: AtomicBool,
}

pub struct RewriterPool {
    factory: Option<Arc<dyn RewriterFactory>>,
    slots: Mutex<Vec<Arc<Slot>>>,
}

impl RewriterPool {
    pub fn new(factory: Arc<dyn RewriterFactory>) -> Self {
        Self {
            factory: Some(factory),
            slots: Mutex::new(Vec::new()),
        }
    }

    /// A pool whose engines are all [`PassThroughRewriter`]s.
    pub fn passthrough() -> Self {
        Self {
            factory: None,
            slots: Mutex::new(Vec::new()),
        }
    }

    /// Check out a free engine, creating one if none is free.
    pub fn checkout(&self, config: &ProxyConfig) -> RewriterHandle {
        {
            let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            for slot in slots.iter() {
                if slot
                    .in_use
                    .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
                    .is_ok()
                {
                    return RewriterHandle { slot: slot.clone() };
                }
            }
        }

        let slot = Arc::new(Slot {
            engine: self.build(config),
            in_use: AtomicBool::new(true),
        });

        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.push(slot.clone());
        metrics::record_pool_size(slots.len());
        tracing::debug!(pool_size = slots.len(), "Rewriter pool grew");

        RewriterHandle { slot }
    }

    /// Number of engines ever created.
    pub fn size(&self) -> usize {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Number of engines currently checked out.
    pub fn in_use(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|s| s.in_use.load(Ordering::Acquire))
            .count()
    }

    fn build(&self, config: &ProxyConfig) -> Box<dyn ExternalRewriter> {
        let Some(factory) = &self.factory else {
            return Box::new(PassThroughRewriter);
        };
        match factory.create(config) {
            Ok(engine) => engine,
            Err(e) => {
                tracing::warn!(error = %e, "JS rewriter unavailable, falling back to pass-through");
                Box::new(PassThroughRewriter)
            }
        }
    }
}

impl std::fmt::Debug for RewriterPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RewriterPool")
            .field("size", &self.size())
            .field("in_use", &self.in_use())
            .finish()
    }
}

/// Exclusive access to one pooled engine. Released on drop.
pub struct RewriterHandle {
    slot: Arc<Slot>,
}

impl Deref for RewriterHandle {
    type Target = dyn ExternalRewriter;

    fn deref(&self) -> &Self::Target {
        self.slot.engine.as_ref()
    }
}

impl Drop for RewriterHandle {
    fn drop(&mut self) {
        self.slot.in_use.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Barrier;
    use std::thread;

    struct CountingFactory {
        created: AtomicUsize,
        fail: bool,
    }

    impl RewriterFactory for CountingFactory {
        fn create(&self, _config: &ProxyConfig) -> Result<Box<dyn ExternalRewriter>, EngineError> {
            self.created.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(EngineError::Unavailable("no engine".to_string()))
            } else {
                Ok(Box::new(PassThroughRewriter))
            }
        }
    }

    fn factory(fail: bool) -> Arc<CountingFactory> {
        Arc::new(CountingFactory {
            created: AtomicUsize::new(0),
            fail,
        })
    }

    #[test]
    fn test_handles_are_reused_after_release() {
        let f = factory(false);
        let pool = RewriterPool::new(f.clone());
        let config = ProxyConfig::default();

        drop(pool.checkout(&config));
        drop(pool.checkout(&config));

        assert_eq!(pool.size(), 1);
        assert_eq!(pool.in_use(), 0);
        assert_eq!(f.created.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_pool_grows_when_busy() {
        let pool = RewriterPool::passthrough();
        let config = ProxyConfig::default();

        let a = pool.checkout(&config);
        let b = pool.checkout(&config);
        assert_eq!(pool.size(), 2);
        assert_eq!(pool.in_use(), 2);
        drop(a);
        assert_eq!(pool.in_use(), 1);
        drop(b);
        assert_eq!(pool.in_use(), 0);
    }

    #[test]
    fn test_factory_failure_falls_back() {
        let pool = RewriterPool::new(factory(true));
        let handle = pool.checkout(&ProxyConfig::default());
        let out = handle.rewrite("let a = 1;", "", "", false).unwrap();
        assert_eq!(out.source, "let a = 1;");
    }

    #[test]
    fn test_concurrent_checkout_is_exclusive() {
        let pool = Arc::new(RewriterPool::passthrough());
        let barrier = Arc::new(Barrier::new(8));
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let pool = pool.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    let handle = pool.checkout(&ProxyConfig::default());
                    barrier.wait();
                    drop(handle);
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        // All eight were held at the barrier at once.
        assert_eq!(pool.size(), 8);
        assert_eq!(pool.in_use(), 0);
    }
}
