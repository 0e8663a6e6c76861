//! Registry of live execution contexts and their parent links.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use super::api::{ContextId, ContextKind};
use super::context::{ClientServices, ExecutionContext, HostApi};

#[derive(Debug, Default)]
pub struct ContextRegistry {
    contexts: DashMap<ContextId, Arc<ExecutionContext>>,
    children: DashMap<ContextId, Vec<ContextId>>,
}

impl ContextRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a new, not yet installed context.
    pub fn create(
        self: &Arc<Self>,
        services: Arc<ClientServices>,
        host: Arc<dyn HostApi>,
        kind: ContextKind,
        name: Option<String>,
        parent: Option<ContextId>,
        location: impl Into<String>,
    ) -> Arc<ExecutionContext> {
        let name = name.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let ctx = Arc::new(ExecutionContext::new(
            kind,
            name,
            parent,
            location.into(),
            services,
            host,
            Arc::downgrade(self),
        ));

        self.contexts.insert(ctx.id(), Arc::clone(&ctx));
        if let Some(parent) = parent {
            self.children.entry(parent).or_default().push(ctx.id());
        }
        debug!(context = %ctx.id(), kind = ?kind, parent = ?parent, "Registered context");
        ctx
    }

    /// Register a child of `parent` sharing its services and host.
    pub fn create_child(
        self: &Arc<Self>,
        parent: &ExecutionContext,
        kind: ContextKind,
        location: impl Into<String>,
    ) -> Arc<ExecutionContext> {
        self.create(
            Arc::clone(parent.services()),
            Arc::clone(parent.host()),
            kind,
            None,
            Some(parent.id()),
            location,
        )
    }

    pub fn get(&self, id: &ContextId) -> Option<Arc<ExecutionContext>> {
        self.contexts.get(id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn find_by_name(&self, name: &str) -> Option<Arc<ExecutionContext>> {
        self.contexts
            .iter()
            .find(|entry| entry.value().name() == name)
            .map(|entry| Arc::clone(entry.value()))
    }

    pub fn children(&self, id: &ContextId) -> Vec<ContextId> {
        self.children
            .get(id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    /// Remove a context and all its descendants.
    pub fn remove(&self, id: &ContextId) -> usize {
        let mut removed = 0;
        let mut pending = vec![*id];
        while let Some(next) = pending.pop() {
            if let Some((_, ctx)) = self.contexts.remove(&next) {
                removed += 1;
                if let Some(parent) = ctx.parent() {
                    if let Some(mut siblings) = self.children.get_mut(&parent) {
                        siblings.retain(|child| *child != next);
                    }
                }
            }
            if let Some((_, children)) = self.children.remove(&next) {
                pending.extend(children);
            }
        }
        removed
    }

    /// Install every registered context that has not been installed yet.
    pub fn install_pending(&self) -> usize {
        self.contexts
            .iter()
            .filter(|entry| entry.value().install())
            .count()
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }
}
