//! Registry of every launched execution context
//!
//! Owned by the application rather than hidden in a global: create one at
//! startup, pass it to every worker definition, and drain it with
//! [`ContextRegistry::terminate_all`] at shutdown. Entries are never removed;
//! terminating a context individually leaves its entry in place.

use std::sync::Arc;

use parking_lot::RwLock;

use super::context::{ContextHandle, ContextId, Termination};

/// Append-only list of context handles.
#[derive(Debug, Clone, Default)]
pub struct ContextRegistry {
    contexts: Arc<RwLock<Vec<ContextHandle>>>,
}

impl ContextRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a launched context.
    pub fn register(&self, context: ContextHandle) {
        self.contexts.write().push(context);
    }

    /// Number of contexts ever registered.
    pub fn len(&self) -> usize {
        self.contexts.read().len()
    }

    /// Whether no context was ever registered.
    pub fn is_empty(&self) -> bool {
        self.contexts.read().is_empty()
    }

    /// Snapshot of every registered handle, in launch order.
    pub fn contexts(&self) -> Vec<ContextHandle> {
        self.contexts.read().clone()
    }

    /// Look up a context by id.
    pub fn get(&self, id: ContextId) -> Option<ContextHandle> {
        self.contexts
            .read()
            .iter()
            .find(|context| context.id() == id)
            .cloned()
    }

    /// Terminate every registered context and wait for all of them.
    ///
    /// Every context is asked to stop before any is waited on, so they wind
    /// down concurrently. Contexts already terminated report
    /// [`Termination::AlreadyTerminated`].
    pub fn terminate_all(&self) -> Vec<(ContextId, Termination)> {
        let contexts = self.contexts();
        tracing::debug!(count = contexts.len(), "Terminating all execution contexts");

        for context in &contexts {
            context.request_termination();
        }

        contexts
            .iter()
            .map(|context| (context.id(), context.join()))
            .collect()
    }
}
