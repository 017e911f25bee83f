//! Type-erased registry for discovering handlers by action type key.
//!
//! Built once at startup via [`RegistryBuilder`] and injected into the
//! executor. Tests build their own registries with exactly the handlers
//! they exercise.

use std::collections::HashMap;
use std::sync::Arc;

use crate::handler::ActionHandler;

/// Immutable map from type key to handler.
#[derive(Default)]
pub struct Registry {
    handlers: HashMap<&'static str, Arc<dyn ActionHandler>>,
}

impl Registry {
    /// Start building a registry.
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Look up a handler by its type key.
    #[must_use]
    pub fn get(&self, kind: &str) -> Option<&Arc<dyn ActionHandler>> {
        self.handlers.get(kind)
    }

    /// Whether a handler is registered for `kind`.
    #[must_use]
    pub fn contains(&self, kind: &str) -> bool {
        self.handlers.contains_key(kind)
    }

    /// All registered type keys, sorted.
    #[must_use]
    pub fn kinds(&self) -> Vec<&'static str> {
        let mut kinds: Vec<&'static str> = self.handlers.keys().copied().collect();
        kinds.sort_unstable();
        kinds
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns `true` if no handlers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("count", &self.handlers.len())
            .field("kinds", &self.kinds())
            .finish()
    }
}

/// Accumulates handlers, then freezes them into a [`Registry`].
#[derive(Default)]
pub struct RegistryBuilder {
    handlers: HashMap<&'static str, Arc<dyn ActionHandler>>,
}

impl RegistryBuilder {
    /// Register a handler under its own type key. Overwrites any
    /// earlier registration for the same key.
    #[must_use]
    pub fn register(mut self, handler: Arc<dyn ActionHandler>) -> Self {
        self.handlers.insert(handler.kind(), handler);
        self
    }

    /// Freeze into an immutable registry.
    #[must_use]
    pub fn build(self) -> Registry {
        Registry {
            handlers: self.handlers,
        }
    }
}
