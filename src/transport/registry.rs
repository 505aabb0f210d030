//! Handler registry keyed by string-like ids.
//!
//! Registration never silently replaces an existing handler, and
//! unregistering is the only cancellation primitive: it stops local
//! dispatch and does not signal the remote party.

use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;

use parking_lot::RwLock;

use crate::error::{Error, Result};

/// Map from id to handler with explicit register / unregister
#[derive(Debug)]
pub struct Registry<Id, H> {
    handlers: RwLock<HashMap<Id, H>>,
}

impl<Id, H> Default for Registry<Id, H> {
    fn default() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
        }
    }
}

impl<Id, H> Registry<Id, H>
where
    Id: Eq + Hash + Clone + Display,
    H: Clone,
{
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler; fails if `id` is taken
    pub fn register(&self, id: Id, handler: H) -> Result<()> {
        let mut handlers = self.handlers.write();
        if handlers.contains_key(&id) {
            return Err(Error::RegistryConflict(id.to_string()));
        }
        handlers.insert(id, handler);
        Ok(())
    }

    /// Remove a handler, reporting whether one was registered
    pub fn unregister(&self, id: &Id) -> bool {
        self.handlers.write().remove(id).is_some()
    }

    /// Look up a handler
    pub fn get(&self, id: &Id) -> Option<H> {
        self.handlers.read().get(id).cloned()
    }

    /// Whether `id` is registered
    pub fn contains(&self, id: &Id) -> bool {
        self.handlers.read().contains_key(id)
    }

    /// Registered ids
    pub fn ids(&self) -> Vec<Id> {
        self.handlers.read().keys().cloned().collect()
    }

    /// Snapshot of every handler
    pub fn handlers(&self) -> Vec<H> {
        self.handlers.read().values().cloned().collect()
    }

    /// Number of registered handlers
    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_conflict() {
        let registry: Registry<String, u32> = Registry::new();
        registry.register("a".into(), 1).unwrap();

        let err = registry.register("a".into(), 2).unwrap_err();
        assert!(matches!(err, Error::RegistryConflict(ref id) if id == "a"));
        // Original handler untouched
        assert_eq!(registry.get(&"a".to_string()), Some(1));
    }

    #[test]
    fn test_unregister() {
        let registry: Registry<String, u32> = Registry::new();
        assert!(!registry.unregister(&"missing".to_string()));

        registry.register("a".into(), 1).unwrap();
        assert!(registry.contains(&"a".to_string()));
        assert!(registry.unregister(&"a".to_string()));
        assert!(registry.is_empty());

        // Re-registration after unregistering is allowed
        registry.register("a".into(), 3).unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.ids(), vec!["a".to_string()]);
        assert_eq!(registry.handlers(), vec![3]);
    }
}
