//! Validator registry - id to descriptor catalog
//!
//! Populated once at startup and read-only during synthesis.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use super::{builtin, ValidatorDescriptor, ValidatorRole};

/// Catalog of known validators
#[derive(Debug, Clone, Default)]
pub struct ValidatorRegistry {
    validators: HashMap<String, Arc<ValidatorDescriptor>>,
}

impl ValidatorRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in validator
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for descriptor in builtin::descriptors() {
            registry.register(descriptor);
        }
        info!("Registered {} built-in validators", registry.len());
        registry
    }

    /// Register a validator, replacing any previous one with the same id
    pub fn register(&mut self, descriptor: ValidatorDescriptor) -> &mut Self {
        debug!("Registering validator: {} ({:?})", descriptor.id, descriptor.role);
        self.validators.insert(descriptor.id.clone(), Arc::new(descriptor));
        self
    }

    pub fn lookup(&self, id: &str) -> Option<Arc<ValidatorDescriptor>> {
        self.validators.get(id).cloned()
    }

    /// Role of a known validator
    pub fn role(&self, id: &str) -> Option<ValidatorRole> {
        self.validators.get(id).map(|d| d.role)
    }

    /// Registered ids, sorted
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<_> = self.validators.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }
}
