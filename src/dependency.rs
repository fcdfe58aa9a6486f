//! External services required by hooks and custom validations
//!
//! A schema names the services it needs through [`DependencyKey`]s. The
//! [`DependencyTracker`] collects them once per schema in first-seen order;
//! at call time a [`ServiceResolver`] turns each key into a live instance.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ValidationError};

/// A resolved service instance
pub type Service = Arc<dyn Any + Send + Sync>;

/// Identity of an external service type
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DependencyKey(String);

impl DependencyKey {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Key named after a Rust type
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self(std::any::type_name::<T>().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DependencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DependencyKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for DependencyKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// =============================================================================
// Tracker
// =============================================================================

/// De-duplicating, order-preserving set of dependency keys
#[derive(Debug, Clone, Default)]
pub struct DependencyTracker {
    order: Vec<DependencyKey>,
    seen: HashSet<DependencyKey>,
}

impl DependencyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a key. Returns false when it was already tracked.
    pub fn add(&mut self, key: DependencyKey) -> bool {
        if self.seen.contains(&key) {
            return false;
        }
        self.seen.insert(key.clone());
        self.order.push(key);
        true
    }

    pub fn extend<'a>(&mut self, keys: impl IntoIterator<Item = &'a DependencyKey>) {
        for key in keys {
            self.add(key.clone());
        }
    }

    pub fn count(&self) -> usize {
        self.order.len()
    }

    /// Keys in first-seen order
    pub fn ordered_types(&self) -> &[DependencyKey] {
        &self.order
    }

    pub fn into_ordered(self) -> Vec<DependencyKey> {
        self.order
    }
}

// =============================================================================
// Resolution
// =============================================================================

/// Host capability that produces service instances at call time
pub trait ServiceResolver: Send + Sync {
    fn resolve(&self, key: &DependencyKey) -> Result<Service>;
}

/// Resolver for callers without services; every lookup fails
#[derive(Debug, Clone, Copy, Default)]
pub struct NoServices;

impl ServiceResolver for NoServices {
    fn resolve(&self, key: &DependencyKey) -> Result<Service> {
        Err(ValidationError::MissingDependency(key.clone()))
    }
}

/// In-memory resolver backed by a map of ready instances
#[derive(Clone, Default)]
pub struct ServiceMap {
    services: HashMap<DependencyKey, Service>,
}

impl ServiceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a service under an explicit key
    pub fn insert<T: Any + Send + Sync>(&mut self, key: impl Into<DependencyKey>, service: T) -> &mut Self {
        self.services.insert(key.into(), Arc::new(service));
        self
    }

    /// Register a service under the key of its own type
    pub fn provide<T: Any + Send + Sync>(&mut self, service: T) -> &mut Self {
        self.insert(DependencyKey::of::<T>(), service)
    }

    pub fn get<T: Any + Send + Sync>(&self, key: &DependencyKey) -> Option<Arc<T>> {
        self.services.get(key).cloned()?.downcast::<T>().ok()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

impl ServiceResolver for ServiceMap {
    fn resolve(&self, key: &DependencyKey) -> Result<Service> {
        self.services
            .get(key)
            .cloned()
            .ok_or_else(|| ValidationError::MissingDependency(key.clone()))
    }
}

impl fmt::Debug for ServiceMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.services.keys().map(|k| k.as_str()).collect();
        keys.sort_unstable();
        f.debug_struct("ServiceMap").field("keys", &keys).finish()
    }
}

/// Services resolved for one plan invocation, handed to hooks
#[derive(Clone, Default)]
pub struct ResolvedServices {
    entries: Vec<(DependencyKey, Service)>,
}

impl ResolvedServices {
    pub(crate) fn push(&mut self, key: DependencyKey, service: Service) {
        self.entries.push((key, service));
    }

    /// Typed access to a resolved service
    pub fn get<T: Any + Send + Sync>(&self, key: &DependencyKey) -> Result<Arc<T>> {
        let service = self
            .entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, s)| Arc::clone(s))
            .ok_or_else(|| ValidationError::MissingDependency(key.clone()))?;

        service.downcast::<T>().map_err(|_| ValidationError::ServiceType {
            key: key.clone(),
            expected: std::any::type_name::<T>(),
        })
    }

    /// Typed access using the key derived from `T`
    pub fn get_of<T: Any + Send + Sync>(&self) -> Result<Arc<T>> {
        self.get(&DependencyKey::of::<T>())
    }

    pub fn keys(&self) -> impl Iterator<Item = &DependencyKey> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for ResolvedServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Clock(u64);

    #[test]
    fn test_tracker_first_seen_order() {
        let mut tracker = DependencyTracker::new();
        assert!(tracker.add("users".into()));
        assert!(tracker.add("clock".into()));
        assert!(!tracker.add("users".into()));

        assert_eq!(tracker.count(), 2);
        let names: Vec<_> = tracker.ordered_types().iter().map(|k| k.as_str()).collect();
        assert_eq!(names, vec!["users", "clock"]);
    }

    #[test]
    fn test_service_map_typed_lookup() {
        let mut services = ServiceMap::new();
        services.provide(Clock(42));

        let clock = services.get::<Clock>(&DependencyKey::of::<Clock>()).unwrap();
        assert_eq!(clock.0, 42);
        assert!(services.get::<String>(&DependencyKey::of::<Clock>()).is_none());
    }

    #[test]
    fn test_missing_service_is_an_error() {
        let err = NoServices.resolve(&"users".into()).unwrap_err();
        assert!(matches!(err, ValidationError::MissingDependency(k) if k.as_str() == "users"));
    }

    #[test]
    fn test_resolved_services_type_mismatch() {
        let mut resolved = ResolvedServices::default();
        resolved.push("clock".into(), Arc::new(Clock(1)));

        assert_eq!(resolved.get::<Clock>(&"clock".into()).unwrap().0, 1);
        let err = resolved.get::<String>(&"clock".into()).unwrap_err();
        assert!(matches!(err, ValidationError::ServiceType { .. }));
    }
}
