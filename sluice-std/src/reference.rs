//! In-memory reference lookup.

use sluice_core::{MessagingError, Reference, ReferenceSearchService};
use std::{any::Any, collections::BTreeMap, sync::Arc};

/// A [`ReferenceSearchService`] over a name → value map, optionally falling
/// back to another lookup for names it does not hold.
///
/// # Example
///
/// ```rust,ignore
/// let references = InMemoryReferenceSearchService::new()
///     .with("orderService", OrderService::default())
///     .with_fallback(container_lookup);
/// ```
#[derive(Clone, Default)]
pub struct InMemoryReferenceSearchService {
    references: BTreeMap<String, Reference>,
    fallback: Option<Arc<dyn ReferenceSearchService>>,
}

impl InMemoryReferenceSearchService {
    /// Create an empty lookup.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value under `name`.
    pub fn with<T: Any + Send + Sync>(mut self, name: impl Into<String>, value: T) -> Self {
        self.register(name, value);
        self
    }

    /// Add an already shared value under `name`.
    pub fn with_shared(mut self, name: impl Into<String>, value: Reference) -> Self {
        self.references.insert(name.into(), value);
        self
    }

    /// Consult `fallback` for names not held here.
    pub fn with_fallback(mut self, fallback: Arc<dyn ReferenceSearchService>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Add a value under `name`, replacing any previous one.
    pub fn register<T: Any + Send + Sync>(&mut self, name: impl Into<String>, value: T) {
        self.references.insert(name.into(), Arc::new(value));
    }
}

impl ReferenceSearchService for InMemoryReferenceSearchService {
    fn has(&self, name: &str) -> bool {
        self.references.contains_key(name)
            || self.fallback.as_ref().is_some_and(|fallback| fallback.has(name))
    }

    fn get(&self, name: &str) -> Result<Reference, MessagingError> {
        match (self.references.get(name), &self.fallback) {
            (Some(reference), _) => Ok(Arc::clone(reference)),
            (None, Some(fallback)) => fallback.get(name),
            (None, None) => Err(MessagingError::ReferenceNotFound(name.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_core::ReferenceSearchServiceExt;

    #[test]
    fn test_typed_lookup() {
        let references = InMemoryReferenceSearchService::new().with("greeting", "hello".to_string());
        assert!(references.has("greeting"));
        assert_eq!(*references.get_typed::<String>("greeting").unwrap(), "hello");
        assert!(references.get_typed::<i64>("greeting").is_err());
        assert!(matches!(
            references.get("missing"),
            Err(MessagingError::ReferenceNotFound(_))
        ));
    }

    #[test]
    fn test_fallback_is_consulted_for_unknown_names() {
        let external = Arc::new(InMemoryReferenceSearchService::new().with("db", 5_i64));
        let references = InMemoryReferenceSearchService::new()
            .with("local", 1_i64)
            .with_fallback(external);

        assert!(references.has("db"));
        assert_eq!(*references.get_typed::<i64>("db").unwrap(), 5);
        assert_eq!(*references.get_typed::<i64>("local").unwrap(), 1);
        assert!(!references.has("other"));
    }
}
