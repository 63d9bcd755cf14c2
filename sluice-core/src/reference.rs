//! Reference lookup.
//!
//! Builders depend on externally provided collaborators (services, converters,
//! type hierarchies) by name. The lookup is supplied to the assembler; its
//! construction is the embedding application's business.

use crate::error::MessagingError;
use std::{any::Any, sync::Arc};

/// A shared, type-erased reference.
pub type Reference = Arc<dyn Any + Send + Sync>;

/// Name-based lookup of external collaborators.
pub trait ReferenceSearchService: Send + Sync {
    /// Whether a reference is available under `name`.
    fn has(&self, name: &str) -> bool;

    /// The reference registered under `name`.
    fn get(&self, name: &str) -> Result<Reference, MessagingError>;
}

/// Typed access on top of [`ReferenceSearchService`].
pub trait ReferenceSearchServiceExt: ReferenceSearchService {
    /// The reference registered under `name`, downcast to `T`.
    ///
    /// A reference of a different type is reported as not found.
    fn get_typed<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>, MessagingError> {
        self.get(name)?
            .downcast::<T>()
            .map_err(|_| MessagingError::ReferenceNotFound(format!(
                "{name} (expected {})",
                std::any::type_name::<T>()
            )))
    }
}

impl<S: ReferenceSearchService + ?Sized> ReferenceSearchServiceExt for S {}
