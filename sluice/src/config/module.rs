use super::{ConfiguredMessagingSystem, MessagingSystemConfiguration};
use sluice_core::{MessagingError, Reference, ReferenceSearchService};
use std::{any::Any, collections::BTreeMap, sync::Arc};

/// A unit of configuration that registers builders with the assembler.
///
/// Modules run in three phases: `prepare` for every module first, then
/// `configure` for every module, then `post_configure` once the system is
/// built. Modules registered during `prepare` are prepared too.
///
/// # Example
///
/// ```rust,ignore
/// struct Auditing;
///
/// impl Module for Auditing {
///     fn name(&self) -> &str {
///         "auditing"
///     }
///
///     fn configure(
///         &self,
///         configuration: &mut MessagingSystemConfiguration,
///         context: &ModuleContext,
///     ) -> Result<(), MessagingError> {
///         configuration.register_around_interceptor("orders.*", Arc::new(LoggingAroundInterceptor));
///         Ok(())
///     }
/// }
/// ```
pub trait Module: Send + Sync {
    /// The name extensions are addressed to.
    fn name(&self) -> &str;

    /// Register builders, extensions and further modules.
    fn prepare(&self, _configuration: &mut MessagingSystemConfiguration) -> Result<(), MessagingError> {
        Ok(())
    }

    /// Register builders that depend on extensions, references or variables.
    fn configure(
        &self,
        _configuration: &mut MessagingSystemConfiguration,
        _context: &ModuleContext,
    ) -> Result<(), MessagingError> {
        Ok(())
    }

    /// Inspect the built system.
    fn post_configure(&self, _system: &ConfiguredMessagingSystem) -> Result<(), MessagingError> {
        Ok(())
    }
}

/// What a module sees while it is configured.
pub struct ModuleContext {
    extensions: Vec<Reference>,
    references: Arc<dyn ReferenceSearchService>,
    variables: BTreeMap<String, String>,
}

impl ModuleContext {
    pub(crate) fn new(
        extensions: Vec<Reference>,
        references: Arc<dyn ReferenceSearchService>,
        variables: BTreeMap<String, String>,
    ) -> Self {
        Self {
            extensions,
            references,
            variables,
        }
    }

    /// Every extension addressed to the module, in registration order.
    pub fn extensions(&self) -> &[Reference] {
        &self.extensions
    }

    /// The extensions of type `T`.
    pub fn extensions_of<T: Any + Send + Sync>(&self) -> Vec<Arc<T>> {
        self.extensions
            .iter()
            .filter_map(|extension| Arc::clone(extension).downcast::<T>().ok())
            .collect()
    }

    /// The external reference lookup.
    pub fn references(&self) -> &dyn ReferenceSearchService {
        self.references.as_ref()
    }

    /// The configuration variable `name`.
    pub fn variable(&self, name: &str) -> Option<&str> {
        self.variables.get(name).map(String::as_str)
    }

    /// All configuration variables.
    pub fn variables(&self) -> &BTreeMap<String, String> {
        &self.variables
    }
}
