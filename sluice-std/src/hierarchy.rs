//! Declared type hierarchies for payload type routing.

use sluice_core::{TypeDescriptor, TypeHierarchy};
use std::collections::HashMap;

/// Reference name the hierarchy router looks up its [`TypeHierarchy`] under.
pub const TYPE_HIERARCHY_REFERENCE: &str = "typeHierarchy";

#[derive(Debug, Clone, Default)]
struct Declaration {
    parent: Option<TypeDescriptor>,
    interfaces: Vec<TypeDescriptor>,
}

/// A [`TypeHierarchy`] declared up front.
///
/// # Example
///
/// ```rust,ignore
/// let hierarchy = InMemoryTypeHierarchy::new()
///     .with_interface("OrderEvent", [])
///     .with_class("OrderPlaced", Some("DomainEvent"), ["OrderEvent"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryTypeHierarchy {
    declarations: HashMap<TypeDescriptor, Declaration>,
}

impl InMemoryTypeHierarchy {
    /// An empty hierarchy: every type stands alone.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a class with an optional parent class and its directly
    /// implemented interfaces.
    pub fn with_class<I, S>(mut self, name: &str, parent: Option<&str>, interfaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.declarations.insert(
            TypeDescriptor::new(name),
            Declaration {
                parent: parent.map(TypeDescriptor::new),
                interfaces: interfaces.into_iter().map(|i| TypeDescriptor::new(i)).collect(),
            },
        );
        self
    }

    /// Declare an interface and the interfaces it extends.
    pub fn with_interface<I, S>(self, name: &str, extends: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with_class(name, None, extends)
    }
}

impl TypeHierarchy for InMemoryTypeHierarchy {
    fn parent_of(&self, ty: &TypeDescriptor) -> Option<TypeDescriptor> {
        self.declarations.get(ty).and_then(|d| d.parent.clone())
    }

    fn interfaces_of(&self, ty: &TypeDescriptor) -> Vec<TypeDescriptor> {
        self.declarations
            .get(ty)
            .map(|d| d.interfaces.clone())
            .unwrap_or_default()
    }
}
