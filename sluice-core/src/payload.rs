use crate::types::TypeDescriptor;
use std::{any::Any, fmt, sync::Arc};

/// A shared, type-erased message body tagged with its [`TypeDescriptor`].
///
/// Cloning a payload is cheap: the value itself is reference counted.
#[derive(Clone)]
pub struct Payload {
    value: Arc<dyn Any + Send + Sync>,
    type_descriptor: TypeDescriptor,
}

impl Payload {
    /// Wrap a value, describing it with [`TypeDescriptor::of`].
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            value: Arc::new(value),
            type_descriptor: TypeDescriptor::of::<T>(),
        }
    }

    /// Wrap a value under an explicit type descriptor.
    ///
    /// Used for domain types that take part in hierarchy routing, where the
    /// descriptor names the class rather than the Rust path.
    pub fn with_type<T: Any + Send + Sync>(value: T, type_descriptor: TypeDescriptor) -> Self {
        Self {
            value: Arc::new(value),
            type_descriptor,
        }
    }

    /// Wrap an already shared value.
    pub fn from_shared(value: Arc<dyn Any + Send + Sync>, type_descriptor: TypeDescriptor) -> Self {
        Self {
            value,
            type_descriptor,
        }
    }

    /// The absent value.
    pub fn null() -> Self {
        Self {
            value: Arc::new(()),
            type_descriptor: TypeDescriptor::NULL,
        }
    }

    /// Whether this is the absent value.
    pub fn is_null(&self) -> bool {
        self.type_descriptor == TypeDescriptor::NULL
    }

    /// The descriptor of the carried value.
    pub fn type_descriptor(&self) -> &TypeDescriptor {
        &self.type_descriptor
    }

    /// Re-tag the payload without touching the value.
    pub fn retyped(self, type_descriptor: TypeDescriptor) -> Self {
        Self {
            value: self.value,
            type_descriptor,
        }
    }

    /// Borrow the value as `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// Share the value as `T`.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.value).downcast::<T>().ok()
    }

    /// Whether the value is a `T`.
    pub fn is<T: Any>(&self) -> bool {
        self.value.is::<T>()
    }

    /// The shared, type-erased value.
    pub fn shared(&self) -> Arc<dyn Any + Send + Sync> {
        Arc::clone(&self.value)
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Payload");
        debug.field("type", &self.type_descriptor.name());
        if let Some(text) = self.downcast_ref::<String>() {
            debug.field("value", text);
        } else if let Some(number) = self.downcast_ref::<i64>() {
            debug.field("value", number);
        } else if let Some(flag) = self.downcast_ref::<bool>() {
            debug.field("value", flag);
        }
        debug.finish_non_exhaustive()
    }
}
