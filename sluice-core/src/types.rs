//! Type and representation descriptors.
//!
//! A [`TypeDescriptor`] names the type of a payload or parameter; a
//! [`MediaType`] names how a value is represented. Conversions are looked up
//! by the `(type, media type)` pair on each side.

use crate::message::Message;
use std::{
    any::{Any, TypeId},
    borrow::Cow,
    fmt,
};

/// Names the type of a value flowing through the system.
///
/// Primitive Rust types map to short canonical names (`string`, `int`,
/// `float`, `bool`), everything else uses [`std::any::type_name`] unless a
/// name is given explicitly with [`TypeDescriptor::new`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeDescriptor(Cow<'static, str>);

impl TypeDescriptor {
    /// Catch-all object type; matches every payload.
    pub const OBJECT: TypeDescriptor = TypeDescriptor(Cow::Borrowed("object"));
    /// Accepts any value without conversion.
    pub const ANYTHING: TypeDescriptor = TypeDescriptor(Cow::Borrowed("anything"));
    /// The [`Message`] type itself.
    pub const MESSAGE: TypeDescriptor = TypeDescriptor(Cow::Borrowed("message"));
    /// Absence of a value.
    pub const NULL: TypeDescriptor = TypeDescriptor(Cow::Borrowed("null"));
    /// Return type of operations that produce nothing.
    pub const VOID: TypeDescriptor = TypeDescriptor(Cow::Borrowed("void"));
    /// UTF-8 strings.
    pub const STRING: TypeDescriptor = TypeDescriptor(Cow::Borrowed("string"));
    /// Signed integers.
    pub const INTEGER: TypeDescriptor = TypeDescriptor(Cow::Borrowed("int"));
    /// Floating point numbers.
    pub const FLOAT: TypeDescriptor = TypeDescriptor(Cow::Borrowed("float"));
    /// Booleans.
    pub const BOOL: TypeDescriptor = TypeDescriptor(Cow::Borrowed("bool"));
    /// Ordered collections.
    pub const ARRAY: TypeDescriptor = TypeDescriptor(Cow::Borrowed("array"));

    /// Create a descriptor with an explicit name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    /// Describe the Rust type `T`.
    pub fn of<T: Any>() -> Self {
        let id = TypeId::of::<T>();
        if id == TypeId::of::<String>() || id == TypeId::of::<&'static str>() {
            Self::STRING
        } else if id == TypeId::of::<i64>()
            || id == TypeId::of::<i32>()
            || id == TypeId::of::<u64>()
            || id == TypeId::of::<u32>()
        {
            Self::INTEGER
        } else if id == TypeId::of::<f64>() || id == TypeId::of::<f32>() {
            Self::FLOAT
        } else if id == TypeId::of::<bool>() {
            Self::BOOL
        } else if id == TypeId::of::<Message>() {
            Self::MESSAGE
        } else if id == TypeId::of::<()>() {
            Self::VOID
        } else {
            Self(Cow::Borrowed(std::any::type_name::<T>()))
        }
    }

    /// The descriptor's name.
    pub fn name(&self) -> &str {
        &self.0
    }

    /// Whether this is the message type.
    pub fn is_message(&self) -> bool {
        *self == Self::MESSAGE
    }

    /// Whether this is the void return type.
    pub fn is_void(&self) -> bool {
        *self == Self::VOID
    }

    /// Whether a value described by `source` can be passed where `self` is
    /// expected without conversion.
    pub fn accepts(&self, source: &TypeDescriptor) -> bool {
        self == source || *self == Self::ANYTHING || (*self == Self::OBJECT && *source != Self::NULL)
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for TypeDescriptor {
    fn from(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }
}

/// A representation identifier such as `application/json;type=Order`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaType {
    primary: String,
    subtype: String,
    parameters: Vec<(String, String)>,
}

impl MediaType {
    /// In-memory Rust value, the representation of payloads that were never
    /// serialized.
    pub const RUST_OBJECT: &'static str = "application/x-rust-object";
    /// JSON text.
    pub const JSON: &'static str = "application/json";
    /// Plain text.
    pub const TEXT_PLAIN: &'static str = "text/plain";

    /// Parse `type/subtype[;key=value]*`.
    ///
    /// Malformed input without a `/` is treated as a primary type with an
    /// empty subtype.
    pub fn parse(text: &str) -> Self {
        let mut parts = text.split(';');
        let essence = parts.next().unwrap_or_default().trim();
        let (primary, subtype) = essence.split_once('/').unwrap_or((essence, ""));
        let parameters = parts
            .filter_map(|param| param.split_once('='))
            .map(|(key, value)| {
                (
                    key.trim().to_lowercase(),
                    value.trim().trim_matches('"').to_string(),
                )
            })
            .collect();

        Self {
            primary: primary.to_lowercase(),
            subtype: subtype.to_lowercase(),
            parameters,
        }
    }

    /// The in-memory object media type.
    pub fn rust_object() -> Self {
        Self::parse(Self::RUST_OBJECT)
    }

    /// The JSON media type.
    pub fn json() -> Self {
        Self::parse(Self::JSON)
    }

    /// Add or replace a parameter.
    pub fn with_parameter(mut self, key: &str, value: impl Into<String>) -> Self {
        let key = key.to_lowercase();
        self.parameters.retain(|(existing, _)| *existing != key);
        self.parameters.push((key, value.into()));
        self
    }

    /// Look up a parameter.
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(key))
            .map(|(_, value)| value.as_str())
    }

    /// The `type` parameter naming the carried payload type, if any.
    pub fn type_parameter(&self) -> Option<TypeDescriptor> {
        self.parameter("type").map(TypeDescriptor::new)
    }

    /// Compare ignoring parameters.
    pub fn is_compatible_with(&self, other: &MediaType) -> bool {
        self.primary == other.primary && self.subtype == other.subtype
    }

    /// `type/subtype` without parameters.
    pub fn essence(&self) -> String {
        format!("{}/{}", self.primary, self.subtype)
    }
}

impl Default for MediaType {
    fn default() -> Self {
        Self::rust_object()
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.primary, self.subtype)?;
        for (key, value) in &self.parameters {
            write!(f, ";{key}={value}")?;
        }
        Ok(())
    }
}

/// Explicit type-hierarchy introspection used by hierarchy-aware routing.
///
/// Implementations describe a finite graph: walking `parent_of` from any type
/// must terminate.
pub trait TypeHierarchy: Send + Sync {
    /// The direct ancestor class of `ty`, if any.
    fn parent_of(&self, ty: &TypeDescriptor) -> Option<TypeDescriptor>;

    /// Interfaces declared directly on `ty` (classes and interfaces alike).
    fn interfaces_of(&self, ty: &TypeDescriptor) -> Vec<TypeDescriptor>;
}
