//! Conversion service and standard converters.

use serde::{Serialize, de::DeserializeOwned};
use sluice_core::{
    BoxError, ConversionError, ConversionService, Converter, MediaType, Payload, TypeDescriptor,
};
use std::{any::Any, marker::PhantomData, sync::Arc};

/// Tries registered converters in order; the first match converts.
#[derive(Clone, Default)]
pub struct AutoCollectionConversionService {
    converters: Vec<Arc<dyn Converter>>,
}

impl AutoCollectionConversionService {
    /// A service with the given converters.
    pub fn new(converters: Vec<Arc<dyn Converter>>) -> Self {
        Self { converters }
    }

    /// A service that converts nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of registered converters.
    pub fn len(&self) -> usize {
        self.converters.len()
    }

    /// Whether no converter is registered.
    pub fn is_empty(&self) -> bool {
        self.converters.is_empty()
    }

    fn find(
        &self,
        source_type: &TypeDescriptor,
        source_media: &MediaType,
        target_type: &TypeDescriptor,
        target_media: &MediaType,
    ) -> Option<&Arc<dyn Converter>> {
        self.converters
            .iter()
            .find(|c| c.matches(source_type, source_media, target_type, target_media))
    }
}

impl ConversionService for AutoCollectionConversionService {
    fn can_convert(
        &self,
        source_type: &TypeDescriptor,
        source_media: &MediaType,
        target_type: &TypeDescriptor,
        target_media: &MediaType,
    ) -> bool {
        self.find(source_type, source_media, target_type, target_media)
            .is_some()
    }

    fn convert(
        &self,
        payload: &Payload,
        source_type: &TypeDescriptor,
        source_media: &MediaType,
        target_type: &TypeDescriptor,
        target_media: &MediaType,
    ) -> Result<Payload, ConversionError> {
        let converter = self
            .find(source_type, source_media, target_type, target_media)
            .ok_or_else(|| ConversionError::Unsupported {
                source_type: source_type.to_string(),
                source_media: source_media.to_string(),
                target_type: target_type.to_string(),
                target_media: target_media.to_string(),
            })?;
        converter.convert(payload, target_type, target_media)
    }
}

/// Converts between JSON text and `T` using serde.
///
/// Deserializes a `string` payload in `application/json` into `T` as an
/// in-memory object, and serializes `T` back into JSON text.
pub struct JsonConverter<T> {
    type_descriptor: TypeDescriptor,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonConverter<T>
where
    T: Serialize + DeserializeOwned + Any + Send + Sync,
{
    /// A converter for `T` described by [`TypeDescriptor::of`].
    pub fn new() -> Self {
        Self::named(TypeDescriptor::of::<T>())
    }

    /// A converter for `T` under an explicit descriptor.
    pub fn named(type_descriptor: TypeDescriptor) -> Self {
        Self {
            type_descriptor,
            _marker: PhantomData,
        }
    }
}

impl<T> Default for JsonConverter<T>
where
    T: Serialize + DeserializeOwned + Any + Send + Sync,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Converter for JsonConverter<T>
where
    T: Serialize + DeserializeOwned + Any + Send + Sync,
{
    fn matches(
        &self,
        source_type: &TypeDescriptor,
        source_media: &MediaType,
        target_type: &TypeDescriptor,
        target_media: &MediaType,
    ) -> bool {
        let json = MediaType::json();
        let object = MediaType::rust_object();
        let decoding = source_media.is_compatible_with(&json)
            && target_media.is_compatible_with(&object)
            && *target_type == self.type_descriptor;
        let encoding = source_media.is_compatible_with(&object)
            && target_media.is_compatible_with(&json)
            && *source_type == self.type_descriptor;
        decoding || encoding
    }

    fn convert(
        &self,
        payload: &Payload,
        _target_type: &TypeDescriptor,
        target_media: &MediaType,
    ) -> Result<Payload, ConversionError> {
        if target_media.is_compatible_with(&MediaType::json()) {
            let value = payload
                .downcast_ref::<T>()
                .ok_or_else(|| ConversionError::Failed(format!("payload is not `{}`", self.type_descriptor).into()))?;
            let text = serde_json::to_string(value).map_err(|e| ConversionError::Failed(e.into()))?;
            return Ok(Payload::new(text));
        }

        let text = payload
            .downcast_ref::<String>()
            .ok_or_else(|| ConversionError::Failed("JSON payload is not a string".into()))?;
        let value: T = serde_json::from_str(text).map_err(|e| ConversionError::Failed(e.into()))?;
        Ok(Payload::with_type(value, self.type_descriptor.clone()))
    }
}

type ConvertFn = dyn Fn(&Payload) -> Result<Payload, BoxError> + Send + Sync;

/// A converter between two fixed types backed by a closure, ignoring media
/// types.
pub struct FnConverter {
    source_type: TypeDescriptor,
    target_type: TypeDescriptor,
    convert: Box<ConvertFn>,
}

impl FnConverter {
    /// Convert `source_type` values into `target_type` with `convert`.
    pub fn new<F>(source_type: TypeDescriptor, target_type: TypeDescriptor, convert: F) -> Self
    where
        F: Fn(&Payload) -> Result<Payload, BoxError> + Send + Sync + 'static,
    {
        Self {
            source_type,
            target_type,
            convert: Box::new(convert),
        }
    }
}

impl Converter for FnConverter {
    fn matches(
        &self,
        source_type: &TypeDescriptor,
        _source_media: &MediaType,
        target_type: &TypeDescriptor,
        _target_media: &MediaType,
    ) -> bool {
        *source_type == self.source_type && *target_type == self.target_type
    }

    fn convert(
        &self,
        payload: &Payload,
        _target_type: &TypeDescriptor,
        _target_media: &MediaType,
    ) -> Result<Payload, ConversionError> {
        (self.convert)(payload).map_err(ConversionError::Failed)
    }
}
