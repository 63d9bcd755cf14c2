//! Conversion contracts.
//!
//! Values are converted between `(type, media type)` pairs. The invoker asks a
//! [`ConversionService`] whether a path exists before converting; a
//! [`Converter`] is one such path.

use crate::{
    error::ConversionError,
    payload::Payload,
    types::{MediaType, TypeDescriptor},
};

/// Reference name under which the active conversion service is registered.
pub const CONVERSION_SERVICE_REFERENCE: &str = "conversionService";

/// Converts payloads between types and representations.
pub trait ConversionService: Send + Sync {
    /// Whether a conversion path exists.
    fn can_convert(
        &self,
        source_type: &TypeDescriptor,
        source_media: &MediaType,
        target_type: &TypeDescriptor,
        target_media: &MediaType,
    ) -> bool;

    /// Convert the payload.
    fn convert(
        &self,
        payload: &Payload,
        source_type: &TypeDescriptor,
        source_media: &MediaType,
        target_type: &TypeDescriptor,
        target_media: &MediaType,
    ) -> Result<Payload, ConversionError>;
}

/// A single conversion path.
pub trait Converter: Send + Sync {
    /// Whether this converter handles the pair.
    fn matches(
        &self,
        source_type: &TypeDescriptor,
        source_media: &MediaType,
        target_type: &TypeDescriptor,
        target_media: &MediaType,
    ) -> bool;

    /// Convert the payload into the target type.
    fn convert(
        &self,
        payload: &Payload,
        target_type: &TypeDescriptor,
        target_media: &MediaType,
    ) -> Result<Payload, ConversionError>;
}
