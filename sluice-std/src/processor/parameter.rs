//! Parameter converters.
//!
//! A [`ParameterConverterBuilder`] declares where one parameter of a target
//! operation takes its value from. Builders are resolved once, when the
//! handler is built; the resulting converters run for every message.

use sluice_core::{
    BoxError, ConversionError, Message, MessagingError, Payload, ReferenceSearchService,
    TypeDescriptor,
};
use serde_json::Value;
use std::{fmt, sync::Arc};

type ExpressionFn = dyn Fn(&Message) -> Result<Payload, BoxError> + Send + Sync;

#[derive(Clone)]
enum Source {
    Message,
    Payload,
    Header { name: String, required: bool },
    Headers,
    Reference(String),
    Expression(Arc<ExpressionFn>),
}

/// Declares the source of one parameter's value.
///
/// # Example
///
/// ```rust,ignore
/// let converters = vec![
///     ParameterConverterBuilder::payload("order"),
///     ParameterConverterBuilder::header("tenant", "tenantId"),
///     ParameterConverterBuilder::reference("repository", "orderRepository"),
/// ];
/// ```
#[derive(Clone)]
pub struct ParameterConverterBuilder {
    parameter: String,
    source: Source,
}

impl ParameterConverterBuilder {
    /// Pass the whole message.
    pub fn message(parameter: impl Into<String>) -> Self {
        Self::new(parameter, Source::Message)
    }

    /// Pass the payload, converted to the parameter type when needed.
    pub fn payload(parameter: impl Into<String>) -> Self {
        Self::new(parameter, Source::Payload)
    }

    /// Pass a header value; a missing header is an error.
    pub fn header(parameter: impl Into<String>, header_name: impl Into<String>) -> Self {
        Self::new(
            parameter,
            Source::Header {
                name: header_name.into(),
                required: true,
            },
        )
    }

    /// Pass a header value; a missing header passes the null payload.
    pub fn optional_header(parameter: impl Into<String>, header_name: impl Into<String>) -> Self {
        Self::new(
            parameter,
            Source::Header {
                name: header_name.into(),
                required: false,
            },
        )
    }

    /// Pass all headers as [`MessageHeaders`](sluice_core::MessageHeaders).
    pub fn headers(parameter: impl Into<String>) -> Self {
        Self::new(parameter, Source::Headers)
    }

    /// Pass the reference registered under `reference_name`.
    pub fn reference(parameter: impl Into<String>, reference_name: impl Into<String>) -> Self {
        Self::new(parameter, Source::Reference(reference_name.into()))
    }

    /// Pass a value computed from the message.
    pub fn expression<F>(parameter: impl Into<String>, expression: F) -> Self
    where
        F: Fn(&Message) -> Result<Payload, BoxError> + Send + Sync + 'static,
    {
        Self::new(parameter, Source::Expression(Arc::new(expression)))
    }

    fn new(parameter: impl Into<String>, source: Source) -> Self {
        Self {
            parameter: parameter.into(),
            source,
        }
    }

    /// The parameter this converter feeds.
    pub fn parameter_name(&self) -> &str {
        &self.parameter
    }

    /// Whether this converter passes the whole message.
    pub fn is_message_converter(&self) -> bool {
        matches!(self.source, Source::Message)
    }

    /// References needed to build the converter.
    pub fn required_reference_names(&self) -> Vec<String> {
        match &self.source {
            Source::Reference(name) => vec![name.clone()],
            _ => Vec::new(),
        }
    }

    /// Resolve build-time dependencies.
    pub fn build(&self, references: &dyn ReferenceSearchService) -> Result<ParameterConverter, MessagingError> {
        let kind = match &self.source {
            Source::Message => Kind::Message,
            Source::Payload => Kind::Payload,
            Source::Header { name, required } => Kind::Header {
                name: name.clone(),
                required: *required,
            },
            Source::Headers => Kind::Headers,
            Source::Reference(name) => Kind::Reference(references.get(name)?),
            Source::Expression(expression) => Kind::Expression(Arc::clone(expression)),
        };
        Ok(ParameterConverter {
            parameter: self.parameter.clone(),
            kind,
        })
    }
}

impl fmt::Debug for ParameterConverterBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let source = match &self.source {
            Source::Message => "message".to_string(),
            Source::Payload => "payload".to_string(),
            Source::Header { name, .. } => format!("header({name})"),
            Source::Headers => "headers".to_string(),
            Source::Reference(name) => format!("reference({name})"),
            Source::Expression(_) => "expression".to_string(),
        };
        f.debug_struct("ParameterConverterBuilder")
            .field("parameter", &self.parameter)
            .field("source", &source)
            .finish()
    }
}

#[derive(Clone)]
enum Kind {
    Message,
    Payload,
    Header { name: String, required: bool },
    Headers,
    Reference(sluice_core::Reference),
    Expression(Arc<ExpressionFn>),
}

/// A built parameter converter.
#[derive(Clone)]
pub struct ParameterConverter {
    parameter: String,
    kind: Kind,
}

impl ParameterConverter {
    /// The parameter this converter feeds.
    pub fn parameter_name(&self) -> &str {
        &self.parameter
    }

    /// Whether the produced value is the message payload, which may carry a
    /// `type` media parameter describing it.
    pub fn is_payload_converter(&self) -> bool {
        matches!(self.kind, Kind::Payload)
    }

    /// Whether the produced value must be passed on untouched.
    pub fn skips_conversion(&self) -> bool {
        matches!(self.kind, Kind::Message | Kind::Reference(_))
    }

    /// Extract the raw argument from `message`, before any type conversion.
    pub fn extract(
        &self,
        parameter_type: &TypeDescriptor,
        message: &Message,
    ) -> Result<Payload, MessagingError> {
        Ok(match &self.kind {
            Kind::Message => Payload::new(message.clone()),
            Kind::Payload => message.payload().clone(),
            Kind::Header { name, required } => match message.headers().get(name) {
                Some(value) => header_payload(value),
                None if *required => return Err(ConversionError::MissingHeader(name.clone()).into()),
                None => Payload::null(),
            },
            Kind::Headers => Payload::new(message.headers().clone()),
            Kind::Reference(reference) => Payload::from_shared(Arc::clone(reference), parameter_type.clone()),
            Kind::Expression(expression) => expression(message).map_err(MessagingError::Custom)?,
        })
    }
}

/// Map a JSON header value onto the closest native payload.
fn header_payload(value: &Value) -> Payload {
    match value {
        Value::Null => Payload::null(),
        Value::Bool(flag) => Payload::new(*flag),
        Value::String(text) => Payload::new(text.clone()),
        Value::Number(number) => match number.as_i64() {
            Some(integer) => Payload::new(integer),
            None => Payload::new(number.as_f64().unwrap_or_default()),
        },
        Value::Array(_) => Payload::with_type(value.clone(), TypeDescriptor::ARRAY),
        Value::Object(_) => Payload::with_type(value.clone(), TypeDescriptor::of::<Value>()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::InMemoryReferenceSearchService;
    use sluice_core::{MessageBuilder, MessageHeaders};

    fn message() -> Message {
        MessageBuilder::with_payload("body".to_string())
            .set_header("tenant", "acme")
            .set_header("attempt", 3)
            .build()
    }

    fn extract(builder: ParameterConverterBuilder) -> Result<Payload, MessagingError> {
        let references = InMemoryReferenceSearchService::new().with("limit", 10_i64);
        builder
            .build(&references)?
            .extract(&TypeDescriptor::ANYTHING, &message())
    }

    #[test]
    fn test_header_values_become_native_payloads() {
        let tenant = extract(ParameterConverterBuilder::header("t", "tenant")).unwrap();
        let attempt = extract(ParameterConverterBuilder::header("a", "attempt")).unwrap();
        assert_eq!(tenant.downcast_ref::<String>().map(String::as_str), Some("acme"));
        assert_eq!(attempt.downcast_ref::<i64>(), Some(&3));
    }

    #[test]
    fn test_missing_headers() {
        let required = extract(ParameterConverterBuilder::header("x", "missing"));
        assert!(matches!(
            required,
            Err(MessagingError::Conversion(ConversionError::MissingHeader(_)))
        ));

        let optional = extract(ParameterConverterBuilder::optional_header("x", "missing")).unwrap();
        assert!(optional.is_null());
    }

    #[test]
    fn test_message_headers_and_reference_sources() {
        let whole = extract(ParameterConverterBuilder::message("m")).unwrap();
        assert!(whole.type_descriptor().is_message());

        let headers = extract(ParameterConverterBuilder::headers("h")).unwrap();
        assert_eq!(
            headers.downcast_ref::<MessageHeaders>().and_then(|h| h.get_str("tenant")),
            Some("acme")
        );

        let limit = extract(ParameterConverterBuilder::reference("l", "limit")).unwrap();
        assert_eq!(limit.downcast_ref::<i64>(), Some(&10));
    }

    #[test]
    fn test_missing_reference_fails_at_build() {
        let builder = ParameterConverterBuilder::reference("l", "absent");
        assert_eq!(builder.required_reference_names(), vec!["absent"]);
        assert!(builder.build(&InMemoryReferenceSearchService::new()).is_err());
    }

    #[test]
    fn test_expression_source() {
        let total = extract(ParameterConverterBuilder::expression("total", |m| {
            let attempt = m.headers().get_i64("attempt").ok_or("no attempt")?;
            Ok(Payload::new(attempt * 2))
        }))
        .unwrap();
        assert_eq!(total.downcast_ref::<i64>(), Some(&6));
    }
}
