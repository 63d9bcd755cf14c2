//! Turning gateway call arguments into a request message.

use serde_json::Value;
use sluice_core::{
    ConversionError, InterfaceToCall, Message, MessageBuilder, MessageHeaders, Payload,
};
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
enum Target {
    Payload,
    Message,
    Header(String),
    Headers,
}

#[derive(Debug, Clone)]
enum Source {
    Parameter { parameter: String, target: Target },
    Static { header: String, value: Value },
}

/// Declares where one gateway argument goes in the request message.
///
/// Without converters, a single-parameter method sends its argument as the
/// payload, or as the whole message when the parameter is typed as one.
///
/// # Example
///
/// ```rust,ignore
/// let converters = [
///     GatewayParameterConverter::payload("order"),
///     GatewayParameterConverter::header("tenant", "tenantId"),
///     GatewayParameterConverter::static_header("source", "api"),
/// ];
/// ```
#[derive(Debug, Clone)]
pub struct GatewayParameterConverter {
    source: Source,
}

impl GatewayParameterConverter {
    /// Send the argument as the payload.
    pub fn payload(parameter: impl Into<String>) -> Self {
        Self::parameter(parameter, Target::Payload)
    }

    /// Send the argument, which must be a [`Message`], as the request.
    pub fn message(parameter: impl Into<String>) -> Self {
        Self::parameter(parameter, Target::Message)
    }

    /// Send the argument as the header `header`.
    ///
    /// Strings, integers, floats, booleans and JSON values are accepted.
    pub fn header(parameter: impl Into<String>, header: impl Into<String>) -> Self {
        Self::parameter(parameter, Target::Header(header.into()))
    }

    /// Merge the argument into the headers.
    ///
    /// Accepts a `BTreeMap<String, Value>`, [`MessageHeaders`] or a JSON
    /// object.
    pub fn headers(parameter: impl Into<String>) -> Self {
        Self::parameter(parameter, Target::Headers)
    }

    /// Set a fixed header on every request.
    pub fn static_header(header: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            source: Source::Static {
                header: header.into(),
                value: value.into(),
            },
        }
    }

    fn parameter(parameter: impl Into<String>, target: Target) -> Self {
        Self {
            source: Source::Parameter {
                parameter: parameter.into(),
                target,
            },
        }
    }

    /// The parameter this converter consumes; `None` for static headers.
    pub fn parameter_name(&self) -> Option<&str> {
        match &self.source {
            Source::Parameter { parameter, .. } => Some(parameter),
            Source::Static { .. } => None,
        }
    }
}

#[derive(Default)]
struct Draft {
    base: Option<Message>,
    payload: Option<Payload>,
    headers: BTreeMap<String, Value>,
}

/// Converters matched to the parameters of one gateway method.
#[derive(Debug, Clone)]
pub(crate) struct RequestMapping {
    interface: String,
    parameters: Vec<(String, Target)>,
    static_headers: Vec<(String, Value)>,
}

impl RequestMapping {
    /// Match `converters` to `interface` parameters by name.
    pub(crate) fn new(
        interface: &InterfaceToCall,
        converters: &[GatewayParameterConverter],
    ) -> Result<Self, ConversionError> {
        let static_headers = converters
            .iter()
            .filter_map(|c| match &c.source {
                Source::Static { header, value } => Some((header.clone(), value.clone())),
                Source::Parameter { .. } => None,
            })
            .collect();
        let bound: Vec<(&str, &Target)> = converters
            .iter()
            .filter_map(|c| match &c.source {
                Source::Parameter { parameter, target } => Some((parameter.as_str(), target)),
                Source::Static { .. } => None,
            })
            .collect();

        let parameters = interface.parameters();
        let targets = if bound.is_empty() && parameters.len() == 1 {
            let target = if parameters[0].type_descriptor().is_message() {
                Target::Message
            } else {
                Target::Payload
            };
            vec![(parameters[0].name().to_string(), target)]
        } else {
            if bound.len() != parameters.len() {
                return Err(ConversionError::ParameterCountMismatch {
                    interface: interface.to_string(),
                    expected: parameters.len(),
                    actual: bound.len(),
                });
            }
            parameters
                .iter()
                .map(|parameter| {
                    bound
                        .iter()
                        .find(|(name, _)| *name == parameter.name())
                        .map(|(name, target)| (name.to_string(), (*target).clone()))
                        .ok_or_else(|| ConversionError::MissingParameterConverter {
                            interface: interface.to_string(),
                            parameter: parameter.name().to_string(),
                        })
                })
                .collect::<Result<Vec<_>, _>>()?
        };

        Ok(Self {
            interface: interface.to_string(),
            parameters: targets,
            static_headers,
        })
    }

    /// Build the request from arguments given in parameter order.
    pub(crate) fn to_message(&self, arguments: &[Payload]) -> Result<MessageBuilder, ConversionError> {
        if arguments.len() != self.parameters.len() {
            return Err(ConversionError::ParameterCountMismatch {
                interface: self.interface.clone(),
                expected: self.parameters.len(),
                actual: arguments.len(),
            });
        }

        let mut draft = Draft::default();
        for ((parameter, target), argument) in self.parameters.iter().zip(arguments) {
            match target {
                Target::Payload => draft.payload = Some(argument.clone()),
                Target::Message => {
                    let message = argument.downcast_ref::<Message>().ok_or_else(|| {
                        unsupported_argument(parameter, "a message")
                    })?;
                    draft.base = Some(message.clone());
                }
                Target::Header(header) => {
                    let value = header_value(argument)
                        .ok_or_else(|| unsupported_argument(parameter, "a scalar or JSON value"))?;
                    draft.headers.insert(header.clone(), value);
                }
                Target::Headers => {
                    let headers = header_map(argument)
                        .ok_or_else(|| unsupported_argument(parameter, "a header map"))?;
                    draft.headers.extend(headers);
                }
            }
        }

        let mut builder = match (draft.base, draft.payload) {
            (Some(base), Some(payload)) => MessageBuilder::from_message(&base).set_payload(payload),
            (Some(base), None) => MessageBuilder::from_message(&base),
            (None, payload) => MessageBuilder::with_raw_payload(payload.unwrap_or_else(Payload::null)),
        };
        builder = builder.set_headers(draft.headers);
        builder = builder.set_headers(self.static_headers.iter().cloned());
        Ok(builder)
    }
}

fn unsupported_argument(parameter: &str, expected: &str) -> ConversionError {
    ConversionError::Failed(format!("gateway argument `{parameter}` must be {expected}").into())
}

fn header_value(argument: &Payload) -> Option<Value> {
    if argument.is_null() {
        return Some(Value::Null);
    }
    if let Some(text) = argument.downcast_ref::<String>() {
        return Some(Value::from(text.as_str()));
    }
    if let Some(text) = argument.downcast_ref::<&'static str>() {
        return Some(Value::from(*text));
    }
    if let Some(number) = argument.downcast_ref::<i64>() {
        return Some(Value::from(*number));
    }
    if let Some(number) = argument.downcast_ref::<i32>() {
        return Some(Value::from(*number));
    }
    if let Some(number) = argument.downcast_ref::<u64>() {
        return Some(Value::from(*number));
    }
    if let Some(number) = argument.downcast_ref::<f64>() {
        return Some(Value::from(*number));
    }
    if let Some(flag) = argument.downcast_ref::<bool>() {
        return Some(Value::from(*flag));
    }
    argument.downcast_ref::<Value>().cloned()
}

fn header_map(argument: &Payload) -> Option<BTreeMap<String, Value>> {
    if let Some(map) = argument.downcast_ref::<BTreeMap<String, Value>>() {
        return Some(map.clone());
    }
    if let Some(headers) = argument.downcast_ref::<MessageHeaders>() {
        return Some(
            headers
                .iter()
                .filter(|(name, _)| {
                    name.as_str() != MessageHeaders::ID && name.as_str() != MessageHeaders::TIMESTAMP
                })
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
        );
    }
    match argument.downcast_ref::<Value>() {
        Some(Value::Object(object)) => Some(
            object
                .iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
        ),
        _ => None,
    }
}
