//! Error types for Sluice.
//!
//! This module provides a structured error hierarchy using `thiserror`:
//!
//! - [`MessagingError`] - Top-level error for runtime and per-message failures
//! - [`AssemblyError`] - Fatal errors raised while building a messaging system
//! - [`RoutingError`] - Errors from routers resolving destinations
//! - [`ConversionError`] - Errors converting payloads between types
//! - [`InvocationError`] - Faults raised by a target operation
//! - [`DispatchError`] - Errors delivering a message through a channel
//! - [`ConfigurationError`] - Malformed triggers, patterns and settings

use thiserror::Error;

/// A boxed error type for dynamic error handling.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Top-level error type for all Sluice runtime operations.
#[derive(Error, Debug)]
pub enum MessagingError {
    /// Assembling the messaging system failed.
    #[error("assembly error: {0}")]
    Assembly(#[from] AssemblyError),

    /// A router could not resolve or reach its destinations.
    #[error("routing error: {0}")]
    Routing(#[from] RoutingError),

    /// A payload could not be converted to a parameter type.
    #[error("conversion error: {0}")]
    Conversion(#[from] ConversionError),

    /// The target operation raised a fault.
    #[error("invocation error: {0}")]
    Invocation(#[from] InvocationError),

    /// A channel could not deliver a message.
    #[error("dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    /// A trigger, pattern or setting is malformed.
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// No channel is registered under the given name.
    #[error("channel `{0}` not found")]
    ChannelNotFound(String),

    /// No gateway is registered under the given reference name.
    #[error("gateway `{0}` not found")]
    GatewayNotFound(String),

    /// The gateway exists but does not expose the method.
    #[error("gateway `{gateway}` has no method `{method}`")]
    GatewayMethodNotFound {
        /// Gateway reference name.
        gateway: String,
        /// Requested method name.
        method: String,
    },

    /// No endpoint is registered under the given id.
    #[error("endpoint `{0}` not found")]
    EndpointNotFound(String),

    /// No reference is registered under the given name.
    #[error("reference `{0}` not found")]
    ReferenceNotFound(String),

    /// A handler needed to reply but no reply destination was available.
    #[error("handler `{endpoint_id}` requires a reply but no output or reply channel is set")]
    ReplyRequired {
        /// The endpoint that produced no deliverable reply.
        endpoint_id: String,
    },

    /// A filter discarded a message and was configured to fail on discard.
    #[error("message `{message_id}` was discarded by `{endpoint_id}`")]
    MessageDiscarded {
        /// The filtering endpoint.
        endpoint_id: String,
        /// Id of the discarded message.
        message_id: String,
    },

    /// A gateway did not receive a reply in time.
    #[error("no reply received within {0:?}")]
    ReplyTimeout(std::time::Duration),

    /// A custom error occurred.
    #[error(transparent)]
    Custom(BoxError),
}

/// Fatal errors raised while assembling a messaging system.
#[derive(Error, Debug)]
pub enum AssemblyError {
    /// A builder declared a reference the lookup cannot provide.
    #[error("reference `{reference}` required by {required_by} is not available")]
    MissingReference {
        /// The missing reference name.
        reference: String,
        /// Description of the builder that requires it.
        required_by: String,
    },

    /// No registered consumer factory supports the handler.
    #[error("no consumer factory supports handler {handler}")]
    NoConsumerFactory {
        /// Description of the unsupported handler builder.
        handler: String,
    },

    /// Two gateways share one reference name.
    #[error("gateway `{0}` is registered more than once")]
    DuplicateGateway(String),

    /// Two methods of one gateway share a name.
    #[error("gateway `{gateway}` declares method `{method}` more than once")]
    DuplicateGatewayMethod {
        /// The gateway reference name.
        gateway: String,
        /// The repeated method name.
        method: String,
    },

    /// Two handlers declare the same endpoint id.
    #[error("endpoint id `{0}` is registered more than once")]
    DuplicateEndpoint(String),

    /// Two different channel builders share one name.
    #[error("channel `{0}` is registered twice with different definitions")]
    ConflictingChannel(String),

    /// A polling definition could not be turned into a trigger.
    #[error("invalid trigger for endpoint `{endpoint_id}`")]
    InvalidTrigger {
        /// The endpoint owning the trigger.
        endpoint_id: String,
        /// Why the trigger was rejected.
        #[source]
        source: ConfigurationError,
    },

    /// A component failed to build.
    #[error("failed to build {component}")]
    Build {
        /// Description of the failing component.
        component: String,
        /// The underlying failure.
        #[source]
        source: Box<MessagingError>,
    },
}

impl AssemblyError {
    /// Wrap a build failure of the described component.
    pub fn build(component: impl Into<String>, source: MessagingError) -> Self {
        Self::Build {
            component: component.into(),
            source: Box::new(source),
        }
    }
}

/// Errors raised while resolving or reaching router destinations.
#[derive(Error, Debug)]
pub enum RoutingError {
    /// No destination was resolved and resolution is required.
    #[error("no destination resolved for message `{message_id}` by `{endpoint_id}`")]
    NoDestination {
        /// The routing endpoint.
        endpoint_id: String,
        /// The unroutable message.
        message_id: String,
    },

    /// A custom router returned something other than channel names.
    #[error("router `{endpoint_id}` returned an unsupported destination of type `{type_name}`")]
    InvalidDestination {
        /// The routing endpoint.
        endpoint_id: String,
        /// Type descriptor of the returned value.
        type_name: String,
    },
}

/// Errors converting a payload to a parameter type.
#[derive(Error, Debug)]
pub enum ConversionError {
    /// No converter handles the pair.
    #[error("cannot convert `{source_type}` ({source_media}) to `{target_type}` ({target_media})")]
    Unsupported {
        /// Source type descriptor.
        source_type: String,
        /// Source media type.
        source_media: String,
        /// Target type descriptor.
        target_type: String,
        /// Target media type.
        target_media: String,
    },

    /// A converter accepted the pair but failed on the value.
    #[error("converter failed: {0}")]
    Failed(#[source] BoxError),

    /// A required header was absent.
    #[error("required header `{0}` is missing")]
    MissingHeader(String),

    /// The number of converters does not match the parameters of the target.
    #[error("{interface} requires {expected} parameter converters, but {actual} were passed")]
    ParameterCountMismatch {
        /// Description of the target operation.
        interface: String,
        /// Number of declared parameters.
        expected: usize,
        /// Number of converters supplied.
        actual: usize,
    },

    /// A declared parameter has no converter.
    #[error("{interface} has no converter for parameter `{parameter}`")]
    MissingParameterConverter {
        /// Description of the target operation.
        interface: String,
        /// The unmapped parameter.
        parameter: String,
    },
}

/// A fault raised by a target operation.
#[derive(Error, Debug)]
#[error("{interface} failed: {source}")]
pub struct InvocationError {
    /// Description of the failing operation.
    pub interface: String,
    /// The fault.
    #[source]
    pub source: BoxError,
}

impl InvocationError {
    /// Create an invocation error for the described operation.
    pub fn new(interface: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self {
            interface: interface.into(),
            source: source.into(),
        }
    }
}

/// Errors delivering a message through a channel.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// An event-driven channel has nothing subscribed.
    #[error("channel `{0}` has no subscribers")]
    NoSubscribers(String),

    /// A point-to-point channel already has its subscriber.
    #[error("channel `{0}` accepts a single subscriber")]
    SubscriberAlreadyRegistered(String),

    /// The channel cannot be polled.
    #[error("channel `{0}` is not pollable")]
    NotPollable(String),

    /// The channel cannot be subscribed to.
    #[error("channel `{0}` is not subscribable")]
    NotSubscribable(String),

    /// The endpoint cannot be run in the foreground.
    #[error("endpoint `{0}` is event-driven and cannot be run")]
    NotRunnable(String),
}

/// Malformed triggers, patterns and settings.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    /// A cron expression could not be parsed.
    #[error("invalid cron expression `{expression}`: {reason}")]
    InvalidCronExpression {
        /// The rejected expression.
        expression: String,
        /// What was wrong with it.
        reason: String,
    },

    /// A routing pattern could not be compiled.
    #[error("invalid routing pattern `{pattern}`")]
    InvalidPattern {
        /// The rejected pattern.
        pattern: String,
        /// The compile error.
        #[source]
        source: BoxError,
    },

    /// A numeric option is out of range.
    #[error("{name} must be positive, got {value}")]
    NotPositive {
        /// The option name.
        name: &'static str,
        /// The rejected value.
        value: i64,
    },

    /// A duration is too large to schedule with.
    #[error("{name} of {value} is out of range")]
    OutOfRange {
        /// The option name.
        name: &'static str,
        /// The rejected value, as given.
        value: String,
    },

    /// A target operation does not fit the handler it was given to.
    #[error("{target} cannot be used here: {reason}")]
    InvalidTarget {
        /// Description of the target operation.
        target: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Settings could not be read or parsed.
    #[error("invalid settings: {0}")]
    Settings(#[source] BoxError),
}

// Convenience conversions
impl From<BoxError> for MessagingError {
    fn from(err: BoxError) -> Self {
        MessagingError::Custom(err)
    }
}

impl From<BoxError> for ConversionError {
    fn from(err: BoxError) -> Self {
        ConversionError::Failed(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_reference_names_reference_and_requirer() {
        let err = AssemblyError::MissingReference {
            reference: "orderService".into(),
            required_by: "service activator `orders`".into(),
        };
        let text = err.to_string();
        assert!(text.contains("orderService"));
        assert!(text.contains("orders"));
    }

    #[test]
    fn test_build_error_keeps_source() {
        let err = AssemblyError::build(
            "handler `h`",
            MessagingError::ChannelNotFound("missing".into()),
        );
        let source = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("channel `missing` not found"));
    }

    #[test]
    fn test_boxed_error_converts_to_custom() {
        let boxed: BoxError = "boom".into();
        let err: MessagingError = boxed.into();
        assert!(matches!(err, MessagingError::Custom(_)));
    }
}
