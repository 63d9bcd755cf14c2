use super::{
    dispatch::{Exchange, Gateway, GatewayMethod, ReplyCorrelator},
    parameter::{GatewayParameterConverter, RequestMapping},
};
use sluice_core::{
    AssemblyError, CONVERSION_SERVICE_REFERENCE, ChannelResolver, ConversionService,
    DispatchError, DynAroundInterceptor, InterfaceToCall, MessagingError, ReferenceSearchService,
    ReferenceSearchServiceExt,
};
use sluice_std::conversion::AutoCollectionConversionService;
use std::{collections::BTreeMap, sync::Arc, time::Duration};

/// Blueprint of a gateway.
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not a gateway builder",
    label = "must implement `GatewayBuilder`"
)]
pub trait GatewayBuilder: Send + Sync {
    /// The name the gateway is registered under.
    fn reference_name(&self) -> &str;

    /// The interface the gateway implements.
    fn interface_name(&self) -> &str;

    /// References the gateway needs.
    fn required_reference_names(&self) -> Vec<String> {
        Vec::new()
    }

    /// A short description used in errors and logs.
    fn describe(&self) -> String {
        format!("gateway `{}` ({})", self.reference_name(), self.interface_name())
    }

    /// Build the gateway.
    fn build(
        &self,
        channels: &Arc<dyn ChannelResolver>,
        references: &Arc<dyn ReferenceSearchService>,
    ) -> Result<Gateway, MessagingError>;
}

/// One gateway method: where its requests go and how replies come back.
///
/// Registered alone it builds a single-method gateway; several can be
/// combined into one gateway with [`CombinedGatewayBuilder`].
///
/// # Example
///
/// ```rust,ignore
/// let place = GatewayProxyBuilder::new(
///     "orderGateway",
///     InterfaceToCall::new("OrderGateway", "place")
///         .with_parameter("order", order_type)
///         .returning(TypeDescriptor::INTEGER),
///     "orders",
/// )
/// .with_reply_timeout(Duration::from_secs(1))
/// .with_error_channel("orderErrors");
/// ```
#[derive(Clone)]
pub struct GatewayProxyBuilder {
    reference_name: String,
    interface: InterfaceToCall,
    request_channel: String,
    reply_channel: Option<String>,
    reply_timeout: Option<Duration>,
    error_channel: Option<String>,
    converters: Vec<GatewayParameterConverter>,
    interceptors: Vec<Arc<dyn DynAroundInterceptor>>,
}

impl GatewayProxyBuilder {
    /// A method of `interface` sending its requests to `request_channel`.
    pub fn new(
        reference_name: impl Into<String>,
        interface: InterfaceToCall,
        request_channel: impl Into<String>,
    ) -> Self {
        Self {
            reference_name: reference_name.into(),
            interface,
            request_channel: request_channel.into(),
            reply_channel: None,
            reply_timeout: None,
            error_channel: None,
            converters: Vec::new(),
            interceptors: Vec::new(),
        }
    }

    /// Receive replies from this pollable channel instead of a private
    /// queue.
    ///
    /// Requests carry a `correlationId` header and only the reply carrying
    /// the same value is returned; late replies of timed-out calls are
    /// discarded.
    pub fn with_reply_channel(mut self, channel: impl Into<String>) -> Self {
        self.reply_channel = Some(channel.into());
        self
    }

    /// Wait at most `timeout` for the reply.
    ///
    /// Without a timeout the reply must already be there when the request
    /// has been sent.
    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = Some(timeout);
        self
    }

    /// Hand failures to this channel instead of returning them.
    pub fn with_error_channel(mut self, channel: impl Into<String>) -> Self {
        self.error_channel = Some(channel.into());
        self
    }

    /// Map arguments onto the request message.
    pub fn with_parameter_converters(
        mut self,
        converters: impl IntoIterator<Item = GatewayParameterConverter>,
    ) -> Self {
        self.converters = converters.into_iter().collect();
        self
    }

    /// Wrap calls of this method.
    pub fn with_around_interceptor(mut self, interceptor: Arc<dyn DynAroundInterceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    /// The method name.
    pub fn method_name(&self) -> &str {
        self.interface.method_name()
    }

    /// Build this method; methods sharing a reply channel share `correlators`.
    fn build_method(
        &self,
        channels: &dyn ChannelResolver,
        references: &dyn ReferenceSearchService,
        correlators: &mut BTreeMap<String, Arc<ReplyCorrelator>>,
    ) -> Result<GatewayMethod, MessagingError> {
        let mapping = RequestMapping::new(&self.interface, &self.converters)?;
        let request_channel = channels.resolve(&self.request_channel)?;
        let replies = match self.reply_channel.as_deref() {
            Some(name) => match correlators.get(name) {
                Some(correlator) => Some(Arc::clone(correlator)),
                None => {
                    let channel = channels.resolve(name)?;
                    if channel.as_pollable().is_none() {
                        return Err(DispatchError::NotPollable(name.to_string()).into());
                    }
                    let correlator = Arc::new(ReplyCorrelator::new(channel));
                    correlators.insert(name.to_string(), Arc::clone(&correlator));
                    Some(correlator)
                }
            },
            None => None,
        };
        let error_channel = self
            .error_channel
            .as_deref()
            .map(|name| channels.resolve(name))
            .transpose()?;

        let conversion: Arc<dyn ConversionService> = if references.has(CONVERSION_SERVICE_REFERENCE) {
            let shared = references.get_typed::<Arc<dyn ConversionService>>(CONVERSION_SERVICE_REFERENCE)?;
            Arc::clone(shared.as_ref())
        } else {
            Arc::new(AutoCollectionConversionService::empty())
        };

        let exchange = Exchange {
            origin: format!("{}::{}", self.reference_name, self.interface.method_name()),
            interface: self.interface.clone(),
            mapping,
            request_channel,
            replies,
            reply_timeout: self.reply_timeout,
            conversion,
        };
        Ok(GatewayMethod::new(
            exchange,
            error_channel,
            self.interceptors.clone(),
        ))
    }
}

impl GatewayBuilder for GatewayProxyBuilder {
    fn reference_name(&self) -> &str {
        &self.reference_name
    }

    fn interface_name(&self) -> &str {
        self.interface.interface_name()
    }

    fn build(
        &self,
        channels: &Arc<dyn ChannelResolver>,
        references: &Arc<dyn ReferenceSearchService>,
    ) -> Result<Gateway, MessagingError> {
        let method = self.build_method(channels.as_ref(), references.as_ref(), &mut BTreeMap::new())?;
        Ok(Gateway::new(
            &self.reference_name,
            self.interface.interface_name(),
            BTreeMap::from([(self.method_name().to_string(), method)]),
        ))
    }
}

/// A gateway exposing several methods under one reference name.
///
/// The reference and interface names of the combined builder win over those
/// of its methods. Method names must be unique.
pub struct CombinedGatewayBuilder {
    reference_name: String,
    interface_name: String,
    methods: Vec<GatewayProxyBuilder>,
}

impl CombinedGatewayBuilder {
    /// Combine `methods` into the gateway `reference_name`.
    pub fn new(
        reference_name: impl Into<String>,
        interface_name: impl Into<String>,
        methods: impl IntoIterator<Item = GatewayProxyBuilder>,
    ) -> Self {
        Self {
            reference_name: reference_name.into(),
            interface_name: interface_name.into(),
            methods: methods.into_iter().collect(),
        }
    }
}

impl GatewayBuilder for CombinedGatewayBuilder {
    fn reference_name(&self) -> &str {
        &self.reference_name
    }

    fn interface_name(&self) -> &str {
        &self.interface_name
    }

    fn build(
        &self,
        channels: &Arc<dyn ChannelResolver>,
        references: &Arc<dyn ReferenceSearchService>,
    ) -> Result<Gateway, MessagingError> {
        let mut methods = BTreeMap::new();
        let mut correlators = BTreeMap::new();
        for method in &self.methods {
            if methods.contains_key(method.method_name()) {
                return Err(AssemblyError::DuplicateGatewayMethod {
                    gateway: self.reference_name.clone(),
                    method: method.method_name().to_string(),
                }
                .into());
            }
            let built = method.build_method(channels.as_ref(), references.as_ref(), &mut correlators)?;
            methods.insert(method.method_name().to_string(), built);
        }
        Ok(Gateway::new(&self.reference_name, &self.interface_name, methods))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_core::{MessageChannel, TypeDescriptor};
    use sluice_std::{
        channel::{DirectChannel, InMemoryChannelResolver, QueueChannel},
        reference::InMemoryReferenceSearchService,
    };

    fn channels() -> Arc<dyn ChannelResolver> {
        let direct: Arc<dyn MessageChannel> = Arc::new(DirectChannel::new("requests"));
        let queue: Arc<dyn MessageChannel> = Arc::new(QueueChannel::new("replies"));
        Arc::new(InMemoryChannelResolver::from_channels([direct, queue]))
    }

    fn references() -> Arc<dyn ReferenceSearchService> {
        Arc::new(InMemoryReferenceSearchService::new())
    }

    fn method(name: &str) -> InterfaceToCall {
        InterfaceToCall::new("Commands", name).with_parameter("command", TypeDescriptor::STRING)
    }

    #[test]
    fn test_combined_gateway_exposes_every_method() {
        let builder = CombinedGatewayBuilder::new(
            "commands",
            "Commands",
            [
                GatewayProxyBuilder::new("commands", method("send"), "requests"),
                GatewayProxyBuilder::new("commands", method("ask"), "requests"),
            ],
        );
        let gateway = builder.build(&channels(), &references()).unwrap();
        assert_eq!(gateway.method_names(), vec!["ask", "send"]);
        assert_eq!(gateway.reference_name(), "commands");
    }

    #[test]
    fn test_repeated_method_name_is_rejected() {
        let builder = CombinedGatewayBuilder::new(
            "commands",
            "Commands",
            [
                GatewayProxyBuilder::new("commands", method("send"), "requests"),
                GatewayProxyBuilder::new("commands", method("send"), "requests").with_reply_channel("replies"),
            ],
        );
        assert!(matches!(
            builder.build(&channels(), &references()),
            Err(MessagingError::Assembly(AssemblyError::DuplicateGatewayMethod { ref gateway, ref method }))
                if gateway == "commands" && method == "send"
        ));
    }

    #[test]
    fn test_unknown_request_channel_fails_to_build() {
        let builder = GatewayProxyBuilder::new("commands", method("send"), "missing");
        assert!(matches!(
            builder.build(&channels(), &references()),
            Err(MessagingError::ChannelNotFound(_))
        ));
    }

    #[test]
    fn test_reply_channel_must_be_pollable() {
        let builder =
            GatewayProxyBuilder::new("commands", method("send"), "requests").with_reply_channel("requests");
        assert!(matches!(
            builder.build(&channels(), &references()),
            Err(MessagingError::Dispatch(DispatchError::NotPollable(_)))
        ));
    }
}
