use crate::processor::{MethodInvoker, ParameterConverterBuilder};
use sluice_core::{
    ChannelResolver, DynAroundInterceptor, Message, MessageBuilder, MessageChannel, MessageHeaders,
    MessagingError, MethodTarget, Payload, ReferenceSearchService, ReferenceSearchServiceExt,
};
use std::sync::Arc;

/// Where a handler's target operation comes from.
#[derive(Debug, Clone)]
pub(crate) enum TargetSource {
    Direct(MethodTarget),
    /// A [`MethodTarget`] registered as a reference.
    Reference(String),
}

impl TargetSource {
    pub(crate) fn required_reference_names(&self) -> Vec<String> {
        match self {
            TargetSource::Direct(_) => Vec::new(),
            TargetSource::Reference(name) => vec![name.clone()],
        }
    }

    pub(crate) fn resolve(&self, references: &dyn ReferenceSearchService) -> Result<MethodTarget, MessagingError> {
        match self {
            TargetSource::Direct(target) => Ok(target.clone()),
            TargetSource::Reference(name) => references
                .get_typed::<MethodTarget>(name)
                .map(|target| MethodTarget::clone(&target)),
        }
    }

    pub(crate) fn describe(&self) -> String {
        match self {
            TargetSource::Direct(target) => target.interface().to_string(),
            TargetSource::Reference(name) => format!("@{name}"),
        }
    }
}

/// Options shared by every handler that calls a target operation.
#[derive(Clone)]
pub(crate) struct HandlerDefinition {
    pub(crate) input_channel: String,
    pub(crate) endpoint_id: Option<String>,
    pub(crate) output_channel: Option<String>,
    pub(crate) require_reply: bool,
    pub(crate) target: TargetSource,
    pub(crate) converters: Vec<ParameterConverterBuilder>,
    pub(crate) interceptors: Vec<Arc<dyn DynAroundInterceptor>>,
}

impl HandlerDefinition {
    pub(crate) fn new(input_channel: impl Into<String>, target: TargetSource) -> Self {
        Self {
            input_channel: input_channel.into(),
            endpoint_id: None,
            output_channel: None,
            require_reply: false,
            target,
            converters: Vec::new(),
            interceptors: Vec::new(),
        }
    }

    pub(crate) fn endpoint_label(&self) -> &str {
        self.endpoint_id.as_deref().unwrap_or(&self.input_channel)
    }

    pub(crate) fn required_reference_names(&self) -> Vec<String> {
        let mut names = self.target.required_reference_names();
        names.extend(self.converters.iter().flat_map(|c| c.required_reference_names()));
        names
    }

    pub(crate) fn describe(&self, kind: &str) -> String {
        format!("{kind} `{}` ({})", self.endpoint_label(), self.target.describe())
    }

    pub(crate) fn build_invoker(&self, references: &dyn ReferenceSearchService) -> Result<MethodInvoker, MessagingError> {
        let target = self.target.resolve(references)?;
        MethodInvoker::create(target, &self.converters, self.interceptors.clone(), references)
    }

    pub(crate) fn reply_producer(&self, channels: &Arc<dyn ChannelResolver>) -> ReplyProducer {
        ReplyProducer::new(
            self.endpoint_label().to_string(),
            self.output_channel.clone(),
            self.require_reply,
            Arc::clone(channels),
        )
    }
}

/// Sends a handler's result on to the output channel, or back to whoever
/// is waiting for it.
#[derive(Clone)]
pub(crate) struct ReplyProducer {
    endpoint_id: String,
    output_channel: Option<String>,
    require_reply: bool,
    channels: Arc<dyn ChannelResolver>,
}

impl ReplyProducer {
    pub(crate) fn new(
        endpoint_id: String,
        output_channel: Option<String>,
        require_reply: bool,
        channels: Arc<dyn ChannelResolver>,
    ) -> Self {
        Self {
            endpoint_id,
            output_channel,
            require_reply,
            channels,
        }
    }

    /// Turn a target result into a reply to `request`.
    ///
    /// A result that already is a [`Message`] is sent as is; any other value
    /// replaces the request payload and keeps its headers.
    pub(crate) async fn reply_with(&self, request: &Message, result: Option<Payload>) -> Result<(), MessagingError> {
        match result.filter(|payload| !payload.is_null()) {
            Some(payload) => self.send(request, reply_message(request, payload)).await,
            None if self.require_reply => Err(self.reply_required()),
            None => Ok(()),
        }
    }

    /// Send `reply` to the output channel, else the request's reply channel.
    pub(crate) async fn send(&self, request: &Message, reply: Message) -> Result<(), MessagingError> {
        match self.destination(request)? {
            Some(channel) => {
                tracing::debug!(
                    endpoint_id = %self.endpoint_id,
                    channel = channel.name(),
                    message_id = reply.id(),
                    "sending reply"
                );
                channel.send(reply).await
            }
            None if self.require_reply => Err(self.reply_required()),
            None => {
                tracing::debug!(endpoint_id = %self.endpoint_id, "no reply destination, dropping result");
                Ok(())
            }
        }
    }

    fn destination(&self, request: &Message) -> Result<Option<Arc<dyn MessageChannel>>, MessagingError> {
        if let Some(name) = &self.output_channel {
            return self.channels.resolve(name).map(Some);
        }
        if let Some(channel) = request.reply_channel() {
            return Ok(Some(Arc::clone(channel)));
        }
        request
            .headers()
            .get_str(MessageHeaders::REPLY_CHANNEL)
            .map(|name| self.channels.resolve(name))
            .transpose()
    }

    fn reply_required(&self) -> MessagingError {
        MessagingError::ReplyRequired {
            endpoint_id: self.endpoint_id.clone(),
        }
    }
}

fn reply_message(request: &Message, payload: Payload) -> Message {
    if let Some(message) = payload.downcast::<Message>() {
        return Message::clone(&message);
    }
    MessageBuilder::from_message(request)
        .set_payload(payload)
        .remove_header(MessageHeaders::CONTENT_TYPE)
        .build()
}

/// Implements the fluent options and [`MessageHandlerBuilder`] plumbing for
/// a builder holding a `definition: HandlerDefinition` field.
///
/// The builder supplies `describe_handler` and `build_handler`.
///
/// [`MessageHandlerBuilder`]: sluice_core::MessageHandlerBuilder
macro_rules! impl_handler_builder {
    ($builder:ty) => {
        impl $builder {
            /// Send results to the named channel instead of the reply channel.
            pub fn with_output_channel(mut self, channel: impl Into<String>) -> Self {
                self.definition.output_channel = Some(channel.into());
                self
            }

            /// Declare the endpoint id.
            pub fn with_endpoint_id(mut self, endpoint_id: impl Into<String>) -> Self {
                self.definition.endpoint_id = Some(endpoint_id.into());
                self
            }

            /// Fail when the target produces no reply or there is nowhere to
            /// send it.
            pub fn with_require_reply(mut self, require_reply: bool) -> Self {
                self.definition.require_reply = require_reply;
                self
            }

            /// Declare where each target parameter takes its value from.
            pub fn with_parameter_converters(
                mut self,
                converters: impl IntoIterator<Item = $crate::processor::ParameterConverterBuilder>,
            ) -> Self {
                self.definition.converters = converters.into_iter().collect();
                self
            }

            /// Append an around-interceptor to the invocation chain.
            pub fn with_around_interceptor(
                mut self,
                interceptor: ::std::sync::Arc<dyn ::sluice_core::DynAroundInterceptor>,
            ) -> Self {
                self.definition.interceptors.push(interceptor);
                self
            }
        }

        impl ::sluice_core::MessageHandlerBuilder for $builder {
            fn input_channel_name(&self) -> &str {
                &self.definition.input_channel
            }

            fn endpoint_id(&self) -> Option<&str> {
                self.definition.endpoint_id.as_deref()
            }

            fn set_endpoint_id(&mut self, endpoint_id: String) {
                self.definition.endpoint_id = Some(endpoint_id);
            }

            fn required_reference_names(&self) -> Vec<String> {
                self.definition.required_reference_names()
            }

            fn add_around_interceptor(
                &mut self,
                interceptor: ::std::sync::Arc<dyn ::sluice_core::DynAroundInterceptor>,
            ) {
                self.definition.interceptors.push(interceptor);
            }

            fn describe(&self) -> String {
                self.describe_handler()
            }

            fn build(
                &self,
                channels: &::std::sync::Arc<dyn ::sluice_core::ChannelResolver>,
                references: &::std::sync::Arc<dyn ::sluice_core::ReferenceSearchService>,
            ) -> Result<::std::sync::Arc<dyn ::sluice_core::DynMessageHandler>, ::sluice_core::MessagingError> {
                self.build_handler(channels, references)
            }
        }
    };
}

pub(crate) use impl_handler_builder;
