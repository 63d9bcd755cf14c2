use super::definition::ReplyProducer;
use crate::channel::QueueChannel;
use sluice_core::{
    ChannelResolver, ConfigurationError, DynAroundInterceptor, DynMessageHandler, Message,
    MessageBuilder, MessageChannel, MessageHandler, MessageHandlerBuilder, MessagingError,
    PollableChannel, ReferenceSearchService,
};
use std::sync::Arc;

/// Runs handlers one after another, feeding each handler's reply to the
/// next one.
///
/// Steps reply through a private queue, so chained builders should not
/// declare output channels of their own. When a step produces nothing the
/// flow stops there. The last result goes to the chain's output channel,
/// its output handler, or else the reply channel of the message that
/// entered the chain.
pub struct ChainMessageHandlerBuilder {
    input_channel: String,
    endpoint_id: Option<String>,
    output_channel: Option<String>,
    require_reply: bool,
    steps: Vec<Box<dyn MessageHandlerBuilder>>,
    output_handler: Option<Box<dyn MessageHandlerBuilder>>,
}

impl ChainMessageHandlerBuilder {
    /// Start an empty chain consuming `input_channel`.
    pub fn create(input_channel: impl Into<String>) -> Self {
        Self {
            input_channel: input_channel.into(),
            endpoint_id: None,
            output_channel: None,
            require_reply: false,
            steps: Vec::new(),
            output_handler: None,
        }
    }

    /// Append a step.
    pub fn chain(mut self, step: impl MessageHandlerBuilder + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    /// Hand the last result to `handler` instead of replying.
    pub fn with_output_handler(mut self, handler: impl MessageHandlerBuilder + 'static) -> Self {
        self.output_handler = Some(Box::new(handler));
        self
    }

    /// Send the last result to the named channel.
    pub fn with_output_channel(mut self, channel: impl Into<String>) -> Self {
        self.output_channel = Some(channel.into());
        self
    }

    /// Declare the endpoint id.
    pub fn with_endpoint_id(mut self, endpoint_id: impl Into<String>) -> Self {
        self.endpoint_id = Some(endpoint_id.into());
        self
    }

    /// Fail when the chain produces no reply or there is nowhere to send it.
    pub fn with_require_reply(mut self, require_reply: bool) -> Self {
        self.require_reply = require_reply;
        self
    }

    fn label(&self) -> &str {
        self.endpoint_id.as_deref().unwrap_or(&self.input_channel)
    }

    fn invalid(&self, reason: &str) -> MessagingError {
        ConfigurationError::InvalidTarget {
            target: self.describe(),
            reason: reason.into(),
        }
        .into()
    }
}

impl MessageHandlerBuilder for ChainMessageHandlerBuilder {
    fn input_channel_name(&self) -> &str {
        &self.input_channel
    }

    fn endpoint_id(&self) -> Option<&str> {
        self.endpoint_id.as_deref()
    }

    fn set_endpoint_id(&mut self, endpoint_id: String) {
        self.endpoint_id = Some(endpoint_id);
    }

    fn required_reference_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .steps
            .iter()
            .chain(&self.output_handler)
            .flat_map(|step| step.required_reference_names())
            .collect();
        names.sort();
        names.dedup();
        names
    }

    fn add_around_interceptor(&mut self, interceptor: Arc<dyn DynAroundInterceptor>) {
        for step in &mut self.steps {
            step.add_around_interceptor(Arc::clone(&interceptor));
        }
    }

    fn describe(&self) -> String {
        format!("chain `{}` of {} steps", self.label(), self.steps.len())
    }

    fn build(
        &self,
        channels: &Arc<dyn ChannelResolver>,
        references: &Arc<dyn ReferenceSearchService>,
    ) -> Result<Arc<dyn DynMessageHandler>, MessagingError> {
        if self.steps.is_empty() {
            return Err(self.invalid("a chain needs at least one step"));
        }
        if self.output_handler.is_some() && self.output_channel.is_some() {
            return Err(self.invalid("a chain cannot have both an output channel and an output handler"));
        }
        let steps = self
            .steps
            .iter()
            .map(|step| step.build(channels, references))
            .collect::<Result<Vec<_>, _>>()?;
        let output_handler = self
            .output_handler
            .as_ref()
            .map(|handler| handler.build(channels, references))
            .transpose()?;
        Ok(Arc::new(ChainHandler {
            endpoint_id: self.label().to_string(),
            steps,
            output_handler,
            reply: ReplyProducer::new(
                self.label().to_string(),
                self.output_channel.clone(),
                self.require_reply,
                Arc::clone(channels),
            ),
            require_reply: self.require_reply,
        }))
    }
}

struct ChainHandler {
    endpoint_id: String,
    steps: Vec<Arc<dyn DynMessageHandler>>,
    output_handler: Option<Arc<dyn DynMessageHandler>>,
    reply: ReplyProducer,
    require_reply: bool,
}

impl ChainHandler {
    async fn run_step(&self, step: &dyn DynMessageHandler, message: &Message) -> Result<Option<Message>, MessagingError> {
        let bridge = Arc::new(QueueChannel::new(format!("{}.chain", self.endpoint_id)));
        let shared: Arc<dyn MessageChannel> = bridge.clone();
        let request = MessageBuilder::from_message(message).set_reply_channel(shared).build();
        step.handle_dyn(request).await?;
        Ok(bridge.receive())
    }
}

impl MessageHandler for ChainHandler {
    async fn handle(&self, message: Message) -> Result<(), MessagingError> {
        let mut current = message.clone();
        for (index, step) in self.steps.iter().enumerate() {
            match self.run_step(step.as_ref(), &current).await? {
                Some(next) => current = next,
                None if self.require_reply => {
                    return Err(MessagingError::ReplyRequired {
                        endpoint_id: self.endpoint_id.clone(),
                    });
                }
                None => {
                    tracing::debug!(endpoint_id = %self.endpoint_id, step = index, "chain step produced nothing, stopping flow");
                    return Ok(());
                }
            }
        }

        let mut result = MessageBuilder::from_message(&current).without_reply_channel();
        if let Some(channel) = message.reply_channel() {
            result = result.set_reply_channel(Arc::clone(channel));
        }
        let result = result.build();
        match &self.output_handler {
            Some(handler) => handler.handle_dyn(result).await,
            None => self.reply.send(&message, result).await,
        }
    }
}
