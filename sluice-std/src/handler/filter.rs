use super::definition::{HandlerDefinition, ReplyProducer, TargetSource, impl_handler_builder};
use crate::processor::MethodInvoker;
use sluice_core::{
    ChannelResolver, ConfigurationError, DynMessageHandler, Message, MessageHandler,
    MessagingError, MethodTarget, ReferenceSearchService, TypeDescriptor,
};
use std::sync::Arc;

/// Lets a message through unchanged when a boolean target accepts it.
///
/// Rejected messages go to the discard channel if one is set; with
/// `throw_on_discard` the rejection is also reported as
/// [`MessagingError::MessageDiscarded`].
#[derive(Clone)]
pub struct MessageFilterBuilder {
    definition: HandlerDefinition,
    discard_channel: Option<String>,
    throw_on_discard: bool,
}

impl MessageFilterBuilder {
    /// Filter messages on `input_channel` with a target returning `bool`.
    pub fn create(input_channel: impl Into<String>, target: MethodTarget) -> Self {
        Self::new(HandlerDefinition::new(input_channel, TargetSource::Direct(target)))
    }

    /// Filter with the [`MethodTarget`] registered under `reference_name`.
    pub fn create_with_reference(input_channel: impl Into<String>, reference_name: impl Into<String>) -> Self {
        Self::new(HandlerDefinition::new(
            input_channel,
            TargetSource::Reference(reference_name.into()),
        ))
    }

    fn new(definition: HandlerDefinition) -> Self {
        Self {
            definition,
            discard_channel: None,
            throw_on_discard: false,
        }
    }

    /// Send rejected messages to the named channel.
    pub fn with_discard_channel(mut self, channel: impl Into<String>) -> Self {
        self.discard_channel = Some(channel.into());
        self
    }

    /// Fail the send when a message is rejected.
    pub fn with_throw_on_discard(mut self, throw_on_discard: bool) -> Self {
        self.throw_on_discard = throw_on_discard;
        self
    }

    fn describe_handler(&self) -> String {
        self.definition.describe("filter")
    }

    fn build_handler(
        &self,
        channels: &Arc<dyn ChannelResolver>,
        references: &Arc<dyn ReferenceSearchService>,
    ) -> Result<Arc<dyn DynMessageHandler>, MessagingError> {
        let invoker = self.definition.build_invoker(references.as_ref())?;
        if *invoker.interface().return_type() != TypeDescriptor::BOOL {
            return Err(ConfigurationError::InvalidTarget {
                target: invoker.interface().to_string(),
                reason: format!("a filter must return `bool`, not `{}`", invoker.interface().return_type()),
            }
            .into());
        }
        Ok(Arc::new(MessageFilter {
            endpoint_id: self.definition.endpoint_label().to_string(),
            invoker,
            reply: self.definition.reply_producer(channels),
            channels: Arc::clone(channels),
            discard_channel: self.discard_channel.clone(),
            throw_on_discard: self.throw_on_discard,
        }))
    }
}

impl_handler_builder!(MessageFilterBuilder);

struct MessageFilter {
    endpoint_id: String,
    invoker: MethodInvoker,
    reply: ReplyProducer,
    channels: Arc<dyn ChannelResolver>,
    discard_channel: Option<String>,
    throw_on_discard: bool,
}

impl MessageHandler for MessageFilter {
    async fn handle(&self, message: Message) -> Result<(), MessagingError> {
        let accepted = self
            .invoker
            .invoke(message.clone())
            .await?
            .and_then(|result| result.downcast_ref::<bool>().copied())
            .unwrap_or(false);

        if accepted {
            return self.reply.send(&message, message.clone()).await;
        }

        tracing::debug!(endpoint_id = %self.endpoint_id, message_id = message.id(), "message discarded");
        let message_id = message.id().to_string();
        if let Some(name) = &self.discard_channel {
            self.channels.resolve(name)?.send(message).await?;
        }
        if self.throw_on_discard {
            return Err(MessagingError::MessageDiscarded {
                endpoint_id: self.endpoint_id.clone(),
                message_id,
            });
        }
        Ok(())
    }
}
