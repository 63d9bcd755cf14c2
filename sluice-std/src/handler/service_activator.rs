use super::definition::{HandlerDefinition, ReplyProducer, TargetSource, impl_handler_builder};
use crate::processor::MethodInvoker;
use sluice_core::{
    ChannelResolver, DynMessageHandler, Message, MessageHandler, MessagingError, MethodTarget,
    ReferenceSearchService,
};
use std::sync::Arc;

/// Calls a target operation for every message and forwards its result.
///
/// # Example
///
/// ```rust,ignore
/// let activator = ServiceActivatorBuilder::create("orders", place_order)
///     .with_output_channel("confirmations")
///     .with_endpoint_id("placeOrder");
/// configuration.register_handler(activator);
/// ```
#[derive(Clone)]
pub struct ServiceActivatorBuilder {
    definition: HandlerDefinition,
}

impl ServiceActivatorBuilder {
    /// Activate `target` for messages on `input_channel`.
    pub fn create(input_channel: impl Into<String>, target: MethodTarget) -> Self {
        Self {
            definition: HandlerDefinition::new(input_channel, TargetSource::Direct(target)),
        }
    }

    /// Activate the [`MethodTarget`] registered under `reference_name`.
    pub fn create_with_reference(input_channel: impl Into<String>, reference_name: impl Into<String>) -> Self {
        Self {
            definition: HandlerDefinition::new(input_channel, TargetSource::Reference(reference_name.into())),
        }
    }

    fn describe_handler(&self) -> String {
        self.definition.describe("service activator")
    }

    fn build_handler(
        &self,
        channels: &Arc<dyn ChannelResolver>,
        references: &Arc<dyn ReferenceSearchService>,
    ) -> Result<Arc<dyn DynMessageHandler>, MessagingError> {
        Ok(Arc::new(ServiceActivatingHandler {
            invoker: self.definition.build_invoker(references.as_ref())?,
            reply: self.definition.reply_producer(channels),
        }))
    }
}

impl_handler_builder!(ServiceActivatorBuilder);

struct ServiceActivatingHandler {
    invoker: MethodInvoker,
    reply: ReplyProducer,
}

impl MessageHandler for ServiceActivatingHandler {
    async fn handle(&self, message: Message) -> Result<(), MessagingError> {
        let result = self.invoker.invoke(message.clone()).await?;
        self.reply.reply_with(&message, result).await
    }
}
