use super::definition::{HandlerDefinition, ReplyProducer, TargetSource, impl_handler_builder};
use crate::processor::MethodInvoker;
use serde_json::Value;
use sluice_core::{
    ChannelResolver, ConfigurationError, DynMessageHandler, InterfaceToCall, Message,
    MessageBuilder, MessageHandler, MessagingError, MethodTarget, Payload, ReferenceSearchService,
    TypeDescriptor,
};
use std::{collections::BTreeMap, sync::Arc};

/// Replaces a message's payload, or the whole message, with the result of a
/// target operation.
///
/// The target must return a value. When it returns nothing for a message,
/// the flow stops there.
#[derive(Clone)]
pub struct TransformerBuilder {
    definition: HandlerDefinition,
}

impl TransformerBuilder {
    /// Transform messages on `input_channel` with `target`.
    pub fn create(input_channel: impl Into<String>, target: MethodTarget) -> Self {
        Self {
            definition: HandlerDefinition::new(input_channel, TargetSource::Direct(target)),
        }
    }

    /// Transform with the [`MethodTarget`] registered under `reference_name`.
    pub fn create_with_reference(input_channel: impl Into<String>, reference_name: impl Into<String>) -> Self {
        Self {
            definition: HandlerDefinition::new(input_channel, TargetSource::Reference(reference_name.into())),
        }
    }

    /// Add fixed headers to every message, keeping the payload.
    pub fn create_header_enricher(
        input_channel: impl Into<String>,
        headers: BTreeMap<String, Value>,
    ) -> Self {
        let interface = InterfaceToCall::new("HeaderEnricher", "enrich")
            .with_parameter("message", TypeDescriptor::MESSAGE)
            .returning(TypeDescriptor::MESSAGE);
        let target = MethodTarget::sync(interface, move |arguments| {
            let message = arguments
                .first()
                .and_then(|argument| argument.downcast_ref::<Message>())
                .ok_or("header enricher expects the message")?;
            let enriched = MessageBuilder::from_message(message)
                .set_headers(headers.clone())
                .build();
            Ok(Some(Payload::with_type(enriched, TypeDescriptor::MESSAGE)))
        });
        Self::create(input_channel, target)
    }

    fn describe_handler(&self) -> String {
        self.definition.describe("transformer")
    }

    fn build_handler(
        &self,
        channels: &Arc<dyn ChannelResolver>,
        references: &Arc<dyn ReferenceSearchService>,
    ) -> Result<Arc<dyn DynMessageHandler>, MessagingError> {
        let invoker = self.definition.build_invoker(references.as_ref())?;
        if invoker.interface().is_void() {
            return Err(ConfigurationError::InvalidTarget {
                target: invoker.interface().to_string(),
                reason: "a transformer must return a value".into(),
            }
            .into());
        }
        Ok(Arc::new(TransformingHandler {
            invoker,
            reply: self.definition.reply_producer(channels),
        }))
    }
}

impl_handler_builder!(TransformerBuilder);

struct TransformingHandler {
    invoker: MethodInvoker,
    reply: ReplyProducer,
}

impl MessageHandler for TransformingHandler {
    async fn handle(&self, message: Message) -> Result<(), MessagingError> {
        let result = self.invoker.invoke(message.clone()).await?;
        if result.as_ref().is_none_or(Payload::is_null) {
            tracing::debug!(message_id = message.id(), "transformer produced nothing, stopping flow");
            return Ok(());
        }
        self.reply.reply_with(&message, result).await
    }
}
