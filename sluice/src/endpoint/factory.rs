use super::{
    consumer::{ConsumerLifecycle, EventDrivenConsumer},
    metadata::PollingMetadata,
    polling::PollingConsumer,
};
use crate::config::PollingSettings;
use sluice_core::{
    AssemblyError, ChannelResolver, Clock, MessageChannel, MessageHandlerBuilder, MessagingError,
    ReferenceSearchService, Trigger,
};
use std::{sync::Arc, time::Duration};

/// Everything a consumer factory may use to build a consumer.
pub struct ConsumerContext<'a> {
    channels: &'a Arc<dyn ChannelResolver>,
    references: &'a Arc<dyn ReferenceSearchService>,
    polling: Option<&'a PollingMetadata>,
    defaults: &'a PollingSettings,
    clock: &'a Arc<dyn Clock>,
}

impl<'a> ConsumerContext<'a> {
    pub(crate) fn new(
        channels: &'a Arc<dyn ChannelResolver>,
        references: &'a Arc<dyn ReferenceSearchService>,
        polling: Option<&'a PollingMetadata>,
        defaults: &'a PollingSettings,
        clock: &'a Arc<dyn Clock>,
    ) -> Self {
        Self {
            channels,
            references,
            polling,
            defaults,
            clock,
        }
    }

    /// The assembled channels.
    pub fn channels(&self) -> &Arc<dyn ChannelResolver> {
        self.channels
    }

    /// The reference lookup, including assembler defaults.
    pub fn references(&self) -> &Arc<dyn ReferenceSearchService> {
        self.references
    }

    /// Polling options registered for the endpoint.
    pub fn polling_metadata(&self) -> Option<&PollingMetadata> {
        self.polling
    }

    /// Polling defaults from settings.
    pub fn polling_defaults(&self) -> &PollingSettings {
        self.defaults
    }

    /// The clock schedules are computed with.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        self.clock
    }
}

/// Turns a handler builder into a consumer of its input channel.
///
/// The assembler asks each registered factory in order and uses the first
/// one that supports the handler.
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not a consumer factory",
    label = "must implement `MessageHandlerConsumerBuilder`"
)]
pub trait MessageHandlerConsumerBuilder: Send + Sync {
    /// Whether this factory can consume the handler's input channel.
    fn is_supporting(&self, channels: &dyn ChannelResolver, handler: &dyn MessageHandlerBuilder) -> bool;

    /// Build the handler and the consumer feeding it.
    fn build(
        &self,
        handler: &dyn MessageHandlerBuilder,
        context: &ConsumerContext<'_>,
    ) -> Result<Arc<dyn ConsumerLifecycle>, MessagingError>;
}

fn endpoint_id(handler: &dyn MessageHandlerBuilder) -> &str {
    handler
        .endpoint_id()
        .unwrap_or_else(|| handler.input_channel_name())
}

/// Subscribes handlers to event-driven channels, right away.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventDrivenConsumerBuilder;

impl MessageHandlerConsumerBuilder for EventDrivenConsumerBuilder {
    fn is_supporting(&self, channels: &dyn ChannelResolver, handler: &dyn MessageHandlerBuilder) -> bool {
        channels
            .resolve(handler.input_channel_name())
            .is_ok_and(|channel| channel.as_subscribable().is_some())
    }

    fn build(
        &self,
        handler: &dyn MessageHandlerBuilder,
        context: &ConsumerContext<'_>,
    ) -> Result<Arc<dyn ConsumerLifecycle>, MessagingError> {
        let channel = context.channels().resolve(handler.input_channel_name())?;
        let built = handler.build(context.channels(), context.references())?;
        let consumer = EventDrivenConsumer::new(endpoint_id(handler), channel, built);
        consumer.start()?;
        Ok(Arc::new(consumer))
    }
}

/// Attaches handlers to pollable channels through a [`PollingConsumer`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PollingConsumerBuilder;

impl MessageHandlerConsumerBuilder for PollingConsumerBuilder {
    fn is_supporting(&self, channels: &dyn ChannelResolver, handler: &dyn MessageHandlerBuilder) -> bool {
        channels
            .resolve(handler.input_channel_name())
            .is_ok_and(|channel| channel.as_pollable().is_some())
    }

    fn build(
        &self,
        handler: &dyn MessageHandlerBuilder,
        context: &ConsumerContext<'_>,
    ) -> Result<Arc<dyn ConsumerLifecycle>, MessagingError> {
        let endpoint_id = endpoint_id(handler);
        let plan = PollingPlan::resolve(endpoint_id, context)?;
        let channel = context.channels().resolve(handler.input_channel_name())?;
        let built = handler.build(context.channels(), context.references())?;
        let consumer = PollingConsumer::new(
            endpoint_id,
            channel,
            built,
            Arc::clone(&plan.trigger),
            Arc::clone(context.clock()),
        )?;
        let consumer = plan.apply(consumer);
        Ok(Arc::new(consumer))
    }
}

/// Polling options for one endpoint with settings defaults applied and the
/// trigger and error channel built.
pub(crate) struct PollingPlan {
    pub(crate) trigger: Arc<dyn Trigger>,
    metadata: PollingMetadata,
    error_channel: Option<Arc<dyn MessageChannel>>,
    receive_timeout: Duration,
}

impl PollingPlan {
    pub(crate) fn resolve(endpoint_id: &str, context: &ConsumerContext<'_>) -> Result<Self, MessagingError> {
        let metadata = context
            .polling_metadata()
            .cloned()
            .unwrap_or_else(|| PollingMetadata::new(endpoint_id));
        let resolved = metadata.resolve(context.polling_defaults());

        let trigger = resolved
            .trigger
            .build()
            .map_err(|source| AssemblyError::InvalidTrigger {
                endpoint_id: endpoint_id.to_string(),
                source,
            })?;
        let error_channel = resolved
            .error_channel_name
            .as_deref()
            .map(|name| context.channels().resolve(name))
            .transpose()?;
        Ok(Self {
            trigger,
            metadata,
            error_channel,
            receive_timeout: resolved.receive_timeout,
        })
    }

    pub(crate) fn apply(self, consumer: PollingConsumer) -> PollingConsumer {
        let consumer = consumer
            .with_receive_timeout(self.receive_timeout)
            .with_handled_message_limit(self.metadata.handled_message_limit())
            .with_execution_time_limit(self.metadata.execution_time_limit())
            .with_auto_startup(self.metadata.auto_startup());
        match self.error_channel {
            Some(error_channel) => consumer.with_error_channel(error_channel),
            None => consumer,
        }
    }
}
