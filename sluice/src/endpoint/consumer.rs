use parking_lot::Mutex;
use sluice_core::{
    BoxFuture, DispatchError, DynMessageHandler, Message, MessageChannel, MessageHandler,
    MessagingError, SubscriptionId,
};
use std::sync::Arc;
use tracing::Instrument;

/// A running endpoint: one handler attached to one input channel.
///
/// Consumers are built by a [`MessageHandlerConsumerBuilder`](super::MessageHandlerConsumerBuilder)
/// and owned by the [`ConfiguredMessagingSystem`](crate::ConfiguredMessagingSystem),
/// which starts and stops them by endpoint id.
pub trait ConsumerLifecycle: Send + Sync {
    /// The endpoint id.
    fn endpoint_id(&self) -> &str;

    /// The channel the consumer takes messages from.
    fn input_channel_name(&self) -> &str;

    /// Whether the consumer polls its channel.
    fn is_pollable(&self) -> bool;

    /// Whether the consumer is currently receiving messages.
    fn is_running(&self) -> bool;

    /// Start receiving messages; starting a running consumer does nothing.
    fn start(&self) -> Result<(), MessagingError>;

    /// Stop receiving messages.
    fn stop(&self);

    /// Poll in the caller's task until a stop condition holds.
    fn run(&self) -> BoxFuture<'_, Result<(), MessagingError>>;

    /// Whether the consumer starts as soon as the system is built.
    fn auto_startup(&self) -> bool {
        false
    }
}

/// Runs the inner handler inside an `endpoint` span.
pub(crate) struct InstrumentedHandler {
    endpoint_id: String,
    inner: Arc<dyn DynMessageHandler>,
}

impl InstrumentedHandler {
    pub(crate) fn new(endpoint_id: impl Into<String>, inner: Arc<dyn DynMessageHandler>) -> Self {
        Self {
            endpoint_id: endpoint_id.into(),
            inner,
        }
    }
}

impl MessageHandler for InstrumentedHandler {
    async fn handle(&self, message: Message) -> Result<(), MessagingError> {
        let span = tracing::debug_span!(
            "endpoint",
            endpoint_id = %self.endpoint_id,
            message_id = %message.id()
        );
        self.inner.handle_dyn(message).instrument(span).await
    }
}

/// Subscribes a handler to an event-driven channel.
///
/// Messages are handled on the sender's task, before the sender's `send`
/// returns.
pub struct EventDrivenConsumer {
    endpoint_id: String,
    channel: Arc<dyn MessageChannel>,
    handler: Arc<dyn DynMessageHandler>,
    subscription: Mutex<Option<SubscriptionId>>,
}

impl EventDrivenConsumer {
    /// A stopped consumer of `channel`.
    pub fn new(
        endpoint_id: impl Into<String>,
        channel: Arc<dyn MessageChannel>,
        handler: Arc<dyn DynMessageHandler>,
    ) -> Self {
        let endpoint_id = endpoint_id.into();
        let handler: Arc<dyn DynMessageHandler> =
            Arc::new(InstrumentedHandler::new(endpoint_id.clone(), handler));
        Self {
            endpoint_id,
            channel,
            handler,
            subscription: Mutex::new(None),
        }
    }
}

impl ConsumerLifecycle for EventDrivenConsumer {
    fn endpoint_id(&self) -> &str {
        &self.endpoint_id
    }

    fn input_channel_name(&self) -> &str {
        self.channel.name()
    }

    fn is_pollable(&self) -> bool {
        false
    }

    fn is_running(&self) -> bool {
        self.subscription.lock().is_some()
    }

    fn start(&self) -> Result<(), MessagingError> {
        let mut subscription = self.subscription.lock();
        if subscription.is_some() {
            return Ok(());
        }
        let channel = self
            .channel
            .as_subscribable()
            .ok_or_else(|| DispatchError::NotSubscribable(self.channel.name().to_string()))?;
        *subscription = Some(channel.subscribe(Arc::clone(&self.handler))?);
        tracing::debug!(endpoint_id = %self.endpoint_id, channel = %self.channel.name(), "subscribed");
        Ok(())
    }

    fn stop(&self) {
        let Some(id) = self.subscription.lock().take() else {
            return;
        };
        if let Some(channel) = self.channel.as_subscribable() {
            channel.unsubscribe(id);
        }
        tracing::debug!(endpoint_id = %self.endpoint_id, channel = %self.channel.name(), "unsubscribed");
    }

    fn run(&self) -> BoxFuture<'_, Result<(), MessagingError>> {
        let err = DispatchError::NotRunnable(self.endpoint_id.clone());
        Box::pin(futures::future::ready(Err(err.into())))
    }
}
