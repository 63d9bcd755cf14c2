use parking_lot::RwLock;
use sluice_core::{
    BoxFuture, DispatchError, DynMessageHandler, Message, MessageChannel, MessagingError,
    SubscribableChannel, SubscriptionId,
};
use std::sync::Arc;

/// Point-to-point, event-driven channel.
///
/// `send` hands the message to the single subscriber on the caller's task
/// and completes when the subscriber has handled it.
pub struct DirectChannel {
    name: String,
    subscriber: RwLock<Option<(SubscriptionId, Arc<dyn DynMessageHandler>)>>,
}

impl DirectChannel {
    /// Create an unsubscribed channel.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            subscriber: RwLock::new(None),
        }
    }
}

impl MessageChannel for DirectChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&self, message: Message) -> BoxFuture<'_, Result<(), MessagingError>> {
        Box::pin(async move {
            let handler = self.subscriber.read().as_ref().map(|(_, h)| Arc::clone(h));
            match handler {
                Some(handler) => {
                    tracing::trace!(channel = %self.name, message_id = %message.id(), "dispatching");
                    handler.handle_dyn(message).await
                }
                None => Err(DispatchError::NoSubscribers(self.name.clone()).into()),
            }
        })
    }

    fn as_subscribable(&self) -> Option<&dyn SubscribableChannel> {
        Some(self)
    }
}

impl SubscribableChannel for DirectChannel {
    fn subscribe(
        &self,
        handler: Arc<dyn DynMessageHandler>,
    ) -> Result<SubscriptionId, MessagingError> {
        let mut slot = self.subscriber.write();
        if slot.is_some() {
            return Err(DispatchError::SubscriberAlreadyRegistered(self.name.clone()).into());
        }
        let id = SubscriptionId::next();
        *slot = Some((id, handler));
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut slot = self.subscriber.write();
        match slot.as_ref() {
            Some((current, _)) if *current == id => {
                *slot = None;
                true
            }
            _ => false,
        }
    }

    fn subscriber_count(&self) -> usize {
        usize::from(self.subscriber.read().is_some())
    }
}
