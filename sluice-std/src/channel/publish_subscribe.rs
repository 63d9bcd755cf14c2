use parking_lot::RwLock;
use sluice_core::{
    BoxFuture, DynMessageHandler, Message, MessageChannel, MessagingError, SubscribableChannel,
    SubscriptionId,
};
use std::sync::Arc;

/// Event-driven channel delivering each message to every subscriber.
///
/// Subscribers run one after another on the sender's task, in subscription
/// order. A failing subscriber does not prevent delivery to the rest; the
/// first failure is returned once all of them ran.
pub struct PublishSubscribeChannel {
    name: String,
    subscribers: RwLock<Vec<(SubscriptionId, Arc<dyn DynMessageHandler>)>>,
}

impl PublishSubscribeChannel {
    /// Create a channel without subscribers.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            subscribers: RwLock::new(Vec::new()),
        }
    }
}

impl MessageChannel for PublishSubscribeChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&self, message: Message) -> BoxFuture<'_, Result<(), MessagingError>> {
        Box::pin(async move {
            let subscribers: Vec<_> = self
                .subscribers
                .read()
                .iter()
                .map(|(_, h)| Arc::clone(h))
                .collect();

            let mut first_error = None;
            for subscriber in subscribers {
                if let Err(err) = subscriber.handle_dyn(message.clone()).await {
                    tracing::warn!(channel = %self.name, message_id = %message.id(), error = %err, "subscriber failed");
                    first_error.get_or_insert(err);
                }
            }
            first_error.map_or(Ok(()), Err)
        })
    }

    fn as_subscribable(&self) -> Option<&dyn SubscribableChannel> {
        Some(self)
    }
}

impl SubscribableChannel for PublishSubscribeChannel {
    fn subscribe(
        &self,
        handler: Arc<dyn DynMessageHandler>,
    ) -> Result<SubscriptionId, MessagingError> {
        let id = SubscriptionId::next();
        self.subscribers.write().push((id, handler));
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|(current, _)| *current != id);
        subscribers.len() != before
    }

    fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}
