//! Channel interceptor adapters.
//!
//! The assembler wraps every channel that has interceptors in one of these
//! adapters; resolving the channel by name returns the adapter. Interceptors
//! are applied in the order given, which the assembler sorts by descending
//! importance.

use sluice_core::{
    BoxFuture, ChannelInterceptor, DispatchError, DynMessageHandler, Message, MessageChannel,
    MessagingError, PollableChannel, SubscribableChannel, SubscriptionId,
};
use std::{sync::Arc, time::Duration};

async fn send_through(
    channel: &dyn MessageChannel,
    interceptors: &[Arc<dyn ChannelInterceptor>],
    message: Message,
) -> Result<(), MessagingError> {
    let name = channel.name();
    let mut current = message;
    let mut applied = 0;

    for interceptor in interceptors {
        match interceptor.pre_send(current.clone(), name) {
            Ok(Some(next)) => {
                current = next;
                applied += 1;
            }
            Ok(None) => {
                tracing::debug!(channel = %name, message_id = %current.id(), "send stopped by interceptor");
                complete_send(&interceptors[..applied], &current, name, None);
                return Ok(());
            }
            Err(err) => {
                complete_send(&interceptors[..applied], &current, name, Some(&err));
                return Err(err);
            }
        }
    }

    let result = channel.send(current.clone()).await;
    if result.is_ok() {
        for interceptor in interceptors {
            interceptor.post_send(&current, name);
        }
    }
    complete_send(interceptors, &current, name, result.as_ref().err());
    result
}

fn complete_send(
    applied: &[Arc<dyn ChannelInterceptor>],
    message: &Message,
    channel: &str,
    error: Option<&MessagingError>,
) {
    for interceptor in applied.iter().rev() {
        interceptor.after_send_completion(message, channel, error);
    }
}

/// Wraps `send` of an event-driven channel.
pub struct EventDrivenChannelInterceptorAdapter {
    inner: Arc<dyn MessageChannel>,
    interceptors: Vec<Arc<dyn ChannelInterceptor>>,
}

impl EventDrivenChannelInterceptorAdapter {
    /// Wrap `inner` with interceptors applied in the given order.
    pub fn new(inner: Arc<dyn MessageChannel>, interceptors: Vec<Arc<dyn ChannelInterceptor>>) -> Self {
        Self {
            inner,
            interceptors,
        }
    }
}

impl MessageChannel for EventDrivenChannelInterceptorAdapter {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn send(&self, message: Message) -> BoxFuture<'_, Result<(), MessagingError>> {
        Box::pin(send_through(self.inner.as_ref(), &self.interceptors, message))
    }

    fn as_subscribable(&self) -> Option<&dyn SubscribableChannel> {
        self.inner.as_subscribable().map(|_| self as &dyn SubscribableChannel)
    }
}

impl SubscribableChannel for EventDrivenChannelInterceptorAdapter {
    fn subscribe(
        &self,
        handler: Arc<dyn DynMessageHandler>,
    ) -> Result<SubscriptionId, MessagingError> {
        self.inner
            .as_subscribable()
            .ok_or_else(|| DispatchError::NotSubscribable(self.name().to_string()))?
            .subscribe(handler)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner
            .as_subscribable()
            .is_some_and(|channel| channel.unsubscribe(id))
    }

    fn subscriber_count(&self) -> usize {
        self.inner
            .as_subscribable()
            .map_or(0, |channel| channel.subscriber_count())
    }
}

/// Wraps receive (and send) of a pollable channel.
pub struct PollableChannelInterceptorAdapter {
    inner: Arc<dyn MessageChannel>,
    interceptors: Vec<Arc<dyn ChannelInterceptor>>,
}

impl PollableChannelInterceptorAdapter {
    /// Wrap `inner`, which must be pollable.
    pub fn new(
        inner: Arc<dyn MessageChannel>,
        interceptors: Vec<Arc<dyn ChannelInterceptor>>,
    ) -> Result<Self, MessagingError> {
        if inner.as_pollable().is_none() {
            return Err(DispatchError::NotPollable(inner.name().to_string()).into());
        }
        Ok(Self {
            inner,
            interceptors,
        })
    }

    /// Run `pre_receive` on every interceptor; returns how many ran and
    /// whether the poll may go ahead.
    fn before_receive(&self) -> (usize, bool) {
        let name = self.inner.name();
        for (index, interceptor) in self.interceptors.iter().enumerate() {
            if !interceptor.pre_receive(name) {
                return (index, false);
            }
        }
        (self.interceptors.len(), true)
    }

    fn after_receive(&self, applied: usize, message: Option<Message>) -> Option<Message> {
        let name = self.inner.name();
        let message = message.and_then(|received| {
            self.interceptors
                .iter()
                .try_fold(received, |current, interceptor| interceptor.post_receive(current, name))
        });
        for interceptor in self.interceptors[..applied].iter().rev() {
            interceptor.after_receive_completion(message.as_ref(), name);
        }
        message
    }
}

impl MessageChannel for PollableChannelInterceptorAdapter {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn send(&self, message: Message) -> BoxFuture<'_, Result<(), MessagingError>> {
        Box::pin(send_through(self.inner.as_ref(), &self.interceptors, message))
    }

    fn as_pollable(&self) -> Option<&dyn PollableChannel> {
        Some(self)
    }
}

impl PollableChannel for PollableChannelInterceptorAdapter {
    fn receive(&self) -> Option<Message> {
        let (applied, proceed) = self.before_receive();
        let message = if proceed {
            self.inner.as_pollable().and_then(|pollable| pollable.receive())
        } else {
            None
        };
        self.after_receive(applied, message)
    }

    fn receive_with_timeout(&self, timeout: Duration) -> BoxFuture<'_, Option<Message>> {
        Box::pin(async move {
            let (applied, proceed) = self.before_receive();
            let message = match self.inner.as_pollable() {
                Some(pollable) if proceed => pollable.receive_with_timeout(timeout).await,
                _ => None,
            };
            self.after_receive(applied, message)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        channel::{DirectChannel, QueueChannel},
        testing::{RecordingChannelInterceptor, RecordingHandler},
    };
    use sluice_core::MessageBuilder;

    struct Blocking;

    impl ChannelInterceptor for Blocking {
        fn pre_send(&self, _message: Message, _channel: &str) -> Result<Option<Message>, MessagingError> {
            Ok(None)
        }
    }

    struct Stamping;

    impl ChannelInterceptor for Stamping {
        fn pre_send(&self, message: Message, _channel: &str) -> Result<Option<Message>, MessagingError> {
            Ok(Some(
                MessageBuilder::from_message(&message)
                    .set_header("stamped", true)
                    .build(),
            ))
        }
    }

    #[tokio::test]
    async fn test_event_driven_interceptors_run_in_order() {
        let first = RecordingChannelInterceptor::new("first");
        let second = RecordingChannelInterceptor::new("second");
        let log = first.shared_log();
        let second = second.with_log(log.clone());

        let inner: Arc<dyn MessageChannel> = Arc::new(DirectChannel::new("orders"));
        let adapter = EventDrivenChannelInterceptorAdapter::new(
            inner,
            vec![Arc::new(first), Arc::new(second)],
        );
        let recorder = RecordingHandler::new();
        adapter.subscribe(Arc::new(recorder.clone())).unwrap();

        adapter
            .send(MessageBuilder::with_payload(1_i64).build())
            .await
            .unwrap();

        assert_eq!(recorder.count(), 1);
        assert_eq!(
            *log.lock(),
            vec![
                "first:pre_send",
                "second:pre_send",
                "first:post_send",
                "second:post_send",
                "second:after_send_completion",
                "first:after_send_completion",
            ]
        );
    }

    #[tokio::test]
    async fn test_pre_send_can_stop_and_replace() {
        let inner: Arc<dyn MessageChannel> = Arc::new(DirectChannel::new("orders"));
        let recorder = RecordingHandler::new();
        inner
            .as_subscribable()
            .unwrap()
            .subscribe(Arc::new(recorder.clone()))
            .unwrap();

        let stamping = EventDrivenChannelInterceptorAdapter::new(inner.clone(), vec![Arc::new(Stamping)]);
        stamping
            .send(MessageBuilder::with_payload(1_i64).build())
            .await
            .unwrap();
        assert_eq!(
            recorder.messages()[0]
                .headers()
                .get("stamped")
                .and_then(|v| v.as_bool()),
            Some(true)
        );

        let blocking = EventDrivenChannelInterceptorAdapter::new(inner, vec![Arc::new(Blocking)]);
        blocking
            .send(MessageBuilder::with_payload(2_i64).build())
            .await
            .unwrap();
        assert_eq!(recorder.count(), 1);
    }

    #[tokio::test]
    async fn test_pollable_adapter_wraps_receive() {
        let interceptor = RecordingChannelInterceptor::new("audit");
        let log = interceptor.shared_log();
        let inner: Arc<dyn MessageChannel> = Arc::new(QueueChannel::new("jobs"));
        let adapter = PollableChannelInterceptorAdapter::new(inner, vec![Arc::new(interceptor)]).unwrap();

        adapter
            .send(MessageBuilder::with_payload(1_i64).build())
            .await
            .unwrap();
        log.lock().clear();

        assert!(adapter.receive().is_some());
        assert_eq!(
            *log.lock(),
            vec!["audit:pre_receive", "audit:post_receive", "audit:after_receive_completion"]
        );
    }

    #[test]
    fn test_pollable_adapter_rejects_event_driven_channel() {
        let inner: Arc<dyn MessageChannel> = Arc::new(DirectChannel::new("orders"));
        assert!(PollableChannelInterceptorAdapter::new(inner, vec![]).is_err());
    }
}
