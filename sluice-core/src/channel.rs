//! Channel contracts.
//!
//! Every channel is a [`MessageChannel`]. Event-driven channels additionally
//! implement [`SubscribableChannel`] and push messages into their subscribers
//! on send; pollable channels implement [`PollableChannel`] and buffer
//! messages until a consumer receives them.

use crate::{error::MessagingError, handler::DynMessageHandler, message::Message};
use futures::future::BoxFuture;
use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

/// A named conduit for messages.
///
/// This trait is object safe; channels are shared as
/// `Arc<dyn MessageChannel>` across handlers, gateways and the resolver.
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not a message channel",
    label = "missing `MessageChannel` implementation",
    note = "Channels must implement `send` and expose their name."
)]
pub trait MessageChannel: Send + Sync + 'static {
    /// The channel name.
    fn name(&self) -> &str;

    /// Send a message into the channel.
    ///
    /// Event-driven channels complete only after every subscriber has handled
    /// the message.
    fn send(&self, message: Message) -> BoxFuture<'_, Result<(), MessagingError>>;

    /// This channel as a pollable channel, if it is one.
    fn as_pollable(&self) -> Option<&dyn PollableChannel> {
        None
    }

    /// This channel as a subscribable channel, if it is one.
    fn as_subscribable(&self) -> Option<&dyn SubscribableChannel> {
        None
    }
}

/// A channel that buffers messages until polled.
pub trait PollableChannel: MessageChannel {
    /// Take the next message without waiting.
    fn receive(&self) -> Option<Message>;

    /// Take the next message, waiting at most `timeout` for one to arrive.
    fn receive_with_timeout(&self, timeout: Duration) -> BoxFuture<'_, Option<Message>>;
}

/// Identifies one subscription on a [`SubscribableChannel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Allocate a process-wide unique id.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// A channel that pushes messages into subscribed handlers.
pub trait SubscribableChannel: MessageChannel {
    /// Attach a handler.
    fn subscribe(
        &self,
        handler: Arc<dyn DynMessageHandler>,
    ) -> Result<SubscriptionId, MessagingError>;

    /// Detach a handler; returns whether it was subscribed.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;

    /// Number of current subscribers.
    fn subscriber_count(&self) -> usize;
}

/// Resolves channels by name.
pub trait ChannelResolver: Send + Sync {
    /// The channel registered under `name`.
    fn resolve(&self, name: &str) -> Result<Arc<dyn MessageChannel>, MessagingError>;

    /// Whether a channel is registered under `name`.
    fn has(&self, name: &str) -> bool;

    /// Registered channel names in sorted order.
    fn channel_names(&self) -> Vec<String>;
}
