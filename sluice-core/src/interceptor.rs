//! Channel interceptors.
//!
//! A [`ChannelInterceptor`] observes or alters messages at the boundaries of
//! a channel operation. Send-side callbacks run around `send`; receive-side
//! callbacks run around polling. All callbacks have pass-through defaults, so
//! an interceptor only overrides what it needs.

use crate::{error::MessagingError, message::Message};

/// Cross-cutting wrapper around channel send and receive.
pub trait ChannelInterceptor: Send + Sync + 'static {
    /// Called before a message is sent. Returning `Ok(None)` stops the send
    /// without error; returning a different message replaces it.
    fn pre_send(&self, message: Message, _channel: &str) -> Result<Option<Message>, MessagingError> {
        Ok(Some(message))
    }

    /// Called after the channel accepted a message.
    fn post_send(&self, _message: &Message, _channel: &str) {}

    /// Called after the send finished, successfully or not, for every
    /// interceptor whose `pre_send` ran, in reverse order.
    fn after_send_completion(
        &self,
        _message: &Message,
        _channel: &str,
        _error: Option<&MessagingError>,
    ) {
    }

    /// Called before polling. Returning `false` skips the poll.
    fn pre_receive(&self, _channel: &str) -> bool {
        true
    }

    /// Called with a received message. Returning `None` drops it.
    fn post_receive(&self, message: Message, _channel: &str) -> Option<Message> {
        Some(message)
    }

    /// Called after a poll finished for every interceptor whose
    /// `pre_receive` ran, in reverse order.
    fn after_receive_completion(&self, _message: Option<&Message>, _channel: &str) {}
}
