//! Logging interceptors for message flow observation.

use sluice_core::{
    AroundInterceptor, ChannelInterceptor, Message, MessagingError, MethodInvocation, Payload,
};
use std::time::Instant;
use tracing::Instrument;

/// A channel interceptor that logs messages passing through a channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingChannelInterceptor;

impl ChannelInterceptor for LoggingChannelInterceptor {
    fn pre_send(&self, message: Message, channel: &str) -> Result<Option<Message>, MessagingError> {
        tracing::info!(
            channel,
            message_id = %message.id(),
            payload_type = %message.payload().type_descriptor(),
            "sending message"
        );
        Ok(Some(message))
    }

    fn after_send_completion(&self, message: &Message, channel: &str, error: Option<&MessagingError>) {
        if let Some(error) = error {
            tracing::warn!(channel, message_id = %message.id(), %error, "send failed");
        }
    }

    fn post_receive(&self, message: Message, channel: &str) -> Option<Message> {
        tracing::info!(channel, message_id = %message.id(), "received message");
        Some(message)
    }
}

/// An around-interceptor that runs the rest of the chain inside a `tracing`
/// span and logs the outcome.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingAroundInterceptor;

impl AroundInterceptor for LoggingAroundInterceptor {
    async fn around(&self, invocation: MethodInvocation) -> Result<Option<Payload>, MessagingError> {
        let span = tracing::info_span!(
            "invoke",
            target_method = %invocation.interface(),
            message_id = %invocation.message().id(),
        );
        async move {
            let started = Instant::now();
            let result = invocation.proceed().await;
            match &result {
                Ok(_) => tracing::debug!(elapsed_ms = started.elapsed().as_millis() as u64, "invocation finished"),
                Err(error) => tracing::warn!(%error, "invocation failed"),
            }
            result
        }
        .instrument(span)
        .await
    }
}
