use sluice_core::{BoxFuture, Message, MessageChannel, MessagingError};

/// Name under which the assembler registers a [`NullChannel`].
pub const NULL_CHANNEL_NAME: &str = "nullChannel";

/// Accepts and discards every message.
pub struct NullChannel {
    name: String,
}

impl NullChannel {
    /// Create a discarding channel.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for NullChannel {
    fn default() -> Self {
        Self::new(NULL_CHANNEL_NAME)
    }
}

impl MessageChannel for NullChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&self, message: Message) -> BoxFuture<'_, Result<(), MessagingError>> {
        tracing::trace!(channel = %self.name, message_id = %message.id(), "discarded");
        Box::pin(futures::future::ready(Ok(())))
    }
}
