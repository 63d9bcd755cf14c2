//! Message handlers.
//!
//! A handler is the terminal consumer of a message on a channel: service
//! activators, transformers, filters and routers all become
//! [`MessageHandler`]s once built.

use crate::{error::MessagingError, message::Message};
use futures::future::BoxFuture;
use std::{future::Future, sync::Arc};

/// Consumes messages delivered by a channel.
///
/// # Static vs Dynamic Dispatch
///
/// This trait uses native `async fn` for zero-cost static dispatch.
/// Channels store handlers as [`DynMessageHandler`] trait objects.
#[diagnostic::on_unimplemented(
    message = "`{Self}` does not implement `MessageHandler`",
    label = "missing `MessageHandler` implementation",
    note = "Handlers must implement `handle` taking an owned `Message`."
)]
pub trait MessageHandler: Send + Sync + 'static {
    /// Handle one message.
    fn handle(&self, message: Message) -> impl Future<Output = Result<(), MessagingError>> + Send;
}

/// Dynamic object-safe version of [`MessageHandler`].
pub trait DynMessageHandler: Send + Sync + 'static {
    /// Handle one message (dynamic dispatch version).
    fn handle_dyn(&self, message: Message) -> BoxFuture<'_, Result<(), MessagingError>>;
}

// Blanket implementation: Any type implementing MessageHandler implements DynMessageHandler automatically.
impl<T: MessageHandler> DynMessageHandler for T {
    fn handle_dyn(&self, message: Message) -> BoxFuture<'_, Result<(), MessagingError>> {
        Box::pin(self.handle(message))
    }
}

// Allow Arc<dyn DynMessageHandler> to be used where MessageHandler is expected.
impl MessageHandler for Arc<dyn DynMessageHandler> {
    async fn handle(&self, message: Message) -> Result<(), MessagingError> {
        (**self).handle_dyn(message).await
    }
}

/// A handler backed by an async closure.
///
/// # Example
///
/// ```rust,ignore
/// let handler = FnHandler::new(|message: Message| async move {
///     println!("{}", message.id());
///     Ok(())
/// });
/// ```
pub struct FnHandler<F> {
    f: F,
}

impl<F> FnHandler<F> {
    /// Wrap a closure.
    pub const fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F, Fut> MessageHandler for FnHandler<F>
where
    F: Fn(Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), MessagingError>> + Send,
{
    async fn handle(&self, message: Message) -> Result<(), MessagingError> {
        (self.f)(message).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageBuilder;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_fn_handler_through_dyn() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let handler: Arc<dyn DynMessageHandler> = Arc::new(FnHandler::new(move |_m: Message| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }));

        handler
            .handle(MessageBuilder::with_payload(1_i64).build())
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
