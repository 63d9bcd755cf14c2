//! # Destination resolution (Router)
//!
//! A [`Router`] decides which channels a message goes to. It only names the
//! destinations; the routing endpoint owns the policy for an empty result,
//! the default channel and sequence headers, and does the sending.
//!
//! Routers take the message by reference so one message can be inspected by
//! several resolvers without cloning.

use crate::{error::MessagingError, message::Message};
use futures::future::BoxFuture;
use std::future::Future;

/// Resolves the names of the channels a message should be sent to.
///
/// Implementations return each name at most once, in a stable order.
#[diagnostic::on_unimplemented(
    message = "`{Self}` cannot resolve message destinations",
    label = "missing `Router` implementation",
    note = "Implement `Router` to map a message to channel names."
)]
pub trait Router: Send + Sync + 'static {
    /// Channel names for `message`; empty when nothing matches.
    fn resolve_destinations(
        &self,
        message: &Message,
    ) -> impl Future<Output = Result<Vec<String>, MessagingError>> + Send;
}

/// Dynamic object-safe version of [`Router`].
pub trait DynRouter: Send + Sync + 'static {
    /// Channel names for `message` (dynamic dispatch version).
    fn resolve_destinations_dyn<'a>(
        &'a self,
        message: &'a Message,
    ) -> BoxFuture<'a, Result<Vec<String>, MessagingError>>;
}

impl<T: Router> DynRouter for T {
    fn resolve_destinations_dyn<'a>(
        &'a self,
        message: &'a Message,
    ) -> BoxFuture<'a, Result<Vec<String>, MessagingError>> {
        Box::pin(self.resolve_destinations(message))
    }
}
