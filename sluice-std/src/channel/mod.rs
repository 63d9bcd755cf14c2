//! Standard in-memory channels.
//!
//! - [`DirectChannel`] - Point-to-point, event-driven
//! - [`PublishSubscribeChannel`] - Broadcasting, event-driven
//! - [`QueueChannel`] - FIFO, pollable
//! - [`NullChannel`] - Discards everything
//!
//! Interceptors are attached through [`EventDrivenChannelInterceptorAdapter`]
//! and [`PollableChannelInterceptorAdapter`].

mod builder;
mod direct;
mod intercepted;
mod null;
mod publish_subscribe;
mod queue;
mod resolver;

pub use builder::{ChannelKind, SimpleChannelInterceptorBuilder, SimpleMessageChannelBuilder};
pub use direct::DirectChannel;
pub use intercepted::{EventDrivenChannelInterceptorAdapter, PollableChannelInterceptorAdapter};
pub use null::{NULL_CHANNEL_NAME, NullChannel};
pub use publish_subscribe::PublishSubscribeChannel;
pub use queue::QueueChannel;
pub use resolver::InMemoryChannelResolver;
