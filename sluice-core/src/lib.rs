//! # sluice-core
//!
//! Core contracts for the Sluice messaging runtime.
//!
//! This crate has minimal dependencies and is designed to be imported by
//! channel, converter and handler implementations that don't need the full
//! `sluice-std` implementation.
//!
//! # Building Blocks
//!
//! ## Messages ([`Message`])
//!
//! Immutable headers plus a type-erased [`Payload`]. Every message carries an
//! id and a timestamp; derived messages are produced with a
//! [`MessageBuilder`].
//!
//! ## Channels ([`MessageChannel`])
//!
//! Named conduits. Event-driven channels ([`SubscribableChannel`]) push
//! messages into subscribed handlers while the sender waits; pollable
//! channels ([`PollableChannel`]) buffer them for a polling consumer.
//! [`ChannelInterceptor`]s wrap the send and receive sides.
//!
//! ## Handlers ([`MessageHandler`])
//!
//! Terminal consumers of a channel. Handlers that call user code do so
//! through a [`MethodInvocation`] threaded through ordered
//! [`AroundInterceptor`]s.
//!
//! ## Routing ([`Router`])
//!
//! Resolves the channel names a message should go to; the routing endpoint
//! applies the default-channel and resolution-required policy.
//!
//! ## Builders ([`MessageHandlerBuilder`], [`MessageChannelBuilder`], ...)
//!
//! Blueprints registered during assembly. Each one produces exactly one
//! runtime component once the [`ReferenceSearchService`] and
//! [`ChannelResolver`] are available.
//!
//! ## Scheduling ([`Trigger`])
//!
//! Pure functions from a [`Clock`] reading and a [`TriggerContext`] to the
//! next execution instant of a polling endpoint.
//!
//! # Error Types
//!
//! - [`MessagingError`] - Top-level runtime error
//! - [`AssemblyError`] - Fatal assembly errors
//! - [`RoutingError`], [`ConversionError`], [`InvocationError`],
//!   [`DispatchError`] - Per-message errors
//! - [`ConfigurationError`] - Malformed triggers, patterns and settings

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

mod builder;
mod channel;
mod conversion;
mod error;
mod handler;
mod interceptor;
mod invocation;
mod message;
mod payload;
mod reference;
mod router;
mod scheduling;
mod types;

// Re-exports
pub use builder::{ChannelInterceptorBuilder, MessageChannelBuilder, MessageHandlerBuilder};
pub use channel::{
    ChannelResolver, MessageChannel, PollableChannel, SubscribableChannel, SubscriptionId,
};
pub use conversion::{CONVERSION_SERVICE_REFERENCE, ConversionService, Converter};
pub use error::{
    AssemblyError, BoxError, ConfigurationError, ConversionError, DispatchError, InvocationError,
    MessagingError, RoutingError,
};
pub use handler::{DynMessageHandler, FnHandler, MessageHandler};
pub use interceptor::ChannelInterceptor;
pub use invocation::{
    AroundFn, AroundInterceptor, DynAroundInterceptor, InterfaceParameter, InterfaceToCall,
    MethodInvocation, MethodTarget, TargetResult,
};
pub use message::{ErrorPayload, Message, MessageBuilder, MessageHeaders};
pub use payload::Payload;
pub use reference::{Reference, ReferenceSearchService, ReferenceSearchServiceExt};
pub use router::{DynRouter, Router};
pub use scheduling::{Clock, Trigger, TriggerContext};
pub use types::{MediaType, TypeDescriptor, TypeHierarchy};

/// Boxed future returned by object-safe async methods.
pub use futures::future::BoxFuture;
