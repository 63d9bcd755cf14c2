//! Consumers and the factories that build them.
//!
//! - [`EventDrivenConsumer`] - Subscribes to an event-driven channel
//! - [`PollingConsumer`] - Polls a pollable channel on a trigger
//! - [`EventDrivenConsumerBuilder`] / [`PollingConsumerBuilder`] - The
//!   default consumer factories, tried in that order
//! - [`InboundChannelAdapterBuilder`] - Publishes a target's results on a
//!   trigger
//! - [`PollingMetadata`] - Per-endpoint trigger, limits and error channel

mod consumer;
mod factory;
mod inbound;
mod metadata;
mod polling;

pub use consumer::{ConsumerLifecycle, EventDrivenConsumer};
pub use factory::{
    ConsumerContext, EventDrivenConsumerBuilder, MessageHandlerConsumerBuilder,
    PollingConsumerBuilder,
};
pub use inbound::InboundChannelAdapterBuilder;
pub use metadata::{PollingMetadata, TriggerDefinition};
pub use polling::PollingConsumer;
