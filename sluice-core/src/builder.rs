//! Builder contracts.
//!
//! Builders are blueprints registered with the assembler. Each one names the
//! references it needs and produces exactly one runtime component once the
//! reference lookup and, for handlers, the channel resolver are available.

use crate::{
    channel::{ChannelResolver, MessageChannel},
    error::MessagingError,
    handler::DynMessageHandler,
    interceptor::ChannelInterceptor,
    invocation::DynAroundInterceptor,
    reference::ReferenceSearchService,
};
use std::sync::Arc;

/// Blueprint of a named channel.
pub trait MessageChannelBuilder: Send + Sync {
    /// The channel name.
    fn name(&self) -> &str;

    /// Whether the built channel is pollable rather than event-driven.
    fn is_pollable(&self) -> bool;

    /// A description that is equal for builders of the same channel.
    fn definition(&self) -> String;

    /// References the channel needs.
    fn required_reference_names(&self) -> Vec<String> {
        Vec::new()
    }

    /// Build the channel.
    fn build(
        &self,
        references: &dyn ReferenceSearchService,
    ) -> Result<Arc<dyn MessageChannel>, MessagingError>;
}

/// Blueprint of a channel interceptor.
pub trait ChannelInterceptorBuilder: Send + Sync {
    /// Name pattern of the channels this interceptor attaches to; `*`
    /// matches any sequence of characters.
    fn target_pattern(&self) -> &str;

    /// Interceptors with higher importance wrap first.
    fn importance(&self) -> i32;

    /// References the interceptor needs.
    fn required_reference_names(&self) -> Vec<String> {
        Vec::new()
    }

    /// A short description used in logs and introspection.
    fn describe(&self) -> String;

    /// Build the interceptor.
    fn build(
        &self,
        references: &dyn ReferenceSearchService,
    ) -> Result<Arc<dyn ChannelInterceptor>, MessagingError>;
}

/// Blueprint of a handler consuming one input channel.
pub trait MessageHandlerBuilder: Send + Sync {
    /// The channel the handler consumes.
    fn input_channel_name(&self) -> &str;

    /// The endpoint id, if one was declared.
    fn endpoint_id(&self) -> Option<&str>;

    /// Assign the endpoint id.
    fn set_endpoint_id(&mut self, endpoint_id: String);

    /// References the handler needs.
    fn required_reference_names(&self) -> Vec<String> {
        Vec::new()
    }

    /// Append an around-interceptor to the handler's invocation chain.
    fn add_around_interceptor(&mut self, interceptor: Arc<dyn DynAroundInterceptor>);

    /// A short description used in errors and logs.
    fn describe(&self) -> String;

    /// Build the handler.
    fn build(
        &self,
        channels: &Arc<dyn ChannelResolver>,
        references: &Arc<dyn ReferenceSearchService>,
    ) -> Result<Arc<dyn DynMessageHandler>, MessagingError>;
}
