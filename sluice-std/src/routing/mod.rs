//! Routers and the routing endpoint.
//!
//! - [`TypeHierarchyRouter`] - Payload type, its interfaces and ancestors
//! - [`PayloadTypeNameRouter`] - Channel named after the payload type
//! - [`WildcardNameRouter`] - Header value against `*` patterns
//! - [`RecipientListRouter`] - Fixed list of channels
//! - [`HeaderValueRouter`] - Header value to channel
//! - [`MethodTargetRouter`] - A target operation names the channels
//!
//! [`RouterBuilder`] turns any of these into a handler that applies the
//! default channel, resolution-required and sequence policies.

mod builder;
mod pattern;
mod routers;

pub use builder::RouterBuilder;
pub use pattern::WildcardPattern;
pub use routers::{
    HeaderValueRouter, MethodTargetRouter, PayloadTypeNameRouter, RecipientListRouter,
    TypeHierarchyRouter, WildcardNameRouter,
};
