//! Gateways: calling into the messaging system like calling a method.
//!
//! A [`Gateway`] is an explicit dispatch table from method names to request
//! channels. Arguments become a request message through
//! [`GatewayParameterConverter`]s; the reply payload, if the method returns
//! one, becomes the result.
//!
//! - [`GatewayProxyBuilder`] - One method
//! - [`CombinedGatewayBuilder`] - Several methods under one reference name

mod builder;
mod dispatch;
mod parameter;

pub use builder::{CombinedGatewayBuilder, GatewayBuilder, GatewayProxyBuilder};
pub use dispatch::Gateway;
pub use parameter::GatewayParameterConverter;
