//! Calling user operations for messages.
//!
//! - [`ParameterConverterBuilder`] - Where each parameter takes its value from
//! - [`MethodInvoker`] - Argument resolution, conversion and the
//!   around-interceptor chain

mod invoker;
mod parameter;

pub use invoker::MethodInvoker;
pub use parameter::{ParameterConverter, ParameterConverterBuilder};
