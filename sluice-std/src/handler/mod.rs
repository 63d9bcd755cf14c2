//! Handlers that call target operations.
//!
//! - [`ServiceActivatorBuilder`] - Calls a target and forwards its result
//! - [`TransformerBuilder`] - Replaces the payload with the target's result
//! - [`MessageFilterBuilder`] - Passes or discards messages on a boolean
//! - [`ChainMessageHandlerBuilder`] - Runs handlers in sequence
//!
//! Results go to the output channel when one is set, otherwise to the
//! request's reply channel; without either they are dropped unless a reply
//! is required.

mod chain;
mod definition;
mod filter;
mod service_activator;
mod transformer;

pub use chain::ChainMessageHandlerBuilder;
pub(crate) use definition::TargetSource;
pub use filter::MessageFilterBuilder;
pub use service_activator::ServiceActivatorBuilder;
pub use transformer::TransformerBuilder;
