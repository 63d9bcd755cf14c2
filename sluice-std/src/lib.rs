//! # sluice-std
//!
//! Standard implementations for the Sluice messaging runtime.
//!
//! This crate provides:
//! - **Channels**: Direct, publish-subscribe, queue and null channels plus the
//!   interceptor adapters
//! - **Invocation**: [`processor::MethodInvoker`] and parameter converters
//! - **Handlers**: Service activator, transformer, filter and chain builders
//! - **Routing**: Type hierarchy, wildcard, recipient list, header value and
//!   custom routers
//! - **Scheduling**: Periodic and cron triggers, endpoint schedules
//! - **Standard interceptors**: Logging, time limit

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

// Re-export core contracts
pub use sluice_core;

// Modules
pub mod channel;
pub mod conversion;
pub mod handler;
pub mod hierarchy;
pub mod interceptors;
pub mod processor;
pub mod reference;
pub mod routing;
pub mod scheduling;
pub mod testing;
