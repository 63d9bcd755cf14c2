//! Assembly: from registered builders to a running messaging system.
//!
//! - [`MessagingSystemConfiguration`] - Collects builders, modules and
//!   settings, then assembles them
//! - [`ConfiguredMessagingSystem`] - The assembled runtime
//! - [`Module`] - Groups related registrations
//! - [`ConfigurationObserver`] - Hears about each component as it is built
//! - [`SluiceSettings`] - TOML-backed polling, logging and variable settings

mod configuration;
mod module;
mod observer;
mod settings;
mod system;

pub use configuration::MessagingSystemConfiguration;
pub use module::{Module, ModuleContext};
pub use observer::{ConfigurationObserver, NullObserver};
pub use settings::{LOG_FILTER_ENV, LoggingSettings, PollingSettings, SluiceSettings};
pub use system::ConfiguredMessagingSystem;
