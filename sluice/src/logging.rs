//! Log output bootstrap.
//!
//! Sluice itself only emits `tracing` events; an application that has no
//! subscriber of its own can install one here.

use crate::config::LoggingSettings;
use sluice_core::ConfigurationError;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install a global `fmt` subscriber filtered by `RUST_LOG`, or by
/// [`LoggingSettings::filter`] when `RUST_LOG` is unset.
///
/// Fails if the filter does not parse or a global subscriber is already
/// installed.
///
/// # Example
///
/// ```rust,ignore
/// let settings = SluiceSettings::load("sluice.toml")?.merge_with_env();
/// sluice::logging::init_tracing(&settings.logging)?;
/// ```
pub fn init_tracing(settings: &LoggingSettings) -> Result<(), ConfigurationError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&settings.filter)
            .map_err(|e| ConfigurationError::Settings(e.into()))?,
    };

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if settings.json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer()).try_init()
    };
    installed.map_err(|e| ConfigurationError::Settings(e.into()))
}
