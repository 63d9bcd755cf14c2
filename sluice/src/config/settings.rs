//! External settings.
//!
//! Settings are read from TOML:
//!
//! ```toml
//! [polling]
//! default_period_ms = 500
//! error_channel = "errors"
//!
//! [logging]
//! filter = "sluice=debug,info"
//! json = false
//!
//! [variables]
//! tenant = "acme"
//! ```
//!
//! Every key is optional.

use serde::Deserialize;
use sluice_core::ConfigurationError;
use std::{collections::BTreeMap, fs, path::Path, time::Duration};

/// Environment variable overriding [`LoggingSettings::filter`].
pub const LOG_FILTER_ENV: &str = "SLUICE_LOG";

/// Top-level settings of a messaging system.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SluiceSettings {
    /// Defaults for polling endpoints without their own metadata.
    pub polling: PollingSettings,
    /// Log output.
    pub logging: LoggingSettings,
    /// Free-form variables handed to modules.
    pub variables: BTreeMap<String, String>,
}

/// Defaults for polling endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PollingSettings {
    /// Period of the fixed-rate trigger, in milliseconds.
    pub default_period_ms: u64,
    /// Delay before the first poll, in milliseconds.
    pub default_initial_delay_ms: u64,
    /// How long one poll waits for a message, in milliseconds.
    pub default_receive_timeout_ms: u64,
    /// Channel receiving failures of polling endpoints without their own.
    pub error_channel: Option<String>,
}

impl PollingSettings {
    /// [`default_period_ms`](Self::default_period_ms) as a duration.
    pub fn default_period(&self) -> Duration {
        Duration::from_millis(self.default_period_ms)
    }

    /// [`default_initial_delay_ms`](Self::default_initial_delay_ms) as a
    /// duration.
    pub fn default_initial_delay(&self) -> Duration {
        Duration::from_millis(self.default_initial_delay_ms)
    }

    /// [`default_receive_timeout_ms`](Self::default_receive_timeout_ms) as a
    /// duration.
    pub fn default_receive_timeout(&self) -> Duration {
        Duration::from_millis(self.default_receive_timeout_ms)
    }
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            default_period_ms: 1000,
            default_initial_delay_ms: 0,
            default_receive_timeout_ms: 0,
            error_channel: None,
        }
    }
}

/// Log output settings, see [`init_tracing`](crate::logging::init_tracing).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSettings {
    /// An `EnvFilter` directive such as `info` or `sluice=debug`.
    pub filter: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}

impl SluiceSettings {
    /// Parse settings from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigurationError> {
        toml::from_str(content).map_err(|e| ConfigurationError::Settings(e.into()))
    }

    /// Read and parse a TOML settings file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let content =
            fs::read_to_string(path.as_ref()).map_err(|e| ConfigurationError::Settings(e.into()))?;
        Self::from_toml_str(&content)
    }

    /// Apply overrides from the environment.
    ///
    /// `SLUICE_LOG` replaces the log filter.
    pub fn merge_with_env(mut self) -> Self {
        if let Ok(filter) = std::env::var(LOG_FILTER_ENV) {
            self.logging.filter = filter;
        }
        self
    }

    /// The variable named `name`.
    pub fn variable(&self, name: &str) -> Option<&str> {
        self.variables.get(name).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_gives_defaults() {
        let settings = SluiceSettings::from_toml_str("").unwrap();
        assert_eq!(settings, SluiceSettings::default());
        assert_eq!(settings.polling.default_period(), Duration::from_secs(1));
        assert_eq!(settings.logging.filter, "info");
    }

    #[test]
    fn test_sections_are_read() {
        let settings = SluiceSettings::from_toml_str(
            r#"
            [polling]
            default_period_ms = 250
            error_channel = "errors"

            [logging]
            json = true

            [variables]
            tenant = "acme"
            "#,
        )
        .unwrap();

        assert_eq!(settings.polling.default_period(), Duration::from_millis(250));
        assert_eq!(settings.polling.default_initial_delay_ms, 0);
        assert_eq!(settings.polling.error_channel.as_deref(), Some("errors"));
        assert!(settings.logging.json);
        assert_eq!(settings.logging.filter, "info");
        assert_eq!(settings.variable("tenant"), Some("acme"));
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let result = SluiceSettings::from_toml_str("[polling]\nperiod = 5\n");
        assert!(matches!(result, Err(ConfigurationError::Settings(_))));
    }

    #[test]
    fn test_missing_file_is_a_settings_error() {
        let result = SluiceSettings::load("/definitely/not/here/sluice.toml");
        assert!(matches!(result, Err(ConfigurationError::Settings(_))));
    }
}
