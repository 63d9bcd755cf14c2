use crate::config::PollingSettings;
use sluice_core::{ConfigurationError, Trigger};
use sluice_std::scheduling::{CronTrigger, PeriodicTrigger};
use std::{sync::Arc, time::Duration};

/// When a polling endpoint fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerDefinition {
    /// A fixed period measured from the end of each cycle.
    FixedRate {
        /// Time between the end of one cycle and the start of the next.
        period: Duration,
        /// Delay before the first cycle.
        initial_delay: Duration,
    },
    /// A five-field cron expression, evaluated in UTC.
    Cron(String),
}

impl TriggerDefinition {
    /// Turn the definition into a trigger.
    pub fn build(&self) -> Result<Arc<dyn Trigger>, ConfigurationError> {
        Ok(match self {
            Self::FixedRate {
                period,
                initial_delay,
            } => Arc::new(PeriodicTrigger::new(*period, *initial_delay)?),
            Self::Cron(expression) => Arc::new(CronTrigger::new(expression)?),
        })
    }
}

/// Per-endpoint polling options.
///
/// Anything left unset falls back to [`PollingSettings`].
///
/// # Example
///
/// ```rust,ignore
/// configuration.register_polling_metadata(
///     PollingMetadata::new("invoices")
///         .with_cron("0 2 * * *")
///         .with_error_channel("invoiceErrors"),
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollingMetadata {
    endpoint_id: String,
    trigger: Option<TriggerDefinition>,
    handled_message_limit: Option<usize>,
    execution_time_limit: Option<Duration>,
    error_channel_name: Option<String>,
    auto_startup: bool,
    receive_timeout: Option<Duration>,
}

impl PollingMetadata {
    /// Options for the endpoint `endpoint_id`.
    pub fn new(endpoint_id: impl Into<String>) -> Self {
        Self {
            endpoint_id: endpoint_id.into(),
            trigger: None,
            handled_message_limit: None,
            execution_time_limit: None,
            error_channel_name: None,
            auto_startup: false,
            receive_timeout: None,
        }
    }

    /// Fire `period` after each cycle ends, the first time after
    /// `initial_delay`.
    pub fn with_fixed_rate(mut self, period: Duration, initial_delay: Duration) -> Self {
        self.trigger = Some(TriggerDefinition::FixedRate {
            period,
            initial_delay,
        });
        self
    }

    /// Fire on a cron schedule.
    pub fn with_cron(mut self, expression: impl Into<String>) -> Self {
        self.trigger = Some(TriggerDefinition::Cron(expression.into()));
        self
    }

    /// Stop after handling `limit` messages.
    pub fn with_handled_message_limit(mut self, limit: usize) -> Self {
        self.handled_message_limit = Some(limit);
        self
    }

    /// Stop once `limit` has elapsed since the endpoint started.
    pub fn with_execution_time_limit(mut self, limit: Duration) -> Self {
        self.execution_time_limit = Some(limit);
        self
    }

    /// Publish failures to the named channel.
    pub fn with_error_channel(mut self, channel: impl Into<String>) -> Self {
        self.error_channel_name = Some(channel.into());
        self
    }

    /// Start polling as soon as the system is built.
    pub fn with_auto_startup(mut self, auto_startup: bool) -> Self {
        self.auto_startup = auto_startup;
        self
    }

    /// Wait up to `timeout` for a message on each poll.
    pub fn with_receive_timeout(mut self, timeout: Duration) -> Self {
        self.receive_timeout = Some(timeout);
        self
    }

    /// The endpoint these options belong to.
    pub fn endpoint_id(&self) -> &str {
        &self.endpoint_id
    }

    /// The explicit trigger, if any.
    pub fn trigger(&self) -> Option<&TriggerDefinition> {
        self.trigger.as_ref()
    }

    /// Handled-message limit.
    pub fn handled_message_limit(&self) -> Option<usize> {
        self.handled_message_limit
    }

    /// Execution-time limit.
    pub fn execution_time_limit(&self) -> Option<Duration> {
        self.execution_time_limit
    }

    /// Error channel name.
    pub fn error_channel_name(&self) -> Option<&str> {
        self.error_channel_name.as_deref()
    }

    /// Whether polling starts with the system.
    pub fn auto_startup(&self) -> bool {
        self.auto_startup
    }

    /// Whether a stop condition other than "queue drained" is set.
    pub fn has_limits(&self) -> bool {
        self.handled_message_limit.is_some() || self.execution_time_limit.is_some()
    }

    /// Fill unset options from `defaults`.
    pub(crate) fn resolve(&self, defaults: &PollingSettings) -> ResolvedPolling {
        ResolvedPolling {
            trigger: self.trigger.clone().unwrap_or(TriggerDefinition::FixedRate {
                period: defaults.default_period(),
                initial_delay: defaults.default_initial_delay(),
            }),
            error_channel_name: self
                .error_channel_name
                .clone()
                .or_else(|| defaults.error_channel.clone()),
            receive_timeout: self
                .receive_timeout
                .unwrap_or_else(|| defaults.default_receive_timeout()),
        }
    }
}

/// Polling options with defaults applied.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedPolling {
    pub(crate) trigger: TriggerDefinition,
    pub(crate) error_channel_name: Option<String>,
    pub(crate) receive_timeout: Duration,
}
