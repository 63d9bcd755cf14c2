use chrono::{DateTime, TimeDelta, Utc};
use sluice_core::{Clock, ConfigurationError, Trigger, TriggerContext};
use std::time::Duration;

/// Fires at a fixed period measured from the previous completion.
///
/// The first fire is `now + initial_delay`; every later one is
/// `max(now, last completion) + period`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodicTrigger {
    period: TimeDelta,
    initial_delay: TimeDelta,
}

impl PeriodicTrigger {
    /// A trigger with the given period and initial delay.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::NotPositive`] for a zero period and
    /// [`ConfigurationError::OutOfRange`] for durations chrono cannot hold.
    pub fn new(period: Duration, initial_delay: Duration) -> Result<Self, ConfigurationError> {
        Self::from_millis(millis("period", period)?, millis("initial delay", initial_delay)?)
    }

    /// A trigger from millisecond values, as found in settings.
    pub fn from_millis(period_ms: i64, initial_delay_ms: i64) -> Result<Self, ConfigurationError> {
        if period_ms <= 0 {
            return Err(ConfigurationError::NotPositive {
                name: "period",
                value: period_ms,
            });
        }
        if initial_delay_ms < 0 {
            return Err(ConfigurationError::NotPositive {
                name: "initial delay",
                value: initial_delay_ms,
            });
        }
        Ok(Self {
            period: delta("period", period_ms)?,
            initial_delay: delta("initial delay", initial_delay_ms)?,
        })
    }

    /// The period between completion and the next fire.
    pub fn period(&self) -> TimeDelta {
        self.period
    }

    /// The delay before the first fire.
    pub fn initial_delay(&self) -> TimeDelta {
        self.initial_delay
    }
}

fn millis(name: &'static str, duration: Duration) -> Result<i64, ConfigurationError> {
    i64::try_from(duration.as_millis()).map_err(|_| ConfigurationError::OutOfRange {
        name,
        value: format!("{duration:?}"),
    })
}

fn delta(name: &'static str, ms: i64) -> Result<TimeDelta, ConfigurationError> {
    TimeDelta::try_milliseconds(ms).ok_or_else(|| ConfigurationError::OutOfRange {
        name,
        value: format!("{ms}ms"),
    })
}

impl Trigger for PeriodicTrigger {
    fn next_execution_time(&self, clock: &dyn Clock, context: &TriggerContext) -> DateTime<Utc> {
        if let Some(pending) = context.pending_execution() {
            return pending;
        }
        let now = clock.now();
        let next = match context.last_completion_time() {
            None => now.checked_add_signed(self.initial_delay),
            Some(completed) => now.max(completed).checked_add_signed(self.period),
        };
        // Past the representable range the trigger never fires again.
        next.unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}
