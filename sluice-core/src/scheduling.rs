//! Scheduling contracts.
//!
//! A [`Trigger`] is a pure function of a [`Clock`] reading and a
//! [`TriggerContext`] snapshot. Triggers hold no mutable state; the endpoint
//! that owns a schedule records what happened and hands the snapshot back in.

use chrono::{DateTime, Utc};
use std::fmt::Debug;

/// Supplies the current instant.
pub trait Clock: Send + Sync {
    /// The current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Immutable snapshot of an endpoint's scheduling history.
///
/// A completion is only meaningful when it is not earlier than the last
/// scheduled execution; otherwise the last cycle is still outstanding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TriggerContext {
    last_scheduled_execution_time: Option<DateTime<Utc>>,
    last_completion_time: Option<DateTime<Utc>>,
}

impl TriggerContext {
    /// A context for an endpoint that never ran.
    pub const fn new() -> Self {
        Self {
            last_scheduled_execution_time: None,
            last_completion_time: None,
        }
    }

    /// Record the instant the last cycle was scheduled for.
    pub fn with_last_scheduled_execution_time(mut self, instant: DateTime<Utc>) -> Self {
        self.last_scheduled_execution_time = Some(instant);
        self
    }

    /// Record the instant the last cycle completed.
    pub fn with_last_completion_time(mut self, instant: DateTime<Utc>) -> Self {
        self.last_completion_time = Some(instant);
        self
    }

    /// When the last cycle was scheduled for.
    pub fn last_scheduled_execution_time(&self) -> Option<DateTime<Utc>> {
        self.last_scheduled_execution_time
    }

    /// When the last cycle completed.
    pub fn last_completion_time(&self) -> Option<DateTime<Utc>> {
        self.last_completion_time
    }

    /// The still outstanding scheduled instant, if the last scheduled cycle
    /// has not been confirmed complete.
    ///
    /// Every trigger returns this instant unchanged when present, so a slow
    /// cycle is never overlapped by the next one.
    pub fn pending_execution(&self) -> Option<DateTime<Utc>> {
        let scheduled = self.last_scheduled_execution_time?;
        match self.last_completion_time {
            Some(completed) if completed >= scheduled => None,
            _ => Some(scheduled),
        }
    }
}

/// Computes the next execution instant of a scheduled endpoint.
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not a trigger",
    label = "missing `Trigger` implementation",
    note = "Triggers compute `next_execution_time` from a clock and a `TriggerContext`."
)]
pub trait Trigger: Send + Sync + Debug {
    /// The next instant the endpoint should run.
    fn next_execution_time(&self, clock: &dyn Clock, context: &TriggerContext) -> DateTime<Utc>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2017, 1, 1, hour, minute, 0).unwrap()
    }

    #[test]
    fn test_never_ran_has_no_pending_execution() {
        assert_eq!(TriggerContext::new().pending_execution(), None);
    }

    #[test]
    fn test_scheduled_without_completion_is_pending() {
        let context = TriggerContext::new().with_last_scheduled_execution_time(at(23, 0));
        assert_eq!(context.pending_execution(), Some(at(23, 0)));
    }

    #[test]
    fn test_completion_before_schedule_is_pending() {
        let context = TriggerContext::new()
            .with_last_scheduled_execution_time(at(23, 5))
            .with_last_completion_time(at(23, 0));
        assert_eq!(context.pending_execution(), Some(at(23, 5)));
    }

    #[test]
    fn test_completion_after_schedule_is_done() {
        let context = TriggerContext::new()
            .with_last_scheduled_execution_time(at(23, 5))
            .with_last_completion_time(at(23, 5));
        assert_eq!(context.pending_execution(), None);
    }
}
