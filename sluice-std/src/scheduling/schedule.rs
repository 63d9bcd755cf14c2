use chrono::{DateTime, Utc};
use sluice_core::{Clock, Trigger, TriggerContext};
use std::{sync::Arc, time::Duration};

/// Where a scheduled endpoint is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointState {
    /// Never scheduled.
    Idle,
    /// Waiting for the next fire instant.
    Scheduled,
    /// A cycle is executing.
    Running,
    /// The last cycle succeeded.
    Completed,
    /// The last cycle failed.
    Failed,
}

/// The scheduling history of one endpoint.
///
/// Cycles go `Idle -> Scheduled -> Running -> Completed | Failed ->
/// Scheduled ...`. The trigger itself is stateless; this type owns the
/// [`TriggerContext`] and replaces it after every transition.
pub struct EndpointSchedule {
    trigger: Arc<dyn Trigger>,
    clock: Arc<dyn Clock>,
    context: TriggerContext,
    state: EndpointState,
}

impl EndpointSchedule {
    /// A schedule that has not fired yet.
    pub fn new(trigger: Arc<dyn Trigger>, clock: Arc<dyn Clock>) -> Self {
        Self {
            trigger,
            clock,
            context: TriggerContext::new(),
            state: EndpointState::Idle,
        }
    }

    /// Current state.
    pub fn state(&self) -> EndpointState {
        self.state
    }

    /// Current history snapshot.
    pub fn context(&self) -> TriggerContext {
        self.context
    }

    /// Compute and record the next fire instant.
    pub fn schedule(&mut self) -> DateTime<Utc> {
        let next = self
            .trigger
            .next_execution_time(self.clock.as_ref(), &self.context);
        self.context = self.context.with_last_scheduled_execution_time(next);
        self.state = EndpointState::Scheduled;
        next
    }

    /// How long until `instant`, zero if it already passed.
    pub fn delay_until(&self, instant: DateTime<Utc>) -> Duration {
        (instant - self.clock.now()).to_std().unwrap_or(Duration::ZERO)
    }

    /// The cycle started.
    pub fn mark_running(&mut self) {
        self.state = EndpointState::Running;
    }

    /// The cycle succeeded.
    pub fn mark_completed(&mut self) {
        self.finish(EndpointState::Completed);
    }

    /// The cycle failed; the schedule continues.
    pub fn mark_failed(&mut self) {
        self.finish(EndpointState::Failed);
    }

    // Completion is never recorded before the instant the cycle was scheduled
    // for, so a cycle that ran early still counts as done.
    fn finish(&mut self, state: EndpointState) {
        let now = self.clock.now();
        let completed = match self.context.last_scheduled_execution_time() {
            Some(scheduled) if scheduled > now => scheduled,
            _ => now,
        };
        self.context = self.context.with_last_completion_time(completed);
        self.state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduling::{PeriodicTrigger, StubClock};
    use chrono::{TimeDelta, TimeZone};

    fn at(minute: u32, second: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2017, 1, 1, 12, minute, second).unwrap()
    }

    fn schedule(clock: &Arc<StubClock>) -> EndpointSchedule {
        let trigger = PeriodicTrigger::new(Duration::from_secs(60), Duration::ZERO).unwrap();
        EndpointSchedule::new(Arc::new(trigger), clock.clone())
    }

    #[test]
    fn test_cycle_transitions() {
        let clock = Arc::new(StubClock::new(at(0, 0)));
        let mut schedule = schedule(&clock);
        assert_eq!(schedule.state(), EndpointState::Idle);

        assert_eq!(schedule.schedule(), at(0, 0));
        assert_eq!(schedule.state(), EndpointState::Scheduled);

        schedule.mark_running();
        clock.advance(TimeDelta::seconds(5));
        schedule.mark_completed();
        assert_eq!(schedule.state(), EndpointState::Completed);
        assert_eq!(schedule.context().last_completion_time(), Some(at(0, 5)));

        assert_eq!(schedule.schedule(), at(1, 5));
    }

    #[test]
    fn test_unfinished_cycle_is_rescheduled_unchanged() {
        let clock = Arc::new(StubClock::new(at(0, 0)));
        let mut schedule = schedule(&clock);
        let first = schedule.schedule();
        schedule.mark_running();

        clock.advance(TimeDelta::minutes(10));
        assert_eq!(schedule.schedule(), first);
    }

    #[test]
    fn test_failure_records_completion_and_continues() {
        let clock = Arc::new(StubClock::new(at(0, 0)));
        let mut schedule = schedule(&clock);
        schedule.schedule();
        schedule.mark_running();
        clock.advance(TimeDelta::seconds(2));
        schedule.mark_failed();

        assert_eq!(schedule.state(), EndpointState::Failed);
        assert_eq!(schedule.context().last_completion_time(), Some(at(0, 2)));
        assert_eq!(schedule.schedule(), at(1, 2));
    }

    #[test]
    fn test_early_completion_counts_as_scheduled_instant() {
        let clock = Arc::new(StubClock::new(at(0, 0)));
        let trigger = PeriodicTrigger::new(Duration::from_secs(60), Duration::from_secs(30)).unwrap();
        let mut schedule = EndpointSchedule::new(Arc::new(trigger), clock.clone());

        let scheduled = schedule.schedule();
        schedule.mark_completed();
        assert_eq!(schedule.context().last_completion_time(), Some(scheduled));
        assert_eq!(schedule.delay_until(scheduled), Duration::from_secs(30));
    }
}
