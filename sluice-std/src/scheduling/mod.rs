//! Clocks, triggers and per-endpoint schedules.
//!
//! - [`PeriodicTrigger`] - Fixed period after each completion
//! - [`CronTrigger`] - Five-field cron expressions
//! - [`EndpointSchedule`] - The state machine a polling endpoint drives

mod clock;
mod cron;
mod periodic;
mod schedule;

pub use clock::{StubClock, UtcClock};
pub use cron::{CronExpression, CronTrigger};
pub use periodic::PeriodicTrigger;
pub use schedule::{EndpointSchedule, EndpointState};
