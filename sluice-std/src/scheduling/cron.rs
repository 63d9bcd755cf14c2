//! Five-field cron triggers.
//!
//! Fields are minute, hour, day-of-month, month and day-of-week (0 = Sunday),
//! evaluated in UTC at minute resolution. Each field is `*`, `*/N` or a
//! single value; ranges, lists and names are rejected. Day-of-month and
//! day-of-week must both match.

use chrono::{DateTime, Datelike, NaiveDate, TimeDelta, Timelike, Utc};
use sluice_core::{Clock, ConfigurationError, Trigger, TriggerContext};
use std::{fmt, str::FromStr};

/// Years searched ahead before an expression is considered to never fire.
const SEARCH_YEARS: i32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Any,
    Step(u32),
    Exact(u32),
}

impl Field {
    fn matches(self, value: u32, min: u32) -> bool {
        match self {
            Field::Any => true,
            Field::Step(step) => (value - min) % step == 0,
            Field::Exact(exact) => value == exact,
        }
    }
}

struct Bounds {
    name: &'static str,
    min: u32,
    max: u32,
}

const MINUTE: Bounds = Bounds { name: "minute", min: 0, max: 59 };
const HOUR: Bounds = Bounds { name: "hour", min: 0, max: 23 };
const DAY_OF_MONTH: Bounds = Bounds { name: "day-of-month", min: 1, max: 31 };
const MONTH: Bounds = Bounds { name: "month", min: 1, max: 12 };
const DAY_OF_WEEK: Bounds = Bounds { name: "day-of-week", min: 0, max: 6 };

/// A parsed cron expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpression {
    source: String,
    minute: Field,
    hour: Field,
    day_of_month: Field,
    month: Field,
    day_of_week: Field,
}

impl CronExpression {
    /// Parse a five-field expression.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidCronExpression`] for a wrong field
    /// count, unsupported syntax, out-of-range values, or a day that never
    /// occurs in the given month.
    pub fn parse(expression: &str) -> Result<Self, ConfigurationError> {
        let invalid = |reason: String| ConfigurationError::InvalidCronExpression {
            expression: expression.to_string(),
            reason,
        };

        let fields: Vec<&str> = expression.split_whitespace().collect();
        let [minute, hour, day_of_month, month, day_of_week] = fields.as_slice() else {
            return Err(invalid(format!("expected 5 fields, found {}", fields.len())));
        };

        let parsed = Self {
            source: expression.to_string(),
            minute: parse_field(minute, &MINUTE).map_err(&invalid)?,
            hour: parse_field(hour, &HOUR).map_err(&invalid)?,
            day_of_month: parse_field(day_of_month, &DAY_OF_MONTH).map_err(&invalid)?,
            month: parse_field(month, &MONTH).map_err(&invalid)?,
            day_of_week: parse_field(day_of_week, &DAY_OF_WEEK).map_err(&invalid)?,
        };

        if let (Field::Exact(day), Field::Exact(month)) = (parsed.day_of_month, parsed.month) {
            if day > longest_month(month) {
                return Err(invalid(format!("month {month} never has day {day}")));
            }
        }
        Ok(parsed)
    }

    /// The expression text.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// The first matching instant at or after `from`, rounded up to the next
    /// whole minute unless `from` is exactly on one.
    ///
    /// Returns `None` when nothing matches within the search horizon.
    pub fn next_after(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let on_boundary = from.second() == 0 && from.nanosecond() == 0;
        let start = if on_boundary {
            from
        } else {
            from.checked_add_signed(TimeDelta::minutes(1))?
        };

        let mut date = start.date_naive();
        let mut hour = start.hour();
        let mut minute = start.minute();
        let horizon = date.year().saturating_add(SEARCH_YEARS);

        while date.year() <= horizon {
            if !self.month.matches(date.month(), MONTH.min) {
                date = first_of_next_month(date)?;
                (hour, minute) = (0, 0);
                continue;
            }
            if !self.day_matches(date) {
                date = date.succ_opt()?;
                (hour, minute) = (0, 0);
                continue;
            }
            let Some(matching_hour) = (hour..24).find(|h| self.hour.matches(*h, HOUR.min)) else {
                date = date.succ_opt()?;
                (hour, minute) = (0, 0);
                continue;
            };
            if matching_hour != hour {
                (hour, minute) = (matching_hour, 0);
            }
            match (minute..60).find(|m| self.minute.matches(*m, MINUTE.min)) {
                Some(matching_minute) => {
                    return date.and_hms_opt(hour, matching_minute, 0).map(|t| t.and_utc());
                }
                None => {
                    hour += 1;
                    minute = 0;
                }
            }
        }
        None
    }

    fn day_matches(&self, date: NaiveDate) -> bool {
        self.day_of_month.matches(date.day(), DAY_OF_MONTH.min)
            && self
                .day_of_week
                .matches(date.weekday().num_days_from_sunday(), DAY_OF_WEEK.min)
    }
}

impl FromStr for CronExpression {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for CronExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn parse_field(text: &str, bounds: &Bounds) -> Result<Field, String> {
    if text == "*" {
        return Ok(Field::Any);
    }
    if let Some(step) = text.strip_prefix("*/") {
        return match step.parse::<u32>() {
            Ok(step) if step >= 1 => Ok(Field::Step(step)),
            _ => Err(format!("invalid step `{step}` in {} field", bounds.name)),
        };
    }
    match text.parse::<u32>() {
        Ok(value) if (bounds.min..=bounds.max).contains(&value) => Ok(Field::Exact(value)),
        Ok(value) => Err(format!(
            "{} value {value} is outside {}..={}",
            bounds.name, bounds.min, bounds.max
        )),
        Err(_) => Err(format!("unsupported {} field `{text}`", bounds.name)),
    }
}

fn longest_month(month: u32) -> u32 {
    match month {
        2 => 29,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

fn first_of_next_month(date: NaiveDate) -> Option<NaiveDate> {
    if date.month() == 12 {
        NaiveDate::from_ymd_opt(date.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(date.year(), date.month() + 1, 1)
    }
}

/// Fires whenever the clock matches a [`CronExpression`].
///
/// # Example
///
/// ```rust,ignore
/// let nightly = CronTrigger::new("0 2 * * *")?;
/// let next = nightly.next_execution_time(&UtcClock, &TriggerContext::new());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronTrigger {
    expression: CronExpression,
}

impl CronTrigger {
    /// Parse `expression` into a trigger.
    pub fn new(expression: &str) -> Result<Self, ConfigurationError> {
        CronExpression::parse(expression).map(Self::from_expression)
    }

    /// A trigger for an already parsed expression.
    pub fn from_expression(expression: CronExpression) -> Self {
        Self { expression }
    }

    /// The expression.
    pub fn expression(&self) -> &CronExpression {
        &self.expression
    }
}

impl Trigger for CronTrigger {
    fn next_execution_time(&self, clock: &dyn Clock, context: &TriggerContext) -> DateTime<Utc> {
        if let Some(pending) = context.pending_execution() {
            return pending;
        }
        self.expression
            .next_after(clock.now())
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduling::StubClock;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32, second: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2017, 1, 1, hour, minute, second).unwrap()
    }

    fn next(expression: &str, now: DateTime<Utc>) -> DateTime<Utc> {
        CronTrigger::new(expression)
            .unwrap()
            .next_execution_time(&StubClock::new(now), &TriggerContext::new())
    }

    #[test]
    fn test_every_minute_rounds_up_to_next_minute() {
        assert_eq!(next("* * * * *", at(0, 0, 1)), at(0, 1, 0));
    }

    #[test]
    fn test_exact_minute_boundary_fires_immediately() {
        assert_eq!(next("* * * * *", at(0, 1, 0)), at(0, 1, 0));
    }

    #[test]
    fn test_steps_skip_to_matching_hour() {
        assert_eq!(next("*/5 */23 * * *", at(1, 1, 0)), at(23, 0, 0));
    }

    #[test]
    fn test_rollover_into_next_month_and_year() {
        let new_year = Utc.with_ymd_and_hms(2017, 12, 31, 23, 59, 30).unwrap();
        assert_eq!(
            next("0 0 1 * *", new_year),
            Utc.with_ymd_and_hms(2018, 1, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_leap_day() {
        let from = Utc.with_ymd_and_hms(2017, 3, 1, 0, 0, 0).unwrap();
        assert_eq!(
            next("0 12 29 2 *", from),
            Utc.with_ymd_and_hms(2020, 2, 29, 12, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_day_fields_are_conjunctive() {
        // Friday the 13th
        assert_eq!(
            next("0 0 13 * 5", at(0, 0, 0)),
            Utc.with_ymd_and_hms(2017, 1, 13, 0, 0, 0).unwrap()
        );
        assert_eq!(
            next("0 0 13 * 5", Utc.with_ymd_and_hms(2017, 1, 14, 0, 0, 0).unwrap()),
            Utc.with_ymd_and_hms(2017, 10, 13, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_pending_cycle_is_returned_unchanged() {
        let context = TriggerContext::new()
            .with_last_scheduled_execution_time(at(23, 5, 0))
            .with_last_completion_time(at(23, 0, 0));
        let trigger = CronTrigger::new("* * * * *").unwrap();
        let clock = StubClock::new(at(23, 1, 0));
        assert_eq!(trigger.next_execution_time(&clock, &context), at(23, 5, 0));
    }

    #[test]
    fn test_malformed_expressions_are_rejected() {
        for expression in [
            "wrong",
            "* * * *",
            "* * * * * *",
            "1-5 * * * *",
            "1,2 * * * *",
            "*/0 * * * *",
            "60 * * * *",
            "* * 0 * *",
            "* * * JAN *",
            "* * * * 7",
            "0 0 31 2 *",
        ] {
            assert!(
                matches!(
                    CronExpression::parse(expression),
                    Err(ConfigurationError::InvalidCronExpression { .. })
                ),
                "{expression} should be rejected"
            );
        }
    }

    #[test]
    fn test_expression_round_trips_as_text() {
        let expression: CronExpression = "*/15 * * * 1".parse().unwrap();
        assert_eq!(expression.to_string(), "*/15 * * * 1");
    }
}
