//! Due-time evaluation for every [`Schedule`] kind.
//!
//! Pure functions of their inputs: the current time always comes in through
//! `now_ms`, never from the wall clock. Missed occurrences collapse into a
//! single run at `now_ms`; there is no catch-up burst.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use thiserror::Error;

use cronwatch_protocols::Schedule;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("interval must be greater than 0")]
    ZeroInterval,

    #[error("invalid cron expression '{expr}': {message}")]
    InvalidCron { expr: String, message: String },
}

/// Compute when a job is next due.
///
/// Returns `Ok(None)` when the schedule will never fire again (a one-shot job
/// that already ran). A returned instant at or before `now_ms` means "due now".
pub fn next_due(
    schedule: &Schedule,
    now_ms: i64,
    last_run_at_ms: Option<i64>,
) -> Result<Option<i64>, ScheduleError> {
    match schedule {
        Schedule::Every { every_ms } => {
            if *every_ms == 0 {
                return Err(ScheduleError::ZeroInterval);
            }
            let period = i64::try_from(*every_ms).unwrap_or(i64::MAX);
            let due = match last_run_at_ms {
                None => now_ms,
                Some(last) => last.saturating_add(period),
            };
            Ok(Some(clamp_to_now(due, now_ms)))
        }

        Schedule::At { at_ms } => match last_run_at_ms {
            Some(_) => Ok(None),
            None => Ok(Some(clamp_to_now(*at_ms, now_ms))),
        },

        Schedule::Cron { expr } => {
            let parsed = parse_cron(expr)?;
            let from = last_run_at_ms.unwrap_or(now_ms);
            let Some(from) = DateTime::<Utc>::from_timestamp_millis(from) else {
                return Ok(None);
            };
            Ok(parsed
                .after(&from)
                .next()
                .map(|next| clamp_to_now(next.timestamp_millis(), now_ms)))
        }
    }
}

/// Whether a job with this schedule should run at `now_ms`.
pub fn is_due(
    schedule: &Schedule,
    now_ms: i64,
    last_run_at_ms: Option<i64>,
) -> Result<bool, ScheduleError> {
    Ok(next_due(schedule, now_ms, last_run_at_ms)?.is_some_and(|due| due <= now_ms))
}

/// Reject schedules that can never be evaluated.
pub fn validate_schedule(schedule: &Schedule) -> Result<(), ScheduleError> {
    match schedule {
        Schedule::Every { every_ms: 0 } => Err(ScheduleError::ZeroInterval),
        Schedule::Every { .. } | Schedule::At { .. } => Ok(()),
        Schedule::Cron { expr } => parse_cron(expr).map(|_| ()),
    }
}

fn clamp_to_now(due_ms: i64, now_ms: i64) -> i64 {
    if due_ms <= now_ms { now_ms } else { due_ms }
}

fn parse_cron(expr: &str) -> Result<cron::Schedule, ScheduleError> {
    cron::Schedule::from_str(&normalize_cron(expr)).map_err(|e| ScheduleError::InvalidCron {
        expr: expr.to_string(),
        message: e.to_string(),
    })
}

/// Normalize a 5-field cron expression to 6 fields by prepending "0 " for seconds.
///
/// The `cron` crate requires `sec min hour day-of-month month day-of-week`;
/// users usually write the classic 5-field form.
pub(crate) fn normalize_cron(expr: &str) -> String {
    let trimmed = expr.trim();
    if trimmed.split_whitespace().count() == 5 {
        format!("0 {}", trimmed)
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
#[path = "schedule_tests.rs"]
mod tests;
