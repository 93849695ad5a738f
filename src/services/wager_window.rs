//! Timing rules shared by offer generation and stake placement

use crate::error::WindowViolation;
use chrono::{DateTime, Utc};

/// Below this many whole days a race counts as imminent
pub const IMMINENT_DAYS: i64 = 2;

/// Whole days between `now` and `start`, floored
pub fn whole_days_until(start: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (start - now).num_seconds().div_euclid(86_400)
}

/// The race must start strictly after `now`
pub fn ensure_not_started(start: DateTime<Utc>, now: DateTime<Utc>) -> Result<(), WindowViolation> {
    if start <= now {
        return Err(WindowViolation::RaceStarted);
    }
    Ok(())
}

/// The race must start strictly after `now` with at least `min_days` whole
/// days of lead time. Returns the days remaining.
pub fn ensure_lead_time(
    start: DateTime<Utc>,
    now: DateTime<Utc>,
    min_days: i64,
) -> Result<i64, WindowViolation> {
    ensure_not_started(start, now)?;

    let days_remaining = whole_days_until(start, now);
    if days_remaining < IMMINENT_DAYS {
        return Err(WindowViolation::RaceImminent { days_remaining });
    }
    if days_remaining < min_days {
        return Err(WindowViolation::InsufficientLeadTime {
            days_remaining,
            min_days,
        });
    }
    Ok(days_remaining)
}
