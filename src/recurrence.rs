//! Recurrence computation.
//!
//! Pure functions over [`RecurrenceRule`] and alarm wall-clock schedules.
//! Deterministic given identical inputs — every reschedule-after-fire
//! decision in the dispatcher rests on that. All calendar math is UTC.

use crate::model::{RecurrenceFreq, RecurrenceRule};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc, Weekday};

/// Compute the next valid occurrence after `from`, or `None` when the rule
/// is exhausted.
///
/// `occurrences_so_far` counts firings already delivered (including the one
/// being processed when called from the dispatcher); once it reaches the
/// rule's `max_occurrences` no further occurrence is produced.
#[must_use]
pub fn next_occurrence(
    from: DateTime<Utc>,
    rule: &RecurrenceRule,
    occurrences_so_far: u32,
) -> Option<DateTime<Utc>> {
    if let Some(max) = rule.max_occurrences {
        if occurrences_so_far >= max {
            return None;
        }
    }

    let interval = rule.interval.max(1);
    let candidate = match rule.freq {
        RecurrenceFreq::Daily => from.checked_add_signed(Duration::days(i64::from(interval)))?,
        RecurrenceFreq::Weekly => weekly_next(from, interval, &rule.days_of_week)?,
        RecurrenceFreq::Monthly => monthly_next(from, interval, rule.day_of_month)?,
        RecurrenceFreq::Yearly => yearly_next(from, interval)?,
        RecurrenceFreq::Custom => from.checked_add_signed(Duration::minutes(i64::from(interval)))?,
    };

    if let Some(end) = rule.end_date {
        if candidate > end {
            return None;
        }
    }

    Some(candidate)
}

/// Next wall-clock `hour:minute` strictly after `now`, filtered by
/// `repeat_days` when non-empty. Returns `None` for out-of-range
/// hour/minute values.
#[must_use]
pub fn next_alarm_trigger(
    now: DateTime<Utc>,
    hour: u8,
    minute: u8,
    repeat_days: &[Weekday],
) -> Option<DateTime<Utc>> {
    let time = NaiveTime::from_hms_opt(u32::from(hour), u32::from(minute), 0)?;
    let mut candidate = now.date_naive().and_time(time).and_utc();
    if candidate <= now {
        candidate += Duration::days(1);
    }
    if repeat_days.is_empty() {
        return Some(candidate);
    }
    for _ in 0..7 {
        if repeat_days.contains(&candidate.weekday()) {
            return Some(candidate);
        }
        candidate += Duration::days(1);
    }
    None
}

/// Whether two instants fall on the same UTC calendar day.
#[must_use]
pub fn same_utc_day(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    a.date_naive() == b.date_naive()
}

/// Monday–Friday.
#[must_use]
pub fn is_weekday(at: DateTime<Utc>) -> bool {
    !is_weekend(at)
}

/// Saturday–Sunday.
#[must_use]
pub fn is_weekend(at: DateTime<Utc>) -> bool {
    matches!(at.weekday(), Weekday::Sat | Weekday::Sun)
}

// ---------------------------------------------------------------------------
// Per-frequency stepping
// ---------------------------------------------------------------------------

/// Advance to the next weekday in `days`, wrapping across week boundaries.
///
/// With `interval > 1`, wrapping past the end of the current Monday-based
/// week skips `interval - 1` further weeks. An empty day set repeats every
/// `interval` weeks from `from`.
fn weekly_next(from: DateTime<Utc>, interval: u32, days: &[Weekday]) -> Option<DateTime<Utc>> {
    let interval = i64::from(interval);
    if days.is_empty() {
        return from.checked_add_signed(Duration::weeks(interval));
    }

    for offset in 1..=7 {
        let candidate = from + Duration::days(offset);
        if days.contains(&candidate.weekday()) {
            if interval > 1 && week_start(candidate) > week_start(from) {
                return candidate.checked_add_signed(Duration::weeks(interval - 1));
            }
            return Some(candidate);
        }
    }
    None
}

/// Monday of the ISO week containing `at`.
fn week_start(at: DateTime<Utc>) -> NaiveDate {
    at.date_naive() - Duration::days(i64::from(at.weekday().num_days_from_monday()))
}

/// Add `interval` months, targeting `day_of_month` (default: the start day)
/// and clamping to the last valid day when the target exceeds the month
/// length (rule day 31 in a 30-day month lands on day 30).
fn monthly_next(
    from: DateTime<Utc>,
    interval: u32,
    day_of_month: Option<u32>,
) -> Option<DateTime<Utc>> {
    let months = i64::from(from.year()) * 12 + i64::from(from.month0()) + i64::from(interval);
    let year = i32::try_from(months.div_euclid(12)).ok()?;
    let month = u32::try_from(months.rem_euclid(12)).ok()? + 1;

    let target = day_of_month.unwrap_or_else(|| from.day());
    let day = target.clamp(1, days_in_month(year, month));
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    Some(date.and_time(from.time()).and_utc())
}

/// Add `interval` years, clamping Feb-29 to Feb-28 in non-leap years.
fn yearly_next(from: DateTime<Utc>, interval: u32) -> Option<DateTime<Utc>> {
    let year = from.year().checked_add(i32::try_from(interval).ok()?)?;
    let day = from.day().min(days_in_month(year, from.month()));
    let date = NaiveDate::from_ymd_opt(year, from.month(), day)?;
    Some(date.and_time(from.time()).and_utc())
}

fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => 30,
    }
}

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}
