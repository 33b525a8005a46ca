//! Domain types for reminders, alarms, and trigger events.
//!
//! Everything in this module is backend-agnostic — shared by the store, the
//! schedulers, and the dispatcher.

use chrono::{DateTime, Datelike, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

// ---------------------------------------------------------------------------
// Global ID counter (shared by reminder/alarm/audit id generation)
// ---------------------------------------------------------------------------

pub(crate) static RECORD_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Generate a store-assigned record id: `{prefix}-{epoch_millis}-{counter}`.
///
/// The process-local counter breaks ties when two records are created within
/// the same millisecond.
pub(crate) fn new_id(prefix: &str) -> String {
    let millis = match std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH) {
        Ok(d) => d.as_millis(),
        Err(_) => 0,
    };
    let n = RECORD_COUNTER.fetch_add(1, AtomicOrdering::Relaxed);
    format!("{prefix}-{millis}-{n}")
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Which trigger source a reminder is bound to. Exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderKind {
    Time,
    Location,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderStatus {
    Pending,
    Completed,
    Cancelled,
}

/// Region transition direction a location reminder is armed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerDirection {
    Enter,
    Exit,
    Both,
}

impl TriggerDirection {
    /// Whether a delivered transition qualifies for this direction.
    ///
    /// Dwell is a presence signal: it qualifies for `Enter` and `Both`,
    /// never for `Exit`.
    #[must_use]
    pub fn accepts(self, transition: Transition) -> bool {
        match self {
            Self::Enter => matches!(transition, Transition::Enter | Transition::Dwell),
            Self::Exit => matches!(transition, Transition::Exit),
            Self::Both => true,
        }
    }
}

/// Re-firing policy for a location reminder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecurrencePolicy {
    /// Fire once, then complete and release the region.
    Once,
    /// Fire on every qualifying transition.
    EveryTime,
    /// At most once per calendar day.
    Daily,
    /// At most once per calendar day, Monday–Friday only.
    Weekdays,
    /// At most once per calendar day, Saturday–Sunday only.
    Weekends,
}

/// Repeat frequency for a time-based reminder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecurrenceFreq {
    Daily,
    Weekly,
    Monthly,
    Yearly,
    /// Fixed interval in minutes.
    Custom,
}

/// User-facing priority. Classification only — no scheduling effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

/// User-facing category. Classification only — no scheduling effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Category {
    #[default]
    General,
    Work,
    Personal,
    Health,
    Errand,
}

/// A spatial transition as delivered by the OS monitoring service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Enter,
    Exit,
    Dwell,
}

// ---------------------------------------------------------------------------
// Recurrence and constraints
// ---------------------------------------------------------------------------

/// Declarative repeat rule for a time-based reminder.
///
/// A reminder with no rule fires once. `interval` is interpreted per
/// frequency: days for `Daily`, weeks for `Weekly`, months for `Monthly`,
/// years for `Yearly`, minutes for `Custom`.
#[derive(Debug, Clone, PartialEq)]
pub struct RecurrenceRule {
    pub freq: RecurrenceFreq,
    pub interval: u32,
    /// Weekdays the rule may land on. `Weekly` only; empty = any.
    pub days_of_week: Vec<Weekday>,
    /// Target day of month. `Monthly` only; `None` = keep the start day.
    pub day_of_month: Option<u32>,
    /// No occurrence is produced after this instant.
    pub end_date: Option<DateTime<Utc>>,
    /// No occurrence is produced once this many firings have happened.
    pub max_occurrences: Option<u32>,
}

impl RecurrenceRule {
    /// A rule repeating every `interval` units of `freq`, no cutoffs.
    #[must_use]
    pub fn every(freq: RecurrenceFreq, interval: u32) -> Self {
        Self {
            freq,
            interval,
            days_of_week: Vec::new(),
            day_of_month: None,
            end_date: None,
            max_occurrences: None,
        }
    }
}

/// Time window gating a location reminder.
///
/// A firing is only allowed when the current UTC time-of-day falls inside
/// `[start, end]` and the current weekday is in `days_of_week` (empty =
/// every day). Windows wrapping midnight (`start > end`) are supported.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeConstraint {
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub days_of_week: Vec<Weekday>,
}

impl TimeConstraint {
    /// Whether `at` satisfies this constraint.
    #[must_use]
    pub fn matches(&self, at: DateTime<Utc>) -> bool {
        if !self.days_of_week.is_empty() && !self.days_of_week.contains(&at.weekday()) {
            return false;
        }
        let t = at.time();
        if self.start <= self.end {
            t >= self.start && t <= self.end
        } else {
            // Window wraps midnight, e.g. 22:00–06:00.
            t >= self.start || t <= self.end
        }
    }
}

// ---------------------------------------------------------------------------
// Core records
// ---------------------------------------------------------------------------

/// Geofence parameters of a location-based reminder.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationTrigger {
    pub latitude: f64,
    pub longitude: f64,
    pub radius_meters: f64,
    pub place_name: Option<String>,
    pub direction: TriggerDirection,
    pub policy: RecurrencePolicy,
    pub time_constraint: Option<TimeConstraint>,
    /// Set by snooze-until-leave: suppress firing until an Exit is observed.
    pub awaiting_exit: bool,
}

/// A persisted reminder record.
#[derive(Debug, Clone, PartialEq)]
pub struct Reminder {
    pub id: String,
    pub message: String,
    pub kind: ReminderKind,
    pub status: ReminderStatus,
    /// Present iff `kind == Time`. Future at creation.
    pub scheduled_time: Option<DateTime<Utc>>,
    /// Present iff `kind == Location`.
    pub location: Option<LocationTrigger>,
    pub recurrence: Option<RecurrenceRule>,
    pub priority: Priority,
    pub category: Category,
    /// While in the future, gates all firing for this record.
    pub snoozed_until: Option<DateTime<Utc>>,
    pub snooze_count: u32,
    pub last_triggered_at: Option<DateTime<Utc>>,
    pub trigger_count: u32,
    /// Present iff an active spatial registration exists for this record.
    pub spatial_handle: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reminder {
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == ReminderStatus::Pending
    }

    /// Whether a snooze window is currently suppressing this record.
    #[must_use]
    pub fn snooze_active(&self, now: DateTime<Utc>) -> bool {
        self.snoozed_until.is_some_and(|until| until > now)
    }
}

/// A persisted alarm record. Always local-clock (UTC) based.
#[derive(Debug, Clone, PartialEq)]
pub struct Alarm {
    pub id: String,
    pub label: String,
    /// Hour of day, 0–23.
    pub hour: u8,
    /// Minute of hour, 0–59.
    pub minute: u8,
    pub enabled: bool,
    /// Weekdays the alarm repeats on. Empty = one-time.
    pub repeat_days: Vec<Weekday>,
    pub sound_ref: Option<String>,
    pub vibrate: bool,
    pub snooze_count: u32,
    pub snooze_duration_minutes: u32,
    pub last_triggered_at: Option<DateTime<Utc>>,
    pub next_trigger_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Alarm {
    #[must_use]
    pub fn is_one_time(&self) -> bool {
        self.repeat_days.is_empty()
    }
}

/// A row in the fire-history audit table.
#[derive(Debug, Clone, PartialEq)]
pub struct FireRecord {
    pub id: String,
    /// Reminder or alarm id that fired.
    pub source_id: String,
    pub summary: String,
    pub at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Inbound requests (command-producer collaborator)
// ---------------------------------------------------------------------------

/// Request to create a time-based reminder.
#[derive(Debug, Clone)]
pub struct CreateTimeReminder {
    pub message: String,
    pub scheduled_time: DateTime<Utc>,
    pub recurrence: Option<RecurrenceRule>,
    pub priority: Priority,
    pub category: Category,
}

/// Request to create a location-based reminder.
#[derive(Debug, Clone)]
pub struct CreateLocationReminder {
    pub message: String,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_meters: f64,
    pub place_name: Option<String>,
    pub direction: TriggerDirection,
    pub policy: RecurrencePolicy,
    pub time_constraint: Option<TimeConstraint>,
    pub priority: Priority,
    pub category: Category,
}

/// Request to create an alarm.
#[derive(Debug, Clone)]
pub struct CreateAlarm {
    pub label: String,
    pub hour: u8,
    pub minute: u8,
    pub repeat_days: Vec<Weekday>,
    pub sound_ref: Option<String>,
    pub vibrate: bool,
    pub snooze_duration_minutes: u32,
}

/// Validated insert payload for a reminder. Built by the engine from a
/// create request; the store assigns the id and timestamps.
#[derive(Debug, Clone)]
pub struct NewReminder {
    pub message: String,
    pub kind: ReminderKind,
    pub scheduled_time: Option<DateTime<Utc>>,
    pub location: Option<LocationTrigger>,
    pub recurrence: Option<RecurrenceRule>,
    pub priority: Priority,
    pub category: Category,
}

/// Validated insert payload for an alarm.
#[derive(Debug, Clone)]
pub struct NewAlarm {
    pub label: String,
    pub hour: u8,
    pub minute: u8,
    pub repeat_days: Vec<Weekday>,
    pub sound_ref: Option<String>,
    pub vibrate: bool,
    pub snooze_duration_minutes: u32,
    pub next_trigger_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Outbound payload (presentation collaborator)
// ---------------------------------------------------------------------------

/// Payload emitted to the notification presenter when a trigger fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirePayload {
    /// Reminder or alarm id.
    pub id: String,
    pub title: String,
    pub body: String,
    /// Snooze durations (minutes) to offer as notification actions.
    pub snooze_actions: Vec<u32>,
}

// ---------------------------------------------------------------------------
// Validation helpers
// ---------------------------------------------------------------------------

/// Reject empty or whitespace-only reminder messages.
pub(crate) fn validate_message(message: &str) -> crate::Result<()> {
    if message.trim().is_empty() {
        return Err(crate::EngineError::InvalidInput(
            "reminder message must not be empty".to_owned(),
        ));
    }
    Ok(())
}

/// Reject out-of-range coordinates and non-positive radii.
pub(crate) fn validate_coordinates(
    latitude: f64,
    longitude: f64,
    radius_meters: f64,
) -> crate::Result<()> {
    if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
        return Err(crate::EngineError::InvalidInput(format!(
            "latitude out of range: {latitude}"
        )));
    }
    if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
        return Err(crate::EngineError::InvalidInput(format!(
            "longitude out of range: {longitude}"
        )));
    }
    if !radius_meters.is_finite() || radius_meters <= 0.0 {
        return Err(crate::EngineError::InvalidInput(format!(
            "radius must be positive: {radius_meters}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn new_id_is_unique_and_prefixed() {
        let a = new_id("rem");
        let b = new_id("rem");
        assert!(a.starts_with("rem-"));
        assert_ne!(a, b);
    }

    #[test]
    fn direction_accepts_matrix() {
        assert!(TriggerDirection::Enter.accepts(Transition::Enter));
        assert!(TriggerDirection::Enter.accepts(Transition::Dwell));
        assert!(!TriggerDirection::Enter.accepts(Transition::Exit));

        assert!(TriggerDirection::Exit.accepts(Transition::Exit));
        assert!(!TriggerDirection::Exit.accepts(Transition::Enter));
        assert!(!TriggerDirection::Exit.accepts(Transition::Dwell));

        assert!(TriggerDirection::Both.accepts(Transition::Enter));
        assert!(TriggerDirection::Both.accepts(Transition::Exit));
        assert!(TriggerDirection::Both.accepts(Transition::Dwell));
    }

    #[test]
    fn time_constraint_plain_window() {
        let tc = TimeConstraint {
            start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            days_of_week: Vec::new(),
        };
        let noon = Utc.with_ymd_and_hms(2026, 3, 4, 12, 0, 0).unwrap();
        let night = Utc.with_ymd_and_hms(2026, 3, 4, 22, 0, 0).unwrap();
        assert!(tc.matches(noon));
        assert!(!tc.matches(night));
    }

    #[test]
    fn time_constraint_wraps_midnight() {
        let tc = TimeConstraint {
            start: NaiveTime::from_hms_opt(22, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
            days_of_week: Vec::new(),
        };
        let late = Utc.with_ymd_and_hms(2026, 3, 4, 23, 30, 0).unwrap();
        let early = Utc.with_ymd_and_hms(2026, 3, 5, 5, 0, 0).unwrap();
        let noon = Utc.with_ymd_and_hms(2026, 3, 4, 12, 0, 0).unwrap();
        assert!(tc.matches(late));
        assert!(tc.matches(early));
        assert!(!tc.matches(noon));
    }

    #[test]
    fn time_constraint_weekday_filter() {
        // 2026-03-04 is a Wednesday.
        let tc = TimeConstraint {
            start: NaiveTime::from_hms_opt(0, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(23, 59, 59).unwrap(),
            days_of_week: vec![Weekday::Sat, Weekday::Sun],
        };
        let wed = Utc.with_ymd_and_hms(2026, 3, 4, 12, 0, 0).unwrap();
        let sat = Utc.with_ymd_and_hms(2026, 3, 7, 12, 0, 0).unwrap();
        assert!(!tc.matches(wed));
        assert!(tc.matches(sat));
    }

    #[test]
    fn snooze_active_only_while_future() {
        let now = Utc.with_ymd_and_hms(2026, 3, 4, 12, 0, 0).unwrap();
        let mut rem = sample_time_reminder(now);
        assert!(!rem.snooze_active(now));

        rem.snoozed_until = Some(now + Duration::minutes(30));
        assert!(rem.snooze_active(now));
        assert!(!rem.snooze_active(now + Duration::minutes(30)));
        assert!(!rem.snooze_active(now + Duration::minutes(31)));
    }

    #[test]
    fn validate_message_rejects_blank() {
        assert!(validate_message("call mom").is_ok());
        assert!(validate_message("").is_err());
        assert!(validate_message("   ").is_err());
    }

    #[test]
    fn validate_coordinates_ranges() {
        assert!(validate_coordinates(55.9533, -3.1883, 100.0).is_ok());
        assert!(validate_coordinates(91.0, 0.0, 100.0).is_err());
        assert!(validate_coordinates(0.0, 181.0, 100.0).is_err());
        assert!(validate_coordinates(0.0, 0.0, 0.0).is_err());
        assert!(validate_coordinates(f64::NAN, 0.0, 100.0).is_err());
    }

    pub(crate) fn sample_time_reminder(now: chrono::DateTime<Utc>) -> Reminder {
        Reminder {
            id: new_id("rem"),
            message: "call mom".to_owned(),
            kind: ReminderKind::Time,
            status: ReminderStatus::Pending,
            scheduled_time: Some(now + Duration::minutes(5)),
            location: None,
            recurrence: None,
            priority: Priority::Normal,
            category: Category::General,
            snoozed_until: None,
            snooze_count: 0,
            last_triggered_at: None,
            trigger_count: 0,
            spatial_handle: None,
            created_at: now,
            updated_at: now,
        }
    }
}
