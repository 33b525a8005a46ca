//! Persistence port for reminders and alarms.
//!
//! Sub-modules:
//! - `schema`: SQLite DDL definitions.
//! - `sqlite`: SQLite-backed [`SqliteStore`].
//!
//! The [`ReminderStore`] trait is the single source of truth for record
//! state. Every component receives it by injection rather than touching a
//! global, so tests can substitute an in-memory database.

pub(crate) mod schema;
pub mod sqlite;

pub use sqlite::{SqliteStore, StoreError};

use crate::model::{
    Alarm, FireRecord, NewAlarm, NewReminder, Reminder, ReminderStatus,
};
use chrono::{DateTime, Utc};

/// CRUD and targeted queries over reminder/alarm records.
///
/// All writes are atomic with respect to concurrent dispatch: an
/// implementation must apply each mutating call as a single transaction.
/// Inserts return a store-generated unique id — never caller-supplied.
pub trait ReminderStore: Send + Sync {
    // -- reminders ---------------------------------------------------------

    /// Insert a reminder. The store assigns the id and timestamps.
    fn create_reminder(&self, new: NewReminder) -> Result<Reminder, StoreError>;

    fn get_reminder(&self, id: &str) -> Result<Option<Reminder>, StoreError>;

    /// Delete a reminder. Returns `false` when no such record existed.
    fn delete_reminder(&self, id: &str) -> Result<bool, StoreError>;

    /// All PENDING time-based reminders, soonest first.
    fn active_time_based(&self) -> Result<Vec<Reminder>, StoreError>;

    /// All PENDING location-based reminders, oldest first.
    fn active_location_based(&self) -> Result<Vec<Reminder>, StoreError>;

    fn find_by_spatial_handle(&self, handle: &str) -> Result<Option<Reminder>, StoreError>;

    /// Record a firing in one transaction: set `new_status`, stamp
    /// `last_triggered_at = at`, increment `trigger_count`, consume any
    /// snooze window, and move `scheduled_time` to `next_time` when given.
    fn mark_fired(
        &self,
        id: &str,
        new_status: ReminderStatus,
        next_time: Option<DateTime<Utc>>,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    fn set_status(&self, id: &str, status: ReminderStatus) -> Result<(), StoreError>;

    /// Set or clear the snooze window and update the snooze counter.
    fn set_snooze(
        &self,
        id: &str,
        until: Option<DateTime<Utc>>,
        count: u32,
    ) -> Result<(), StoreError>;

    /// Set or clear the live spatial-registration handle.
    fn set_spatial_handle(&self, id: &str, handle: Option<&str>) -> Result<(), StoreError>;

    /// Set or clear the snooze-until-leave marker.
    fn set_awaiting_exit(&self, id: &str, awaiting: bool) -> Result<(), StoreError>;

    // -- alarms ------------------------------------------------------------

    /// Insert an alarm. The store assigns the id and timestamps.
    fn create_alarm(&self, new: NewAlarm) -> Result<Alarm, StoreError>;

    fn get_alarm(&self, id: &str) -> Result<Option<Alarm>, StoreError>;

    /// Full-row update keyed by `alarm.id`.
    fn update_alarm(&self, alarm: &Alarm) -> Result<(), StoreError>;

    /// Delete an alarm. Returns `false` when no such record existed.
    fn delete_alarm(&self, id: &str) -> Result<bool, StoreError>;

    fn list_alarms(&self) -> Result<Vec<Alarm>, StoreError>;

    fn enabled_alarms(&self) -> Result<Vec<Alarm>, StoreError>;

    // -- audit -------------------------------------------------------------

    /// Append a row to the fire-history audit trail.
    fn record_firing(
        &self,
        source_id: &str,
        summary: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Most recent firings, newest first.
    fn fire_history(&self, limit: usize) -> Result<Vec<FireRecord>, StoreError>;
}
