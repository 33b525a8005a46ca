//! SQLite-backed reminder/alarm store.
//!
//! Implements the [`ReminderStore`](super::ReminderStore) port backed by a
//! single SQLite database file. Thread-safe via an internal
//! `Mutex<Connection>` — all writes are serialized; reads could proceed
//! concurrently under WAL, but we still take the mutex for simplicity.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc, Weekday};
use rusqlite::{Connection, params};

use super::ReminderStore;
use super::schema::{apply_schema, read_schema_version};
use crate::model::{
    Alarm, Category, FireRecord, LocationTrigger, NewAlarm, NewReminder, Priority, RecurrenceFreq,
    RecurrenceRule, Reminder, ReminderKind, ReminderStatus, TimeConstraint, TriggerDirection,
    RecurrencePolicy, new_id,
};

/// Column list shared by every reminder SELECT.
const REMINDER_COLS: &str = "id, message, kind, status, scheduled_time, latitude, longitude, \
     radius_meters, place_name, direction, policy, time_constraint, awaiting_exit, recurrence, \
     priority, category, snoozed_until, snooze_count, last_triggered_at, trigger_count, \
     spatial_handle, created_at, updated_at";

/// Column list shared by every alarm SELECT.
const ALARM_COLS: &str = "id, label, hour, minute, enabled, repeat_days, sound_ref, vibrate, \
     snooze_count, snooze_duration_minutes, last_triggered_at, next_trigger_at, created_at, \
     updated_at";

/// SQLite-backed store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at `path`, applying the schema.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Io(e.to_string()))?;
        }
        let conn = Connection::open(path)?;
        apply_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open a fresh in-memory database. Used by tests and the simulation
    /// harness.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Read the current schema version from the database.
    pub fn schema_version(&self) -> Result<Option<u32>, StoreError> {
        let conn = self.lock()?;
        Ok(read_schema_version(&conn)?)
    }

    /// Acquire the connection mutex.
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Lock(e.to_string()))
    }
}

impl ReminderStore for SqliteStore {
    fn create_reminder(&self, new: NewReminder) -> Result<Reminder, StoreError> {
        let conn = self.lock()?;
        let now = Utc::now();
        let id = new_id("rem");

        let (latitude, longitude, radius, place, direction, policy, constraint, awaiting) =
            match &new.location {
                Some(loc) => (
                    Some(loc.latitude),
                    Some(loc.longitude),
                    Some(loc.radius_meters),
                    loc.place_name.clone(),
                    Some(direction_to_str(loc.direction)),
                    Some(policy_to_str(loc.policy)),
                    loc.time_constraint.as_ref().map(time_constraint_to_json),
                    loc.awaiting_exit,
                ),
                None => (None, None, None, None, None, None, None, false),
            };

        conn.execute(
            "INSERT INTO reminders \
             (id, message, kind, status, scheduled_time, latitude, longitude, radius_meters, \
              place_name, direction, policy, time_constraint, awaiting_exit, recurrence, \
              priority, category, created_at, updated_at) \
             VALUES (?1, ?2, ?3, 'pending', ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, \
              ?15, ?16, ?17)",
            params![
                id,
                new.message,
                kind_to_str(new.kind),
                new.scheduled_time.map(|t| t.timestamp()),
                latitude,
                longitude,
                radius,
                place,
                direction,
                policy,
                constraint,
                i64::from(awaiting),
                new.recurrence.as_ref().map(recurrence_to_json),
                priority_to_str(new.priority),
                category_to_str(new.category),
                now.timestamp(),
                now.timestamp(),
            ],
        )?;

        Ok(Reminder {
            id,
            message: new.message,
            kind: new.kind,
            status: ReminderStatus::Pending,
            scheduled_time: new.scheduled_time,
            location: new.location,
            recurrence: new.recurrence,
            priority: new.priority,
            category: new.category,
            snoozed_until: None,
            snooze_count: 0,
            last_triggered_at: None,
            trigger_count: 0,
            spatial_handle: None,
            created_at: now,
            updated_at: now,
        })
    }

    fn get_reminder(&self, id: &str) -> Result<Option<Reminder>, StoreError> {
        let conn = self.lock()?;
        let sql = format!("SELECT {REMINDER_COLS} FROM reminders WHERE id = ?1");
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query_map(params![id], row_to_reminder)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    fn delete_reminder(&self, id: &str) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let rows = conn.execute("DELETE FROM reminders WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    fn active_time_based(&self) -> Result<Vec<Reminder>, StoreError> {
        self.query_reminders(
            "WHERE status = 'pending' AND kind = 'time' ORDER BY scheduled_time ASC",
        )
    }

    fn active_location_based(&self) -> Result<Vec<Reminder>, StoreError> {
        self.query_reminders("WHERE status = 'pending' AND kind = 'location' ORDER BY created_at ASC")
    }

    fn find_by_spatial_handle(&self, handle: &str) -> Result<Option<Reminder>, StoreError> {
        let conn = self.lock()?;
        let sql = format!("SELECT {REMINDER_COLS} FROM reminders WHERE spatial_handle = ?1");
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query_map(params![handle], row_to_reminder)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    fn mark_fired(
        &self,
        id: &str,
        new_status: ReminderStatus,
        next_time: Option<DateTime<Utc>>,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let conn = self.lock()?;
        // COALESCE keeps the existing scheduled_time when no next occurrence
        // is supplied; the snooze window is always consumed by a firing.
        let rows = conn.execute(
            "UPDATE reminders SET status = ?1, last_triggered_at = ?2, \
             trigger_count = trigger_count + 1, snoozed_until = NULL, \
             scheduled_time = COALESCE(?3, scheduled_time), updated_at = ?4 \
             WHERE id = ?5",
            params![
                status_to_str(new_status),
                at.timestamp(),
                next_time.map(|t| t.timestamp()),
                at.timestamp(),
                id
            ],
        )?;
        if rows == 0 {
            return Err(StoreError::NotFound(id.to_owned()));
        }
        Ok(())
    }

    fn set_status(&self, id: &str, status: ReminderStatus) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let rows = conn.execute(
            "UPDATE reminders SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status_to_str(status), Utc::now().timestamp(), id],
        )?;
        if rows == 0 {
            return Err(StoreError::NotFound(id.to_owned()));
        }
        Ok(())
    }

    fn set_snooze(
        &self,
        id: &str,
        until: Option<DateTime<Utc>>,
        count: u32,
    ) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let rows = conn.execute(
            "UPDATE reminders SET snoozed_until = ?1, snooze_count = ?2, updated_at = ?3 \
             WHERE id = ?4",
            params![
                until.map(|t| t.timestamp()),
                i64::from(count),
                Utc::now().timestamp(),
                id
            ],
        )?;
        if rows == 0 {
            return Err(StoreError::NotFound(id.to_owned()));
        }
        Ok(())
    }

    fn set_spatial_handle(&self, id: &str, handle: Option<&str>) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let rows = conn.execute(
            "UPDATE reminders SET spatial_handle = ?1, updated_at = ?2 WHERE id = ?3",
            params![handle, Utc::now().timestamp(), id],
        )?;
        if rows == 0 {
            return Err(StoreError::NotFound(id.to_owned()));
        }
        Ok(())
    }

    fn set_awaiting_exit(&self, id: &str, awaiting: bool) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let rows = conn.execute(
            "UPDATE reminders SET awaiting_exit = ?1, updated_at = ?2 WHERE id = ?3",
            params![i64::from(awaiting), Utc::now().timestamp(), id],
        )?;
        if rows == 0 {
            return Err(StoreError::NotFound(id.to_owned()));
        }
        Ok(())
    }

    fn create_alarm(&self, new: NewAlarm) -> Result<Alarm, StoreError> {
        let conn = self.lock()?;
        let now = Utc::now();
        let id = new_id("alm");

        conn.execute(
            "INSERT INTO alarms \
             (id, label, hour, minute, enabled, repeat_days, sound_ref, vibrate, \
              snooze_duration_minutes, next_trigger_at, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, 1, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                id,
                new.label,
                i64::from(new.hour),
                i64::from(new.minute),
                weekdays_to_json(&new.repeat_days),
                new.sound_ref,
                i64::from(new.vibrate),
                i64::from(new.snooze_duration_minutes),
                new.next_trigger_at.map(|t| t.timestamp()),
                now.timestamp(),
                now.timestamp(),
            ],
        )?;

        Ok(Alarm {
            id,
            label: new.label,
            hour: new.hour,
            minute: new.minute,
            enabled: true,
            repeat_days: new.repeat_days,
            sound_ref: new.sound_ref,
            vibrate: new.vibrate,
            snooze_count: 0,
            snooze_duration_minutes: new.snooze_duration_minutes,
            last_triggered_at: None,
            next_trigger_at: new.next_trigger_at,
            created_at: now,
            updated_at: now,
        })
    }

    fn get_alarm(&self, id: &str) -> Result<Option<Alarm>, StoreError> {
        let conn = self.lock()?;
        let sql = format!("SELECT {ALARM_COLS} FROM alarms WHERE id = ?1");
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query_map(params![id], row_to_alarm)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    fn update_alarm(&self, alarm: &Alarm) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let rows = conn.execute(
            "UPDATE alarms SET label = ?1, hour = ?2, minute = ?3, enabled = ?4, \
             repeat_days = ?5, sound_ref = ?6, vibrate = ?7, snooze_count = ?8, \
             snooze_duration_minutes = ?9, last_triggered_at = ?10, next_trigger_at = ?11, \
             updated_at = ?12 WHERE id = ?13",
            params![
                alarm.label,
                i64::from(alarm.hour),
                i64::from(alarm.minute),
                i64::from(alarm.enabled),
                weekdays_to_json(&alarm.repeat_days),
                alarm.sound_ref,
                i64::from(alarm.vibrate),
                i64::from(alarm.snooze_count),
                i64::from(alarm.snooze_duration_minutes),
                alarm.last_triggered_at.map(|t| t.timestamp()),
                alarm.next_trigger_at.map(|t| t.timestamp()),
                Utc::now().timestamp(),
                alarm.id,
            ],
        )?;
        if rows == 0 {
            return Err(StoreError::NotFound(alarm.id.clone()));
        }
        Ok(())
    }

    fn delete_alarm(&self, id: &str) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let rows = conn.execute("DELETE FROM alarms WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    fn list_alarms(&self) -> Result<Vec<Alarm>, StoreError> {
        self.query_alarms("ORDER BY hour, minute")
    }

    fn enabled_alarms(&self) -> Result<Vec<Alarm>, StoreError> {
        self.query_alarms("WHERE enabled = 1 ORDER BY hour, minute")
    }

    fn record_firing(
        &self,
        source_id: &str,
        summary: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO fire_history (id, source_id, summary, at) VALUES (?1, ?2, ?3, ?4)",
            params![new_id("fire"), source_id, summary, at.timestamp()],
        )?;
        Ok(())
    }

    fn fire_history(&self, limit: usize) -> Result<Vec<FireRecord>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, source_id, summary, at FROM fire_history ORDER BY at DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![i64::try_from(limit).unwrap_or(i64::MAX)], |row| {
            let at_secs: i64 = row.get(3)?;
            Ok(FireRecord {
                id: row.get(0)?,
                source_id: row.get(1)?,
                summary: row.get(2)?,
                at: dt_from_secs(at_secs).unwrap_or_default(),
            })
        })?;

        let mut records = Vec::new();
        for r in rows {
            records.push(r?);
        }
        Ok(records)
    }
}

impl SqliteStore {
    fn query_reminders(&self, tail: &str) -> Result<Vec<Reminder>, StoreError> {
        let conn = self.lock()?;
        let sql = format!("SELECT {REMINDER_COLS} FROM reminders {tail}");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], row_to_reminder)?;

        let mut reminders = Vec::new();
        for r in rows {
            reminders.push(r?);
        }
        Ok(reminders)
    }

    fn query_alarms(&self, tail: &str) -> Result<Vec<Alarm>, StoreError> {
        let conn = self.lock()?;
        let sql = format!("SELECT {ALARM_COLS} FROM alarms {tail}");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], row_to_alarm)?;

        let mut alarms = Vec::new();
        for a in rows {
            alarms.push(a?);
        }
        Ok(alarms)
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors from the SQLite store backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("lock poisoned: {0}")]
    Lock(String),
}

// ---------------------------------------------------------------------------
// Row conversion helpers
// ---------------------------------------------------------------------------

fn row_to_reminder(row: &rusqlite::Row<'_>) -> rusqlite::Result<Reminder> {
    let kind_str: String = row.get(2)?;
    let status_str: String = row.get(3)?;
    let kind = str_to_kind(&kind_str);

    let location = if kind == ReminderKind::Location {
        let direction_str: Option<String> = row.get(9)?;
        let policy_str: Option<String> = row.get(10)?;
        let constraint_json: Option<String> = row.get(11)?;
        let awaiting: i64 = row.get(12)?;
        Some(LocationTrigger {
            latitude: row.get::<_, Option<f64>>(5)?.unwrap_or_default(),
            longitude: row.get::<_, Option<f64>>(6)?.unwrap_or_default(),
            radius_meters: row.get::<_, Option<f64>>(7)?.unwrap_or_default(),
            place_name: row.get(8)?,
            direction: str_to_direction(direction_str.as_deref().unwrap_or("enter")),
            policy: str_to_policy(policy_str.as_deref().unwrap_or("once")),
            time_constraint: constraint_json
                .as_deref()
                .and_then(time_constraint_from_json),
            awaiting_exit: awaiting != 0,
        })
    } else {
        None
    };

    let recurrence_json: Option<String> = row.get(13)?;
    let priority_str: String = row.get(14)?;
    let category_str: String = row.get(15)?;

    Ok(Reminder {
        id: row.get(0)?,
        message: row.get(1)?,
        kind,
        status: str_to_status(&status_str),
        scheduled_time: row.get::<_, Option<i64>>(4)?.and_then(dt_from_secs),
        location,
        recurrence: recurrence_json.as_deref().and_then(recurrence_from_json),
        priority: str_to_priority(&priority_str),
        category: str_to_category(&category_str),
        snoozed_until: row.get::<_, Option<i64>>(16)?.and_then(dt_from_secs),
        snooze_count: u32::try_from(row.get::<_, i64>(17)?).unwrap_or(0),
        last_triggered_at: row.get::<_, Option<i64>>(18)?.and_then(dt_from_secs),
        trigger_count: u32::try_from(row.get::<_, i64>(19)?).unwrap_or(0),
        spatial_handle: row.get(20)?,
        created_at: dt_from_secs(row.get(21)?).unwrap_or_default(),
        updated_at: dt_from_secs(row.get(22)?).unwrap_or_default(),
    })
}

fn row_to_alarm(row: &rusqlite::Row<'_>) -> rusqlite::Result<Alarm> {
    let repeat_json: String = row.get(5)?;
    let enabled: i64 = row.get(4)?;
    let vibrate: i64 = row.get(7)?;

    Ok(Alarm {
        id: row.get(0)?,
        label: row.get(1)?,
        hour: u8::try_from(row.get::<_, i64>(2)?).unwrap_or(0),
        minute: u8::try_from(row.get::<_, i64>(3)?).unwrap_or(0),
        enabled: enabled != 0,
        repeat_days: weekdays_from_json(&repeat_json),
        sound_ref: row.get(6)?,
        vibrate: vibrate != 0,
        snooze_count: u32::try_from(row.get::<_, i64>(8)?).unwrap_or(0),
        snooze_duration_minutes: u32::try_from(row.get::<_, i64>(9)?).unwrap_or(10),
        last_triggered_at: row.get::<_, Option<i64>>(10)?.and_then(dt_from_secs),
        next_trigger_at: row.get::<_, Option<i64>>(11)?.and_then(dt_from_secs),
        created_at: dt_from_secs(row.get(12)?).unwrap_or_default(),
        updated_at: dt_from_secs(row.get(13)?).unwrap_or_default(),
    })
}

fn dt_from_secs(secs: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
}

// ---------------------------------------------------------------------------
// Enum ↔ string conversions
// ---------------------------------------------------------------------------

fn kind_to_str(kind: ReminderKind) -> &'static str {
    match kind {
        ReminderKind::Time => "time",
        ReminderKind::Location => "location",
    }
}

fn str_to_kind(s: &str) -> ReminderKind {
    match s {
        "location" => ReminderKind::Location,
        _ => ReminderKind::Time,
    }
}

fn status_to_str(status: ReminderStatus) -> &'static str {
    match status {
        ReminderStatus::Pending => "pending",
        ReminderStatus::Completed => "completed",
        ReminderStatus::Cancelled => "cancelled",
    }
}

fn str_to_status(s: &str) -> ReminderStatus {
    match s {
        "completed" => ReminderStatus::Completed,
        "cancelled" => ReminderStatus::Cancelled,
        _ => ReminderStatus::Pending,
    }
}

fn direction_to_str(direction: TriggerDirection) -> &'static str {
    match direction {
        TriggerDirection::Enter => "enter",
        TriggerDirection::Exit => "exit",
        TriggerDirection::Both => "both",
    }
}

fn str_to_direction(s: &str) -> TriggerDirection {
    match s {
        "exit" => TriggerDirection::Exit,
        "both" => TriggerDirection::Both,
        _ => TriggerDirection::Enter,
    }
}

fn policy_to_str(policy: RecurrencePolicy) -> &'static str {
    match policy {
        RecurrencePolicy::Once => "once",
        RecurrencePolicy::EveryTime => "every_time",
        RecurrencePolicy::Daily => "daily",
        RecurrencePolicy::Weekdays => "weekdays",
        RecurrencePolicy::Weekends => "weekends",
    }
}

fn str_to_policy(s: &str) -> RecurrencePolicy {
    match s {
        "every_time" => RecurrencePolicy::EveryTime,
        "daily" => RecurrencePolicy::Daily,
        "weekdays" => RecurrencePolicy::Weekdays,
        "weekends" => RecurrencePolicy::Weekends,
        _ => RecurrencePolicy::Once,
    }
}

fn priority_to_str(priority: Priority) -> &'static str {
    match priority {
        Priority::Low => "low",
        Priority::Normal => "normal",
        Priority::High => "high",
    }
}

fn str_to_priority(s: &str) -> Priority {
    match s {
        "low" => Priority::Low,
        "high" => Priority::High,
        _ => Priority::Normal,
    }
}

fn category_to_str(category: Category) -> &'static str {
    match category {
        Category::General => "general",
        Category::Work => "work",
        Category::Personal => "personal",
        Category::Health => "health",
        Category::Errand => "errand",
    }
}

fn str_to_category(s: &str) -> Category {
    match s {
        "work" => Category::Work,
        "personal" => Category::Personal,
        "health" => Category::Health,
        "errand" => Category::Errand,
        _ => Category::General,
    }
}

fn freq_to_str(freq: RecurrenceFreq) -> &'static str {
    match freq {
        RecurrenceFreq::Daily => "daily",
        RecurrenceFreq::Weekly => "weekly",
        RecurrenceFreq::Monthly => "monthly",
        RecurrenceFreq::Yearly => "yearly",
        RecurrenceFreq::Custom => "custom",
    }
}

fn str_to_freq(s: &str) -> RecurrenceFreq {
    match s {
        "weekly" => RecurrenceFreq::Weekly,
        "monthly" => RecurrenceFreq::Monthly,
        "yearly" => RecurrenceFreq::Yearly,
        "custom" => RecurrenceFreq::Custom,
        _ => RecurrenceFreq::Daily,
    }
}

// ---------------------------------------------------------------------------
// JSON encoding (weekday lists, recurrence rules, time constraints)
// ---------------------------------------------------------------------------

/// Weekdays stored as JSON arrays of Monday-based day numbers (0–6).
fn weekday_to_num(day: Weekday) -> u8 {
    u8::try_from(day.num_days_from_monday()).unwrap_or(0)
}

fn num_to_weekday(n: u64) -> Option<Weekday> {
    match n {
        0 => Some(Weekday::Mon),
        1 => Some(Weekday::Tue),
        2 => Some(Weekday::Wed),
        3 => Some(Weekday::Thu),
        4 => Some(Weekday::Fri),
        5 => Some(Weekday::Sat),
        6 => Some(Weekday::Sun),
        _ => None,
    }
}

fn weekdays_to_json(days: &[Weekday]) -> String {
    let nums: Vec<u8> = days.iter().map(|d| weekday_to_num(*d)).collect();
    serde_json::to_string(&nums).unwrap_or_else(|_| "[]".to_owned())
}

fn weekdays_from_json(s: &str) -> Vec<Weekday> {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(s) else {
        return Vec::new();
    };
    value
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_u64().and_then(num_to_weekday))
                .collect()
        })
        .unwrap_or_default()
}

fn recurrence_to_json(rule: &RecurrenceRule) -> String {
    let days: Vec<u8> = rule.days_of_week.iter().map(|d| weekday_to_num(*d)).collect();
    serde_json::json!({
        "freq": freq_to_str(rule.freq),
        "interval": rule.interval,
        "days_of_week": days,
        "day_of_month": rule.day_of_month,
        "end_date": rule.end_date.map(|t| t.timestamp()),
        "max_occurrences": rule.max_occurrences,
    })
    .to_string()
}

fn recurrence_from_json(s: &str) -> Option<RecurrenceRule> {
    let value: serde_json::Value = serde_json::from_str(s).ok()?;
    let freq = str_to_freq(value.get("freq")?.as_str()?);
    let interval = u32::try_from(value.get("interval")?.as_u64()?).ok()?;
    let days_of_week = value
        .get("days_of_week")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_u64().and_then(num_to_weekday))
                .collect()
        })
        .unwrap_or_default();
    let day_of_month = value
        .get("day_of_month")
        .and_then(|v| v.as_u64())
        .and_then(|n| u32::try_from(n).ok());
    let end_date = value
        .get("end_date")
        .and_then(|v| v.as_i64())
        .and_then(dt_from_secs);
    let max_occurrences = value
        .get("max_occurrences")
        .and_then(|v| v.as_u64())
        .and_then(|n| u32::try_from(n).ok());

    Some(RecurrenceRule {
        freq,
        interval,
        days_of_week,
        day_of_month,
        end_date,
        max_occurrences,
    })
}

fn time_constraint_to_json(constraint: &TimeConstraint) -> String {
    let days: Vec<u8> = constraint
        .days_of_week
        .iter()
        .map(|d| weekday_to_num(*d))
        .collect();
    serde_json::json!({
        "start": constraint.start.format("%H:%M:%S").to_string(),
        "end": constraint.end.format("%H:%M:%S").to_string(),
        "days_of_week": days,
    })
    .to_string()
}

fn time_constraint_from_json(s: &str) -> Option<TimeConstraint> {
    let value: serde_json::Value = serde_json::from_str(s).ok()?;
    let start =
        chrono::NaiveTime::parse_from_str(value.get("start")?.as_str()?, "%H:%M:%S").ok()?;
    let end = chrono::NaiveTime::parse_from_str(value.get("end")?.as_str()?, "%H:%M:%S").ok()?;
    let days_of_week = value
        .get("days_of_week")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_u64().and_then(num_to_weekday))
                .collect()
        })
        .unwrap_or_default();

    Some(TimeConstraint {
        start,
        end,
        days_of_week,
    })
}
