//! SQLite DDL definitions for the trigger-engine store.
//!
//! All `CREATE TABLE` / `CREATE INDEX` statements live here so they are
//! reviewable and testable in isolation.

use rusqlite::Connection;

/// Complete DDL for the engine database.
///
/// Uses `IF NOT EXISTS` throughout so `apply_schema` is idempotent.
pub(crate) const SCHEMA_SQL: &str = r#"
-- Enable WAL mode for concurrent reads during writes.
PRAGMA journal_mode = WAL;

-- Schema version tracking.
CREATE TABLE IF NOT EXISTS schema_meta (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- Reminder records — mirrors Reminder fields.
CREATE TABLE IF NOT EXISTS reminders (
    id                TEXT PRIMARY KEY,
    message           TEXT NOT NULL,
    kind              TEXT NOT NULL,      -- 'time' | 'location'
    status            TEXT NOT NULL DEFAULT 'pending',
    scheduled_time    INTEGER,            -- epoch secs, time kind only
    latitude          REAL,               -- location kind only
    longitude         REAL,
    radius_meters     REAL,
    place_name        TEXT,
    direction         TEXT,               -- 'enter' | 'exit' | 'both'
    policy            TEXT,               -- location re-firing policy
    time_constraint   TEXT,               -- JSON {start, end, days_of_week}
    awaiting_exit     INTEGER NOT NULL DEFAULT 0,
    recurrence        TEXT,               -- JSON RecurrenceRule
    priority          TEXT NOT NULL DEFAULT 'normal',
    category          TEXT NOT NULL DEFAULT 'general',
    snoozed_until     INTEGER,
    snooze_count      INTEGER NOT NULL DEFAULT 0,
    last_triggered_at INTEGER,
    trigger_count     INTEGER NOT NULL DEFAULT 0,
    spatial_handle    TEXT,
    created_at        INTEGER NOT NULL DEFAULT 0,
    updated_at        INTEGER NOT NULL DEFAULT 0
);

-- Indexes for the dispatcher's query patterns.
CREATE INDEX IF NOT EXISTS idx_reminders_status_kind ON reminders(status, kind);
CREATE INDEX IF NOT EXISTS idx_reminders_spatial     ON reminders(spatial_handle);

-- Alarm records — mirrors Alarm fields.
CREATE TABLE IF NOT EXISTS alarms (
    id                      TEXT PRIMARY KEY,
    label                   TEXT NOT NULL,
    hour                    INTEGER NOT NULL,
    minute                  INTEGER NOT NULL,
    enabled                 INTEGER NOT NULL DEFAULT 1,
    repeat_days             TEXT NOT NULL DEFAULT '[]',  -- JSON array, 0 = Monday
    sound_ref               TEXT,
    vibrate                 INTEGER NOT NULL DEFAULT 1,
    snooze_count            INTEGER NOT NULL DEFAULT 0,
    snooze_duration_minutes INTEGER NOT NULL DEFAULT 10,
    last_triggered_at       INTEGER,
    next_trigger_at         INTEGER,
    created_at              INTEGER NOT NULL DEFAULT 0,
    updated_at              INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_alarms_enabled ON alarms(enabled);

-- Audit trail of emitted firings.
CREATE TABLE IF NOT EXISTS fire_history (
    id        TEXT PRIMARY KEY,
    source_id TEXT NOT NULL,     -- reminder or alarm id
    summary   TEXT NOT NULL,
    at        INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_fire_history_at ON fire_history(at);

"#;

pub(crate) const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Apply the full schema to an open connection.
///
/// Safe to call multiple times — all statements use `IF NOT EXISTS`.
/// Inserts the current schema version into `schema_meta` if not already
/// present.
pub(crate) fn apply_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    let version_str = CURRENT_SCHEMA_VERSION.to_string();
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', ?1)",
        rusqlite::params![version_str],
    )?;

    Ok(())
}

/// Read the current schema version from the database.
///
/// Returns `None` if the `schema_meta` table is empty or the key is missing.
pub(crate) fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<u32>> {
    let mut stmt = conn.prepare("SELECT value FROM schema_meta WHERE key = 'schema_version'")?;
    let mut rows = stmt.query([])?;
    match rows.next()? {
        Some(row) => {
            let val: String = row.get(0)?;
            Ok(val.parse::<u32>().ok())
        }
        None => Ok(None),
    }
}
