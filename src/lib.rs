//! Remi: scheduled-trigger engine for a personal assistant.
//!
//! Persists reminders and alarms, computes recurrence, arms OS-level time
//! wake-ups and geofence triggers, and — on trigger delivery — decides
//! exactly what fires, exactly once, with snooze, cooldown, and hybrid
//! time+location gating.
//!
//! # Architecture
//!
//! The engine reconciles three independent, unreliable async event sources
//! (exact-time wake-ups, region transitions, process restarts) against a
//! single source of truth:
//! - **Store**: SQLite persistence port; every dispatch decision reloads
//!   current state from here first
//! - **Schedulers**: arm/cancel wake-ups and regions through two narrow OS
//!   capability ports
//! - **Dispatcher**: the idempotent state machine consuming trigger events
//!   from an mpsc channel
//! - **Snooze coordinator**: suppression windows and until-leave parking
//!
//! OS services deliver at-least-once with unbounded delay; duplicate and
//! late deliveries are suppressed by reload-and-check, never by trusting
//! the delivery itself.

pub mod clock;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod model;
pub mod recurrence;
pub mod remi_dirs;
pub mod snooze;
pub mod store;
pub mod testkit;
pub mod triggers;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::EngineConfig;
pub use dispatch::{DispatchOutcome, TriggerDispatcher};
pub use engine::{RearmReport, TriggerEngine};
pub use error::{EngineError, Result};
pub use model::{
    Alarm, CreateAlarm, CreateLocationReminder, CreateTimeReminder, FirePayload, Reminder,
    ReminderStatus, Transition,
};
pub use store::{ReminderStore, SqliteStore};
pub use triggers::{SpatialTriggerService, TimeTriggerService, TriggerEvent};
