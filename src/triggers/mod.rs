//! Trigger arming and OS-event intake.
//!
//! The OS exact-wake and geofencing services are abstracted as two narrow
//! capability ports ([`TimeTriggerService`], [`SpatialTriggerService`])
//! injected into the schedulers. Broadcast-style OS callbacks become
//! [`TriggerEvent`] values pushed through an mpsc channel into the
//! dispatcher, decoupling OS-thread context from business logic.

pub mod spatial;
pub mod time;

pub use spatial::{RegionSpec, SpatialTriggerController, SpatialTriggerService};
pub use time::{TimeTriggerScheduler, TimeTriggerService};

use crate::model::Transition;
use uuid::Uuid;

/// One delivered OS trigger, as consumed by the dispatcher.
///
/// Delivery may be late, duplicated, or arrive after a reboot — the
/// dispatcher treats every event as at-least-once.
#[derive(Debug, Clone)]
pub struct TriggerEvent {
    /// Trace id for correlating log lines across one delivery.
    pub delivery_id: Uuid,
    pub source: TriggerSource,
}

impl TriggerEvent {
    #[must_use]
    pub fn time(reminder_id: impl Into<String>) -> Self {
        Self {
            delivery_id: Uuid::new_v4(),
            source: TriggerSource::Time {
                reminder_id: reminder_id.into(),
            },
        }
    }

    #[must_use]
    pub fn alarm(alarm_id: impl Into<String>) -> Self {
        Self {
            delivery_id: Uuid::new_v4(),
            source: TriggerSource::Alarm {
                alarm_id: alarm_id.into(),
            },
        }
    }

    #[must_use]
    pub fn spatial(handle: impl Into<String>, transition: Transition) -> Self {
        Self {
            delivery_id: Uuid::new_v4(),
            source: TriggerSource::Spatial {
                handle: handle.into(),
                transition,
            },
        }
    }
}

/// Which external service produced an event.
#[derive(Debug, Clone)]
pub enum TriggerSource {
    /// Exact-time wake-up for a time-based reminder.
    Time { reminder_id: String },
    /// Exact-time wake-up for an alarm.
    Alarm { alarm_id: String },
    /// Region transition for a location-based reminder.
    Spatial {
        handle: String,
        transition: Transition,
    },
}
