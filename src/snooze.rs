//! Snooze coordination.
//!
//! Mutates a record's suppression window and re-arms the appropriate
//! scheduler. For time-based records the snooze is a one-off override of
//! the wake-up — the recurrence base (`scheduled_time`) is never touched.
//! Location records keep their region registered and rely on the
//! dispatcher's snooze gate instead.

use crate::clock::Clock;
use crate::error::{EngineError, Result};
use crate::model::{Reminder, ReminderKind, TriggerDirection};
use crate::store::ReminderStore;
use crate::triggers::{SpatialTriggerController, TimeTriggerScheduler};
use chrono::Duration;
use std::sync::Arc;
use tracing::debug;

pub struct SnoozeCoordinator {
    store: Arc<dyn ReminderStore>,
    time_scheduler: Arc<TimeTriggerScheduler>,
    spatial: Arc<SpatialTriggerController>,
    clock: Arc<dyn Clock>,
}

impl SnoozeCoordinator {
    pub fn new(
        store: Arc<dyn ReminderStore>,
        time_scheduler: Arc<TimeTriggerScheduler>,
        spatial: Arc<SpatialTriggerController>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            time_scheduler,
            spatial,
            clock,
        }
    }

    /// Suppress a reminder for `minutes` from now.
    ///
    /// Time-based records are disarmed and re-armed at the snooze deadline;
    /// location records stay registered and the dispatcher's snooze gate
    /// holds firings back until the window elapses.
    pub fn snooze(&self, id: &str, minutes: u32) -> Result<()> {
        if minutes == 0 {
            return Err(EngineError::InvalidInput(
                "snooze duration must be at least one minute".to_owned(),
            ));
        }
        let reminder = self.load_pending(id)?;

        let until = self.clock.now() + Duration::minutes(i64::from(minutes));
        self.store
            .set_snooze(id, Some(until), reminder.snooze_count + 1)?;

        if reminder.kind == ReminderKind::Time {
            self.time_scheduler.disarm(id)?;
            self.time_scheduler.arm(id, until)?;
        }
        debug!("snoozed {id} until {until}");
        Ok(())
    }

    /// Suppress a location reminder until the user leaves its region.
    ///
    /// Arms the region for the next Exit only; once that Exit is observed
    /// the dispatcher clears the marker and restores the configured
    /// direction.
    pub fn snooze_until_leave(&self, id: &str) -> Result<()> {
        let reminder = self.load_pending(id)?;
        let Some(loc) = reminder.location.as_ref() else {
            return Err(EngineError::InvalidInput(format!(
                "snooze-until-leave applies to location reminders only: {id}"
            )));
        };
        if loc.direction == TriggerDirection::Exit {
            return Err(EngineError::InvalidInput(format!(
                "reminder {id} already fires on exit"
            )));
        }

        self.store.set_awaiting_exit(id, true)?;
        self.spatial
            .update_direction(&reminder, TriggerDirection::Exit)?;
        debug!("snoozed {id} until next region exit");
        Ok(())
    }

    /// Re-arm an alarm at now + its configured snooze duration.
    pub fn snooze_alarm(&self, id: &str) -> Result<()> {
        let Some(alarm) = self.store.get_alarm(id)? else {
            return Err(EngineError::InvalidInput(format!("unknown alarm: {id}")));
        };
        if !alarm.enabled {
            return Err(EngineError::InvalidInput(format!(
                "cannot snooze disabled alarm: {id}"
            )));
        }

        let next = self.clock.now() + Duration::minutes(i64::from(alarm.snooze_duration_minutes));
        let mut updated = alarm;
        updated.snooze_count += 1;
        updated.next_trigger_at = Some(next);
        self.store.update_alarm(&updated)?;

        self.time_scheduler.disarm(id)?;
        self.time_scheduler.arm(id, next)?;
        debug!("snoozed alarm {id} until {next}");
        Ok(())
    }

    fn load_pending(&self, id: &str) -> Result<Reminder> {
        let Some(reminder) = self.store.get_reminder(id)? else {
            return Err(EngineError::InvalidInput(format!("unknown reminder: {id}")));
        };
        if !reminder.is_pending() {
            return Err(EngineError::InvalidInput(format!(
                "cannot snooze a non-pending reminder: {id}"
            )));
        }
        Ok(reminder)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::clock::ManualClock;
    use crate::config::SpatialConfig;
    use crate::model::{
        Category, LocationTrigger, NewAlarm, NewReminder, Priority, RecurrencePolicy,
        ReminderStatus,
    };
    use crate::store::SqliteStore;
    use crate::testkit::{FakeSpatialService, FakeTimeService};
    use crate::triggers::TriggerEvent;
    use chrono::{TimeZone, Utc};
    use tokio::sync::mpsc;

    struct TestBed {
        coordinator: SnoozeCoordinator,
        store: Arc<SqliteStore>,
        time_scheduler: Arc<TimeTriggerScheduler>,
        spatial: Arc<SpatialTriggerController>,
        clock: Arc<ManualClock>,
        _event_rx: mpsc::UnboundedReceiver<TriggerEvent>,
    }

    fn testbed() -> TestBed {
        let start = Utc.with_ymd_and_hms(2026, 3, 4, 9, 0, 0).unwrap();
        let store = Arc::new(SqliteStore::open_in_memory().expect("store"));
        let clock = Arc::new(ManualClock::new(start));
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let time_scheduler = Arc::new(TimeTriggerScheduler::new(
            Arc::new(FakeTimeService::default()),
            clock.clone(),
        ));
        let spatial = Arc::new(SpatialTriggerController::new(
            Arc::new(FakeSpatialService::default()),
            store.clone(),
            clock.clone(),
            SpatialConfig::default(),
            event_tx,
        ));
        let coordinator = SnoozeCoordinator::new(
            store.clone(),
            time_scheduler.clone(),
            spatial.clone(),
            clock.clone(),
        );
        TestBed {
            coordinator,
            store,
            time_scheduler,
            spatial,
            clock,
            _event_rx: event_rx,
        }
    }

    fn create_time_reminder(bed: &TestBed) -> Reminder {
        use crate::store::ReminderStore as _;
        let at = bed.clock.now() + chrono::Duration::hours(1);
        let reminder = bed
            .store
            .create_reminder(NewReminder {
                message: "stretch".to_owned(),
                kind: ReminderKind::Time,
                scheduled_time: Some(at),
                location: None,
                recurrence: None,
                priority: Priority::Normal,
                category: Category::Health,
            })
            .expect("create");
        bed.time_scheduler.arm(&reminder.id, at).expect("arm");
        reminder
    }

    fn create_location_reminder(bed: &TestBed) -> Reminder {
        use crate::store::ReminderStore as _;
        let reminder = bed
            .store
            .create_reminder(NewReminder {
                message: "water plants".to_owned(),
                kind: ReminderKind::Location,
                scheduled_time: None,
                location: Some(LocationTrigger {
                    latitude: 55.9533,
                    longitude: -3.1883,
                    radius_meters: 100.0,
                    place_name: Some("home".to_owned()),
                    direction: TriggerDirection::Enter,
                    policy: RecurrencePolicy::Daily,
                    time_constraint: None,
                    awaiting_exit: false,
                }),
                recurrence: None,
                priority: Priority::Normal,
                category: Category::Personal,
            })
            .expect("create");
        let handle = bed.spatial.register(&reminder).expect("register");
        bed.store
            .set_spatial_handle(&reminder.id, Some(&handle))
            .expect("handle");
        reminder
    }

    #[test]
    fn snooze_time_reminder_moves_the_wakeup() {
        use crate::store::ReminderStore as _;
        let bed = testbed();
        let reminder = create_time_reminder(&bed);

        bed.coordinator.snooze(&reminder.id, 30).expect("snooze");

        let until = bed.clock.now() + chrono::Duration::minutes(30);
        let loaded = bed
            .store
            .get_reminder(&reminder.id)
            .expect("get")
            .expect("present");
        assert_eq!(loaded.snoozed_until, Some(until));
        assert_eq!(loaded.snooze_count, 1);
        // One wake-up, at the snooze deadline — not at the original time.
        assert_eq!(bed.time_scheduler.armed_count(), 1);
        assert_eq!(bed.time_scheduler.armed_at(&reminder.id), Some(until));
        // Recurrence base untouched.
        assert_eq!(loaded.scheduled_time, reminder.scheduled_time);
    }

    #[test]
    fn snooze_location_reminder_keeps_registration() {
        use crate::store::ReminderStore as _;
        let bed = testbed();
        let reminder = create_location_reminder(&bed);

        bed.coordinator.snooze(&reminder.id, 15).expect("snooze");

        assert!(bed.spatial.is_registered(&reminder.id));
        let loaded = bed
            .store
            .get_reminder(&reminder.id)
            .expect("get")
            .expect("present");
        assert!(loaded.snooze_active(bed.clock.now()));
    }

    #[test]
    fn snooze_rejects_zero_minutes_and_unknown_ids() {
        let bed = testbed();
        let reminder = create_time_reminder(&bed);

        assert!(matches!(
            bed.coordinator.snooze(&reminder.id, 0),
            Err(EngineError::InvalidInput(_))
        ));
        assert!(matches!(
            bed.coordinator.snooze("rem-missing", 10),
            Err(EngineError::InvalidInput(_))
        ));
    }

    #[test]
    fn snooze_rejects_completed_reminders() {
        use crate::store::ReminderStore as _;
        let bed = testbed();
        let reminder = create_time_reminder(&bed);
        bed.store
            .set_status(&reminder.id, ReminderStatus::Completed)
            .expect("complete");

        assert!(matches!(
            bed.coordinator.snooze(&reminder.id, 10),
            Err(EngineError::InvalidInput(_))
        ));
    }

    #[test]
    fn snooze_until_leave_sets_marker_and_swaps_direction() {
        use crate::store::ReminderStore as _;
        let bed = testbed();
        let reminder = create_location_reminder(&bed);

        bed.coordinator
            .snooze_until_leave(&reminder.id)
            .expect("snooze until leave");

        let loaded = bed
            .store
            .get_reminder(&reminder.id)
            .expect("get")
            .expect("present");
        assert!(loaded.location.expect("loc").awaiting_exit);
        assert!(bed.spatial.is_registered(&reminder.id));
    }

    #[test]
    fn snooze_until_leave_rejects_non_location_reminders() {
        let bed = testbed();
        let time_reminder = create_time_reminder(&bed);
        assert!(matches!(
            bed.coordinator.snooze_until_leave(&time_reminder.id),
            Err(EngineError::InvalidInput(_))
        ));
    }

    #[test]
    fn snooze_alarm_rearms_at_configured_duration() {
        use crate::store::ReminderStore as _;
        let bed = testbed();
        let next = bed.clock.now() + chrono::Duration::hours(8);
        let alarm = bed
            .store
            .create_alarm(NewAlarm {
                label: "wake up".to_owned(),
                hour: 7,
                minute: 0,
                repeat_days: Vec::new(),
                sound_ref: None,
                vibrate: true,
                snooze_duration_minutes: 9,
                next_trigger_at: Some(next),
            })
            .expect("create alarm");
        bed.time_scheduler.arm(&alarm.id, next).expect("arm");

        bed.coordinator.snooze_alarm(&alarm.id).expect("snooze");

        let expected = bed.clock.now() + chrono::Duration::minutes(9);
        let loaded = bed.store.get_alarm(&alarm.id).expect("get").expect("present");
        assert_eq!(loaded.next_trigger_at, Some(expected));
        assert_eq!(loaded.snooze_count, 1);
        assert_eq!(bed.time_scheduler.armed_at(&alarm.id), Some(expected));
    }
}
