//! Engine facade: wiring, inbound command API, and boot recovery.
//!
//! [`TriggerEngine`] composes the store, schedulers, dispatcher, and snooze
//! coordinator, and exposes the interface consumed by the command-producer
//! collaborator. Creation-time errors are returned synchronously and never
//! swallowed; dispatch-time errors are the dispatcher's business.

use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::dispatch::TriggerDispatcher;
use crate::error::{EngineError, Result};
use crate::model::{
    CreateAlarm, CreateLocationReminder, CreateTimeReminder, FirePayload, LocationTrigger,
    NewAlarm, NewReminder, ReminderKind, validate_coordinates, validate_message,
};
use crate::recurrence::next_alarm_trigger;
use crate::snooze::SnoozeCoordinator;
use crate::store::ReminderStore;
use crate::triggers::{
    SpatialTriggerController, SpatialTriggerService, TimeTriggerScheduler, TimeTriggerService,
    TriggerEvent,
};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// What a boot/resume recovery pass accomplished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RearmReport {
    /// Time wake-ups newly armed.
    pub time_armed: usize,
    /// Alarm wake-ups newly armed.
    pub alarms_armed: usize,
    /// Geofence regions newly registered.
    pub regions_registered: usize,
    /// Overdue records handed straight to the dispatcher as late
    /// deliveries.
    pub overdue_dispatched: usize,
}

/// The scheduled-trigger engine.
pub struct TriggerEngine {
    store: Arc<dyn ReminderStore>,
    clock: Arc<dyn Clock>,
    time_scheduler: Arc<TimeTriggerScheduler>,
    spatial: Arc<SpatialTriggerController>,
    dispatcher: Arc<TriggerDispatcher>,
    snooze: SnoozeCoordinator,
    event_tx: mpsc::UnboundedSender<TriggerEvent>,
    event_rx: Mutex<Option<mpsc::UnboundedReceiver<TriggerEvent>>>,
}

impl TriggerEngine {
    /// Wire an engine from its injected capabilities.
    ///
    /// `fire_tx` is the presentation side: every emitted [`FirePayload`]
    /// goes there.
    pub fn new(
        store: Arc<dyn ReminderStore>,
        time_service: Arc<dyn TimeTriggerService>,
        spatial_service: Arc<dyn SpatialTriggerService>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
        fire_tx: mpsc::UnboundedSender<FirePayload>,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let time_scheduler = Arc::new(TimeTriggerScheduler::new(time_service, clock.clone()));
        let spatial = Arc::new(SpatialTriggerController::new(
            spatial_service,
            store.clone(),
            clock.clone(),
            config.spatial.clone(),
            event_tx.clone(),
        ));
        let dispatcher = Arc::new(TriggerDispatcher::new(
            store.clone(),
            time_scheduler.clone(),
            spatial.clone(),
            clock.clone(),
            config.snooze.clone(),
            config.cooldown.clone(),
            fire_tx,
        ));
        let snooze = SnoozeCoordinator::new(
            store.clone(),
            time_scheduler.clone(),
            spatial.clone(),
            clock.clone(),
        );

        Self {
            store,
            clock,
            time_scheduler,
            spatial,
            dispatcher,
            snooze,
            event_tx,
            event_rx: Mutex::new(Some(event_rx)),
        }
    }

    /// Start the dispatch loop. Callable once.
    pub fn run(&self) -> Result<tokio::task::JoinHandle<()>> {
        let event_rx = self
            .event_rx
            .lock()
            .map_err(|e| EngineError::Unknown(format!("event receiver lock poisoned: {e}")))?
            .take()
            .ok_or_else(|| EngineError::Channel("dispatcher already running".to_owned()))?;
        Ok(self.dispatcher.clone().run(event_rx))
    }

    // -----------------------------------------------------------------------
    // Inbound command API
    // -----------------------------------------------------------------------

    /// Create a time-based reminder and arm its wake-up. Returns the new id.
    pub fn create_time_reminder(&self, request: CreateTimeReminder) -> Result<String> {
        validate_message(&request.message)?;
        if request.scheduled_time <= self.clock.now() {
            return Err(EngineError::InvalidInput(format!(
                "scheduled time must be in the future (got {})",
                request.scheduled_time
            )));
        }
        if let Some(rule) = &request.recurrence {
            if rule.interval == 0 {
                return Err(EngineError::InvalidInput(
                    "recurrence interval must be at least 1".to_owned(),
                ));
            }
        }

        let reminder = self.store.create_reminder(NewReminder {
            message: request.message,
            kind: ReminderKind::Time,
            scheduled_time: Some(request.scheduled_time),
            location: None,
            recurrence: request.recurrence,
            priority: request.priority,
            category: request.category,
        })?;

        if let Err(e) = self.time_scheduler.arm(&reminder.id, request.scheduled_time) {
            // Creation is all-or-nothing: a record the OS will not wake is
            // not a created reminder.
            let _ = self.store.delete_reminder(&reminder.id);
            return Err(e);
        }

        info!("created time reminder {} at {}", reminder.id, request.scheduled_time);
        Ok(reminder.id)
    }

    /// Create a location-based reminder and register its region. Returns
    /// the new id.
    pub fn create_location_reminder(&self, request: CreateLocationReminder) -> Result<String> {
        validate_message(&request.message)?;
        validate_coordinates(request.latitude, request.longitude, request.radius_meters)?;

        let reminder = self.store.create_reminder(NewReminder {
            message: request.message,
            kind: ReminderKind::Location,
            scheduled_time: None,
            location: Some(LocationTrigger {
                latitude: request.latitude,
                longitude: request.longitude,
                radius_meters: request.radius_meters,
                place_name: request.place_name,
                direction: request.direction,
                policy: request.policy,
                time_constraint: request.time_constraint,
                awaiting_exit: false,
            }),
            recurrence: None,
            priority: request.priority,
            category: request.category,
        })?;

        let handle = match self.spatial.register(&reminder) {
            Ok(handle) => handle,
            Err(e) => {
                let _ = self.store.delete_reminder(&reminder.id);
                return Err(e);
            }
        };
        if let Err(e) = self.store.set_spatial_handle(&reminder.id, Some(&handle)) {
            let _ = self.spatial.unregister(&reminder.id);
            let _ = self.store.delete_reminder(&reminder.id);
            return Err(e.into());
        }

        info!("created location reminder {} ({handle})", reminder.id);
        Ok(reminder.id)
    }

    /// Create an alarm and arm its next wake-up. Returns the new id.
    pub fn create_alarm(&self, request: CreateAlarm) -> Result<String> {
        if request.hour > 23 || request.minute > 59 {
            return Err(EngineError::InvalidInput(format!(
                "invalid alarm time {:02}:{:02}",
                request.hour, request.minute
            )));
        }

        let now = self.clock.now();
        let next = next_alarm_trigger(now, request.hour, request.minute, &request.repeat_days)
            .ok_or_else(|| {
                EngineError::InvalidInput(format!(
                    "cannot compute next trigger for {:02}:{:02}",
                    request.hour, request.minute
                ))
            })?;

        let alarm = self.store.create_alarm(NewAlarm {
            label: request.label,
            hour: request.hour,
            minute: request.minute,
            repeat_days: request.repeat_days,
            sound_ref: request.sound_ref,
            vibrate: request.vibrate,
            snooze_duration_minutes: request.snooze_duration_minutes.max(1),
            next_trigger_at: Some(next),
        })?;

        if let Err(e) = self.time_scheduler.arm(&alarm.id, next) {
            let _ = self.store.delete_alarm(&alarm.id);
            return Err(e);
        }

        info!("created alarm {} at {next}", alarm.id);
        Ok(alarm.id)
    }

    /// Delete a reminder or alarm by id.
    ///
    /// Any live registration is released synchronously before the store
    /// delete completes. Returns `false` when no such record exists.
    pub fn delete(&self, id: &str) -> Result<bool> {
        if let Some(reminder) = self.store.get_reminder(id)? {
            match reminder.kind {
                ReminderKind::Time => self.time_scheduler.disarm(id)?,
                ReminderKind::Location => self.spatial.unregister(id)?,
            }
            let deleted = self.store.delete_reminder(id)?;
            info!("deleted reminder {id}");
            return Ok(deleted);
        }
        if self.store.get_alarm(id)?.is_some() {
            self.time_scheduler.disarm(id)?;
            let deleted = self.store.delete_alarm(id)?;
            info!("deleted alarm {id}");
            return Ok(deleted);
        }
        Ok(false)
    }

    /// Suppress a reminder for `minutes` from now.
    pub fn snooze(&self, id: &str, minutes: u32) -> Result<()> {
        self.snooze.snooze(id, minutes)
    }

    /// Suppress a location reminder until its region is exited.
    pub fn snooze_until_leave(&self, id: &str) -> Result<()> {
        self.snooze.snooze_until_leave(id)
    }

    /// Re-arm an alarm at its configured snooze offset.
    pub fn snooze_alarm(&self, id: &str) -> Result<()> {
        self.snooze.snooze_alarm(id)
    }

    // -----------------------------------------------------------------------
    // Boot / resume recovery
    // -----------------------------------------------------------------------

    /// Bulk idempotent re-arm over everything PENDING.
    ///
    /// Arms only records with no live registration — never duplicates —
    /// and hands records that came due while the process was down straight
    /// to the dispatcher as late deliveries. Safe to run concurrently with
    /// in-flight dispatch; per-record failures are logged and retried on
    /// the next call.
    pub fn rearm_all(&self) -> Result<RearmReport> {
        let now = self.clock.now();
        let mut report = RearmReport::default();

        // Time reminders: a live snooze window overrides the base schedule.
        let mut entries = Vec::new();
        for reminder in self.store.active_time_based()? {
            let target = reminder
                .snoozed_until
                .filter(|until| *until > now)
                .or(reminder.scheduled_time);
            match target {
                Some(at) if at > now => entries.push((reminder.id, at)),
                Some(_) => {
                    if self.event_tx.send(TriggerEvent::time(&reminder.id)).is_ok() {
                        report.overdue_dispatched += 1;
                    }
                }
                None => warn!("time reminder {} has no scheduled time", reminder.id),
            }
        }
        report.time_armed = self.time_scheduler.rearm_all(&entries);

        // Alarms: recompute stale next-trigger stamps, deliver missed ones.
        let mut alarm_entries = Vec::new();
        for alarm in self.store.enabled_alarms()? {
            match alarm.next_trigger_at {
                Some(at) if at > now => alarm_entries.push((alarm.id, at)),
                Some(_) => {
                    if self.event_tx.send(TriggerEvent::alarm(&alarm.id)).is_ok() {
                        report.overdue_dispatched += 1;
                    }
                }
                None => {
                    let Some(next) =
                        next_alarm_trigger(now, alarm.hour, alarm.minute, &alarm.repeat_days)
                    else {
                        warn!("alarm {} has no computable next trigger", alarm.id);
                        continue;
                    };
                    let mut updated = alarm.clone();
                    updated.next_trigger_at = Some(next);
                    self.store.update_alarm(&updated)?;
                    alarm_entries.push((updated.id, next));
                }
            }
        }
        report.alarms_armed = self.time_scheduler.rearm_all(&alarm_entries);

        // Location reminders: re-register lost regions under their old
        // handles. Slot exhaustion is retried opportunistically next pass.
        for reminder in self.store.active_location_based()? {
            if self.spatial.is_registered(&reminder.id) {
                continue;
            }
            match self.spatial.register(&reminder) {
                Ok(handle) => {
                    self.store.set_spatial_handle(&reminder.id, Some(&handle))?;
                    report.regions_registered += 1;
                }
                Err(e) => warn!("cannot re-register region for {}: {e}", reminder.id),
            }
        }

        info!(
            "re-arm pass: {} time, {} alarms, {} regions, {} overdue",
            report.time_armed,
            report.alarms_armed,
            report.regions_registered,
            report.overdue_dispatched
        );
        Ok(report)
    }

    // -----------------------------------------------------------------------
    // OS callback boundary
    // -----------------------------------------------------------------------

    /// Intake for OS exact-wake callbacks. The key is the record id the
    /// wake-up was armed under.
    pub fn deliver_time_wakeup(&self, key: &str) -> Result<()> {
        let event = if key.starts_with("alm-") {
            TriggerEvent::alarm(key)
        } else {
            TriggerEvent::time(key)
        };
        self.event_tx
            .send(event)
            .map_err(|_| EngineError::Channel("trigger event channel closed".to_owned()))
    }

    /// Intake for OS region-transition callbacks.
    pub fn deliver_transition(&self, handle: &str, transition: crate::model::Transition) {
        self.spatial.on_transition(handle, transition);
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// The persistence port this engine was wired with.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn ReminderStore> {
        &self.store
    }

    /// The dispatcher, for synchronous event handling in tests and tools.
    #[must_use]
    pub fn dispatcher(&self) -> &Arc<TriggerDispatcher> {
        &self.dispatcher
    }

    /// The time scheduler, exposing the armed-set mirror.
    #[must_use]
    pub fn time_scheduler(&self) -> &Arc<TimeTriggerScheduler> {
        &self.time_scheduler
    }

    /// The spatial controller, exposing registration state.
    #[must_use]
    pub fn spatial_controller(&self) -> &Arc<SpatialTriggerController> {
        &self.spatial
    }
}
