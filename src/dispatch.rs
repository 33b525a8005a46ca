//! Trigger-event dispatch.
//!
//! [`TriggerDispatcher`] owns the per-record state machine. Both OS event
//! sources deliver at-least-once with unbounded delay, so every handler
//! reloads current persisted state before acting and treats "already not
//! pending", "still snoozed", and "not due yet" as silent no-ops. The
//! presentation payload is built and sent only after the state transition
//! has been committed to the store.
//!
//! Store failures during dispatch are logged and the event dropped — never
//! retried synchronously. The next organic event (tomorrow's entry, the
//! next exact wake-up) is the natural retry point.

use crate::clock::Clock;
use crate::config::{CooldownConfig, SnoozeConfig};
use crate::model::{
    FirePayload, RecurrencePolicy, Reminder, ReminderStatus, Transition,
};
use crate::recurrence::{is_weekday, is_weekend, next_alarm_trigger, next_occurrence, same_utc_day};
use crate::store::ReminderStore;
use crate::triggers::{SpatialTriggerController, TimeTriggerScheduler, TriggerEvent, TriggerSource};
use chrono::Duration;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// What one delivery resolved to. Suppressions are silent no-ops, not
/// errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A `Fire` payload was emitted.
    Fired,
    /// The event was discarded; the reason is for logs and tests.
    Suppressed(&'static str),
}

/// The orchestrator invoked by either scheduler on event delivery.
pub struct TriggerDispatcher {
    store: Arc<dyn ReminderStore>,
    time_scheduler: Arc<TimeTriggerScheduler>,
    spatial: Arc<SpatialTriggerController>,
    clock: Arc<dyn Clock>,
    snooze_config: SnoozeConfig,
    cooldown_config: CooldownConfig,
    fire_tx: mpsc::UnboundedSender<FirePayload>,
}

impl TriggerDispatcher {
    pub fn new(
        store: Arc<dyn ReminderStore>,
        time_scheduler: Arc<TimeTriggerScheduler>,
        spatial: Arc<SpatialTriggerController>,
        clock: Arc<dyn Clock>,
        snooze_config: SnoozeConfig,
        cooldown_config: CooldownConfig,
        fire_tx: mpsc::UnboundedSender<FirePayload>,
    ) -> Self {
        Self {
            store,
            time_scheduler,
            spatial,
            clock,
            snooze_config,
            cooldown_config,
            fire_tx,
        }
    }

    /// Start the dispatch loop, consuming events until the channel closes.
    pub fn run(self: Arc<Self>, mut event_rx: mpsc::UnboundedReceiver<TriggerEvent>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            info!("trigger dispatcher started");
            while let Some(event) = event_rx.recv().await {
                self.handle_event(&event);
            }
            debug!("trigger event channel closed, dispatcher stopping");
        })
    }

    /// Dispatch one delivery. Errors are logged and the event dropped.
    pub fn handle_event(&self, event: &TriggerEvent) {
        let result = match &event.source {
            TriggerSource::Time { reminder_id } => self.handle_time_trigger(reminder_id),
            TriggerSource::Alarm { alarm_id } => self.handle_alarm_trigger(alarm_id),
            TriggerSource::Spatial { handle, transition } => {
                self.handle_spatial_transition(handle, *transition)
            }
        };

        match result {
            Ok(DispatchOutcome::Fired) => debug!("delivery {} fired", event.delivery_id),
            Ok(DispatchOutcome::Suppressed(reason)) => {
                debug!("delivery {} suppressed: {reason}", event.delivery_id);
            }
            Err(e) => warn!("delivery {} dropped: {e}", event.delivery_id),
        }
    }

    /// Time-trigger delivery for a reminder.
    pub fn handle_time_trigger(&self, reminder_id: &str) -> crate::Result<DispatchOutcome> {
        let Some(reminder) = self.store.get_reminder(reminder_id)? else {
            return Ok(DispatchOutcome::Suppressed("unknown record"));
        };
        if !reminder.is_pending() {
            return Ok(DispatchOutcome::Suppressed("not pending"));
        }

        let now = self.clock.now();
        if reminder.snooze_active(now) {
            // Already re-armed for the later time by the snooze coordinator.
            return Ok(DispatchOutcome::Suppressed("snoozed"));
        }
        // Duplicate delivery of a repeating reminder: the first delivery
        // already moved scheduled_time to the next occurrence.
        if reminder.scheduled_time.is_some_and(|t| t > now) {
            return Ok(DispatchOutcome::Suppressed("not due"));
        }

        // Recurrence advances from the occurrence that fired, not from a
        // snoozed delivery time. Occurrences missed while the device was
        // off collapse into this single firing: step forward until the
        // next occurrence is in the future.
        let base = reminder.scheduled_time.unwrap_or(now);
        let occurrences = reminder.trigger_count + 1;
        let mut next = reminder
            .recurrence
            .as_ref()
            .and_then(|rule| next_occurrence(base, rule, occurrences));
        if let Some(rule) = reminder.recurrence.as_ref() {
            while let Some(n) = next {
                if n > now {
                    break;
                }
                next = next_occurrence(n, rule, occurrences);
            }
        }

        match next {
            Some(next_time) => {
                self.store
                    .mark_fired(&reminder.id, ReminderStatus::Pending, Some(next_time), now)?;
                if let Err(e) = self.time_scheduler.arm(&reminder.id, next_time) {
                    warn!("cannot re-arm {} after firing: {e}", reminder.id);
                }
            }
            None => {
                self.store
                    .mark_fired(&reminder.id, ReminderStatus::Completed, None, now)?;
                if let Err(e) = self.time_scheduler.disarm(&reminder.id) {
                    warn!("cannot disarm {} after completion: {e}", reminder.id);
                }
            }
        }

        self.emit_reminder_fire(&reminder);
        Ok(DispatchOutcome::Fired)
    }

    /// Alarm wake-up delivery.
    pub fn handle_alarm_trigger(&self, alarm_id: &str) -> crate::Result<DispatchOutcome> {
        let Some(alarm) = self.store.get_alarm(alarm_id)? else {
            return Ok(DispatchOutcome::Suppressed("unknown record"));
        };
        if !alarm.enabled {
            return Ok(DispatchOutcome::Suppressed("disabled"));
        }

        let now = self.clock.now();
        // Duplicate delivery: the first one moved next_trigger_at forward
        // (or disabled a one-time alarm).
        if alarm.next_trigger_at.is_some_and(|t| t > now) {
            return Ok(DispatchOutcome::Suppressed("not due"));
        }

        let mut updated = alarm.clone();
        updated.last_triggered_at = Some(now);
        if alarm.is_one_time() {
            updated.enabled = false;
            updated.next_trigger_at = None;
            self.store.update_alarm(&updated)?;
            if let Err(e) = self.time_scheduler.disarm(&alarm.id) {
                warn!("cannot disarm one-time alarm {}: {e}", alarm.id);
            }
        } else {
            let next = next_alarm_trigger(now, alarm.hour, alarm.minute, &alarm.repeat_days);
            updated.next_trigger_at = next;
            self.store.update_alarm(&updated)?;
            match next {
                Some(next_time) => {
                    if let Err(e) = self.time_scheduler.arm(&alarm.id, next_time) {
                        warn!("cannot re-arm alarm {}: {e}", alarm.id);
                    }
                }
                None => warn!("alarm {} has no computable next trigger", alarm.id),
            }
        }

        self.emit_alarm_fire(&updated);
        Ok(DispatchOutcome::Fired)
    }

    /// Spatial-transition delivery for the reminder registered under
    /// `handle`.
    pub fn handle_spatial_transition(
        &self,
        handle: &str,
        transition: Transition,
    ) -> crate::Result<DispatchOutcome> {
        let Some(reminder) = self.store.find_by_spatial_handle(handle)? else {
            return Ok(DispatchOutcome::Suppressed("unknown handle"));
        };
        if !reminder.is_pending() {
            return Ok(DispatchOutcome::Suppressed("not pending"));
        }
        let Some(loc) = reminder.location.clone() else {
            return Ok(DispatchOutcome::Suppressed("no location"));
        };

        let now = self.clock.now();

        // Snooze-until-leave: the Exit that clears the marker restores the
        // configured direction and does not fire.
        if loc.awaiting_exit {
            if transition == Transition::Exit {
                self.store.set_awaiting_exit(&reminder.id, false)?;
                if let Err(e) = self.spatial.update_direction(&reminder, loc.direction) {
                    warn!("cannot restore direction for {}: {e}", reminder.id);
                }
                return Ok(DispatchOutcome::Suppressed("until-leave cleared"));
            }
            return Ok(DispatchOutcome::Suppressed("awaiting exit"));
        }

        if !loc.direction.accepts(transition) {
            return Ok(DispatchOutcome::Suppressed("direction mismatch"));
        }
        if let Some(constraint) = &loc.time_constraint {
            if !constraint.matches(now) {
                return Ok(DispatchOutcome::Suppressed("outside time window"));
            }
        }
        if reminder.snooze_active(now) {
            return Ok(DispatchOutcome::Suppressed("snoozed"));
        }
        match loc.policy {
            RecurrencePolicy::Weekdays if !is_weekday(now) => {
                return Ok(DispatchOutcome::Suppressed("day filter"));
            }
            RecurrencePolicy::Weekends if !is_weekend(now) => {
                return Ok(DispatchOutcome::Suppressed("day filter"));
            }
            _ => {}
        }
        if self.cooldown_blocks(loc.policy, &reminder, now) {
            return Ok(DispatchOutcome::Suppressed("cooldown"));
        }

        if loc.policy == RecurrencePolicy::Once {
            self.store
                .mark_fired(&reminder.id, ReminderStatus::Completed, None, now)?;
            self.store.set_spatial_handle(&reminder.id, None)?;
            if let Err(e) = self.spatial.unregister(&reminder.id) {
                warn!("cannot release region for {}: {e}", reminder.id);
            }
        } else {
            self.store
                .mark_fired(&reminder.id, ReminderStatus::Pending, None, now)?;
        }

        self.emit_reminder_fire(&reminder);
        Ok(DispatchOutcome::Fired)
    }

    /// Whether the policy's cooldown window suppresses a firing at `now`.
    fn cooldown_blocks(
        &self,
        policy: RecurrencePolicy,
        reminder: &Reminder,
        now: chrono::DateTime<chrono::Utc>,
    ) -> bool {
        let Some(last) = reminder.last_triggered_at else {
            return false;
        };
        match policy {
            RecurrencePolicy::Once => false,
            RecurrencePolicy::EveryTime => {
                let minutes = i64::from(self.cooldown_config.every_time_minutes);
                minutes > 0 && now - last < Duration::minutes(minutes)
            }
            RecurrencePolicy::Daily | RecurrencePolicy::Weekdays | RecurrencePolicy::Weekends => {
                same_utc_day(last, now)
            }
        }
    }

    fn emit_reminder_fire(&self, reminder: &Reminder) {
        let title = match reminder
            .location
            .as_ref()
            .and_then(|loc| loc.place_name.as_deref())
        {
            Some(place) => format!("Reminder · {place}"),
            None => "Reminder".to_owned(),
        };
        let payload = FirePayload {
            id: reminder.id.clone(),
            title,
            body: reminder.message.clone(),
            snooze_actions: self.snooze_config.offered_minutes.clone(),
        };
        self.emit(payload, &format!("reminder fired: {}", reminder.message));
    }

    fn emit_alarm_fire(&self, alarm: &crate::model::Alarm) {
        let body = if alarm.label.trim().is_empty() {
            format!("{:02}:{:02}", alarm.hour, alarm.minute)
        } else {
            alarm.label.clone()
        };
        let payload = FirePayload {
            id: alarm.id.clone(),
            title: "Alarm".to_owned(),
            body,
            snooze_actions: vec![alarm.snooze_duration_minutes],
        };
        self.emit(payload, &format!("alarm fired: {}", alarm.label));
    }

    /// Audit and send. Runs strictly after the state transition committed;
    /// audit failure never blocks the notification.
    fn emit(&self, payload: FirePayload, summary: &str) {
        if let Err(e) = self
            .store
            .record_firing(&payload.id, summary, self.clock.now())
        {
            warn!("cannot record firing for {}: {e}", payload.id);
        }
        if self.fire_tx.send(payload).is_err() {
            warn!("fire channel closed, notification payload dropped");
        }
    }
}
