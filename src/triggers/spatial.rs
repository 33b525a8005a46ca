//! Geofence region registration and transition intake.
//!
//! [`SpatialTriggerController`] is the only component that touches the OS
//! spatial-monitoring port. It owns the finite region-slot budget, filters
//! transitions against the armed direction before dispatch, and forwards
//! qualifying events into the dispatcher channel.

use crate::clock::Clock;
use crate::config::{SlotPolicy, SpatialConfig};
use crate::error::{EngineError, Result};
use crate::model::{Reminder, Transition, TriggerDirection};
use crate::store::ReminderStore;
use crate::triggers::TriggerEvent;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Region handles are derived from the record id, so a reboot re-registers
/// under the same handle it lost.
#[must_use]
pub fn spatial_handle_for(reminder_id: &str) -> String {
    format!("geo-{reminder_id}")
}

/// Parameters of one monitored region.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionSpec {
    pub latitude: f64,
    pub longitude: f64,
    pub radius_meters: f64,
    /// Direction the OS should report for this region.
    pub direction: TriggerDirection,
}

/// OS geofencing capability port.
///
/// The OS imposes a maximum concurrent region count; the controller never
/// exceeds [`max_regions`](SpatialTriggerService::max_regions).
pub trait SpatialTriggerService: Send + Sync {
    /// Create a monitored region. Registering an existing handle replaces
    /// its region.
    fn register_region(&self, handle: &str, region: &RegionSpec) -> Result<()>;

    /// Remove a monitored region. Must be idempotent.
    fn unregister_region(&self, handle: &str) -> Result<()>;

    /// The OS-side cap on concurrent monitored regions.
    fn max_regions(&self) -> usize;
}

/// One live registration, mirrored engine-side.
#[derive(Debug, Clone)]
struct Registration {
    reminder_id: String,
    direction: TriggerDirection,
    registered_at: DateTime<Utc>,
}

/// Registers/unregisters geofenced regions and forwards transition events.
pub struct SpatialTriggerController {
    service: Arc<dyn SpatialTriggerService>,
    store: Arc<dyn ReminderStore>,
    clock: Arc<dyn Clock>,
    config: SpatialConfig,
    event_tx: mpsc::UnboundedSender<TriggerEvent>,
    registrations: Mutex<HashMap<String, Registration>>,
}

impl SpatialTriggerController {
    pub fn new(
        service: Arc<dyn SpatialTriggerService>,
        store: Arc<dyn ReminderStore>,
        clock: Arc<dyn Clock>,
        config: SpatialConfig,
        event_tx: mpsc::UnboundedSender<TriggerEvent>,
    ) -> Self {
        Self {
            service,
            store,
            clock,
            config,
            event_tx,
            registrations: Mutex::new(HashMap::new()),
        }
    }

    /// Register a monitored region for a location reminder.
    ///
    /// Idempotent: a reminder whose region is already live keeps it. At the
    /// slot limit the configured [`SlotPolicy`] applies — reject the new
    /// registration, or evict the oldest to make room.
    pub fn register(&self, reminder: &Reminder) -> Result<String> {
        let loc = reminder.location.as_ref().ok_or_else(|| {
            EngineError::InvalidInput(format!(
                "reminder {} has no location to register",
                reminder.id
            ))
        })?;

        let handle = spatial_handle_for(&reminder.id);
        if self.registrations()?.contains_key(&handle) {
            return Ok(handle);
        }

        let cap = self.config.max_regions.min(self.service.max_regions());
        while self.registrations()?.len() >= cap {
            match self.config.slot_policy {
                SlotPolicy::RejectNew => {
                    return Err(EngineError::Scheduling(format!(
                        "region slots exhausted ({cap} in use), cannot register {}",
                        reminder.id
                    )));
                }
                SlotPolicy::EvictOldest => self.evict_oldest()?,
            }
        }

        // A reminder parked by snooze-until-leave re-arms watching for the
        // Exit that clears it, not its configured direction.
        let direction = if loc.awaiting_exit {
            TriggerDirection::Exit
        } else {
            loc.direction
        };
        let spec = RegionSpec {
            latitude: loc.latitude,
            longitude: loc.longitude,
            radius_meters: loc.radius_meters,
            direction,
        };
        self.service.register_region(&handle, &spec)?;
        self.registrations()?.insert(
            handle.clone(),
            Registration {
                reminder_id: reminder.id.clone(),
                direction,
                registered_at: self.clock.now(),
            },
        );
        debug!("registered region {handle} ({direction:?})");
        Ok(handle)
    }

    /// Remove the monitored region for a reminder. Safe to call when no
    /// registration exists.
    pub fn unregister(&self, reminder_id: &str) -> Result<()> {
        let handle = spatial_handle_for(reminder_id);
        self.service.unregister_region(&handle)?;
        self.registrations()?.remove(&handle);
        debug!("unregistered region {handle}");
        Ok(())
    }

    /// Re-register a reminder's region watching a different direction.
    /// Used by snooze-until-leave to swap Enter↔Exit arming.
    pub fn update_direction(
        &self,
        reminder: &Reminder,
        direction: TriggerDirection,
    ) -> Result<()> {
        let loc = reminder.location.as_ref().ok_or_else(|| {
            EngineError::InvalidInput(format!("reminder {} has no location", reminder.id))
        })?;

        let handle = spatial_handle_for(&reminder.id);
        let spec = RegionSpec {
            latitude: loc.latitude,
            longitude: loc.longitude,
            radius_meters: loc.radius_meters,
            direction,
        };
        self.service.register_region(&handle, &spec)?;

        let mut registrations = self.registrations()?;
        match registrations.get_mut(&handle) {
            Some(registration) => registration.direction = direction,
            None => {
                registrations.insert(
                    handle.clone(),
                    Registration {
                        reminder_id: reminder.id.clone(),
                        direction,
                        registered_at: self.clock.now(),
                    },
                );
            }
        }
        debug!("region {handle} now watching {direction:?}");
        Ok(())
    }

    /// Intake for OS transition callbacks.
    ///
    /// Transitions that do not match the registered direction are discarded
    /// here, before dispatch. Dwell counts as presence (Enter-equivalent).
    pub fn on_transition(&self, handle: &str, transition: Transition) {
        let Ok(registrations) = self.registrations() else {
            warn!("dropping transition for {handle}: registration lock poisoned");
            return;
        };
        let Some(registration) = registrations.get(handle) else {
            debug!("dropping transition for unknown region {handle}");
            return;
        };
        if !registration.direction.accepts(transition) {
            debug!(
                "dropping {transition:?} for {handle}: armed for {:?}",
                registration.direction
            );
            return;
        }
        drop(registrations);

        let event = TriggerEvent::spatial(handle, transition);
        debug!(
            "forwarding {transition:?} for {handle} (delivery {})",
            event.delivery_id
        );
        if self.event_tx.send(event).is_err() {
            warn!("trigger event channel closed, dropping transition for {handle}");
        }
    }

    /// Whether a live registration exists for a reminder.
    pub fn is_registered(&self, reminder_id: &str) -> bool {
        let handle = spatial_handle_for(reminder_id);
        self.registrations()
            .map(|r| r.contains_key(&handle))
            .unwrap_or(false)
    }

    /// Number of live registrations.
    pub fn registered_count(&self) -> usize {
        self.registrations().map(|r| r.len()).unwrap_or(0)
    }

    /// Release the oldest registration and clear its record's handle so the
    /// next bulk re-arm can re-register it when a slot frees up.
    fn evict_oldest(&self) -> Result<()> {
        let oldest = self
            .registrations()?
            .iter()
            .min_by_key(|(_, reg)| reg.registered_at)
            .map(|(handle, reg)| (handle.clone(), reg.reminder_id.clone()));

        let Some((handle, reminder_id)) = oldest else {
            return Err(EngineError::Scheduling(
                "region slots exhausted with nothing to evict".to_owned(),
            ));
        };

        warn!("evicting oldest region {handle} to free a slot");
        self.service.unregister_region(&handle)?;
        self.registrations()?.remove(&handle);
        self.store.set_spatial_handle(&reminder_id, None)?;
        Ok(())
    }

    fn registrations(&self) -> Result<MutexGuard<'_, HashMap<String, Registration>>> {
        self.registrations
            .lock()
            .map_err(|e| EngineError::Unknown(format!("registration lock poisoned: {e}")))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::clock::ManualClock;
    use crate::model::{Category, NewReminder, Priority, RecurrencePolicy, ReminderKind};
    use crate::model::LocationTrigger;
    use crate::store::SqliteStore;
    use crate::testkit::FakeSpatialService;
    use chrono::TimeZone;

    struct Setup {
        controller: SpatialTriggerController,
        service: Arc<FakeSpatialService>,
        store: Arc<SqliteStore>,
        event_rx: mpsc::UnboundedReceiver<TriggerEvent>,
        clock: Arc<ManualClock>,
    }

    fn setup(config: SpatialConfig) -> Setup {
        let service = Arc::new(FakeSpatialService::with_max_regions(8));
        let store = Arc::new(SqliteStore::open_in_memory().expect("store"));
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 3, 4, 9, 0, 0).unwrap(),
        ));
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let controller = SpatialTriggerController::new(
            service.clone(),
            store.clone(),
            clock.clone(),
            config,
            event_tx,
        );
        Setup {
            controller,
            service,
            store,
            event_rx,
            clock,
        }
    }

    fn create_location_reminder(
        store: &SqliteStore,
        direction: TriggerDirection,
    ) -> Reminder {
        use crate::store::ReminderStore as _;
        store
            .create_reminder(NewReminder {
                message: "buy milk".to_owned(),
                kind: ReminderKind::Location,
                scheduled_time: None,
                location: Some(LocationTrigger {
                    latitude: 55.9533,
                    longitude: -3.1883,
                    radius_meters: 150.0,
                    place_name: Some("shop".to_owned()),
                    direction,
                    policy: RecurrencePolicy::EveryTime,
                    time_constraint: None,
                    awaiting_exit: false,
                }),
                recurrence: None,
                priority: Priority::Normal,
                category: Category::Errand,
            })
            .expect("create reminder")
    }

    #[test]
    fn register_is_idempotent_per_reminder() {
        let mut s = setup(SpatialConfig::default());
        let reminder = create_location_reminder(&s.store, TriggerDirection::Enter);

        let first = s.controller.register(&reminder).expect("first register");
        let second = s.controller.register(&reminder).expect("second register");
        assert_eq!(first, second);
        assert_eq!(s.controller.registered_count(), 1);
        assert_eq!(s.service.region_count(), 1);
        assert!(s.event_rx.try_recv().is_err());
    }

    #[test]
    fn reject_new_at_slot_limit() {
        let config = SpatialConfig {
            max_regions: 2,
            slot_policy: SlotPolicy::RejectNew,
        };
        let s = setup(config);
        let a = create_location_reminder(&s.store, TriggerDirection::Enter);
        let b = create_location_reminder(&s.store, TriggerDirection::Enter);
        let c = create_location_reminder(&s.store, TriggerDirection::Enter);

        s.controller.register(&a).expect("register a");
        s.controller.register(&b).expect("register b");
        let result = s.controller.register(&c);
        assert!(matches!(result, Err(EngineError::Scheduling(_))));
        assert_eq!(s.controller.registered_count(), 2);
    }

    #[test]
    fn evict_oldest_frees_a_slot_and_clears_handle() {
        use crate::store::ReminderStore as _;
        let config = SpatialConfig {
            max_regions: 2,
            slot_policy: SlotPolicy::EvictOldest,
        };
        let s = setup(config);
        let a = create_location_reminder(&s.store, TriggerDirection::Enter);
        let b = create_location_reminder(&s.store, TriggerDirection::Enter);
        let c = create_location_reminder(&s.store, TriggerDirection::Enter);

        let handle_a = s.controller.register(&a).expect("register a");
        s.store
            .set_spatial_handle(&a.id, Some(&handle_a))
            .expect("persist handle a");
        s.clock.advance(chrono::Duration::minutes(1));
        s.controller.register(&b).expect("register b");
        s.clock.advance(chrono::Duration::minutes(1));
        s.controller.register(&c).expect("register c evicts a");

        assert_eq!(s.controller.registered_count(), 2);
        assert!(!s.controller.is_registered(&a.id));
        assert!(s.controller.is_registered(&c.id));

        let evicted = s.store.get_reminder(&a.id).expect("get").expect("present");
        assert!(evicted.spatial_handle.is_none());
    }

    #[test]
    fn mismatched_direction_is_discarded_before_dispatch() {
        let mut s = setup(SpatialConfig::default());
        let reminder = create_location_reminder(&s.store, TriggerDirection::Enter);
        let handle = s.controller.register(&reminder).expect("register");

        s.controller.on_transition(&handle, Transition::Exit);
        assert!(s.event_rx.try_recv().is_err());

        s.controller.on_transition(&handle, Transition::Enter);
        let event = s.event_rx.try_recv().expect("event forwarded");
        assert!(matches!(
            event.source,
            crate::triggers::TriggerSource::Spatial {
                transition: Transition::Enter,
                ..
            }
        ));
    }

    #[test]
    fn dwell_counts_as_presence() {
        let mut s = setup(SpatialConfig::default());
        let reminder = create_location_reminder(&s.store, TriggerDirection::Enter);
        let handle = s.controller.register(&reminder).expect("register");

        s.controller.on_transition(&handle, Transition::Dwell);
        assert!(s.event_rx.try_recv().is_ok());
    }

    #[test]
    fn unknown_handle_is_dropped() {
        let mut s = setup(SpatialConfig::default());
        s.controller.on_transition("geo-unknown", Transition::Enter);
        assert!(s.event_rx.try_recv().is_err());
    }

    #[test]
    fn unregister_is_idempotent() {
        let s = setup(SpatialConfig::default());
        let reminder = create_location_reminder(&s.store, TriggerDirection::Enter);
        s.controller.register(&reminder).expect("register");

        s.controller.unregister(&reminder.id).expect("unregister");
        s.controller
            .unregister(&reminder.id)
            .expect("second unregister");
        assert_eq!(s.controller.registered_count(), 0);
        assert_eq!(s.service.region_count(), 0);
    }

    #[test]
    fn update_direction_swaps_the_watched_direction() {
        let mut s = setup(SpatialConfig::default());
        let reminder = create_location_reminder(&s.store, TriggerDirection::Enter);
        let handle = s.controller.register(&reminder).expect("register");

        s.controller
            .update_direction(&reminder, TriggerDirection::Exit)
            .expect("swap to exit");
        s.controller.on_transition(&handle, Transition::Enter);
        assert!(s.event_rx.try_recv().is_err());
        s.controller.on_transition(&handle, Transition::Exit);
        assert!(s.event_rx.try_recv().is_ok());
        assert_eq!(s.controller.registered_count(), 1);
    }
}
