//! Deterministic in-process implementations of the trigger service ports.
//!
//! Used by unit tests, the integration suite, and the `remi-sim` scenario
//! harness. Both fakes record what the engine asked of them and can be told
//! to refuse (simulating a revoked OS permission).

use crate::error::{EngineError, Result};
use crate::triggers::{RegionSpec, SpatialTriggerService, TimeTriggerService};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// In-process exact-wake service.
#[derive(Default)]
pub struct FakeTimeService {
    scheduled: Mutex<HashMap<String, DateTime<Utc>>>,
    deny: AtomicBool,
}

impl FakeTimeService {
    /// Make subsequent `schedule_wakeup` calls fail, as when the OS denies
    /// exact-wake permission.
    pub fn deny(&self) {
        self.deny.store(true, Ordering::SeqCst);
    }

    /// Restore normal behavior after [`deny`](Self::deny).
    pub fn allow(&self) {
        self.deny.store(false, Ordering::SeqCst);
    }

    /// The instant `key` is scheduled for, if any.
    pub fn scheduled_at(&self, key: &str) -> Option<DateTime<Utc>> {
        self.scheduled
            .lock()
            .ok()
            .and_then(|s| s.get(key).copied())
    }

    /// Number of live wake-ups.
    pub fn scheduled_count(&self) -> usize {
        self.scheduled.lock().map(|s| s.len()).unwrap_or(0)
    }
}

impl TimeTriggerService for FakeTimeService {
    fn schedule_wakeup(&self, key: &str, at: DateTime<Utc>) -> Result<()> {
        if self.deny.load(Ordering::SeqCst) {
            return Err(EngineError::Scheduling(
                "exact-wake permission denied".to_owned(),
            ));
        }
        self.scheduled
            .lock()
            .map_err(|e| EngineError::Unknown(format!("fake service lock poisoned: {e}")))?
            .insert(key.to_owned(), at);
        Ok(())
    }

    fn cancel_wakeup(&self, key: &str) -> Result<()> {
        self.scheduled
            .lock()
            .map_err(|e| EngineError::Unknown(format!("fake service lock poisoned: {e}")))?
            .remove(key);
        Ok(())
    }
}

/// In-process geofencing service.
pub struct FakeSpatialService {
    regions: Mutex<HashMap<String, RegionSpec>>,
    max: usize,
    deny: AtomicBool,
}

impl Default for FakeSpatialService {
    fn default() -> Self {
        Self::with_max_regions(20)
    }
}

impl FakeSpatialService {
    /// A service whose OS-side slot cap is `max`.
    #[must_use]
    pub fn with_max_regions(max: usize) -> Self {
        Self {
            regions: Mutex::new(HashMap::new()),
            max,
            deny: AtomicBool::new(false),
        }
    }

    /// Make subsequent `register_region` calls fail.
    pub fn deny(&self) {
        self.deny.store(true, Ordering::SeqCst);
    }

    /// The region registered under `handle`, if any.
    pub fn region(&self, handle: &str) -> Option<RegionSpec> {
        self.regions
            .lock()
            .ok()
            .and_then(|r| r.get(handle).cloned())
    }

    /// Number of live regions.
    pub fn region_count(&self) -> usize {
        self.regions.lock().map(|r| r.len()).unwrap_or(0)
    }
}

impl SpatialTriggerService for FakeSpatialService {
    fn register_region(&self, handle: &str, region: &RegionSpec) -> Result<()> {
        if self.deny.load(Ordering::SeqCst) {
            return Err(EngineError::Scheduling(
                "region monitoring unavailable".to_owned(),
            ));
        }
        self.regions
            .lock()
            .map_err(|e| EngineError::Unknown(format!("fake service lock poisoned: {e}")))?
            .insert(handle.to_owned(), region.clone());
        Ok(())
    }

    fn unregister_region(&self, handle: &str) -> Result<()> {
        self.regions
            .lock()
            .map_err(|e| EngineError::Unknown(format!("fake service lock poisoned: {e}")))?
            .remove(handle);
        Ok(())
    }

    fn max_regions(&self) -> usize {
        self.max
    }
}
