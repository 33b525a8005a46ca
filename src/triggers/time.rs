//! Exact-time wake-up arming.
//!
//! [`TimeTriggerScheduler`] wraps the OS scheduling port and keeps an
//! armed-set mirror so bulk re-arm after boot/app-resume never duplicates a
//! registration that is already live.

use crate::clock::Clock;
use crate::error::{EngineError, Result};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

/// OS exact-wake capability port.
///
/// Implementations schedule a callback at a precise instant (best-effort,
/// including during low-power states). Delivery is at-least-once with
/// unbounded delay; the dispatcher compensates.
pub trait TimeTriggerService: Send + Sync {
    /// Schedule a wake-up for `key` at `at`. Re-scheduling an existing key
    /// replaces its previous wake-up.
    fn schedule_wakeup(&self, key: &str, at: DateTime<Utc>) -> Result<()>;

    /// Cancel the wake-up for `key`. Must be idempotent — cancelling an
    /// unknown key is a no-op.
    fn cancel_wakeup(&self, key: &str) -> Result<()>;
}

/// Arms and cancels exact time-based wake-ups.
pub struct TimeTriggerScheduler {
    service: Arc<dyn TimeTriggerService>,
    clock: Arc<dyn Clock>,
    armed: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl TimeTriggerScheduler {
    pub fn new(service: Arc<dyn TimeTriggerService>, clock: Arc<dyn Clock>) -> Self {
        Self {
            service,
            clock,
            armed: Mutex::new(HashMap::new()),
        }
    }

    /// Arm a wake-up for `key` at `at`.
    ///
    /// Fails with `InvalidInput` unless `at` is strictly in the future, and
    /// with `Scheduling` when the OS service refuses (permission denied).
    /// Arming an already-armed key moves its wake-up — never duplicates it.
    pub fn arm(&self, key: &str, at: DateTime<Utc>) -> Result<()> {
        if at <= self.clock.now() {
            return Err(EngineError::InvalidInput(format!(
                "wake-up time must be in the future (got {at})"
            )));
        }

        self.service.schedule_wakeup(key, at)?;
        self.mirror()?.insert(key.to_owned(), at);
        debug!("armed time trigger {key} at {at}");
        Ok(())
    }

    /// Cancel the wake-up for `key`. Safe to call on an already-disarmed key.
    pub fn disarm(&self, key: &str) -> Result<()> {
        self.service.cancel_wakeup(key)?;
        self.mirror()?.remove(key);
        debug!("disarmed time trigger {key}");
        Ok(())
    }

    /// Whether a live wake-up exists for `key`.
    pub fn is_armed(&self, key: &str) -> bool {
        self.mirror().map(|m| m.contains_key(key)).unwrap_or(false)
    }

    /// The instant `key` is armed for, if any.
    pub fn armed_at(&self, key: &str) -> Option<DateTime<Utc>> {
        self.mirror().ok().and_then(|m| m.get(key).copied())
    }

    /// Number of live wake-ups.
    pub fn armed_count(&self) -> usize {
        self.mirror().map(|m| m.len()).unwrap_or(0)
    }

    /// Bulk idempotent re-registration used on boot/app-resume.
    ///
    /// Arms only keys with no existing live wake-up; already-armed keys are
    /// left untouched. Per-entry failures are logged and skipped — the next
    /// re-arm pass is the retry point. Returns the number newly armed.
    pub fn rearm_all(&self, entries: &[(String, DateTime<Utc>)]) -> usize {
        let mut newly_armed = 0;
        for (key, at) in entries {
            if self.is_armed(key) {
                continue;
            }
            match self.arm(key, *at) {
                Ok(()) => newly_armed += 1,
                Err(e) => warn!("cannot re-arm time trigger {key}: {e}"),
            }
        }
        newly_armed
    }

    fn mirror(&self) -> Result<MutexGuard<'_, HashMap<String, DateTime<Utc>>>> {
        self.armed
            .lock()
            .map_err(|e| EngineError::Unknown(format!("armed-set lock poisoned: {e}")))
    }
}
