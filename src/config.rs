//! Configuration types for the trigger engine.
//!
//! Snooze and cooldown durations are deliberately configuration rather than
//! constants — the product has shipped with several values over time and
//! none of them is load-bearing.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration for the trigger engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Database file location. `None` = `{data_dir}/remi.db`.
    pub database_path: Option<PathBuf>,
    /// Snooze behavior.
    pub snooze: SnoozeConfig,
    /// Cooldown windows for location re-firing.
    pub cooldown: CooldownConfig,
    /// Geofence slot management.
    pub spatial: SpatialConfig,
}

/// Snooze behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SnoozeConfig {
    /// Default snooze duration in minutes when the caller does not pick one.
    pub default_minutes: u32,
    /// Snooze durations (minutes) offered as notification actions.
    pub offered_minutes: Vec<u32>,
}

impl Default for SnoozeConfig {
    fn default() -> Self {
        Self {
            default_minutes: 10,
            offered_minutes: vec![10, 30, 60],
        }
    }
}

/// Cooldown windows for location-reminder re-firing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CooldownConfig {
    /// Minimum minutes between firings for `EveryTime` reminders.
    /// 0 = fire on every qualifying transition.
    pub every_time_minutes: u32,
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self {
            every_time_minutes: 0,
        }
    }
}

/// What to do when a region registration would exceed the slot limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotPolicy {
    /// Fail the new registration with a scheduling error.
    RejectNew,
    /// Release the oldest registration to make room. The evicted record
    /// loses its arming until the next bulk re-arm finds a free slot.
    EvictOldest,
}

/// Geofence slot management configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpatialConfig {
    /// Engine-side cap on concurrent monitored regions. The effective cap
    /// is the smaller of this and the OS service's own limit.
    pub max_regions: usize,
    /// Behavior at the slot limit.
    pub slot_policy: SlotPolicy,
}

impl Default for SpatialConfig {
    fn default() -> Self {
        Self {
            max_regions: 20,
            slot_policy: SlotPolicy::RejectNew,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file, falling back to defaults for
    /// missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::EngineError::Config(e.to_string()))
    }

    /// Load from the default path, or defaults when no file exists yet.
    pub fn load_or_default() -> Self {
        let path = Self::default_config_path();
        match Self::from_file(&path) {
            Ok(config) => config,
            Err(crate::EngineError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Self::default()
            }
            Err(e) => {
                tracing::warn!("cannot load config from {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Save configuration to a TOML file, creating parent directories as
    /// needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> crate::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| crate::EngineError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `{config_dir}/remi/config.toml`.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        crate::remi_dirs::config_dir().join("config.toml")
    }

    /// Effective database path.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(crate::remi_dirs::database_path)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.snooze.default_minutes > 0);
        assert!(!config.snooze.offered_minutes.is_empty());
        assert!(config.spatial.max_regions > 0);
        assert_eq!(config.spatial.slot_policy, SlotPolicy::RejectNew);
        assert_eq!(config.cooldown.every_time_minutes, 0);
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");

        let mut config = EngineConfig::default();
        config.snooze.default_minutes = 25;
        config.spatial.slot_policy = SlotPolicy::EvictOldest;
        config.save_to_file(&path).expect("save");

        let loaded = EngineConfig::from_file(&path).expect("load");
        assert_eq!(loaded.snooze.default_minutes, 25);
        assert_eq!(loaded.spatial.slot_policy, SlotPolicy::EvictOldest);
    }

    #[test]
    fn from_file_nonexistent_returns_error() {
        let result = EngineConfig::from_file(std::path::Path::new("/nonexistent/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[snooze]\ndefault_minutes = 5\n").expect("write");

        let loaded = EngineConfig::from_file(&path).expect("load");
        assert_eq!(loaded.snooze.default_minutes, 5);
        assert_eq!(loaded.snooze.offered_minutes, vec![10, 30, 60]);
        assert_eq!(loaded.spatial.max_regions, 20);
    }
}
