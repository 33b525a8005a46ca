//! Centralized application directory paths for Remi.
//!
//! Provides a single source of truth for the filesystem paths used by the
//! engine. Uses the [`dirs`] crate for platform-appropriate directory
//! resolution.
//!
//! # Environment Overrides
//!
//! Paths can be overridden for testing or custom deployments:
//! - `REMI_DATA_DIR` — overrides [`data_dir`]
//! - `REMI_CONFIG_DIR` — overrides [`config_dir`]

use std::path::PathBuf;

/// Application data root directory.
///
/// Holds the reminder/alarm database. Resolves to `dirs::data_dir()/remi/`
/// by default; override with the `REMI_DATA_DIR` environment variable.
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("REMI_DATA_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::data_dir()
        .map(|d| d.join("remi"))
        .unwrap_or_else(|| PathBuf::from("/tmp/remi-data"))
}

/// Application config directory.
///
/// Holds `config.toml`. Resolves to `dirs::config_dir()/remi/` by default;
/// override with the `REMI_CONFIG_DIR` environment variable.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("REMI_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join("remi"))
        .unwrap_or_else(|| PathBuf::from("/tmp/remi-config"))
}

/// Default path for the engine database.
#[must_use]
pub fn database_path() -> PathBuf {
    data_dir().join("remi.db")
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn database_path_is_under_data_dir() {
        let db = database_path();
        assert!(db.ends_with("remi.db"));
        assert!(db.starts_with(data_dir()));
    }
}
