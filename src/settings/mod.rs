//! Settings provider.
//!
//! The engine never reads settings files itself. It pulls a
//! `SettingsSnapshot` from a `SettingsProvider` and acknowledges the change
//! flag once the new values are applied. Validation happens here, so the
//! engine only ever sees in-range durations.

mod auth;
mod error;

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::daemon::write_json_atomic;
use crate::types::{SettingsPatch, TimerSettings};

pub use auth::{clear_auth, load_auth, save_auth, validate_user_name, AuthRecord};
pub use error::SettingsError;

/// Settings as seen by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsSnapshot {
    pub settings: TimerSettings,
    /// True while the provider is still fetching; the engine ignores it then.
    pub is_loading: bool,
}

/// Supplies settings and a change flag to the engine.
pub trait SettingsProvider {
    fn snapshot(&self) -> SettingsSnapshot;

    /// True if the settings changed since the last acknowledgement.
    fn has_changed(&self) -> bool;

    /// Clears the change flag.
    fn acknowledge_change(&mut self);
}

// ============================================================================
// FileSettingsProvider
// ============================================================================

/// Per-user settings stored as a JSON file.
#[derive(Debug, Clone)]
pub struct FileSettingsProvider {
    path: PathBuf,
    settings: TimerSettings,
    changed: bool,
}

impl FileSettingsProvider {
    /// Loads settings from `path`.
    ///
    /// A missing, unreadable or invalid file yields the defaults. The change
    /// flag starts raised so the first sync applies the loaded values.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let settings = match read_settings(&path) {
            Ok(Some(settings)) => settings,
            Ok(None) => {
                debug!("No settings file at {}, using defaults", path.display());
                TimerSettings::default()
            }
            Err(e) => {
                warn!("Ignoring settings file {}: {}", path.display(), e);
                TimerSettings::default()
            }
        };

        Self {
            path,
            settings,
            changed: true,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &TimerSettings {
        &self.settings
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Applies a partial update, validates it and writes it to disk.
    ///
    /// # Errors
    ///
    /// Returns `InvalidValue` for out-of-range values. If the write fails
    /// the in-memory settings are left unchanged.
    pub fn update(&mut self, patch: &SettingsPatch) -> Result<&TimerSettings, SettingsError> {
        let next = self
            .settings
            .patched(patch)
            .map_err(SettingsError::InvalidValue)?;

        write_json_atomic(&self.path, &next)?;

        debug!("Settings saved to {}", self.path.display());
        self.settings = next;
        self.changed = true;
        Ok(&self.settings)
    }
}

fn read_settings(path: &Path) -> Result<Option<TimerSettings>, SettingsError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let settings: TimerSettings = serde_json::from_str(&content)?;
    settings.validate().map_err(SettingsError::InvalidValue)?;
    Ok(Some(settings))
}

impl SettingsProvider for FileSettingsProvider {
    fn snapshot(&self) -> SettingsSnapshot {
        SettingsSnapshot {
            settings: self.settings.clone(),
            is_loading: false,
        }
    }

    fn has_changed(&self) -> bool {
        self.changed
    }

    fn acknowledge_change(&mut self) {
        self.changed = false;
    }
}

// ============================================================================
// MemorySettingsProvider
// ============================================================================

/// In-memory provider for tests.
#[derive(Debug, Clone)]
pub struct MemorySettingsProvider {
    settings: TimerSettings,
    is_loading: bool,
    changed: bool,
}

impl MemorySettingsProvider {
    #[must_use]
    pub fn new(settings: TimerSettings) -> Self {
        Self {
            settings,
            is_loading: false,
            changed: true,
        }
    }

    /// Replaces the settings and raises the change flag.
    pub fn set(&mut self, settings: TimerSettings) {
        self.settings = settings;
        self.changed = true;
    }

    pub fn set_loading(&mut self, is_loading: bool) {
        self.is_loading = is_loading;
    }
}

impl SettingsProvider for MemorySettingsProvider {
    fn snapshot(&self) -> SettingsSnapshot {
        SettingsSnapshot {
            settings: self.settings.clone(),
            is_loading: self.is_loading,
        }
    }

    fn has_changed(&self) -> bool {
        self.changed
    }

    fn acknowledge_change(&mut self) {
        self.changed = false;
    }
}
