//! Data directory layout and daemon options.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::time::Duration;

/// Environment variable that overrides the data directory.
pub const HOME_ENV: &str = "FOCUSMIND_HOME";

/// Data directory name under the user's home.
const DATA_DIR_NAME: &str = ".focusmind";

/// Default time a rating prompt stays open.
pub const DEFAULT_FEEDBACK_TIMEOUT_SECS: u64 = 120;

/// Locations of every file the daemon and CLI use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    base: PathBuf,
}

impl AppPaths {
    /// Resolves the data directory from `FOCUSMIND_HOME` or the home directory.
    ///
    /// # Errors
    ///
    /// Returns an error if neither is available.
    pub fn resolve() -> Result<Self> {
        if let Some(dir) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
            return Ok(Self::new(PathBuf::from(dir)));
        }
        let home = dirs::home_dir().context("ホームディレクトリが見つかりません")?;
        Ok(Self::new(home.join(DATA_DIR_NAME)))
    }

    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn socket_path(&self) -> PathBuf {
        self.base.join("focusmind.sock")
    }

    /// Stored timer snapshot.
    pub fn snapshot_path(&self) -> PathBuf {
        self.base.join("timer_state.json")
    }

    /// Settings file of one user.
    pub fn settings_path(&self, user: &str) -> PathBuf {
        self.base.join("settings").join(format!("{user}.json"))
    }

    pub fn auth_path(&self) -> PathBuf {
        self.base.join("auth.json")
    }

    pub fn sessions_path(&self) -> PathBuf {
        self.base.join("sessions.jsonl")
    }

    pub fn sounds_dir(&self) -> PathBuf {
        self.base.join("sounds")
    }
}

/// Runtime options of the daemon.
#[derive(Debug, Clone)]
pub struct DaemonOptions {
    pub paths: AppPaths,
    /// Disable the completion cue and ambient sound
    pub no_sound: bool,
    pub feedback_timeout: Duration,
}

impl DaemonOptions {
    pub fn new(paths: AppPaths) -> Self {
        Self {
            paths,
            no_sound: false,
            feedback_timeout: Duration::from_secs(DEFAULT_FEEDBACK_TIMEOUT_SECS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_under_base() {
        let paths = AppPaths::new("/data");
        assert_eq!(paths.socket_path(), PathBuf::from("/data/focusmind.sock"));
        assert_eq!(paths.snapshot_path(), PathBuf::from("/data/timer_state.json"));
        assert_eq!(paths.settings_path("alice"), PathBuf::from("/data/settings/alice.json"));
        assert_eq!(paths.auth_path(), PathBuf::from("/data/auth.json"));
        assert_eq!(paths.sessions_path(), PathBuf::from("/data/sessions.jsonl"));
        assert_eq!(paths.sounds_dir(), PathBuf::from("/data/sounds"));
    }

    #[test]
    fn test_default_options() {
        let options = DaemonOptions::new(AppPaths::new("/data"));
        assert!(!options.no_sound);
        assert_eq!(options.feedback_timeout, Duration::from_secs(120));
    }
}
