//! Signed-in user persistence.
//!
//! The daemon remembers who is signed in across restarts in `auth.json`.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::error::SettingsError;
use crate::daemon::write_json_atomic;

/// Maximum user name length.
const MAX_USER_NAME_LEN: usize = 64;

/// Contents of `auth.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthRecord {
    pub user: String,
    pub signed_in_at: DateTime<Utc>,
}

/// Checks that a user name is safe to use as a file name.
///
/// # Errors
///
/// Returns `InvalidUser` unless the name is 1-64 characters of ASCII
/// letters, digits, `_`, `.` or `-`, and not `.` or `..`.
pub fn validate_user_name(user: &str) -> Result<(), SettingsError> {
    let valid_chars = user
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));

    if user.is_empty()
        || user.len() > MAX_USER_NAME_LEN
        || !valid_chars
        || user == "."
        || user == ".."
    {
        return Err(SettingsError::InvalidUser(user.to_string()));
    }
    Ok(())
}

/// Reads the signed-in user, if any. An unreadable file counts as signed out.
pub fn load_auth(path: &Path) -> Option<AuthRecord> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!("Failed to read {}: {}", path.display(), e);
            return None;
        }
    };

    match serde_json::from_str::<AuthRecord>(&content) {
        Ok(record) if validate_user_name(&record.user).is_ok() => Some(record),
        Ok(record) => {
            warn!("Ignoring invalid user in {}: {}", path.display(), record.user);
            None
        }
        Err(e) => {
            warn!("Ignoring malformed {}: {}", path.display(), e);
            None
        }
    }
}

/// Records the signed-in user.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn save_auth(path: &Path, record: &AuthRecord) -> Result<(), SettingsError> {
    write_json_atomic(path, record)?;
    Ok(())
}

/// Forgets the signed-in user.
///
/// # Errors
///
/// Returns an error if the file exists and cannot be removed.
pub fn clear_auth(path: &Path) -> Result<(), SettingsError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod user_names {
        use super::*;

        #[test]
        fn test_valid_names() {
            for name in ["alice", "bob_2", "a.b-c", "X"] {
                assert!(validate_user_name(name).is_ok(), "{name}");
            }
        }

        #[test]
        fn test_invalid_names() {
            let long = "a".repeat(65);
            for name in ["", ".", "..", "a/b", "a b", "ユーザー", long.as_str()] {
                assert!(validate_user_name(name).is_err(), "{name}");
            }
        }
    }

    mod auth_file {
        use super::*;

        fn record() -> AuthRecord {
            AuthRecord {
                user: "alice".to_string(),
                signed_in_at: Utc::now(),
            }
        }

        #[test]
        fn test_save_load_clear() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("auth.json");

            save_auth(&path, &record()).unwrap();
            assert_eq!(load_auth(&path).map(|r| r.user), Some("alice".to_string()));

            clear_auth(&path).unwrap();
            assert!(load_auth(&path).is_none());
            clear_auth(&path).unwrap();
        }

        #[test]
        fn test_malformed_file_is_signed_out() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("auth.json");
            fs::write(&path, "garbage").unwrap();
            assert!(load_auth(&path).is_none());
        }

        #[test]
        fn test_invalid_user_in_file_is_signed_out() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("auth.json");
            fs::write(&path, r#"{"user":"../etc","signedInAt":"2026-01-01T00:00:00Z"}"#)
                .unwrap();
            assert!(load_auth(&path).is_none());
        }
    }
}
