//! Settings error types.

use thiserror::Error;

/// Errors from the settings provider and the auth file.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// A value is out of range or unknown.
    #[error("設定値が不正です: {0}")]
    InvalidValue(String),

    /// The user name cannot be used.
    #[error("ユーザー名が不正です: {0}")]
    InvalidUser(String),

    /// Reading or writing the settings file failed.
    #[error("設定ファイルの読み書きに失敗しました: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization failed.
    #[error("設定の変換に失敗しました: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The temp file could not replace the settings file.
    #[error("設定ファイルの保存に失敗しました: {0}")]
    Persist(String),
}

impl From<crate::daemon::PersistenceError> for SettingsError {
    fn from(e: crate::daemon::PersistenceError) -> Self {
        use crate::daemon::PersistenceError;
        match e {
            PersistenceError::Io(io) => Self::Io(io),
            PersistenceError::Malformed(json) => Self::Serialize(json),
            PersistenceError::Persist(msg) => Self::Persist(msg),
        }
    }
}
