//! Core data types for the focus timer.
//!
//! This module defines the data structures used for:
//! - Timer mode and status
//! - Timer settings with validation
//! - The serializable timer snapshot and session record
//! - IPC request/response serialization

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Constants
// ============================================================================

/// Minimum work duration in minutes.
pub const WORK_MIN_MINUTES: u32 = 1;
/// Maximum work duration in minutes.
pub const WORK_MAX_MINUTES: u32 = 120;
/// Minimum break duration in minutes.
pub const BREAK_MIN_MINUTES: u32 = 1;
/// Maximum break duration in minutes.
pub const BREAK_MAX_MINUTES: u32 = 90;
/// Work duration used for signed-out users.
pub const GUEST_WORK_MINUTES: u32 = 45;
/// Break duration used for signed-out users.
pub const GUEST_BREAK_MINUTES: u32 = 10;

// ============================================================================
// TimerMode
// ============================================================================

/// Which interval the timer is counting down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerMode {
    /// Focused work interval
    Work,
    /// Break interval
    Break,
}

impl TimerMode {
    /// Returns the string representation of the mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerMode::Work => "work",
            TimerMode::Break => "break",
        }
    }

    /// Returns the other mode.
    pub fn toggled(&self) -> Self {
        match self {
            TimerMode::Work => TimerMode::Break,
            TimerMode::Break => TimerMode::Work,
        }
    }
}

impl Default for TimerMode {
    fn default() -> Self {
        TimerMode::Work
    }
}

// ============================================================================
// TimerStatus
// ============================================================================

/// Observable state of the timer state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerStatus {
    /// No session in progress
    Idle,
    /// Session in progress and counting down
    Running,
    /// Session in progress but paused
    PausedActive,
    /// Work interval finished, waiting for a productivity rating
    AwaitingFeedback,
}

impl TimerStatus {
    /// Returns the string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerStatus::Idle => "idle",
            TimerStatus::Running => "running",
            TimerStatus::PausedActive => "paused_active",
            TimerStatus::AwaitingFeedback => "awaiting_feedback",
        }
    }
}

// ============================================================================
// AmbientVariant
// ============================================================================

/// Looping ambient sound the user can pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AmbientVariant {
    #[serde(rename = "Rainfall")]
    Rainfall,
    #[serde(rename = "Ocean waves")]
    OceanWaves,
    #[serde(rename = "Wind")]
    Wind,
    #[serde(rename = "Rustling leaves")]
    RustlingLeaves,
    #[serde(rename = "Heartbeat")]
    Heartbeat,
    #[serde(rename = "Fire crackling")]
    FireCrackling,
}

impl AmbientVariant {
    /// All variants in display order.
    pub const ALL: [AmbientVariant; 6] = [
        AmbientVariant::Rainfall,
        AmbientVariant::OceanWaves,
        AmbientVariant::Wind,
        AmbientVariant::RustlingLeaves,
        AmbientVariant::Heartbeat,
        AmbientVariant::FireCrackling,
    ];

    /// Returns the display name.
    pub fn as_str(&self) -> &'static str {
        match self {
            AmbientVariant::Rainfall => "Rainfall",
            AmbientVariant::OceanWaves => "Ocean waves",
            AmbientVariant::Wind => "Wind",
            AmbientVariant::RustlingLeaves => "Rustling leaves",
            AmbientVariant::Heartbeat => "Heartbeat",
            AmbientVariant::FireCrackling => "Fire crackling",
        }
    }

    /// Returns the file stem used for the variant's sound file.
    pub fn slug(&self) -> &'static str {
        match self {
            AmbientVariant::Rainfall => "rainfall",
            AmbientVariant::OceanWaves => "ocean-waves",
            AmbientVariant::Wind => "wind",
            AmbientVariant::RustlingLeaves => "rustling-leaves",
            AmbientVariant::Heartbeat => "heartbeat",
            AmbientVariant::FireCrackling => "fire-crackling",
        }
    }
}

impl Default for AmbientVariant {
    fn default() -> Self {
        AmbientVariant::Rainfall
    }
}

impl fmt::Display for AmbientVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AmbientVariant {
    type Err = String;

    /// Accepts either the display name or the slug, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        AmbientVariant::ALL
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(needle) || v.slug().eq_ignore_ascii_case(needle))
            .ok_or_else(|| format!("不明な環境音です: {}", s))
    }
}

// ============================================================================
// TimerSettings
// ============================================================================

/// Durations and ambient sound preference supplied by the settings provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerSettings {
    /// Work duration in minutes (1-120)
    pub work_minutes: u32,
    /// Break duration in minutes (1-90)
    pub break_minutes: u32,
    /// Whether ambient sound plays while a session runs
    #[serde(default)]
    pub ambient_sound_enabled: bool,
    /// Selected ambient sound
    #[serde(default)]
    pub ambient_sound_variant: AmbientVariant,
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self::guest()
    }
}

impl TimerSettings {
    /// Fixed settings used while nobody is signed in.
    pub fn guest() -> Self {
        Self {
            work_minutes: GUEST_WORK_MINUTES,
            break_minutes: GUEST_BREAK_MINUTES,
            ambient_sound_enabled: false,
            ambient_sound_variant: AmbientVariant::default(),
        }
    }

    /// Creates new settings with the specified work duration.
    pub fn with_work_minutes(mut self, minutes: u32) -> Self {
        self.work_minutes = minutes;
        self
    }

    /// Creates new settings with the specified break duration.
    pub fn with_break_minutes(mut self, minutes: u32) -> Self {
        self.break_minutes = minutes;
        self
    }

    /// Creates new settings with the ambient sound preference.
    pub fn with_ambient(mut self, enabled: bool, variant: AmbientVariant) -> Self {
        self.ambient_sound_enabled = enabled;
        self.ambient_sound_variant = variant;
        self
    }

    /// Returns a copy whose interval in `mode` lasts `seconds`.
    pub fn with_total_seconds(mut self, mode: TimerMode, seconds: u32) -> Self {
        match mode {
            TimerMode::Work => self.work_minutes = seconds / 60,
            TimerMode::Break => self.break_minutes = seconds / 60,
        }
        self
    }

    /// Total seconds of an interval in the given mode.
    pub fn total_seconds(&self, mode: TimerMode) -> u32 {
        match mode {
            TimerMode::Work => self.work_minutes * 60,
            TimerMode::Break => self.break_minutes * 60,
        }
    }

    /// Validates the settings.
    ///
    /// Returns an error message if validation fails.
    pub fn validate(&self) -> Result<(), String> {
        if !(WORK_MIN_MINUTES..=WORK_MAX_MINUTES).contains(&self.work_minutes) {
            return Err(format!(
                "作業時間は{}-{}分の範囲で指定してください",
                WORK_MIN_MINUTES, WORK_MAX_MINUTES
            ));
        }
        if !(BREAK_MIN_MINUTES..=BREAK_MAX_MINUTES).contains(&self.break_minutes) {
            return Err(format!(
                "休憩時間は{}-{}分の範囲で指定してください",
                BREAK_MIN_MINUTES, BREAK_MAX_MINUTES
            ));
        }
        Ok(())
    }

    /// Returns a copy with the patch applied, validated.
    pub fn patched(&self, patch: &SettingsPatch) -> Result<Self, String> {
        let mut next = self.clone();
        if let Some(work) = patch.work_minutes {
            next.work_minutes = work;
        }
        if let Some(brk) = patch.break_minutes {
            next.break_minutes = brk;
        }
        if let Some(enabled) = patch.ambient_sound_enabled {
            next.ambient_sound_enabled = enabled;
        }
        if let Some(variant) = &patch.ambient_sound_variant {
            next.ambient_sound_variant = variant.parse()?;
        }
        next.validate()?;
        Ok(next)
    }
}

// ============================================================================
// TimerSnapshot
// ============================================================================

/// Serializable state of the timer at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    pub mode: TimerMode,
    pub remaining_seconds: u32,
    pub is_paused: bool,
    pub is_active: bool,
    pub session_started_at: Option<DateTime<Utc>>,
    pub captured_at: DateTime<Utc>,
    /// Length of the interval the countdown runs against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_seconds: Option<u32>,
}

impl TimerSnapshot {
    /// Returns true if the snapshot was taken while counting down.
    pub fn is_running(&self) -> bool {
        self.is_active && !self.is_paused
    }

    /// Checks the active flag against the session start time and the
    /// remaining time against the interval length.
    pub fn is_consistent(&self, total_seconds: u32) -> bool {
        self.is_active == self.session_started_at.is_some()
            && self.remaining_seconds <= total_seconds
    }
}

// ============================================================================
// SessionRecord
// ============================================================================

/// A finished work session handed to the session logger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    /// Credited work time in seconds
    pub duration_seconds: u32,
    /// Productivity rating 1-5, or None when skipped
    pub feedback: Option<u8>,
    /// When the session ended
    pub completed_at: DateTime<Utc>,
    /// Signed-in user the session belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

/// Returns true if the rating is within 1-5.
pub fn is_valid_rating(rating: u8) -> bool {
    (1..=5).contains(&rating)
}

// ============================================================================
// TimerView
// ============================================================================

/// What the UI needs to render the timer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerView {
    pub mode: TimerMode,
    pub state: TimerStatus,
    pub remaining_seconds: u32,
    pub total_seconds: u32,
    pub percentage: u8,
    pub is_paused: bool,
    pub is_active: bool,
    pub awaiting_feedback: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

/// Remaining time as a percentage of the interval, clamped to 0-100.
pub fn calculate_percentage(remaining_seconds: u32, total_seconds: u32) -> u8 {
    if total_seconds == 0 {
        return 0;
    }
    if remaining_seconds >= total_seconds {
        return 100;
    }
    let pct = (f64::from(remaining_seconds) / f64::from(total_seconds) * 100.0).round();
    pct.clamp(0.0, 100.0) as u8
}

// ============================================================================
// IPC Types
// ============================================================================

/// Partial settings update sent by the CLI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsPatch {
    /// Work duration in minutes
    #[serde(rename = "workMinutes", skip_serializing_if = "Option::is_none")]
    pub work_minutes: Option<u32>,
    /// Break duration in minutes
    #[serde(rename = "breakMinutes", skip_serializing_if = "Option::is_none")]
    pub break_minutes: Option<u32>,
    /// Ambient sound on/off
    #[serde(rename = "ambientSoundEnabled", skip_serializing_if = "Option::is_none")]
    pub ambient_sound_enabled: Option<bool>,
    /// Ambient sound variant name
    #[serde(rename = "ambientSoundVariant", skip_serializing_if = "Option::is_none")]
    pub ambient_sound_variant: Option<String>,
}

impl SettingsPatch {
    /// Returns true if no field is set.
    pub fn is_empty(&self) -> bool {
        self.work_minutes.is_none()
            && self.break_minutes.is_none()
            && self.ambient_sound_enabled.is_none()
            && self.ambient_sound_variant.is_none()
    }
}

/// IPC request from client to daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum IpcRequest {
    /// Start or continue a session
    Start,
    /// Pause the running session
    Pause,
    /// End the session early and move to the next mode
    Skip,
    /// Discard the session
    Cancel,
    /// Query the current status
    Status,
    /// Submit (or skip with null) the productivity rating
    Feedback {
        #[serde(default)]
        rating: Option<u8>,
    },
    /// Read the signed-in user's settings
    Settings,
    /// Change the signed-in user's settings
    UpdateSettings {
        #[serde(flatten)]
        patch: SettingsPatch,
    },
    /// Sign a user in
    Login { user: String },
    /// Sign the current user out
    Logout,
    /// Persist a snapshot of the running session
    Suspend,
    /// Reconcile the stored snapshot with elapsed time
    Resume,
}

/// Response data for IPC responses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseData {
    /// Current timer view
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timer: Option<TimerView>,
    /// Current settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<TimerSettings>,
}

impl ResponseData {
    /// Creates response data from a timer view.
    pub fn from_view(view: TimerView) -> Self {
        Self {
            timer: Some(view),
            settings: None,
        }
    }

    /// Creates response data carrying settings.
    pub fn from_settings(settings: TimerSettings) -> Self {
        Self {
            timer: None,
            settings: Some(settings),
        }
    }
}

/// IPC response from daemon to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpcResponse {
    /// Response status ("success" or "error")
    pub status: String,
    /// Human-readable message
    pub message: String,
    /// Optional response data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ResponseData>,
}

impl IpcResponse {
    /// Creates a success response.
    pub fn success(message: impl Into<String>, data: Option<ResponseData>) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
            data,
        }
    }

    /// Creates an error response.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
            data: None,
        }
    }

    /// Creates an error response that still carries the current view.
    pub fn rejected(message: impl Into<String>, view: TimerView) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
            data: Some(ResponseData::from_view(view)),
        }
    }

    /// Returns true for a success response.
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }

    /// Returns the timer view, if present.
    pub fn timer(&self) -> Option<&TimerView> {
        self.data.as_ref().and_then(|d| d.timer.as_ref())
    }
}

// ============================================================================
// Tests
// ============================================================================
