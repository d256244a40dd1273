//! focusmind library
//!
//! This library provides the core functionality of the focusmind timer.
//! It includes:
//! - Timer engine alternating work and break intervals
//! - Productivity feedback and session logging for signed-in users
//! - Ambient sound and completion cue playback
//! - Suspend/resume through persisted snapshots
//! - IPC server/client for daemon-CLI communication
//! - CLI command parsing and display utilities

pub mod cli;
pub mod config;
pub mod daemon;
pub mod session;
pub mod settings;
pub mod sound;
pub mod types;

// Re-export commonly used types for convenience
pub use types::{
    AmbientVariant, IpcRequest, IpcResponse, ResponseData, SessionRecord, SettingsPatch,
    TimerMode, TimerSettings, TimerSnapshot, TimerStatus, TimerView,
};

pub use config::{AppPaths, DaemonOptions};

pub use daemon::{
    Clock, ClockDriver, EventDispatcher, ManualClock, RejectReason, ResumeOutcome, SystemClock,
    TimerEngine, TimerEvent, TransitionOutcome,
};

pub use session::{JsonlSessionLog, MemorySessionLog, SessionLogger, SessionStats};

pub use settings::{FileSettingsProvider, MemorySettingsProvider, SettingsProvider};

// Re-export sound types
pub use sound::{
    AmbientBackend, AmbientController, MockAmbientBackend, MockSoundPlayer, SoundError,
    SoundPlayer, SoundSource,
};
