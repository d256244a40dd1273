//! Command definitions for the focusmind CLI.
//!
//! Uses clap derive macro for argument parsing.

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::DEFAULT_FEEDBACK_TIMEOUT_SECS;
use crate::types::{AmbientVariant, SettingsPatch};

// ============================================================================
// CLI Structure
// ============================================================================

/// focusmind - focus timer with session feedback and ambient sound
#[derive(Parser, Debug)]
#[command(
    name = "focusmind",
    version,
    about = "作業と休憩を交互に計測するフォーカスタイマー",
    long_about = "作業と休憩を交互に計測するフォーカスタイマー。\n\
                  作業セッションごとに集中度を評価し、環境音を再生できます。",
    propagate_version = true
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

// ============================================================================
// Subcommands
// ============================================================================

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start a session, or continue a paused one
    Start,

    /// Pause the running session
    Pause,

    /// End the session early and move to the next mode
    Skip,

    /// Discard the current session
    Cancel,

    /// Show current timer status
    Status,

    /// Rate the last work session (1-5)
    Rate(RateArgs),

    /// Show or change settings
    Settings(SettingsArgs),

    /// Sign in as a user
    Login {
        /// User name
        user: String,
    },

    /// Sign out
    Logout,

    /// Save the current session so it can be resumed later
    Suspend,

    /// Restore a saved session
    Resume,

    /// Show statistics of completed work sessions
    Stats,

    /// Run as daemon (background service)
    Daemon(DaemonArgs),

    /// Generate shell completion scripts
    Completions {
        /// Shell type for completion script
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

// ============================================================================
// Rate Command Arguments
// ============================================================================

/// Arguments for the rate command
#[derive(Args, Debug, Clone)]
pub struct RateArgs {
    /// Productivity rating
    #[arg(
        value_parser = clap::value_parser!(u8).range(1..=5),
        required_unless_present = "skip",
        conflicts_with = "skip"
    )]
    pub rating: Option<u8>,

    /// Skip rating this session
    #[arg(long)]
    pub skip: bool,
}

// ============================================================================
// Settings Command Arguments
// ============================================================================

/// On/off switch for ambient sound
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    On,
    Off,
}

/// Arguments for the settings command
#[derive(Args, Debug, Clone, Default)]
pub struct SettingsArgs {
    /// Work duration in minutes (1-120)
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..=120))]
    pub work: Option<u32>,

    /// Break duration in minutes (1-90)
    #[arg(
        short,
        long = "break",
        value_parser = clap::value_parser!(u32).range(1..=90)
    )]
    pub break_minutes: Option<u32>,

    /// Play ambient sound while a session runs
    #[arg(short, long, value_enum)]
    pub ambient: Option<Toggle>,

    /// Ambient sound (e.g. "rainfall", "ocean-waves", "Fire crackling")
    #[arg(long, value_parser = parse_variant)]
    pub variant: Option<AmbientVariant>,
}

impl SettingsArgs {
    /// Builds the patch to send, or `None` if nothing was given.
    pub fn to_patch(&self) -> Option<SettingsPatch> {
        let patch = SettingsPatch {
            work_minutes: self.work,
            break_minutes: self.break_minutes,
            ambient_sound_enabled: self.ambient.map(|t| t == Toggle::On),
            ambient_sound_variant: self.variant.map(|v| v.as_str().to_string()),
        };
        (!patch.is_empty()).then_some(patch)
    }
}

// ============================================================================
// Daemon Command Arguments
// ============================================================================

/// Arguments for the daemon command
#[derive(Args, Debug, Clone)]
pub struct DaemonArgs {
    /// Disable the completion cue and ambient sound
    #[arg(long)]
    pub no_sound: bool,

    /// Seconds before an unanswered rating prompt is skipped
    #[arg(
        long,
        default_value_t = DEFAULT_FEEDBACK_TIMEOUT_SECS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub feedback_timeout: u64,
}

// ============================================================================
// Validation Functions
// ============================================================================

fn parse_variant(s: &str) -> Result<AmbientVariant, String> {
    s.parse()
}

// ============================================================================
// Tests
// ============================================================================
