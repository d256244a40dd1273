//! Sound playback for the focus timer.
//!
//! This module provides:
//!
//! - A one-shot completion cue played when an interval ends
//! - A looping ambient sound that follows the running state of the timer
//! - Graceful degradation when audio is unavailable
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐     ┌──────────────────┐
//! │   TimerEngine    │────▶│ AmbientController│
//! └────────┬─────────┘     └────────┬─────────┘
//!          │ SoundPlayer            │ AmbientBackend
//!          ▼                        ▼
//! ┌───────────────────────────────────────────┐
//! │        RodioAudio (audio thread)          │
//! └───────────────────────────────────────────┘
//! ```
//!
//! Sound files live in the sounds directory: `complete.mp3` for the cue and
//! `<variant>.mp3` for each ambient variant. A missing cue falls back to a
//! synthesized tone.

mod ambient;
mod error;
mod player;
mod source;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

pub use ambient::{AmbientBackend, AmbientCall, AmbientController, MockAmbientBackend};
pub use error::SoundError;
pub use player::{try_create_audio, RodioAudio};
pub use source::{completion_cue, discover_sounds, SoundSource, COMPLETION_CUE_FILE};

/// Trait for one-shot sound playback.
///
/// This trait abstracts the sound playback functionality, allowing for
/// different implementations (e.g., rodio-based, mock for testing).
pub trait SoundPlayer: Send + Sync {
    /// Plays a sound from the given source.
    ///
    /// This method should be non-blocking; the sound plays in the background.
    ///
    /// # Errors
    ///
    /// Returns an error if playback fails.
    fn play(&self, source: &SoundSource) -> Result<(), SoundError>;
}

/// Mock sound player for testing.
#[derive(Debug)]
pub struct MockSoundPlayer {
    play_calls: Mutex<Vec<SoundSource>>,
    should_fail: AtomicBool,
}

impl Default for MockSoundPlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSoundPlayer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            play_calls: Mutex::new(Vec::new()),
            should_fail: AtomicBool::new(false),
        }
    }

    pub fn set_should_fail(&self, should_fail: bool) {
        self.should_fail.store(should_fail, Ordering::SeqCst);
    }

    #[must_use]
    pub fn play_count(&self) -> usize {
        self.play_calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn get_play_calls(&self) -> Vec<SoundSource> {
        self.play_calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear_calls(&self) {
        self.play_calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl SoundPlayer for MockSoundPlayer {
    fn play(&self, source: &SoundSource) -> Result<(), SoundError> {
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(SoundError::PlaybackError("Mock failure".to_string()));
        }
        self.play_calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(source.clone());
        Ok(())
    }
}
