//! Ambient sound control.
//!
//! `AmbientController` decides when the looping background sound plays.
//! It follows the running state of the timer and the user's ambient
//! preference, and talks to an `AmbientBackend` that does the actual audio
//! work. Backend failures are logged and never reach the timer.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, warn};

use super::error::SoundError;
use super::source::SoundSource;
use crate::types::AmbientVariant;

/// Low-level ambient playback operations.
pub trait AmbientBackend: Send + Sync {
    /// Selects the looping source. Any current playback is dropped.
    fn load(&self, source: &SoundSource) -> Result<(), SoundError>;

    /// Starts or resumes the loaded source.
    fn play(&self) -> Result<(), SoundError>;

    /// Pauses playback, keeping the position.
    fn pause(&self) -> Result<(), SoundError>;

    /// Resets the position so the next play starts from the beginning.
    fn rewind(&self) -> Result<(), SoundError>;
}

/// Keeps ambient playback in step with the timer.
pub struct AmbientController {
    backend: Option<Arc<dyn AmbientBackend>>,
    sounds_dir: PathBuf,
    enabled: bool,
    variant: AmbientVariant,
    loaded: Option<SoundSource>,
    playing: bool,
}

impl AmbientController {
    /// Creates a controller driving the given backend.
    ///
    /// The preference starts disabled until `set_preference` is called.
    pub fn new(backend: Arc<dyn AmbientBackend>, sounds_dir: impl Into<PathBuf>) -> Self {
        Self {
            backend: Some(backend),
            sounds_dir: sounds_dir.into(),
            enabled: false,
            variant: AmbientVariant::default(),
            loaded: None,
            playing: false,
        }
    }

    /// Creates a controller with no backend. Every call is a no-op.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            backend: None,
            sounds_dir: PathBuf::new(),
            enabled: false,
            variant: AmbientVariant::default(),
            loaded: None,
            playing: false,
        }
    }

    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    #[must_use]
    pub fn preference(&self) -> (bool, AmbientVariant) {
        (self.enabled, self.variant)
    }

    /// Plays ambient sound when `should_play` is true and the preference
    /// allows it; otherwise stops and rewinds.
    pub fn set_enabled(&mut self, should_play: bool) {
        if should_play && self.enabled {
            self.start();
        } else {
            self.stop();
        }
    }

    /// Applies a new ambient preference.
    ///
    /// A variant change while playing switches to the new source without
    /// interrupting. Disabling the preference stops playback.
    pub fn set_preference(&mut self, enabled: bool, variant: AmbientVariant) {
        let variant_changed = variant != self.variant;
        self.enabled = enabled;
        self.variant = variant;

        if !enabled {
            if self.playing {
                self.stop();
            }
            return;
        }

        if !variant_changed {
            return;
        }

        if self.playing {
            self.playing = false;
            self.start();
        } else if self.loaded.is_some() {
            let source = self.source();
            if self.call("load", |b| b.load(&source)) {
                self.loaded = Some(source);
            }
        }
    }

    fn source(&self) -> SoundSource {
        SoundSource::ambient(self.variant, &self.sounds_dir)
    }

    fn start(&mut self) {
        if self.playing || self.backend.is_none() {
            return;
        }
        let source = self.source();
        if self.loaded.as_ref() != Some(&source) {
            if !self.call("load", |b| b.load(&source)) {
                return;
            }
            self.loaded = Some(source);
        }
        if self.call("play", |b| b.play()) {
            debug!("Ambient sound on ({})", self.variant);
            self.playing = true;
        }
    }

    fn stop(&mut self) {
        if !self.playing {
            return;
        }
        self.call("pause", |b| b.pause());
        self.call("rewind", |b| b.rewind());
        debug!("Ambient sound off");
        self.playing = false;
    }

    fn call<F>(&self, op: &str, f: F) -> bool
    where
        F: FnOnce(&dyn AmbientBackend) -> Result<(), SoundError>,
    {
        let Some(backend) = &self.backend else {
            return false;
        };
        match f(backend.as_ref()) {
            Ok(()) => true,
            Err(e) => {
                warn!("Ambient {} failed: {}", op, e);
                false
            }
        }
    }
}

impl std::fmt::Debug for AmbientController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AmbientController")
            .field("has_backend", &self.backend.is_some())
            .field("enabled", &self.enabled)
            .field("variant", &self.variant)
            .field("playing", &self.playing)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Mock
// ============================================================================

/// A recorded call on `MockAmbientBackend`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AmbientCall {
    Load(SoundSource),
    Play,
    Pause,
    Rewind,
}

/// Mock ambient backend for testing.
#[derive(Debug, Default)]
pub struct MockAmbientBackend {
    calls: Mutex<Vec<AmbientCall>>,
    should_fail: AtomicBool,
}

impl MockAmbientBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_should_fail(&self, should_fail: bool) {
        self.should_fail.store(should_fail, Ordering::SeqCst);
    }

    #[must_use]
    pub fn calls(&self) -> Vec<AmbientCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear_calls(&self) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// True if the last play-state call was `Play`.
    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.calls()
            .iter()
            .rev()
            .find(|c| !matches!(c, AmbientCall::Load(_)))
            .is_some_and(|c| *c == AmbientCall::Play)
    }

    fn record(&self, call: AmbientCall) -> Result<(), SoundError> {
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(SoundError::PlaybackError("Mock failure".to_string()));
        }
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
        Ok(())
    }
}

impl AmbientBackend for MockAmbientBackend {
    fn load(&self, source: &SoundSource) -> Result<(), SoundError> {
        self.record(AmbientCall::Load(source.clone()))
    }

    fn play(&self) -> Result<(), SoundError> {
        self.record(AmbientCall::Play)
    }

    fn pause(&self) -> Result<(), SoundError> {
        self.record(AmbientCall::Pause)
    }

    fn rewind(&self) -> Result<(), SoundError> {
        self.record(AmbientCall::Rewind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> (AmbientController, Arc<MockAmbientBackend>) {
        let backend = Arc::new(MockAmbientBackend::new());
        let controller = AmbientController::new(backend.clone(), "/sounds");
        (controller, backend)
    }

    #[test]
    fn test_disabled_preference_never_plays() {
        let (mut c, backend) = controller();
        c.set_enabled(true);
        assert!(!c.is_playing());
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn test_enabled_preference_loads_and_plays() {
        let (mut c, backend) = controller();
        c.set_preference(true, AmbientVariant::Rainfall);
        c.set_enabled(true);

        assert!(c.is_playing());
        assert_eq!(
            backend.calls(),
            vec![
                AmbientCall::Load(SoundSource::ambient(AmbientVariant::Rainfall, "/sounds".as_ref())),
                AmbientCall::Play,
            ]
        );
    }

    #[test]
    fn test_stop_pauses_and_rewinds() {
        let (mut c, backend) = controller();
        c.set_preference(true, AmbientVariant::Rainfall);
        c.set_enabled(true);
        backend.clear_calls();

        c.set_enabled(false);
        assert!(!c.is_playing());
        assert_eq!(backend.calls(), vec![AmbientCall::Pause, AmbientCall::Rewind]);
    }

    #[test]
    fn test_restart_does_not_reload_same_source() {
        let (mut c, backend) = controller();
        c.set_preference(true, AmbientVariant::Rainfall);
        c.set_enabled(true);
        c.set_enabled(false);
        backend.clear_calls();

        c.set_enabled(true);
        assert_eq!(backend.calls(), vec![AmbientCall::Play]);
    }

    #[test]
    fn test_repeated_enable_is_idempotent() {
        let (mut c, backend) = controller();
        c.set_preference(true, AmbientVariant::Rainfall);
        c.set_enabled(true);
        backend.clear_calls();

        c.set_enabled(true);
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn test_stop_without_load_is_noop() {
        let (mut c, backend) = controller();
        c.set_enabled(false);
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn test_variant_change_while_playing_switches_source() {
        let (mut c, backend) = controller();
        c.set_preference(true, AmbientVariant::Rainfall);
        c.set_enabled(true);
        backend.clear_calls();

        c.set_preference(true, AmbientVariant::OceanWaves);
        assert!(c.is_playing());
        assert_eq!(
            backend.calls(),
            vec![
                AmbientCall::Load(SoundSource::ambient(AmbientVariant::OceanWaves, "/sounds".as_ref())),
                AmbientCall::Play,
            ]
        );
    }

    #[test]
    fn test_variant_change_while_idle_does_not_play() {
        let (mut c, backend) = controller();
        c.set_preference(true, AmbientVariant::Rainfall);
        c.set_enabled(true);
        c.set_enabled(false);
        backend.clear_calls();

        c.set_preference(true, AmbientVariant::Heartbeat);
        assert!(!c.is_playing());
        assert_eq!(
            backend.calls(),
            vec![AmbientCall::Load(SoundSource::ambient(
                AmbientVariant::Heartbeat,
                "/sounds".as_ref()
            ))]
        );
    }

    #[test]
    fn test_disabling_preference_stops_playback() {
        let (mut c, backend) = controller();
        c.set_preference(true, AmbientVariant::Rainfall);
        c.set_enabled(true);

        c.set_preference(false, AmbientVariant::Rainfall);
        assert!(!c.is_playing());
        assert!(!backend.is_playing());
    }

    #[test]
    fn test_backend_failure_is_swallowed() {
        let (mut c, backend) = controller();
        backend.set_should_fail(true);
        c.set_preference(true, AmbientVariant::Rainfall);
        c.set_enabled(true);
        assert!(!c.is_playing());
    }

    #[test]
    fn test_disabled_controller_is_noop() {
        let mut c = AmbientController::disabled();
        c.set_preference(true, AmbientVariant::Rainfall);
        c.set_enabled(true);
        assert!(!c.is_playing());
    }
}
