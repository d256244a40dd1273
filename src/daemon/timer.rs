//! Timer engine for the focus timer.
//!
//! This module provides the core timer functionality:
//! - State transitions (Idle → Running ⇄ PausedActive → Idle)
//! - Countdown driven by an external `tick()`
//! - Mode switching between work and break, with auto-start on completion
//! - Feedback collection for completed work sessions
//! - Suspend/resume through a snapshot store
//!
//! Transitions never fail. A call whose precondition does not hold is a
//! no-op and returns `TransitionOutcome::Ignored` with the reason.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use chrono::{DateTime, Utc};

use super::clock::{Clock, SystemClock};
use super::persistence::{MemorySnapshotStore, SnapshotStore, STALE_SNAPSHOT_SECS};
use crate::settings::SettingsProvider;
use crate::sound::{AmbientController, SoundPlayer, SoundSource};
use crate::types::{
    calculate_percentage, is_valid_rating, SessionRecord, TimerMode, TimerSettings,
    TimerSnapshot, TimerStatus, TimerView,
};

// ============================================================================
// TimerEvent
// ============================================================================

/// Timer events for session logging and other observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerEvent {
    /// A new session started from idle
    Started { mode: TimerMode },
    /// A paused session continued
    Resumed,
    /// A signed-in user started a session (for the session logger)
    SessionStarted {
        mode: TimerMode,
        started_at: DateTime<Utc>,
    },
    /// The running session was paused
    Paused,
    /// One second elapsed
    Tick { remaining_seconds: u32 },
    /// The interval counted down to zero
    IntervalCompleted { mode: TimerMode },
    /// The session was ended early
    Skipped {
        mode: TimerMode,
        duration_seconds: u32,
    },
    /// The session was discarded
    Cancelled { mode: TimerMode },
    /// The next interval was loaded
    ModeSwitched { mode: TimerMode, auto_started: bool },
    /// A finished work session waits for a rating
    FeedbackRequested {
        id: Uuid,
        duration_seconds: u32,
        blocking: bool,
    },
    /// A work session is final (for the session logger)
    SessionCompleted { record: SessionRecord },
    /// New durations took effect
    SettingsApplied,
    /// New durations wait for the current session to end
    SettingsDeferred,
    /// State was restored from a snapshot
    Restored { remaining_seconds: u32 },
    /// A user signed in
    SignedIn { user: String },
    /// The user signed out
    SignedOut,
}

// ============================================================================
// Outcomes
// ============================================================================

/// Why a transition was not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("タイマーは既に実行中です")]
    AlreadyRunning,
    #[error("タイマーは実行されていません")]
    NotRunning,
    #[error("進行中のセッションがありません")]
    NoActiveSession,
    #[error("残り時間が残っています")]
    TimeRemaining,
    #[error("セッションの評価を待っています")]
    AwaitingFeedback,
    #[error("評価待ちのセッションはありません")]
    NoPendingFeedback,
    #[error("評価は1から5で指定してください")]
    InvalidRating,
    #[error("ログインしていません")]
    NotSignedIn,
    #[error("設定を読み込み中です")]
    SettingsLoading,
    #[error("設定に変更はありません")]
    NoSettingsChange,
    #[error("状態の保存に失敗しました")]
    StorageUnavailable,
}

/// Result of a transition.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    Applied,
    Ignored(RejectReason),
}

impl TransitionOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }

    pub fn reason(&self) -> Option<RejectReason> {
        match self {
            Self::Applied => None,
            Self::Ignored(reason) => Some(*reason),
        }
    }
}

/// What `resume()` did with the stored snapshot.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeOutcome {
    /// Nothing was stored
    NoSnapshot,
    /// The snapshot was older than the staleness threshold and was dropped
    Stale,
    /// The snapshot was unreadable or inconsistent and was dropped
    Invalid,
    /// The session was restored
    Restored { running: bool },
    /// The session ran out while suspended and was completed
    CompletedWhileSuspended,
}

/// A finished work session waiting for its rating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingFeedback {
    pub id: Uuid,
    pub duration_seconds: u32,
    pub completed_at: DateTime<Utc>,
    /// True if the mode switch waits for this rating
    pub blocking: bool,
}

// ============================================================================
// TimerEngine
// ============================================================================

/// Timer engine that owns the timer state and its side effects.
pub struct TimerEngine {
    /// Active settings; durations change only while idle
    settings: TimerSettings,
    /// Durations queued while a session is in progress
    deferred_settings: Option<TimerSettings>,
    mode: TimerMode,
    remaining_seconds: u32,
    is_paused: bool,
    is_active: bool,
    session_started_at: Option<DateTime<Utc>>,
    pending_feedback: Option<PendingFeedback>,
    user: Option<String>,
    clock: Arc<dyn Clock>,
    cue: Option<Arc<dyn SoundPlayer>>,
    cue_source: SoundSource,
    ambient: AmbientController,
    store: Box<dyn SnapshotStore>,
    /// False once the store is known to be empty
    snapshot_stored: bool,
    /// Event sender channel
    event_tx: mpsc::UnboundedSender<TimerEvent>,
}

impl TimerEngine {
    /// Creates an idle engine in work mode with the given settings.
    pub fn new(settings: TimerSettings, event_tx: mpsc::UnboundedSender<TimerEvent>) -> Self {
        let remaining_seconds = settings.total_seconds(TimerMode::Work);
        Self {
            settings,
            deferred_settings: None,
            mode: TimerMode::Work,
            remaining_seconds,
            is_paused: true,
            is_active: false,
            session_started_at: None,
            pending_feedback: None,
            user: None,
            clock: Arc::new(SystemClock),
            cue: None,
            cue_source: SoundSource::tone("complete"),
            ambient: AmbientController::disabled(),
            store: Box::new(MemorySnapshotStore::new()),
            snapshot_stored: true,
            event_tx,
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Sets the player and source for the completion cue.
    #[must_use]
    pub fn with_cue_player(mut self, player: Arc<dyn SoundPlayer>, source: SoundSource) -> Self {
        self.cue = Some(player);
        self.cue_source = source;
        self
    }

    #[must_use]
    pub fn with_ambient(mut self, mut ambient: AmbientController) -> Self {
        ambient.set_preference(
            self.settings.ambient_sound_enabled,
            self.settings.ambient_sound_variant,
        );
        self.ambient = ambient;
        self
    }

    #[must_use]
    pub fn with_snapshot_store(mut self, store: Box<dyn SnapshotStore>) -> Self {
        self.store = store;
        self.snapshot_stored = true;
        self
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn status(&self) -> TimerStatus {
        if self.pending_feedback.as_ref().is_some_and(|p| p.blocking) {
            TimerStatus::AwaitingFeedback
        } else if !self.is_active {
            TimerStatus::Idle
        } else if self.is_paused {
            TimerStatus::PausedActive
        } else {
            TimerStatus::Running
        }
    }

    pub fn mode(&self) -> TimerMode {
        self.mode
    }

    pub fn remaining_seconds(&self) -> u32 {
        self.remaining_seconds
    }

    /// Length of the current interval under the active settings.
    pub fn total_seconds(&self) -> u32 {
        self.settings.total_seconds(self.mode)
    }

    pub fn settings(&self) -> &TimerSettings {
        &self.settings
    }

    pub fn deferred_settings(&self) -> Option<&TimerSettings> {
        self.deferred_settings.as_ref()
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn session_started_at(&self) -> Option<DateTime<Utc>> {
        self.session_started_at
    }

    pub fn pending_feedback(&self) -> Option<&PendingFeedback> {
        self.pending_feedback.as_ref()
    }

    pub fn is_ambient_playing(&self) -> bool {
        self.ambient.is_playing()
    }

    /// What the UI renders.
    pub fn view(&self) -> TimerView {
        let total_seconds = self.total_seconds();
        TimerView {
            mode: self.mode,
            state: self.status(),
            remaining_seconds: self.remaining_seconds,
            total_seconds,
            percentage: calculate_percentage(self.remaining_seconds, total_seconds),
            is_paused: self.is_paused,
            is_active: self.is_active,
            awaiting_feedback: self.pending_feedback.is_some(),
            user: self.user.clone(),
        }
    }

    /// Captures the current state, stamped with the current time.
    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            mode: self.mode,
            remaining_seconds: self.remaining_seconds,
            is_paused: self.is_paused,
            is_active: self.is_active,
            session_started_at: self.session_started_at,
            captured_at: self.clock.now(),
            total_seconds: Some(self.total_seconds()),
        }
    }

    // ------------------------------------------------------------------------
    // User transitions
    // ------------------------------------------------------------------------

    /// Starts a session from idle, or continues a paused one.
    pub fn start(&mut self) -> TransitionOutcome {
        match self.status() {
            TimerStatus::AwaitingFeedback => {
                return TransitionOutcome::Ignored(RejectReason::AwaitingFeedback)
            }
            TimerStatus::Running => return TransitionOutcome::Ignored(RejectReason::AlreadyRunning),
            TimerStatus::Idle => {
                let now = self.clock.now();
                self.session_started_at = Some(now);
                self.is_active = true;
                self.emit(TimerEvent::Started { mode: self.mode });
                if self.user.is_some() {
                    self.emit(TimerEvent::SessionStarted {
                        mode: self.mode,
                        started_at: now,
                    });
                }
                debug!("Session started: {}", self.mode.as_str());
            }
            TimerStatus::PausedActive => {
                self.emit(TimerEvent::Resumed);
                debug!("Session resumed: {}", self.mode.as_str());
            }
        }

        self.is_paused = false;
        self.ambient.set_enabled(true);
        self.invalidate_snapshot();
        TransitionOutcome::Applied
    }

    /// Pauses the running session.
    pub fn pause(&mut self) -> TransitionOutcome {
        if self.status() != TimerStatus::Running {
            return TransitionOutcome::Ignored(RejectReason::NotRunning);
        }

        self.is_paused = true;
        self.ambient.set_enabled(false);
        self.invalidate_snapshot();
        self.emit(TimerEvent::Paused);
        debug!("Session paused at {}s", self.remaining_seconds);
        TransitionOutcome::Applied
    }

    /// Advances the countdown by one second.
    ///
    /// Ignored unless running. Reaching zero completes the interval.
    pub fn tick(&mut self) -> TransitionOutcome {
        if self.status() != TimerStatus::Running {
            return TransitionOutcome::Ignored(RejectReason::NotRunning);
        }

        self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
        self.emit(TimerEvent::Tick {
            remaining_seconds: self.remaining_seconds,
        });

        if self.remaining_seconds == 0 {
            let now = self.clock.now();
            self.finish_interval(true, now);
        }
        TransitionOutcome::Applied
    }

    /// Completes an active session whose countdown has reached zero.
    pub fn complete(&mut self) -> TransitionOutcome {
        if self.status() == TimerStatus::AwaitingFeedback {
            return TransitionOutcome::Ignored(RejectReason::AwaitingFeedback);
        }
        if !self.is_active {
            return TransitionOutcome::Ignored(RejectReason::NoActiveSession);
        }
        if self.remaining_seconds != 0 {
            return TransitionOutcome::Ignored(RejectReason::TimeRemaining);
        }

        let now = self.clock.now();
        self.finish_interval(true, now);
        TransitionOutcome::Applied
    }

    /// Ends the session early and loads the next mode without starting it.
    ///
    /// A signed-in user gets partial credit for the elapsed work time.
    pub fn skip(&mut self) -> TransitionOutcome {
        if self.status() == TimerStatus::AwaitingFeedback {
            return TransitionOutcome::Ignored(RejectReason::AwaitingFeedback);
        }
        if !self.is_active {
            return TransitionOutcome::Ignored(RejectReason::NoActiveSession);
        }

        let mode = self.mode;
        let duration_seconds = self.total_seconds().saturating_sub(self.remaining_seconds);

        self.play_cue();
        self.ambient.set_enabled(false);
        self.invalidate_snapshot();
        self.emit(TimerEvent::Skipped {
            mode,
            duration_seconds,
        });
        info!("Session skipped: {} after {}s", mode.as_str(), duration_seconds);

        self.end_session();
        if mode == TimerMode::Work && self.user.is_some() && duration_seconds > 0 {
            let now = self.clock.now();
            self.request_feedback(duration_seconds, false, now);
        }
        self.switch_mode(false);
        TransitionOutcome::Applied
    }

    /// Discards the session without a record and resets the countdown.
    pub fn cancel(&mut self) -> TransitionOutcome {
        if !self.is_active {
            return TransitionOutcome::Ignored(RejectReason::NoActiveSession);
        }

        self.ambient.set_enabled(false);
        self.invalidate_snapshot();
        self.end_session();
        self.apply_deferred_settings();
        self.remaining_seconds = self.total_seconds();
        self.emit(TimerEvent::Cancelled { mode: self.mode });
        info!("Session cancelled: {}", self.mode.as_str());
        TransitionOutcome::Applied
    }

    // ------------------------------------------------------------------------
    // Feedback
    // ------------------------------------------------------------------------

    /// Rates the pending work session. `None` skips the rating.
    pub fn submit_feedback(&mut self, rating: Option<u8>) -> TransitionOutcome {
        if rating.is_some_and(|r| !is_valid_rating(r)) {
            return TransitionOutcome::Ignored(RejectReason::InvalidRating);
        }
        let Some(pending) = self.pending_feedback.take() else {
            return TransitionOutcome::Ignored(RejectReason::NoPendingFeedback);
        };

        self.resolve_feedback(pending, rating);
        TransitionOutcome::Applied
    }

    /// Resolves the request `id` without a rating, if it is still pending.
    pub fn dismiss_feedback(&mut self, id: Uuid) -> TransitionOutcome {
        if self.pending_feedback.as_ref().map(|p| p.id) != Some(id) {
            return TransitionOutcome::Ignored(RejectReason::NoPendingFeedback);
        }
        let Some(pending) = self.pending_feedback.take() else {
            return TransitionOutcome::Ignored(RejectReason::NoPendingFeedback);
        };

        debug!("Feedback request {} dismissed", id);
        self.resolve_feedback(pending, None);
        TransitionOutcome::Applied
    }

    // ------------------------------------------------------------------------
    // Settings and authentication
    // ------------------------------------------------------------------------

    /// Applies new settings.
    ///
    /// The ambient preference takes effect at once. New durations are queued
    /// while a session is in progress and applied when it ends; otherwise
    /// the countdown is reset to the new length and the timer goes idle.
    pub fn apply_settings_change(&mut self, settings: TimerSettings) -> TransitionOutcome {
        self.ambient
            .set_preference(settings.ambient_sound_enabled, settings.ambient_sound_variant);
        self.ambient.set_enabled(self.status() == TimerStatus::Running);
        self.settings.ambient_sound_enabled = settings.ambient_sound_enabled;
        self.settings.ambient_sound_variant = settings.ambient_sound_variant;

        if self.is_active || self.status() == TimerStatus::AwaitingFeedback {
            let same_durations = settings.work_minutes == self.settings.work_minutes
                && settings.break_minutes == self.settings.break_minutes;
            if same_durations {
                self.deferred_settings = None;
            } else {
                debug!("Settings deferred until the session ends");
                self.deferred_settings = Some(settings);
                self.emit(TimerEvent::SettingsDeferred);
            }
            return TransitionOutcome::Applied;
        }

        // Idle: nothing is suspended, except a snapshot from the previous
        // run that `resume` has yet to read, so the store is left alone.
        self.deferred_settings = None;
        self.settings = settings;
        self.remaining_seconds = self.total_seconds();
        self.is_paused = true;
        self.emit(TimerEvent::SettingsApplied);
        debug!(
            "Settings applied: work {}m, break {}m",
            self.settings.work_minutes, self.settings.break_minutes
        );
        TransitionOutcome::Applied
    }

    /// Pulls settings from the provider if they changed.
    pub fn sync_settings<P>(&mut self, provider: &mut P) -> TransitionOutcome
    where
        P: SettingsProvider + ?Sized,
    {
        let snapshot = provider.snapshot();
        if snapshot.is_loading {
            return TransitionOutcome::Ignored(RejectReason::SettingsLoading);
        }
        if !provider.has_changed() {
            return TransitionOutcome::Ignored(RejectReason::NoSettingsChange);
        }

        let outcome = self.apply_settings_change(snapshot.settings);
        provider.acknowledge_change();
        outcome
    }

    /// Signs a user in and loads their settings.
    pub fn sign_in<P>(&mut self, user: impl Into<String>, provider: &mut P) -> TransitionOutcome
    where
        P: SettingsProvider + ?Sized,
    {
        let user = user.into();
        info!("Signed in as {}", user);
        self.user = Some(user.clone());
        self.emit(TimerEvent::SignedIn { user });

        let snapshot = provider.snapshot();
        if snapshot.is_loading {
            return TransitionOutcome::Ignored(RejectReason::SettingsLoading);
        }
        let outcome = self.apply_settings_change(snapshot.settings);
        provider.acknowledge_change();
        outcome
    }

    /// Signs the user out, discarding any session and pending rating.
    pub fn sign_out(&mut self) -> TransitionOutcome {
        let Some(user) = self.user.take() else {
            return TransitionOutcome::Ignored(RejectReason::NotSignedIn);
        };

        if self.pending_feedback.take().is_some() {
            debug!("Pending feedback discarded on sign-out");
        }
        self.deferred_settings = None;
        self.ambient.set_enabled(false);
        self.settings = TimerSettings::guest();
        self.ambient.set_preference(
            self.settings.ambient_sound_enabled,
            self.settings.ambient_sound_variant,
        );
        self.invalidate_snapshot();
        self.end_session();
        self.remaining_seconds = self.total_seconds();
        self.emit(TimerEvent::SignedOut);
        info!("Signed out {}", user);
        TransitionOutcome::Applied
    }

    // ------------------------------------------------------------------------
    // Suspend / resume
    // ------------------------------------------------------------------------

    /// Persists the active session so it can be resumed later.
    ///
    /// Idle timers clear any stored snapshot instead.
    pub fn suspend(&mut self) -> TransitionOutcome {
        if !self.is_active {
            self.invalidate_snapshot();
            return TransitionOutcome::Ignored(RejectReason::NoActiveSession);
        }

        let snapshot = self.snapshot();
        match self.store.save(&snapshot) {
            Ok(()) => {
                self.snapshot_stored = true;
                info!(
                    "Suspended {} session with {}s remaining",
                    snapshot.mode.as_str(),
                    snapshot.remaining_seconds
                );
                TransitionOutcome::Applied
            }
            Err(e) => {
                warn!("Failed to save snapshot: {}", e);
                TransitionOutcome::Ignored(RejectReason::StorageUnavailable)
            }
        }
    }

    /// Reconciles the stored snapshot with the time that passed since.
    ///
    /// The snapshot is consumed whatever the outcome.
    pub fn resume(&mut self) -> ResumeOutcome {
        let loaded = self.store.load();
        self.snapshot_stored = true;
        self.invalidate_snapshot();

        let snapshot = match loaded {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return ResumeOutcome::NoSnapshot,
            Err(e) => {
                warn!("Discarding unreadable snapshot: {}", e);
                return ResumeOutcome::Invalid;
            }
        };

        let age = (self.clock.now() - snapshot.captured_at).num_seconds();
        if age > STALE_SNAPSHOT_SECS {
            info!("Discarding snapshot captured {}s ago", age);
            return ResumeOutcome::Stale;
        }
        if self.status() == TimerStatus::AwaitingFeedback {
            warn!("Discarding snapshot while a rating is pending");
            return ResumeOutcome::Invalid;
        }
        let current_total = self.settings.total_seconds(snapshot.mode);
        let total = snapshot.total_seconds.unwrap_or(current_total);
        if total == 0 || total % 60 != 0 || !snapshot.is_consistent(total) {
            warn!("Discarding inconsistent snapshot: {:?}", snapshot);
            return ResumeOutcome::Invalid;
        }

        let elapsed = u32::try_from(age.max(0)).unwrap_or(u32::MAX);

        self.mode = snapshot.mode;
        self.is_active = snapshot.is_active;
        self.is_paused = snapshot.is_paused;
        self.session_started_at = snapshot.session_started_at;
        self.remaining_seconds = snapshot.remaining_seconds;

        // The restored session keeps the length it was started with; the
        // current durations wait for it to end.
        if total != current_total {
            let session_settings = self
                .settings
                .clone()
                .with_total_seconds(snapshot.mode, total);
            let current = std::mem::replace(&mut self.settings, session_settings);
            self.deferred_settings = Some(current);
            debug!("Restored session runs for {}s; new durations deferred", total);
        }

        if snapshot.is_running() {
            self.remaining_seconds = snapshot.remaining_seconds.saturating_sub(elapsed);
            if self.remaining_seconds == 0 {
                info!("Session finished while suspended");
                let ended_at = snapshot.captured_at
                    + chrono::Duration::seconds(i64::from(snapshot.remaining_seconds));
                self.finish_interval(false, ended_at);
                return ResumeOutcome::CompletedWhileSuspended;
            }
            self.ambient.set_enabled(true);
        } else {
            self.ambient.set_enabled(false);
        }

        self.emit(TimerEvent::Restored {
            remaining_seconds: self.remaining_seconds,
        });
        info!(
            "Resumed {} session with {}s remaining",
            self.mode.as_str(),
            self.remaining_seconds
        );
        ResumeOutcome::Restored {
            running: snapshot.is_running(),
        }
    }

    /// Prepares the engine for process exit.
    ///
    /// An unanswered rating is finalized without feedback so the session is
    /// still logged, the session is suspended, and the event channel is
    /// closed so the consumer can drain what is queued and stop.
    pub fn shutdown(&mut self) -> TransitionOutcome {
        if let Some(pending) = self.pending_feedback.take() {
            info!("Logging unrated session before shutdown");
            self.resolve_feedback(pending, None);
        }
        let outcome = self.suspend();

        let (closed_tx, _) = mpsc::unbounded_channel();
        self.event_tx = closed_tx;
        outcome
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn finish_interval(&mut self, play_cue: bool, ended_at: DateTime<Utc>) {
        let mode = self.mode;
        if play_cue {
            self.play_cue();
        }
        self.ambient.set_enabled(false);
        self.invalidate_snapshot();
        self.emit(TimerEvent::IntervalCompleted { mode });
        info!("Interval completed: {}", mode.as_str());

        self.end_session();
        if mode == TimerMode::Work && self.user.is_some() {
            self.remaining_seconds = 0;
            let duration_seconds = self.settings.total_seconds(TimerMode::Work);
            self.request_feedback(duration_seconds, true, ended_at);
        } else {
            self.switch_mode(true);
        }
    }

    fn switch_mode(&mut self, auto_start: bool) {
        self.apply_deferred_settings();
        self.end_session();
        self.mode = self.mode.toggled();
        self.remaining_seconds = self.total_seconds();
        self.emit(TimerEvent::ModeSwitched {
            mode: self.mode,
            auto_started: auto_start,
        });
        debug!("Switched to {}", self.mode.as_str());

        if auto_start {
            let outcome = self.start();
            debug_assert!(outcome.is_applied(), "auto-start rejected: {:?}", outcome);
        }
    }

    fn end_session(&mut self) {
        self.is_active = false;
        self.is_paused = true;
        self.session_started_at = None;
    }

    fn apply_deferred_settings(&mut self) {
        if let Some(settings) = self.deferred_settings.take() {
            self.settings.work_minutes = settings.work_minutes;
            self.settings.break_minutes = settings.break_minutes;
            self.emit(TimerEvent::SettingsApplied);
            debug!("Deferred settings applied");
        }
    }

    fn request_feedback(
        &mut self,
        duration_seconds: u32,
        blocking: bool,
        completed_at: DateTime<Utc>,
    ) {
        if let Some(previous) = self.pending_feedback.take() {
            // Only a background request can still be open here.
            self.emit_record(&previous, None);
        }

        let id = Uuid::new_v4();
        self.pending_feedback = Some(PendingFeedback {
            id,
            duration_seconds,
            completed_at,
            blocking,
        });
        self.emit(TimerEvent::FeedbackRequested {
            id,
            duration_seconds,
            blocking,
        });
        debug!("Feedback requested ({}s, blocking: {})", duration_seconds, blocking);
    }

    fn resolve_feedback(&mut self, pending: PendingFeedback, rating: Option<u8>) {
        self.emit_record(&pending, rating);
        if pending.blocking {
            self.switch_mode(true);
        }
    }

    fn emit_record(&self, pending: &PendingFeedback, feedback: Option<u8>) {
        let record = SessionRecord {
            duration_seconds: pending.duration_seconds,
            feedback,
            completed_at: pending.completed_at,
            user: self.user.clone(),
        };
        self.emit(TimerEvent::SessionCompleted { record });
    }

    fn play_cue(&self) {
        if let Some(player) = &self.cue {
            if let Err(e) = player.play(&self.cue_source) {
                warn!("Failed to play completion cue: {}", e);
            }
        }
    }

    fn invalidate_snapshot(&mut self) {
        if !self.snapshot_stored {
            return;
        }
        match self.store.clear() {
            Ok(()) => self.snapshot_stored = false,
            Err(e) => warn!("Failed to clear snapshot: {}", e),
        }
    }

    fn emit(&self, event: TimerEvent) {
        if self.event_tx.send(event).is_err() {
            debug!("Timer event dropped: no receiver");
        }
    }
}

impl std::fmt::Debug for TimerEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerEngine")
            .field("mode", &self.mode)
            .field("remaining_seconds", &self.remaining_seconds)
            .field("is_paused", &self.is_paused)
            .field("is_active", &self.is_active)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
