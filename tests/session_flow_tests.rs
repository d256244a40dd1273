//! End-to-end session flows on the engine with real file-backed stores.
//!
//! - Feedback after a completed work session reaches the JSONL log
//! - Skipped sessions get partial credit
//! - Suspend in one daemon run, resume in the next
//! - Stale and completed-while-suspended snapshots
//! - Shutdown while a rating is pending
//! - Sign-out discards the session

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use tokio::sync::{mpsc, Mutex};
use tokio::time::Duration;

use focusmind::config::AppPaths;
use focusmind::daemon::{
    EventDispatcher, FileSnapshotStore, ManualClock, ResumeOutcome, TimerEngine, TimerEvent,
};
use focusmind::session::{JsonlSessionLog, SessionStats};
use focusmind::settings::{FileSettingsProvider, MemorySettingsProvider};
use focusmind::sound::{MockAmbientBackend, MockSoundPlayer, SoundPlayer, SoundSource};
use focusmind::types::{AmbientVariant, SettingsPatch, TimerMode, TimerSettings, TimerStatus};
use focusmind::AmbientController;

// ============================================================================
// Test Helpers
// ============================================================================

struct Flow {
    paths: AppPaths,
    clock: ManualClock,
    engine: Arc<Mutex<TimerEngine>>,
    rx: mpsc::UnboundedReceiver<TimerEvent>,
    dispatcher: EventDispatcher,
    log: Arc<JsonlSessionLog>,
    cue: Arc<MockSoundPlayer>,
    ambient: Arc<MockAmbientBackend>,
    _dir: Arc<tempfile::TempDir>,
}

impl Flow {
    fn new() -> Self {
        let dir = Arc::new(tempfile::tempdir().unwrap());
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 6, 10, 9, 0, 0).unwrap());
        Self::with_dir(dir, clock)
    }

    /// A second daemon run on the same data directory.
    fn restart(&self) -> Self {
        Self::with_dir(Arc::clone(&self._dir), self.clock.clone())
    }

    fn with_dir(dir: Arc<tempfile::TempDir>, clock: ManualClock) -> Self {
        let paths = AppPaths::new(dir.path());
        let (tx, rx) = mpsc::unbounded_channel();
        let cue = Arc::new(MockSoundPlayer::new());
        let ambient = Arc::new(MockAmbientBackend::new());
        let cue_player: Arc<dyn SoundPlayer> = cue.clone();

        let engine = TimerEngine::new(TimerSettings::guest(), tx)
            .with_clock(Arc::new(clock.clone()))
            .with_cue_player(cue_player, SoundSource::tone("complete"))
            .with_ambient(AmbientController::new(ambient.clone(), paths.sounds_dir()))
            .with_snapshot_store(Box::new(FileSnapshotStore::new(paths.snapshot_path())));
        let engine = Arc::new(Mutex::new(engine));

        let log = Arc::new(JsonlSessionLog::new(paths.sessions_path()));
        let dispatcher =
            EventDispatcher::new(Arc::clone(&engine), log.clone(), Duration::from_secs(120));

        Self {
            paths,
            clock,
            engine,
            rx,
            dispatcher,
            log,
            cue,
            ambient,
            _dir: dir,
        }
    }

    fn drain(&mut self) {
        while let Ok(event) = self.rx.try_recv() {
            self.dispatcher.dispatch(event);
        }
    }

    async fn sign_in(&self, user: &str, settings: TimerSettings) {
        let mut provider = MemorySettingsProvider::new(settings);
        let _ = self.engine.lock().await.sign_in(user, &mut provider);
    }

    /// Advances both the wall clock and the countdown by `secs`.
    async fn run_for(&self, secs: u32) {
        let mut engine = self.engine.lock().await;
        for _ in 0..secs {
            self.clock.advance(1);
            let _ = engine.tick();
        }
    }
}

fn short_settings() -> TimerSettings {
    TimerSettings::guest()
        .with_work_minutes(1)
        .with_break_minutes(1)
}

// ============================================================================
// Feedback and logging
// ============================================================================

/// 作業完了 → 評価待ち → 評価 → 記録 → 休憩が自動開始
#[tokio::test]
async fn test_completed_session_is_rated_and_logged() {
    let mut flow = Flow::new();
    flow.sign_in("alice", short_settings()).await;

    let _ = flow.engine.lock().await.start();
    flow.run_for(60).await;

    {
        let engine = flow.engine.lock().await;
        assert_eq!(engine.status(), TimerStatus::AwaitingFeedback);
        assert_eq!(engine.remaining_seconds(), 0);
        assert_eq!(engine.mode(), TimerMode::Work);
    }
    assert_eq!(flow.cue.play_count(), 1);

    // Ticks while waiting do nothing.
    flow.run_for(5).await;
    assert_eq!(flow.engine.lock().await.mode(), TimerMode::Work);

    let _ = flow.engine.lock().await.submit_feedback(Some(4));
    {
        let engine = flow.engine.lock().await;
        assert_eq!(engine.mode(), TimerMode::Break);
        assert_eq!(engine.status(), TimerStatus::Running);
        assert_eq!(engine.remaining_seconds(), 60);
    }

    flow.drain();
    let records = flow.log.read_all().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].duration_seconds, 60);
    assert_eq!(records[0].feedback, Some(4));
    assert_eq!(records[0].user.as_deref(), Some("alice"));

    let stats = SessionStats::compute(&records, &flow.clock_now());
    assert_eq!(stats.total_sessions, 1);
    assert_eq!(stats.total_minutes, 1);
}

/// スキップは経過時間だけ記録し、休憩は自動開始しない
#[tokio::test]
async fn test_skipped_session_gets_partial_credit() {
    let mut flow = Flow::new();
    flow.sign_in("alice", TimerSettings::guest()).await;

    let _ = flow.engine.lock().await.start();
    flow.run_for(600).await;
    let _ = flow.engine.lock().await.skip();

    {
        let engine = flow.engine.lock().await;
        assert_eq!(engine.mode(), TimerMode::Break);
        assert_eq!(engine.status(), TimerStatus::Idle);
        let pending = engine.pending_feedback().unwrap();
        assert_eq!(pending.duration_seconds, 600);
        assert!(!pending.blocking);
    }

    let _ = flow.engine.lock().await.submit_feedback(None);
    flow.drain();
    let records = flow.log.read_all().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].duration_seconds, 600);
    assert_eq!(records[0].feedback, None);
}

/// ゲストのセッションは記録されない
#[tokio::test]
async fn test_guest_sessions_are_not_logged() {
    let mut flow = Flow::new();
    {
        let mut engine = flow.engine.lock().await;
        let _ = engine.apply_settings_change(short_settings());
        let _ = engine.start();
    }
    flow.run_for(60).await;

    {
        let engine = flow.engine.lock().await;
        assert_eq!(engine.mode(), TimerMode::Break);
        assert_eq!(engine.status(), TimerStatus::Running);
        assert!(engine.pending_feedback().is_none());
    }
    flow.drain();
    assert!(flow.log.read_all().unwrap().is_empty());
}

// ============================================================================
// Suspend / resume across daemon runs
// ============================================================================

/// 中断 → 再起動 → 経過時間を差し引いて再開
#[tokio::test]
async fn test_suspend_and_resume_in_next_run() {
    let flow = Flow::new();
    let _ = flow.engine.lock().await.start();
    flow.run_for(100).await;
    assert!(flow.engine.lock().await.suspend().is_applied());
    assert!(flow.paths.snapshot_path().exists());

    flow.clock.advance(60);
    let next = flow.restart();
    let outcome = next.engine.lock().await.resume();
    assert_eq!(outcome, ResumeOutcome::Restored { running: true });

    let engine = next.engine.lock().await;
    assert_eq!(engine.status(), TimerStatus::Running);
    assert_eq!(engine.remaining_seconds(), 45 * 60 - 160);
    assert!(!next.paths.snapshot_path().exists());
}

/// 一時停止中のセッションは経過時間に関係なくそのまま復元される
#[tokio::test]
async fn test_paused_session_resumes_unchanged() {
    let flow = Flow::new();
    {
        let mut engine = flow.engine.lock().await;
        let _ = engine.start();
    }
    flow.run_for(30).await;
    {
        let mut engine = flow.engine.lock().await;
        let _ = engine.pause();
        assert!(engine.suspend().is_applied());
    }

    flow.clock.advance(600);
    let next = flow.restart();
    let outcome = next.engine.lock().await.resume();
    assert_eq!(outcome, ResumeOutcome::Restored { running: false });
    let engine = next.engine.lock().await;
    assert_eq!(engine.status(), TimerStatus::PausedActive);
    assert_eq!(engine.remaining_seconds(), 45 * 60 - 30);
}

/// 中断中に時間切れになったセッションは完了扱い（完了音なし）
#[tokio::test]
async fn test_session_completed_while_suspended() {
    let flow = Flow::new();
    let _ = flow.engine.lock().await.start();
    flow.run_for(45 * 60 - 10).await;
    assert!(flow.engine.lock().await.suspend().is_applied());

    flow.clock.advance(30);
    let next = flow.restart();
    let outcome = next.engine.lock().await.resume();
    assert_eq!(outcome, ResumeOutcome::CompletedWhileSuspended);
    assert_eq!(next.cue.play_count(), 0);

    let engine = next.engine.lock().await;
    assert_eq!(engine.mode(), TimerMode::Break);
    assert_eq!(engine.status(), TimerStatus::Running);
}

/// 評価待ちのまま停止 → 評価なしで記録 → 次の起動で休憩を再開
#[tokio::test]
async fn test_unrated_session_is_logged_across_shutdown() {
    let flow = Flow::new();
    flow.sign_in("alice", short_settings()).await;
    let _ = flow.engine.lock().await.start();
    flow.run_for(60).await;
    assert_eq!(
        flow.engine.lock().await.status(),
        TimerStatus::AwaitingFeedback
    );

    let Flow {
        engine,
        rx,
        dispatcher,
        log,
        clock,
        _dir: dir,
        ..
    } = flow;
    let task = dispatcher.spawn(rx);
    let _ = engine.lock().await.shutdown();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("dispatcher should stop once the channel closes")
        .unwrap();

    let records = log.read_all().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].feedback, None);
    assert_eq!(records[0].duration_seconds, 60);

    clock.advance(20);
    let next = Flow::with_dir(dir, clock);
    next.sign_in("alice", short_settings()).await;
    assert_eq!(
        next.engine.lock().await.resume(),
        ResumeOutcome::Restored { running: true }
    );
    {
        let engine = next.engine.lock().await;
        assert_eq!(engine.mode(), TimerMode::Break);
        assert_eq!(engine.remaining_seconds(), 40);
    }
    assert_eq!(next.log.read_all().unwrap().len(), 1);
}

/// セッション中に時間を変更して再起動しても、元の長さで経過時間を記録する
#[tokio::test]
async fn test_deferred_durations_survive_restart() {
    let flow = Flow::new();
    flow.sign_in("alice", TimerSettings::guest()).await;
    let _ = flow.engine.lock().await.start();
    flow.run_for(100).await;
    {
        let mut engine = flow.engine.lock().await;
        let _ = engine.apply_settings_change(TimerSettings::guest().with_work_minutes(60));
        assert!(engine.suspend().is_applied());
    }

    let mut next = flow.restart();
    next.sign_in("alice", TimerSettings::guest().with_work_minutes(60))
        .await;
    assert_eq!(
        next.engine.lock().await.resume(),
        ResumeOutcome::Restored { running: true }
    );
    {
        let mut engine = next.engine.lock().await;
        assert_eq!(engine.total_seconds(), 45 * 60);
        assert_eq!(engine.remaining_seconds(), 45 * 60 - 100);
        let _ = engine.skip();
        let _ = engine.submit_feedback(Some(3));
        assert_eq!(engine.settings().work_minutes, 60);
    }

    next.drain();
    let records = next.log.read_all().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].duration_seconds, 100);
    assert_eq!(records[0].feedback, Some(3));
}

/// 中断中に終わったセッションは終了時刻で記録される
#[tokio::test]
async fn test_expired_session_keeps_its_end_time() {
    let flow = Flow::new();
    flow.sign_in("alice", short_settings()).await;
    let _ = flow.engine.lock().await.start();
    flow.run_for(50).await;
    assert!(flow.engine.lock().await.suspend().is_applied());
    let ended_at = flow.clock_now() + chrono::Duration::seconds(10);

    flow.clock.advance(1800);
    let mut next = flow.restart();
    next.sign_in("alice", short_settings()).await;
    assert_eq!(
        next.engine.lock().await.resume(),
        ResumeOutcome::CompletedWhileSuspended
    );
    let _ = next.engine.lock().await.submit_feedback(None);

    next.drain();
    let records = next.log.read_all().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].completed_at, ended_at);
}

/// 1時間以上前のスナップショットは破棄される
#[tokio::test]
async fn test_stale_snapshot_is_discarded() {
    let flow = Flow::new();
    let _ = flow.engine.lock().await.start();
    assert!(flow.engine.lock().await.suspend().is_applied());

    flow.clock.advance(3601);
    let next = flow.restart();
    assert_eq!(next.engine.lock().await.resume(), ResumeOutcome::Stale);
    assert_eq!(next.engine.lock().await.status(), TimerStatus::Idle);
    assert!(!next.paths.snapshot_path().exists());
}

/// 中断後の操作でスナップショットは無効になる
#[tokio::test]
async fn test_transition_after_suspend_invalidates_snapshot() {
    let flow = Flow::new();
    let _ = flow.engine.lock().await.start();
    assert!(flow.engine.lock().await.suspend().is_applied());
    let _ = flow.engine.lock().await.cancel();
    assert!(!flow.paths.snapshot_path().exists());

    let next = flow.restart();
    assert_eq!(next.engine.lock().await.resume(), ResumeOutcome::NoSnapshot);
}

// ============================================================================
// Settings, ambient sound and sign-out
// ============================================================================

/// セッション中の時間変更は終了後に反映、環境音は即時反映
#[tokio::test]
async fn test_settings_change_during_session() {
    let mut flow = Flow::new();
    let mut provider = FileSettingsProvider::load(flow.paths.settings_path("alice"));
    let _ = flow.engine.lock().await.sign_in("alice", &mut provider);
    let _ = flow.engine.lock().await.start();

    provider
        .update(&SettingsPatch {
            work_minutes: Some(1),
            ambient_sound_enabled: Some(true),
            ambient_sound_variant: Some("Wind".to_string()),
            ..Default::default()
        })
        .unwrap();
    let _ = flow.engine.lock().await.sync_settings(&mut provider);

    {
        let engine = flow.engine.lock().await;
        assert_eq!(engine.total_seconds(), 45 * 60);
        assert!(engine.deferred_settings().is_some());
        assert!(engine.is_ambient_playing());
    }
    assert!(flow.ambient.is_playing());

    let _ = flow.engine.lock().await.cancel();
    {
        let engine = flow.engine.lock().await;
        assert_eq!(engine.total_seconds(), 60);
        assert_eq!(engine.settings().ambient_sound_variant, AmbientVariant::Wind);
        assert!(!engine.is_ambient_playing());
    }
    assert!(!flow.ambient.is_playing());
    flow.drain();
}

/// ログアウトでセッションと評価待ちを破棄し、記録しない
#[tokio::test]
async fn test_sign_out_discards_session() {
    let mut flow = Flow::new();
    flow.sign_in("alice", short_settings()).await;
    let _ = flow.engine.lock().await.start();
    flow.run_for(60).await;
    assert_eq!(
        flow.engine.lock().await.status(),
        TimerStatus::AwaitingFeedback
    );

    let _ = flow.engine.lock().await.sign_out();
    {
        let engine = flow.engine.lock().await;
        assert_eq!(engine.status(), TimerStatus::Idle);
        assert_eq!(engine.user(), None);
        assert_eq!(engine.remaining_seconds(), 45 * 60);
        assert!(engine.pending_feedback().is_none());
    }

    flow.drain();
    assert!(flow.log.read_all().unwrap().is_empty());
}

impl Flow {
    fn clock_now(&self) -> chrono::DateTime<Utc> {
        use focusmind::daemon::Clock;
        self.clock.now()
    }
}
