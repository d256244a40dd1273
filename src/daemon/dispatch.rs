//! Event dispatcher.
//!
//! Consumes `TimerEvent`s from the engine's channel, forwards session
//! lifecycle events to the `SessionLogger` and arms the timeout of every
//! feedback request. Runs outside the engine lock except when it calls back
//! into the engine on a timeout.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use super::timer::{TimerEngine, TimerEvent};
use crate::session::SessionLogger;

/// Routes timer events to their consumers.
pub struct EventDispatcher {
    engine: Arc<Mutex<TimerEngine>>,
    logger: Arc<dyn SessionLogger>,
    feedback_timeout: Duration,
}

impl EventDispatcher {
    pub fn new(
        engine: Arc<Mutex<TimerEngine>>,
        logger: Arc<dyn SessionLogger>,
        feedback_timeout: Duration,
    ) -> Self {
        Self {
            engine,
            logger,
            feedback_timeout,
        }
    }

    /// Spawns the dispatcher on the current runtime.
    pub fn spawn(self, rx: mpsc::UnboundedReceiver<TimerEvent>) -> JoinHandle<()> {
        tokio::spawn(self.run(rx))
    }

    /// Handles events until every sender is gone.
    pub async fn run(self, mut rx: mpsc::UnboundedReceiver<TimerEvent>) {
        while let Some(event) = rx.recv().await {
            self.dispatch(event);
        }
        debug!("Event channel closed");
    }

    /// Handles one event.
    pub fn dispatch(&self, event: TimerEvent) {
        match event {
            TimerEvent::Tick { .. } => {}
            TimerEvent::SessionStarted { mode, started_at } => {
                if let Err(e) = self.logger.log_session_start(mode, started_at) {
                    warn!("Failed to log session start: {}", e);
                }
            }
            TimerEvent::SessionCompleted { record } => {
                if let Err(e) = self.logger.log_session_completed(&record) {
                    warn!("Failed to log session: {}", e);
                }
            }
            TimerEvent::FeedbackRequested { id, .. } => {
                self.arm_feedback_timeout(id);
            }
            other => debug!("Timer event: {:?}", other),
        }
    }

    fn arm_feedback_timeout(&self, id: Uuid) {
        let engine = Arc::clone(&self.engine);
        let timeout = self.feedback_timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let mut engine = engine.lock().await;
            if engine.dismiss_feedback(id).is_applied() {
                debug!("Feedback request {} timed out", id);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MemorySessionLog;
    use crate::settings::MemorySettingsProvider;
    use crate::types::{TimerMode, TimerSettings, TimerStatus};

    struct Setup {
        engine: Arc<Mutex<TimerEngine>>,
        dispatcher: EventDispatcher,
        rx: mpsc::UnboundedReceiver<TimerEvent>,
        log: Arc<MemorySessionLog>,
    }

    impl Setup {
        fn new(timeout_secs: u64) -> Self {
            let (tx, rx) = mpsc::unbounded_channel();
            let engine = Arc::new(Mutex::new(TimerEngine::new(TimerSettings::guest(), tx)));
            let log = Arc::new(MemorySessionLog::new());
            let dispatcher = EventDispatcher::new(
                Arc::clone(&engine),
                log.clone(),
                Duration::from_secs(timeout_secs),
            );
            Self {
                engine,
                dispatcher,
                rx,
                log,
            }
        }

        fn drain(&mut self) {
            while let Ok(event) = self.rx.try_recv() {
                self.dispatcher.dispatch(event);
            }
        }

        async fn sign_in(&self) {
            let mut provider =
                MemorySettingsProvider::new(TimerSettings::guest().with_work_minutes(1));
            let _ = self.engine.lock().await.sign_in("alice", &mut provider);
        }

        /// Runs a one-minute work session to zero.
        async fn finish_work(&self) {
            let mut engine = self.engine.lock().await;
            let _ = engine.start();
            for _ in 0..60 {
                let _ = engine.tick();
            }
        }
    }

    #[tokio::test]
    async fn test_session_start_is_logged() {
        let mut s = Setup::new(120);
        s.sign_in().await;
        let _ = s.engine.lock().await.start();

        s.drain();
        let starts = s.log.starts();
        assert_eq!(starts.len(), 1);
        assert_eq!(starts[0].0, TimerMode::Work);
    }

    #[tokio::test]
    async fn test_guest_session_is_not_logged() {
        let mut s = Setup::new(120);
        let _ = s.engine.lock().await.start();
        let _ = s.engine.lock().await.skip();

        s.drain();
        assert!(s.log.starts().is_empty());
        assert!(s.log.records().is_empty());
    }

    #[tokio::test]
    async fn test_submitted_feedback_is_logged() {
        let mut s = Setup::new(120);
        s.sign_in().await;
        s.finish_work().await;
        {
            let mut engine = s.engine.lock().await;
            assert_eq!(engine.status(), TimerStatus::AwaitingFeedback);
            let _ = engine.submit_feedback(Some(5));
        }

        s.drain();
        let records = s.log.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].feedback, Some(5));
        assert_eq!(records[0].duration_seconds, 60);
        assert_eq!(records[0].user.as_deref(), Some("alice"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_feedback_timeout_dismisses_request() {
        let mut s = Setup::new(120);
        s.sign_in().await;
        s.finish_work().await;
        s.drain();

        tokio::time::sleep(Duration::from_secs(121)).await;

        {
            let engine = s.engine.lock().await;
            assert!(engine.pending_feedback().is_none());
            assert_eq!(engine.mode(), TimerMode::Break);
            assert_eq!(engine.status(), TimerStatus::Running);
        }

        s.drain();
        let records = s.log.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].feedback, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_after_submit_is_noop() {
        let mut s = Setup::new(10);
        s.sign_in().await;
        s.finish_work().await;
        s.drain();
        let _ = s.engine.lock().await.submit_feedback(Some(3));

        tokio::time::sleep(Duration::from_secs(11)).await;
        s.drain();

        let records = s.log.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].feedback, Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_skip_feedback_times_out_in_background() {
        let mut s = Setup::new(30);
        s.sign_in().await;
        {
            let mut engine = s.engine.lock().await;
            let _ = engine.start();
            for _ in 0..20 {
                let _ = engine.tick();
            }
            let _ = engine.skip();
            assert_eq!(engine.mode(), TimerMode::Break);
            assert_eq!(engine.status(), TimerStatus::Idle);
        }
        s.drain();

        tokio::time::sleep(Duration::from_secs(31)).await;
        s.drain();

        let records = s.log.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].duration_seconds, 20);
        assert_eq!(records[0].feedback, None);
        assert_eq!(s.engine.lock().await.status(), TimerStatus::Idle);
    }

    #[tokio::test]
    async fn test_run_drains_queue_after_engine_shutdown() {
        let s = Setup::new(120);
        s.sign_in().await;
        s.finish_work().await;

        let Setup {
            engine,
            dispatcher,
            rx,
            log,
        } = s;
        let task = dispatcher.spawn(rx);
        let _ = engine.lock().await.shutdown();

        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("dispatcher should stop once the channel closes")
            .unwrap();
        // The break started when the pending rating was finalized.
        let starts = log.starts();
        assert_eq!(starts.len(), 2);
        assert_eq!(starts[1].0, TimerMode::Break);
        let records = log.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].feedback, None);
    }
}
