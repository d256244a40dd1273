//! Time source and tick driver.
//!
//! Every wall-clock read in the engine goes through a `Clock` so that tests
//! can move time by hand. The `ClockDriver` is the only source of periodic
//! execution: once per second it locks the engine and calls `tick()`.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::debug;

use super::timer::TimerEngine;

/// Tick period of the driver.
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Source of wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same instant.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Moves the clock forward by `secs` seconds.
    pub fn advance(&self, secs: i64) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += ChronoDuration::seconds(secs);
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = instant;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ============================================================================
// ClockDriver
// ============================================================================

/// Drives `TimerEngine::tick` once per second.
pub struct ClockDriver;

impl ClockDriver {
    /// Spawns the tick loop on the current runtime.
    pub fn spawn(engine: Arc<AsyncMutex<TimerEngine>>) -> ClockHandle {
        Self::spawn_with_period(engine, TICK_INTERVAL)
    }

    /// Spawns the tick loop with a custom period.
    pub fn spawn_with_period(engine: Arc<AsyncMutex<TimerEngine>>, period: Duration) -> ClockHandle {
        let task = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick of an interval completes immediately.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let mut engine = engine.lock().await;
                let _ = engine.tick();
            }
        });

        debug!("Clock driver started");
        ClockHandle { task: Some(task) }
    }
}

/// Handle to a running clock driver. Dropping it stops the driver.
#[derive(Debug)]
pub struct ClockHandle {
    task: Option<JoinHandle<()>>,
}

impl ClockHandle {
    /// Stops the driver.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("Clock driver stopped");
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for ClockHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
