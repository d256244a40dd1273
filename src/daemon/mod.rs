//! Daemon module for the focus timer.
//!
//! This module contains the core daemon functionality:
//! - `timer`: Timer engine with state transitions and countdown logic
//! - `clock`: Time source and the one-second tick driver
//! - `persistence`: Snapshot storage for suspend/resume
//! - `dispatch`: Routes timer events to the session log and feedback timeouts
//! - `ipc`: Unix socket server and request handling
//! - `runtime`: Daemon startup and shutdown

pub mod clock;
pub mod dispatch;
pub mod ipc;
pub mod persistence;
pub mod runtime;
pub mod timer;

pub use clock::{Clock, ClockDriver, ClockHandle, ManualClock, SystemClock, TICK_INTERVAL};
pub use dispatch::EventDispatcher;
pub use ipc::{serve_connection, IpcError, IpcServer, RequestHandler};
pub(crate) use persistence::write_json_atomic;
pub use persistence::{
    FileSnapshotStore, MemorySnapshotStore, PersistenceError, SnapshotStore, STALE_SNAPSHOT_SECS,
};
pub use runtime::run;
pub use timer::{
    PendingFeedback, RejectReason, ResumeOutcome, TimerEngine, TimerEvent, TransitionOutcome,
};
