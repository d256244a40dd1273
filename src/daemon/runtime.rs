//! Daemon runtime: wires the engine to its collaborators and serves IPC
//! until SIGINT or SIGTERM.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::{mpsc, Mutex};
use tokio::time::Duration;
use tracing::{debug, info, warn};

use super::clock::ClockDriver;
use super::dispatch::EventDispatcher;
use super::ipc::{serve_connection, IpcServer, RequestHandler};
use super::persistence::FileSnapshotStore;
use super::timer::{ResumeOutcome, TimerEngine};
use crate::config::DaemonOptions;
use crate::session::JsonlSessionLog;
use crate::settings::load_auth;
use crate::sound::{
    completion_cue, discover_sounds, try_create_audio, AmbientBackend, AmbientController,
    SoundPlayer,
};
use crate::types::TimerSettings;

/// How long shutdown waits for queued events to reach the session log.
const DISPATCHER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Runs the daemon until a shutdown signal arrives.
///
/// # Errors
///
/// Returns an error if the socket cannot be bound or signal handlers cannot
/// be installed.
pub async fn run(options: DaemonOptions) -> Result<()> {
    let paths = options.paths.clone();
    std::fs::create_dir_all(paths.base())
        .with_context(|| format!("Failed to create data directory: {:?}", paths.base()))?;

    let (tx, rx) = mpsc::unbounded_channel();
    let mut engine = TimerEngine::new(TimerSettings::guest(), tx).with_snapshot_store(Box::new(
        FileSnapshotStore::new(paths.snapshot_path()),
    ));

    let sounds_dir = paths.sounds_dir();
    let audio = if options.no_sound {
        None
    } else {
        try_create_audio()
    };
    if let Some(audio) = &audio {
        let available = discover_sounds(&sounds_dir);
        debug!("{} sound file(s) in {:?}", available.len(), sounds_dir);

        let cue: Arc<dyn SoundPlayer> = audio.clone();
        let backend: Arc<dyn AmbientBackend> = audio.clone();
        engine = engine
            .with_cue_player(cue, completion_cue(&sounds_dir))
            .with_ambient(AmbientController::new(backend, &sounds_dir));
    } else {
        info!("Sound disabled");
    }

    let engine = Arc::new(Mutex::new(engine));
    let handler = Arc::new(RequestHandler::new(Arc::clone(&engine), paths.clone()));

    // The user comes first so a session that ran out while the daemon was
    // down is logged for them.
    if let Some(auth) = load_auth(&paths.auth_path()) {
        if let Err(e) = handler.restore_user(&auth.user).await {
            warn!("Ignoring stored sign-in: {:#}", e);
        }
    }

    match engine.lock().await.resume() {
        ResumeOutcome::NoSnapshot => {}
        outcome => info!("Snapshot on startup: {:?}", outcome),
    }

    let server = IpcServer::new(&paths.socket_path())?;
    info!("Daemon listening on {:?}", server.socket_path());

    let mut clock = ClockDriver::spawn(Arc::clone(&engine));
    let dispatcher = EventDispatcher::new(
        Arc::clone(&engine),
        Arc::new(JsonlSessionLog::new(paths.sessions_path())),
        options.feedback_timeout,
    )
    .spawn(rx);

    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
    let mut sigint =
        signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?;

    loop {
        tokio::select! {
            result = server.accept() => {
                match result {
                    Ok(stream) => {
                        let handler = Arc::clone(&handler);
                        tokio::spawn(async move {
                            serve_connection(&handler, stream).await;
                        });
                    }
                    Err(e) => warn!("Accept error: {:#}", e),
                }
            }
            _ = sigterm.recv() => break,
            _ = sigint.recv() => break,
        }
    }

    info!("Shutting down daemon");
    clock.stop();
    let _ = engine.lock().await.shutdown();
    match tokio::time::timeout(DISPATCHER_DRAIN_TIMEOUT, dispatcher).await {
        Ok(Ok(())) => debug!("Event dispatcher drained"),
        Ok(Err(e)) => warn!("Event dispatcher failed: {}", e),
        Err(_) => warn!("Event dispatcher did not drain in time"),
    }
    drop(server);
    if let Some(audio) = audio {
        audio.shutdown();
    }
    info!("Daemon stopped");
    Ok(())
}
