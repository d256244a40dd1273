//! Audio backend using rodio.
//!
//! rodio's output stream cannot leave the thread that opened it, so one
//! dedicated audio thread owns the stream and every sink. Callers hold a
//! cheap, thread-safe `RodioAudio` handle and send commands over a
//! crossbeam channel. Failures are logged on the audio thread and never
//! reported back to the caller.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use rodio::source::{SineWave, Source};
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};
use tracing::{debug, warn};

use super::error::SoundError;
use super::source::SoundSource;
use super::{AmbientBackend, SoundPlayer};

/// Frequency of the built-in completion tone.
const TONE_FREQUENCY_HZ: f32 = 880.0;

/// Length of the built-in completion tone.
const TONE_DURATION_MS: u64 = 400;

/// Volume of the ambient loop.
const AMBIENT_VOLUME: f32 = 0.8;

/// Commands understood by the audio thread.
#[derive(Debug)]
enum AudioCommand {
    PlayOnce(SoundSource),
    AmbientLoad(SoundSource),
    AmbientPlay,
    AmbientPause,
    AmbientRewind,
    Shutdown,
}

/// Handle to the audio thread.
pub struct RodioAudio {
    commands: Sender<AudioCommand>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl RodioAudio {
    /// Starts the audio thread and opens the default output device.
    ///
    /// # Errors
    ///
    /// Returns `SoundError::DeviceNotAvailable` if no audio output device
    /// is available.
    pub fn spawn() -> Result<Self, SoundError> {
        let (tx, rx) = unbounded();
        let (ready_tx, ready_rx) = bounded::<Result<(), SoundError>>(1);

        let thread = std::thread::Builder::new()
            .name("focusmind-audio".to_string())
            .spawn(move || audio_thread(rx, ready_tx))
            .map_err(|e| SoundError::StreamError(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = thread.join();
                return Err(e);
            }
            Err(_) => return Err(SoundError::AudioThreadGone),
        }

        debug!("Audio thread started");

        Ok(Self {
            commands: tx,
            thread: Mutex::new(Some(thread)),
        })
    }

    fn send(&self, command: AudioCommand) -> Result<(), SoundError> {
        self.commands
            .send(command)
            .map_err(|_| SoundError::AudioThreadGone)
    }

    /// Stops the audio thread and waits for it to exit.
    pub fn shutdown(&self) {
        let _ = self.commands.send(AudioCommand::Shutdown);
        let handle = match self.thread.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        };
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }
}

impl Drop for RodioAudio {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for RodioAudio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RodioAudio").finish_non_exhaustive()
    }
}

impl SoundPlayer for RodioAudio {
    fn play(&self, source: &SoundSource) -> Result<(), SoundError> {
        self.send(AudioCommand::PlayOnce(source.clone()))
    }
}

impl AmbientBackend for RodioAudio {
    fn load(&self, source: &SoundSource) -> Result<(), SoundError> {
        self.send(AudioCommand::AmbientLoad(source.clone()))
    }

    fn play(&self) -> Result<(), SoundError> {
        self.send(AudioCommand::AmbientPlay)
    }

    fn pause(&self) -> Result<(), SoundError> {
        self.send(AudioCommand::AmbientPause)
    }

    fn rewind(&self) -> Result<(), SoundError> {
        self.send(AudioCommand::AmbientRewind)
    }
}

/// Starts the audio backend, returning None if audio is unavailable.
///
/// If audio initialization fails, a warning is logged and None is returned.
#[must_use]
pub fn try_create_audio() -> Option<Arc<RodioAudio>> {
    match RodioAudio::spawn() {
        Ok(audio) => Some(Arc::new(audio)),
        Err(e) => {
            warn!("Audio not available, sound disabled: {}", e);
            None
        }
    }
}

// ============================================================================
// Audio thread
// ============================================================================

struct AmbientState {
    source: Option<SoundSource>,
    sink: Option<Sink>,
}

fn audio_thread(commands: Receiver<AudioCommand>, ready: Sender<Result<(), SoundError>>) {
    let (_stream, handle) = match OutputStream::try_default() {
        Ok(pair) => pair,
        Err(e) => {
            let _ = ready.send(Err(SoundError::DeviceNotAvailable(e.to_string())));
            return;
        }
    };
    let _ = ready.send(Ok(()));

    let mut ambient = AmbientState {
        source: None,
        sink: None,
    };

    while let Ok(command) = commands.recv() {
        match command {
            AudioCommand::PlayOnce(source) => {
                if let Err(e) = play_once(&handle, &source) {
                    warn!("Failed to play '{}': {}", source.name(), e);
                }
            }
            AudioCommand::AmbientLoad(source) => {
                if let Some(sink) = ambient.sink.take() {
                    sink.stop();
                }
                debug!("Ambient source loaded: {}", source.name());
                ambient.source = Some(source);
            }
            AudioCommand::AmbientPlay => {
                if let Err(e) = play_ambient(&handle, &mut ambient) {
                    warn!("Failed to play ambient sound: {}", e);
                }
            }
            AudioCommand::AmbientPause => {
                if let Some(sink) = &ambient.sink {
                    sink.pause();
                }
            }
            AudioCommand::AmbientRewind => {
                // Dropping the sink rewinds: the next play decodes from the start.
                if let Some(sink) = ambient.sink.take() {
                    sink.stop();
                }
            }
            AudioCommand::Shutdown => break,
        }
    }

    debug!("Audio thread exiting");
}

fn play_once(handle: &OutputStreamHandle, source: &SoundSource) -> Result<(), SoundError> {
    let sink = Sink::try_new(handle).map_err(|e| SoundError::StreamError(e.to_string()))?;

    match source {
        SoundSource::File { path, name } => match open_decoder(path) {
            Ok(decoder) => sink.append(decoder),
            Err(e) if e.should_fallback_to_tone() => {
                warn!("Cue '{}' unusable ({}), playing tone instead", name, e);
                sink.append(tone());
            }
            Err(e) => return Err(e),
        },
        SoundSource::Tone { .. } => sink.append(tone()),
    }

    sink.detach();
    Ok(())
}

fn play_ambient(handle: &OutputStreamHandle, ambient: &mut AmbientState) -> Result<(), SoundError> {
    if let Some(sink) = &ambient.sink {
        sink.play();
        return Ok(());
    }

    let Some(source) = &ambient.source else {
        return Err(SoundError::PlaybackError("no ambient source loaded".to_string()));
    };
    let Some(path) = source.path() else {
        return Err(SoundError::PlaybackError(format!(
            "ambient source '{}' is not a file",
            source.name()
        )));
    };

    let file = File::open(path)
        .map_err(|e| SoundError::FileNotFound(format!("{}: {}", path.display(), e)))?;
    let looped = Decoder::new_looped(BufReader::new(file))
        .map_err(|e| SoundError::DecodeError(e.to_string()))?;

    let sink = Sink::try_new(handle).map_err(|e| SoundError::StreamError(e.to_string()))?;
    sink.set_volume(AMBIENT_VOLUME);
    sink.append(looped);
    sink.play();
    debug!("Ambient sound started: {}", source.name());
    ambient.sink = Some(sink);
    Ok(())
}

fn open_decoder(path: &Path) -> Result<Decoder<BufReader<File>>, SoundError> {
    let file = File::open(path)
        .map_err(|e| SoundError::FileNotFound(format!("{}: {}", path.display(), e)))?;
    Decoder::new(BufReader::new(file)).map_err(|e| SoundError::DecodeError(e.to_string()))
}

fn tone() -> impl Source<Item = f32> + Send + 'static {
    SineWave::new(TONE_FREQUENCY_HZ)
        .take_duration(Duration::from_millis(TONE_DURATION_MS))
        .amplify(0.2)
}
