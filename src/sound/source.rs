//! Sound source resolution.
//!
//! Sounds live as files under the sounds directory. The completion cue falls
//! back to a built-in tone when its file is missing; ambient variants have no
//! fallback and simply stay silent.

use std::path::{Path, PathBuf};

use crate::types::AmbientVariant;

/// File name of the completion cue inside the sounds directory.
pub const COMPLETION_CUE_FILE: &str = "complete.mp3";

/// Supported audio file extensions.
const SUPPORTED_EXTENSIONS: &[&str] = &["mp3", "wav", "flac", "ogg", "aiff"];

/// Represents the source of a sound to be played.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SoundSource {
    /// An audio file on disk.
    File {
        /// Display name of the sound.
        name: String,
        /// Full path to the file.
        path: PathBuf,
    },
    /// A short synthesized tone.
    Tone {
        /// Display name of the tone.
        name: String,
    },
}

impl SoundSource {
    /// Creates a new file sound source.
    #[must_use]
    pub fn file(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::File {
            name: name.into(),
            path: path.into(),
        }
    }

    /// Creates a new tone source.
    #[must_use]
    pub fn tone(name: impl Into<String>) -> Self {
        Self::Tone { name: name.into() }
    }

    /// Returns the name of the sound source.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::File { name, .. } | Self::Tone { name } => name,
        }
    }

    /// Returns true if this is a file source.
    #[must_use]
    pub fn is_file(&self) -> bool {
        matches!(self, Self::File { .. })
    }

    /// Returns the file path if this is a file source.
    #[must_use]
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Self::File { path, .. } => Some(path),
            Self::Tone { .. } => None,
        }
    }

    /// Source for an ambient variant: `<sounds_dir>/<slug>.mp3`.
    #[must_use]
    pub fn ambient(variant: AmbientVariant, sounds_dir: &Path) -> Self {
        Self::file(
            variant.as_str(),
            sounds_dir.join(format!("{}.mp3", variant.slug())),
        )
    }
}

/// Gets the completion cue, falling back to the built-in tone.
#[must_use]
pub fn completion_cue(sounds_dir: &Path) -> SoundSource {
    let path = sounds_dir.join(COMPLETION_CUE_FILE);
    if path.is_file() {
        SoundSource::file("complete", path)
    } else {
        SoundSource::tone("complete")
    }
}

/// Lists the audio files present in the sounds directory.
#[must_use]
pub fn discover_sounds(sounds_dir: &Path) -> Vec<SoundSource> {
    let mut sounds = Vec::new();

    if let Ok(entries) = std::fs::read_dir(sounds_dir) {
        for entry in entries.flatten() {
            let file_path = entry.path();
            let Some(ext) = file_path.extension() else {
                continue;
            };
            let ext = ext.to_string_lossy().to_lowercase();
            if !SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
                continue;
            }
            if let Some(stem) = file_path.file_stem() {
                sounds.push(SoundSource::File {
                    name: stem.to_string_lossy().into_owned(),
                    path: file_path,
                });
            }
        }
    }

    sounds.sort_by(|a, b| a.name().cmp(b.name()));
    sounds
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sound_source_file() {
        let source = SoundSource::file("Wind", "/sounds/wind.mp3");
        assert!(source.is_file());
        assert_eq!(source.name(), "Wind");
        assert_eq!(source.path(), Some(&PathBuf::from("/sounds/wind.mp3")));
    }

    #[test]
    fn test_sound_source_tone() {
        let source = SoundSource::tone("complete");
        assert!(!source.is_file());
        assert!(source.path().is_none());
    }

    #[test]
    fn test_ambient_source_path() {
        let source = SoundSource::ambient(AmbientVariant::OceanWaves, Path::new("/data/sounds"));
        assert_eq!(source.name(), "Ocean waves");
        assert_eq!(
            source.path(),
            Some(&PathBuf::from("/data/sounds/ocean-waves.mp3"))
        );
    }

    #[test]
    fn test_completion_cue_falls_back_to_tone() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(completion_cue(dir.path()), SoundSource::tone("complete"));
    }

    #[test]
    fn test_completion_cue_prefers_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(COMPLETION_CUE_FILE), b"fake").unwrap();
        assert!(completion_cue(dir.path()).is_file());
    }

    #[test]
    fn test_discover_sounds_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("wind.mp3"), b"x").unwrap();
        std::fs::write(dir.path().join("heartbeat.wav"), b"x").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();

        let sounds = discover_sounds(dir.path());
        let names: Vec<&str> = sounds.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["heartbeat", "wind"]);
    }

    #[test]
    fn test_discover_sounds_missing_dir() {
        assert!(discover_sounds(Path::new("/nonexistent/focusmind/sounds")).is_empty());
    }
}
