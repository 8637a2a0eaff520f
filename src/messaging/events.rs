/// Event types for the audio session
///
/// Events represent things that have happened (past tense).
/// They are broadcast to all subscribers.

use crate::audio_system::cues::CuePlayerState;
use crate::audio_system::effects::{FadeDirection, VolumeState};
use crate::audio_system::session::MusicState;
use crate::audio_system::source::AudioSourceType;

/// Session events
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Background music moved between stopped, fading and playing
    MusicStateChanged { old_state: MusicState, new_state: MusicState },

    /// Volume or mute flag changed
    VolumeChanged { volume: VolumeState },

    /// A fade ran to its target
    FadeCompleted { direction: FadeDirection },

    /// Cue player lifecycle changed
    CuePlayerStateChanged {
        old_state: CuePlayerState,
        new_state: CuePlayerState,
    },

    /// A sequential cue began playback
    CuePlayed { index: usize },

    /// The transition cue began playback
    TransitionPlayed,

    /// The splash exit delay elapsed and music was started
    Entered,

    /// Preview switched to another sample, or stopped (`None`)
    PreviewChanged { sample: Option<String> },

    /// Pack modal opened or closed
    PackModalChanged { open: bool },

    /// A play attempt failed; never fatal
    PlaybackFailed { source: AudioSourceType },

    /// Session is shutting down
    Shutdown,
}

impl Event {
    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            Event::MusicStateChanged { new_state, .. } => {
                format!("Music: {}", new_state.description())
            }
            Event::VolumeChanged { volume } => {
                if volume.is_muted() {
                    format!("Volume {:.0}% (muted)", volume.volume() * 100.0)
                } else {
                    format!("Volume {:.0}%", volume.volume() * 100.0)
                }
            }
            Event::FadeCompleted { direction } => format!("Fade {:?} complete", direction),
            Event::CuePlayerStateChanged { new_state, .. } => {
                format!("Cue player: {}", new_state.description())
            }
            Event::CuePlayed { index } => format!("Cue {} played", index),
            Event::TransitionPlayed => "Transition played".to_string(),
            Event::Entered => "Entered site".to_string(),
            Event::PreviewChanged { sample } => match sample {
                Some(sample) => format!("Previewing {}", sample),
                None => "Preview stopped".to_string(),
            },
            Event::PackModalChanged { open } => {
                if *open {
                    "Pack modal opened".to_string()
                } else {
                    "Pack modal closed".to_string()
                }
            }
            Event::PlaybackFailed { source } => format!("{} failed to play", source),
            Event::Shutdown => "Shutting down".to_string(),
        }
    }
}
