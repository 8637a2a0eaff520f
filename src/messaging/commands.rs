/// Command types for the audio runtime
///
/// Commands represent requests to perform actions (imperative).
/// They are executed on the runtime thread, in arrival order.

/// Session commands
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Start background music (fade-in unless muted)
    StartMusic,

    /// Stop background music
    StopMusic { immediate: bool },

    /// Fade music in, to `target` or the stored volume
    FadeIn { target: Option<f32> },

    /// Fade music out, then pause and rewind
    FadeOut,

    SetVolume(f32),

    SetMuted(bool),

    ToggleMute,

    /// Trigger the next click cue
    PlayClick,

    /// Play the transition cue alone
    PlayTransition,

    /// Splash exit: transition now, music after the exit delay
    Enter,

    /// Restart the click sequence at its first cue
    ResetCues,

    /// Play or pause a sample preview
    TogglePreview { sample_id: String, locator: String },

    StopPreview,

    OpenPackModal,

    ClosePackModal,

    /// Tear the session down and end the runtime thread
    Shutdown,
}

impl Command {
    /// Get a human-readable description of the command
    pub fn description(&self) -> String {
        match self {
            Command::StartMusic => "Start music".to_string(),
            Command::StopMusic { immediate: true } => "Stop music now".to_string(),
            Command::StopMusic { immediate: false } => "Stop music".to_string(),
            Command::FadeIn { target } => match target {
                Some(target) => format!("Fade in to {:.2}", target),
                None => "Fade in".to_string(),
            },
            Command::FadeOut => "Fade out".to_string(),
            Command::SetVolume(volume) => format!("Set volume: {:.2}", volume),
            Command::SetMuted(muted) => format!("Set muted: {}", muted),
            Command::ToggleMute => "Toggle mute".to_string(),
            Command::PlayClick => "Play click".to_string(),
            Command::PlayTransition => "Play transition".to_string(),
            Command::Enter => "Enter".to_string(),
            Command::ResetCues => "Reset cue sequence".to_string(),
            Command::TogglePreview { sample_id, .. } => format!("Toggle preview: {}", sample_id),
            Command::StopPreview => "Stop preview".to_string(),
            Command::OpenPackModal => "Open pack modal".to_string(),
            Command::ClosePackModal => "Close pack modal".to_string(),
            Command::Shutdown => "Shut down".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_description() {
        let cmd = Command::StopMusic { immediate: true };
        assert_eq!(cmd.description(), "Stop music now");

        let cmd = Command::SetVolume(0.8);
        assert_eq!(cmd.description(), "Set volume: 0.80");
    }
}
